//! Follow-up study tasks for questions answered wrongly in homework sessions.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::grading::GradeOutcome;
use crate::model::{AnswerKey, HomeworkSource, PracticeMode, StudyTask};
use crate::normalize::as_scalar;

/// Title marker carried by generated tasks. Sessions launched from a task
/// whose title contains it do not produce further tasks.
pub const REATTEMPT_MARKER: &str = "[Re-attempt]";

/// Build one re-attempt task per answered-but-wrong question.
///
/// Nothing is produced for mock exams, without a key, without a homework
/// source, or when the source is itself a re-attempt. Tasks are dated the
/// day after `today`. Callers that persist tasks handle de-duplication.
pub fn generate_remediation_tasks(
    mode: PracticeMode,
    key: Option<&AnswerKey>,
    outcome: &GradeOutcome,
    source: Option<&HomeworkSource>,
    today: NaiveDate,
) -> Vec<StudyTask> {
    if mode == PracticeMode::Mock {
        return Vec::new();
    }
    let (Some(key), Some(source)) = (key, source) else {
        return Vec::new();
    };
    if key.is_empty() || source.title.contains(REATTEMPT_MARKER) {
        return Vec::new();
    }
    let Some(date) = today.succ_opt() else {
        return Vec::new();
    };

    outcome
        .incorrect()
        .into_iter()
        .map(|number| {
            let expected = key
                .get(number)
                .map(as_scalar)
                .unwrap_or_else(|| "?".to_string());
            StudyTask {
                id: Uuid::new_v4(),
                title: format!("{REATTEMPT_MARKER} {} Q{number}", source.title),
                description: format!(
                    "Question {number} from \"{}\" was answered incorrectly. \
                     Correct answer: {expected}. Work through it again.",
                    source.title
                ),
                date,
                subject: source.subject.clone(),
                source_task_id: source.task_id.clone(),
            }
        })
        .collect()
}
