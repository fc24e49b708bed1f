//! Per-subject and per-chapter breakdowns of a graded session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grading::{GradeOutcome, QuestionStatus};
use crate::model::{ChapterScore, Question, ResultAnalysis, TimingRecord};

/// Bucket used for questions without a subject or chapter tag.
pub const UNTAGGED: &str = "General";

/// Build the analysis attached to a locally graded result.
pub fn build_analysis(
    questions: &[Question],
    outcome: &GradeOutcome,
    timings: &TimingRecord,
) -> ResultAnalysis {
    let mut subject_timings: BTreeMap<String, u64> = BTreeMap::new();
    let mut chapter_scores: BTreeMap<String, ChapterScore> = BTreeMap::new();

    for question in questions {
        let subject = question.subject.as_deref().unwrap_or(UNTAGGED);
        let spent = timings.get(&question.number).copied().unwrap_or(0);
        *subject_timings.entry(subject.to_string()).or_insert(0) += spent;

        let chapter = question.chapter.as_deref().unwrap_or(UNTAGGED);
        let score = chapter_scores.entry(chapter.to_string()).or_default();
        score.total += 1;
        match outcome.status_of(question.number) {
            Some(QuestionStatus::Correct) => {
                score.correct += 1;
                score.attempted += 1;
            }
            Some(QuestionStatus::Incorrect) => score.attempted += 1,
            _ => {}
        }
    }

    ResultAnalysis {
        subject_timings,
        chapter_scores,
        ai_suggestions: Vec::new(),
        incorrect_question_numbers: outcome.incorrect(),
    }
}

/// Headline numbers for a graded session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
    pub ungraded: usize,
    /// Correct over attempted, 0.0 when nothing was attempted.
    pub accuracy: f64,
    pub average_secs: f64,
    /// The slowest question and its time, if any were timed.
    pub slowest: Option<(u32, u64)>,
}

impl SessionStats {
    pub fn compute(outcome: &GradeOutcome, timings: &TimingRecord) -> Self {
        let mut stats = SessionStats::default();
        for grade in &outcome.per_question {
            match grade.status {
                QuestionStatus::Correct => stats.correct += 1,
                QuestionStatus::Incorrect => stats.incorrect += 1,
                QuestionStatus::Unanswered => stats.unanswered += 1,
                QuestionStatus::Ungraded => stats.ungraded += 1,
            }
        }

        let attempted = stats.correct + stats.incorrect;
        if attempted > 0 {
            stats.accuracy = stats.correct as f64 / attempted as f64;
        }
        if !timings.is_empty() {
            let total: u64 = timings.values().sum();
            stats.average_secs = total as f64 / timings.len() as f64;
        }
        // Ties go to the lower question number.
        stats.slowest = timings
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(n, s)| (*n, *s));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::grade;
    use crate::model::{Answer, AnswerKey, AnswerRecord, PracticeMode};

    fn tagged(number: u32, subject: &str, chapter: &str) -> Question {
        let mut q = Question::placeholder(number);
        q.subject = Some(subject.into());
        q.chapter = Some(chapter.into());
        q
    }

    fn fixture() -> (Vec<Question>, GradeOutcome, TimingRecord) {
        let questions = vec![
            tagged(1, "Physics", "Optics"),
            tagged(2, "Physics", "Optics"),
            tagged(3, "Chemistry", "Bonding"),
            Question::placeholder(4),
        ];
        let key: AnswerKey = (1..=4).map(|n| (n, Answer::single("A"))).collect();
        let answers: AnswerRecord = [(1, Answer::single("A")), (2, Answer::single("B"))]
            .into_iter()
            .collect();
        let outcome = grade(&questions, &answers, &key, PracticeMode::Custom);
        let timings: TimingRecord = [(1, 40), (2, 80), (3, 10)].into_iter().collect();
        (questions, outcome, timings)
    }

    #[test]
    fn subject_timings_sum_per_subject() {
        let (questions, outcome, timings) = fixture();
        let analysis = build_analysis(&questions, &outcome, &timings);
        assert_eq!(analysis.subject_timings["Physics"], 120);
        assert_eq!(analysis.subject_timings["Chemistry"], 10);
        assert_eq!(analysis.subject_timings[UNTAGGED], 0);
    }

    #[test]
    fn chapter_scores_count_attempts() {
        let (questions, outcome, timings) = fixture();
        let analysis = build_analysis(&questions, &outcome, &timings);
        assert_eq!(
            analysis.chapter_scores["Optics"],
            ChapterScore {
                correct: 1,
                attempted: 2,
                total: 2
            }
        );
        assert_eq!(analysis.chapter_scores["Bonding"].attempted, 0);
        assert_eq!(analysis.incorrect_question_numbers, vec![2]);
    }

    #[test]
    fn headline_stats() {
        let (_, outcome, timings) = fixture();
        let stats = SessionStats::compute(&outcome, &timings);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.incorrect, 1);
        assert_eq!(stats.unanswered, 2);
        assert!((stats.accuracy - 0.5).abs() < f64::EPSILON);
        assert!((stats.average_secs - 130.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.slowest, Some((2, 80)));
    }

    #[test]
    fn empty_session_stats() {
        let stats = SessionStats::compute(
            &GradeOutcome {
                net_marks: 0,
                total_possible: 0,
                per_question: vec![],
            },
            &TimingRecord::new(),
        );
        assert_eq!(stats.accuracy, 0.0);
        assert_eq!(stats.slowest, None);
    }
}
