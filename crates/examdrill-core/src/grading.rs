//! Answer-key grading with mode-specific negative marking.
//!
//! Correct answers earn a fixed number of marks. In mock exams a wrong or
//! skipped MCQ costs a penalty; numeric and multi-choice questions are never
//! penalized, and custom practice never penalizes at all.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    timings_by_label, Answer, AnswerKey, AnswerRecord, ExamResult, PracticeMode, Question,
    QuestionKind, ResultAnalysis, TimingRecord,
};
use crate::normalize::{as_option_set, as_scalar};

/// Marks awarded for a correct answer.
pub const CORRECT_MARKS: i32 = 4;
/// Marks deducted for a penalized answer.
pub const PENALTY_MARKS: i32 = 1;
/// Total possible marks of a full mock exam.
pub const MOCK_TOTAL_MARKS: i32 = 300;

/// Mark values for one grading pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkingScheme {
    pub correct: i32,
    pub penalty: i32,
    pub mock_total: i32,
}

impl Default for MarkingScheme {
    fn default() -> Self {
        Self {
            correct: CORRECT_MARKS,
            penalty: PENALTY_MARKS,
            mock_total: MOCK_TOTAL_MARKS,
        }
    }
}

impl MarkingScheme {
    /// Whether a wrong or skipped answer costs marks.
    pub fn penalizes(&self, mode: PracticeMode, kind: QuestionKind) -> bool {
        mode == PracticeMode::Mock && kind == QuestionKind::Mcq
    }

    pub fn total_possible(&self, mode: PracticeMode, question_count: usize) -> i32 {
        match mode {
            PracticeMode::Mock => self.mock_total,
            PracticeMode::Custom => self.correct * question_count as i32,
        }
    }
}

/// How a single question came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Correct,
    /// Answered, but wrong.
    Incorrect,
    Unanswered,
    /// The key has no entry for this question.
    Ungraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub number: u32,
    pub status: QuestionStatus,
    pub marks: i32,
}

/// Result of grading a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub net_marks: i32,
    pub total_possible: i32,
    /// One entry per question, in sequence order.
    pub per_question: Vec<QuestionGrade>,
}

impl GradeOutcome {
    /// `"<net>/<total>"`.
    pub fn score_label(&self) -> String {
        format!("{}/{}", self.net_marks, self.total_possible)
    }

    /// Numbers flagged incorrect or unanswered, in sequence order.
    pub fn mistakes(&self) -> Vec<u32> {
        self.numbers_where(|s| {
            matches!(s, QuestionStatus::Incorrect | QuestionStatus::Unanswered)
        })
    }

    pub fn correct(&self) -> Vec<u32> {
        self.numbers_where(|s| s == QuestionStatus::Correct)
    }

    /// Answered-but-wrong questions only.
    pub fn incorrect(&self) -> Vec<u32> {
        self.numbers_where(|s| s == QuestionStatus::Incorrect)
    }

    pub fn status_of(&self, number: u32) -> Option<QuestionStatus> {
        self.per_question
            .iter()
            .find(|g| g.number == number)
            .map(|g| g.status)
    }

    fn numbers_where(&self, pred: impl Fn(QuestionStatus) -> bool) -> Vec<u32> {
        self.per_question
            .iter()
            .filter(|g| pred(g.status))
            .map(|g| g.number)
            .collect()
    }

    /// Build the result record for this grading pass.
    pub fn to_result(
        &self,
        syllabus: &str,
        timings: &TimingRecord,
        analysis: Option<ResultAnalysis>,
    ) -> ExamResult {
        ExamResult {
            id: Uuid::new_v4(),
            date: chrono::Utc::now(),
            score: self.score_label(),
            mistakes: self.mistakes().iter().map(u32::to_string).collect(),
            syllabus: syllabus.to_string(),
            timings: timings_by_label(timings),
            analysis,
        }
    }
}

/// Compare a captured answer with the key entry for a question of `kind`.
pub fn is_correct(kind: QuestionKind, answer: &Answer, expected: &Answer) -> bool {
    match kind {
        QuestionKind::MultiChoice => {
            let given = as_option_set(answer);
            !given.is_empty() && given == as_option_set(expected)
        }
        QuestionKind::Mcq | QuestionKind::Num => {
            let given = as_scalar(answer);
            !given.is_empty() && given == as_scalar(expected)
        }
    }
}

/// Grade a session with the default marking scheme.
pub fn grade(
    questions: &[Question],
    answers: &AnswerRecord,
    key: &AnswerKey,
    mode: PracticeMode,
) -> GradeOutcome {
    grade_with(&MarkingScheme::default(), questions, answers, key, mode)
}

/// Grade a session. Pure: the same inputs always give the same outcome.
pub fn grade_with(
    scheme: &MarkingScheme,
    questions: &[Question],
    answers: &AnswerRecord,
    key: &AnswerKey,
    mode: PracticeMode,
) -> GradeOutcome {
    let mut net_marks = 0;
    let mut per_question = Vec::with_capacity(questions.len());

    for question in questions {
        let penalty = if scheme.penalizes(mode, question.kind) {
            -scheme.penalty
        } else {
            0
        };

        let expected = key.get(question.number).filter(|a| !a.is_empty());
        let answer = answers.get(&question.number).filter(|a| !a.is_empty());

        let (status, marks) = match (expected, answer) {
            (None, _) => (QuestionStatus::Ungraded, 0),
            (Some(_), None) => (QuestionStatus::Unanswered, penalty),
            (Some(expected), Some(answer)) => {
                if is_correct(question.kind, answer, expected) {
                    (QuestionStatus::Correct, scheme.correct)
                } else {
                    (QuestionStatus::Incorrect, penalty)
                }
            }
        };

        net_marks += marks;
        per_question.push(QuestionGrade {
            number: question.number,
            status,
            marks,
        });
    }

    let outcome = GradeOutcome {
        net_marks,
        total_possible: scheme.total_possible(mode, questions.len()),
        per_question,
    };
    tracing::debug!(
        score = %outcome.score_label(),
        mistakes = outcome.mistakes().len(),
        "graded session"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcqs(numbers: &[u32]) -> Vec<Question> {
        numbers.iter().copied().map(Question::placeholder).collect()
    }

    fn with_kind(number: u32, kind: QuestionKind) -> Question {
        let mut q = Question::placeholder(number);
        q.kind = kind;
        if kind == QuestionKind::Num {
            q.options.clear();
        }
        q
    }

    fn abc_key() -> AnswerKey {
        [
            (1, Answer::single("A")),
            (2, Answer::single("B")),
            (3, Answer::single("C")),
        ]
        .into_iter()
        .collect()
    }

    fn scenario_answers() -> AnswerRecord {
        [(1, Answer::single("A")), (2, Answer::single("D"))]
            .into_iter()
            .collect()
    }

    #[test]
    fn mock_mode_penalizes_wrong_and_skipped_mcq() {
        let outcome = grade(
            &mcqs(&[1, 2, 3]),
            &scenario_answers(),
            &abc_key(),
            PracticeMode::Mock,
        );
        assert_eq!(outcome.net_marks, 2);
        assert_eq!(outcome.score_label(), "2/300");
        assert_eq!(outcome.mistakes(), vec![2, 3]);
    }

    #[test]
    fn custom_mode_never_penalizes() {
        let outcome = grade(
            &mcqs(&[1, 2, 3]),
            &scenario_answers(),
            &abc_key(),
            PracticeMode::Custom,
        );
        assert_eq!(outcome.score_label(), "4/12");
        assert_eq!(outcome.mistakes(), vec![2, 3]);
        assert_eq!(outcome.status_of(3), Some(QuestionStatus::Unanswered));
        assert_eq!(outcome.incorrect(), vec![2]);
    }

    #[test]
    fn multi_choice_order_does_not_matter() {
        let questions = vec![with_kind(1, QuestionKind::MultiChoice)];
        let key: AnswerKey = [(1, Answer::multi(["A", "C"]))].into_iter().collect();
        let answers: AnswerRecord = [(1, Answer::multi(["C", "A"]))].into_iter().collect();
        let outcome = grade(&questions, &answers, &key, PracticeMode::Mock);
        assert_eq!(outcome.correct(), vec![1]);
        assert_eq!(outcome.net_marks, 4);
    }

    #[test]
    fn multi_choice_partial_selection_is_wrong_but_unpenalized() {
        let questions = vec![with_kind(1, QuestionKind::MultiChoice)];
        let key: AnswerKey = [(1, Answer::multi(["A", "C"]))].into_iter().collect();
        let answers: AnswerRecord = [(1, Answer::multi(["A"]))].into_iter().collect();
        let outcome = grade(&questions, &answers, &key, PracticeMode::Mock);
        assert_eq!(outcome.mistakes(), vec![1]);
        assert_eq!(outcome.net_marks, 0);
    }

    #[test]
    fn skipping_num_or_multi_in_mock_costs_nothing() {
        let questions = vec![
            with_kind(1, QuestionKind::Num),
            with_kind(2, QuestionKind::MultiChoice),
        ];
        let key: AnswerKey = [(1, Answer::single("42")), (2, Answer::multi(["B", "D"]))]
            .into_iter()
            .collect();
        let outcome = grade(&questions, &AnswerRecord::new(), &key, PracticeMode::Mock);
        assert_eq!(outcome.net_marks, 0);
        assert_eq!(outcome.mistakes(), vec![1, 2]);
    }

    #[test]
    fn skipping_mcq_in_mock_costs_the_penalty() {
        let key: AnswerKey = [(1, Answer::single("A"))].into_iter().collect();
        let outcome = grade(&mcqs(&[1]), &AnswerRecord::new(), &key, PracticeMode::Mock);
        assert_eq!(outcome.net_marks, -PENALTY_MARKS);
    }

    #[test]
    fn numeric_answers_compare_after_normalization() {
        let questions = vec![with_kind(1, QuestionKind::Num)];
        let key: AnswerKey = [(1, Answer::single("12.5"))].into_iter().collect();
        let answers: AnswerRecord = [(1, Answer::single(" 12.5 "))].into_iter().collect();
        let outcome = grade(&questions, &answers, &key, PracticeMode::Custom);
        assert_eq!(outcome.correct(), vec![1]);
    }

    #[test]
    fn digit_coded_key_matches_letter_answers() {
        let key: AnswerKey = [(1, Answer::single("3"))].into_iter().collect();
        let answers: AnswerRecord = [(1, Answer::single("c"))].into_iter().collect();
        let outcome = grade(&mcqs(&[1]), &answers, &key, PracticeMode::Custom);
        assert_eq!(outcome.correct(), vec![1]);
    }

    #[test]
    fn questions_missing_from_key_are_ungraded() {
        let key: AnswerKey = [(1, Answer::single("A"))].into_iter().collect();
        let outcome = grade(&mcqs(&[1, 2]), &AnswerRecord::new(), &key, PracticeMode::Mock);
        assert_eq!(outcome.status_of(2), Some(QuestionStatus::Ungraded));
        assert_eq!(outcome.mistakes(), vec![1]);
    }

    #[test]
    fn every_graded_question_is_correct_or_a_mistake() {
        let questions = mcqs(&[1, 2, 3]);
        let outcome = grade(&questions, &scenario_answers(), &abc_key(), PracticeMode::Mock);
        let mut all = outcome.correct();
        all.extend(outcome.mistakes());
        all.sort();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn grading_is_deterministic() {
        let questions = mcqs(&[1, 2, 3]);
        let a = grade(&questions, &scenario_answers(), &abc_key(), PracticeMode::Mock);
        let b = grade(&questions, &scenario_answers(), &abc_key(), PracticeMode::Mock);
        assert_eq!(a, b);
    }

    #[test]
    fn result_uses_string_mistakes() {
        let outcome = grade(
            &mcqs(&[1, 2, 3]),
            &scenario_answers(),
            &abc_key(),
            PracticeMode::Mock,
        );
        let timings: TimingRecord = [(1, 30), (2, 45)].into_iter().collect();
        let result = outcome.to_result("Mechanics", &timings, None);
        assert_eq!(result.score, "2/300");
        assert_eq!(result.mistakes, vec!["2", "3"]);
        assert_eq!(result.timings.get("2"), Some(&45));
    }
}
