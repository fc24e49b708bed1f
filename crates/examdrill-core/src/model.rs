//! Core data model types for examdrill.
//!
//! Questions, answers, answer keys, and the records a finished session
//! hands to the application.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// Single-choice multiple-choice question.
    #[serde(rename = "MCQ", alias = "mcq")]
    Mcq,
    /// Free-form numeric answer, no options.
    #[serde(rename = "NUM", alias = "num")]
    Num,
    /// Several options may be correct; the answer is a set.
    #[serde(rename = "MULTI_CHOICE", alias = "multi_choice")]
    MultiChoice,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Mcq => write!(f, "MCQ"),
            QuestionKind::Num => write!(f, "NUM"),
            QuestionKind::MultiChoice => write!(f, "MULTI_CHOICE"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "MCQ" | "SINGLE" => Ok(QuestionKind::Mcq),
            "NUM" | "NUMERIC" => Ok(QuestionKind::Num),
            "MULTI_CHOICE" | "MULTI" | "MULTIPLE" => Ok(QuestionKind::MultiChoice),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// Default option letters for questions that come from a range expression.
pub const DEFAULT_OPTIONS: [&str; 4] = ["A", "B", "C", "D"];

/// A single question in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Question number as printed on the paper.
    pub number: u32,
    /// Question text.
    #[serde(default)]
    pub text: String,
    /// Option labels, empty for numeric questions.
    #[serde(default)]
    pub options: Vec<String>,
    pub kind: QuestionKind,
    /// Subject tag used for timing analysis.
    #[serde(default)]
    pub subject: Option<String>,
    /// Chapter tag used for per-chapter scores.
    #[serde(default)]
    pub chapter: Option<String>,
}

impl Question {
    /// A bare MCQ with `A..D` options, used for range-resolved papers.
    pub fn placeholder(number: u32) -> Self {
        Self {
            number,
            text: format!("Question {number}"),
            options: DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect(),
            kind: QuestionKind::Mcq,
            subject: None,
            chapter: None,
        }
    }
}

/// A captured answer, either one value or a set of options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multi(Vec<String>),
}

impl Answer {
    pub fn single(value: impl Into<String>) -> Self {
        Answer::Single(value.into())
    }

    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Answer::Multi(values.into_iter().map(Into::into).collect())
    }

    /// An answer with no content counts as unanswered.
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Single(s) => s.trim().is_empty(),
            Answer::Multi(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }

    /// Multi-select entries joined with commas, as sent to external graders.
    pub fn flatten(&self) -> String {
        match self {
            Answer::Single(s) => s.clone(),
            Answer::Multi(v) => v.join(","),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Single(s) => write!(f, "{s}"),
            Answer::Multi(v) => write!(f, "[{}]", v.join(",")),
        }
    }
}

/// Question number → captured answer.
pub type AnswerRecord = BTreeMap<u32, Answer>;

/// Question number → cumulative seconds spent.
pub type TimingRecord = BTreeMap<u32, u64>;

/// Mapping from question number (as string) to the expected answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(BTreeMap<String, Answer>);

impl AnswerKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, number: impl ToString, answer: Answer) {
        self.0.insert(number.to_string().trim().to_string(), answer);
    }

    pub fn get(&self, number: u32) -> Option<&Answer> {
        self.0.get(&number.to_string())
    }

    /// True when there is nothing to grade against, including a key whose
    /// entries are all blank.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Answer::is_empty)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Answer)> {
        self.0.iter()
    }
}

impl<S: ToString> FromIterator<(S, Answer)> for AnswerKey {
    fn from_iter<T: IntoIterator<Item = (S, Answer)>>(iter: T) -> Self {
        let mut key = AnswerKey::new();
        for (number, answer) in iter {
            key.insert(number, answer);
        }
        key
    }
}

/// Session flavour. Mock exams run on a fixed clock with negative marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    Mock,
    #[default]
    Custom,
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PracticeMode::Mock => write!(f, "mock"),
            PracticeMode::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for PracticeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" | "mock-exam" | "mockexam" => Ok(PracticeMode::Mock),
            "custom" | "practice" => Ok(PracticeMode::Custom),
            other => Err(format!("unknown practice mode: {other}")),
        }
    }
}

/// The homework task a session was launched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkSource {
    pub task_id: String,
    pub title: String,
    #[serde(default)]
    pub subject: String,
}

/// Per-chapter tally in a result analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterScore {
    pub correct: u32,
    pub attempted: u32,
    pub total: u32,
}

/// Optional breakdown attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultAnalysis {
    /// Subject → seconds spent.
    #[serde(default)]
    pub subject_timings: BTreeMap<String, u64>,
    /// Chapter → score tally.
    #[serde(default)]
    pub chapter_scores: BTreeMap<String, ChapterScore>,
    /// Free-text suggestions, usually from an external grader.
    #[serde(default)]
    pub ai_suggestions: Vec<String>,
    #[serde(default)]
    pub incorrect_question_numbers: Vec<u32>,
}

/// The graded outcome of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    /// `"<net>/<total>"`.
    pub score: String,
    /// Question numbers that were wrong or unanswered.
    pub mistakes: Vec<String>,
    pub syllabus: String,
    /// Keys are question numbers as strings.
    pub timings: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ResultAnalysis>,
}

impl ExamResult {
    /// Split `score` back into `(net, total)`.
    pub fn score_parts(&self) -> Option<(i32, i32)> {
        let (net, total) = self.score.split_once('/')?;
        Some((net.trim().parse().ok()?, total.trim().parse().ok()?))
    }
}

/// A follow-up re-attempt task produced for a wrong answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyTask {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub subject: String,
    pub source_task_id: String,
}

/// A question paper loaded from a TOML file.
#[derive(Debug, Clone, PartialEq)]
pub struct Paper {
    pub id: String,
    pub name: String,
    pub syllabus: String,
    pub mode: PracticeMode,
    /// Explicit questions. Empty when the paper uses `question_range`.
    pub questions: Vec<Question>,
    pub question_range: Option<String>,
    pub duration_secs: Option<u64>,
    pub per_question_secs: Option<u64>,
    pub answer_key: Option<AnswerKey>,
    pub source: Option<HomeworkSource>,
}

/// Converts a timing record into the string-keyed form stored in results.
pub fn timings_by_label(timings: &TimingRecord) -> BTreeMap<String, u64> {
    timings
        .iter()
        .map(|(number, secs)| (number.to_string(), *secs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_kind_display_and_parse() {
        assert_eq!(QuestionKind::MultiChoice.to_string(), "MULTI_CHOICE");
        assert_eq!("mcq".parse::<QuestionKind>().unwrap(), QuestionKind::Mcq);
        assert_eq!("numeric".parse::<QuestionKind>().unwrap(), QuestionKind::Num);
        assert_eq!(
            "multi-choice".parse::<QuestionKind>().unwrap(),
            QuestionKind::MultiChoice
        );
        assert!("essay".parse::<QuestionKind>().is_err());
    }

    #[test]
    fn question_kind_serde_names() {
        let json = serde_json::to_string(&QuestionKind::MultiChoice).unwrap();
        assert_eq!(json, "\"MULTI_CHOICE\"");
        let parsed: QuestionKind = serde_json::from_str("\"NUM\"").unwrap();
        assert_eq!(parsed, QuestionKind::Num);
    }

    #[test]
    fn answer_untagged_serde() {
        let single: Answer = serde_json::from_str("\"A\"").unwrap();
        assert_eq!(single, Answer::single("A"));
        let multi: Answer = serde_json::from_str("[\"A\",\"C\"]").unwrap();
        assert_eq!(multi, Answer::multi(["A", "C"]));
    }

    #[test]
    fn blank_answers_are_empty() {
        assert!(Answer::single("  ").is_empty());
        assert!(Answer::Multi(vec![]).is_empty());
        assert!(!Answer::multi(["B"]).is_empty());
        assert_eq!(Answer::multi(["A", "C"]).flatten(), "A,C");
    }

    #[test]
    fn answer_key_lookup_by_number() {
        let key: AnswerKey = [(1, Answer::single("A")), (3, Answer::multi(["A", "C"]))]
            .into_iter()
            .collect();
        assert_eq!(key.get(1), Some(&Answer::single("A")));
        assert!(key.get(2).is_none());
        assert_eq!(key.len(), 2);
        assert!(!key.is_empty());
        assert!(AnswerKey::new().is_empty());
    }

    #[test]
    fn score_parts_roundtrip() {
        let result = ExamResult {
            id: Uuid::nil(),
            date: Utc::now(),
            score: "-3/300".into(),
            mistakes: vec![],
            syllabus: "Physics".into(),
            timings: BTreeMap::new(),
            analysis: None,
        };
        assert_eq!(result.score_parts(), Some((-3, 300)));
    }

    #[test]
    fn placeholder_question_has_four_options() {
        let q = Question::placeholder(7);
        assert_eq!(q.options, vec!["A", "B", "C", "D"]);
        assert_eq!(q.kind, QuestionKind::Mcq);
    }
}
