//! Paper file and answer-key parsing.
//!
//! Loads question papers from TOML files and directories, validates them,
//! and reads answer keys from JSON or loose `number:answer` text.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::grading::is_correct;
use crate::model::{
    Answer, AnswerKey, AnswerRecord, HomeworkSource, Paper, PracticeMode, Question, QuestionKind,
    DEFAULT_OPTIONS,
};
use crate::range::{resolve_questions, QuestionSource};

/// Intermediate TOML structure for parsing paper files.
#[derive(Debug, Deserialize)]
struct TomlPaperFile {
    paper: TomlPaperHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
    #[serde(default)]
    source: Option<TomlSource>,
}

#[derive(Debug, Deserialize)]
struct TomlPaperHeader {
    id: String,
    name: String,
    #[serde(default)]
    syllabus: String,
    #[serde(default = "default_mode_str")]
    mode: String,
    #[serde(default)]
    question_range: Option<String>,
    #[serde(default)]
    duration_secs: Option<u64>,
    #[serde(default)]
    per_question_secs: Option<u64>,
    #[serde(default)]
    answer_key: Option<String>,
}

fn default_mode_str() -> String {
    "custom".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    number: u32,
    #[serde(default)]
    text: String,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    chapter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlSource {
    task_id: String,
    title: String,
    #[serde(default)]
    subject: String,
}

/// Parse a single TOML file into a `Paper`.
pub fn parse_paper(path: &Path) -> Result<Paper> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read paper file: {}", path.display()))?;

    parse_paper_str(&content, path)
}

/// Parse a TOML string into a `Paper` (useful for testing).
pub fn parse_paper_str(content: &str, source_path: &Path) -> Result<Paper> {
    let parsed: TomlPaperFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mode: PracticeMode = parsed
        .paper
        .mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let kind = match q.kind {
                Some(k) => k.parse().map_err(|e: String| anyhow::anyhow!("{}", e))?,
                None => QuestionKind::Mcq,
            };
            let options = match (q.options, kind) {
                (Some(options), _) => options,
                (None, QuestionKind::Num) => vec![],
                (None, _) => DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect(),
            };
            Ok(Question {
                number: q.number,
                text: q.text,
                options,
                kind,
                subject: q.subject,
                chapter: q.chapter,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let answer_key = parsed
        .paper
        .answer_key
        .as_deref()
        .map(parse_answer_key)
        .filter(|key| !key.is_empty());

    Ok(Paper {
        id: parsed.paper.id,
        name: parsed.paper.name,
        syllabus: parsed.paper.syllabus,
        mode,
        questions,
        question_range: parsed.paper.question_range,
        duration_secs: parsed.paper.duration_secs,
        per_question_secs: parsed.paper.per_question_secs,
        answer_key,
        source: parsed.source.map(|s| HomeworkSource {
            task_id: s.task_id,
            title: s.title,
            subject: s.subject,
        }),
    })
}

/// Recursively load all `.toml` paper files from a directory.
pub fn load_paper_directory(dir: &Path) -> Result<Vec<Paper>> {
    let mut papers = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            papers.extend(load_paper_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_paper(&path) {
                Ok(paper) => papers.push(paper),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(papers)
}

impl Paper {
    /// Where this paper's questions come from. Explicit questions win over
    /// a range expression.
    pub fn question_source(&self) -> QuestionSource {
        match &self.question_range {
            Some(range) if self.questions.is_empty() => QuestionSource::Range(range.clone()),
            _ => QuestionSource::Explicit(self.questions.clone()),
        }
    }

    /// The ordered question sequence a session over this paper walks.
    pub fn resolved_questions(&self) -> Vec<Question> {
        resolve_questions(&self.question_source())
    }
}

/// A warning from paper validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question number (if applicable).
    pub question: Option<u32>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn paper(message: impl Into<String>) -> Self {
        Self {
            question: None,
            message: message.into(),
        }
    }

    fn question(number: u32, message: impl Into<String>) -> Self {
        Self {
            question: Some(number),
            message: message.into(),
        }
    }
}

/// Validate a paper for common issues.
pub fn validate_paper(paper: &Paper) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if !paper.questions.is_empty() && paper.question_range.is_some() {
        warnings.push(ValidationWarning::paper(
            "both questions and question_range given; question_range is ignored",
        ));
    }

    let resolved = paper.resolved_questions();
    if resolved.is_empty() {
        warnings.push(ValidationWarning::paper("paper resolves to no questions"));
    }

    let mut seen = HashSet::new();
    for q in &paper.questions {
        if !seen.insert(q.number) {
            warnings.push(ValidationWarning::question(
                q.number,
                format!("duplicate question number: {}", q.number),
            ));
        }
        match q.kind {
            QuestionKind::Num if !q.options.is_empty() => warnings.push(
                ValidationWarning::question(q.number, "numeric question has options"),
            ),
            QuestionKind::Mcq | QuestionKind::MultiChoice if q.options.len() < 2 => warnings.push(
                ValidationWarning::question(q.number, "choice question needs at least two options"),
            ),
            _ => {}
        }
    }

    if paper.mode == PracticeMode::Mock && paper.per_question_secs.is_some() {
        warnings.push(ValidationWarning::paper(
            "per_question_secs is ignored for mock papers",
        ));
    }

    let Some(key) = &paper.answer_key else {
        return warnings;
    };

    let numbers: HashSet<String> = resolved.iter().map(|q| q.number.to_string()).collect();
    for (number, _) in key.iter() {
        if !numbers.contains(number) {
            warnings.push(ValidationWarning::paper(format!(
                "answer key has entry {number} with no matching question"
            )));
        }
    }
    for q in &resolved {
        let Some(expected) = key.get(q.number) else {
            warnings.push(ValidationWarning::question(
                q.number,
                "no answer key entry; question will be ungraded",
            ));
            continue;
        };
        let shape_ok = matches!(
            (q.kind, expected),
            (QuestionKind::MultiChoice, _) | (_, Answer::Single(_))
        );
        // A key entry that cannot match even itself can never be scored correct.
        if !shape_ok || !is_correct(q.kind, expected, expected) {
            warnings.push(ValidationWarning::question(
                q.number,
                format!("answer key entry {expected} does not fit a {} question", q.kind),
            ));
        }
    }

    warnings
}

// ---------------------------------------------------------------------------
// Answer keys
// ---------------------------------------------------------------------------

/// Parse an answer key from JSON or loose text.
///
/// JSON keys map question numbers to a string, a number, or an array of
/// either. The text form is a list of `number:answer` or `number=answer`
/// pairs separated by newlines, commas or semicolons, with multi-select
/// answers in brackets (`3:[A,C]`). Malformed pairs are skipped.
pub fn parse_answer_key(text: &str) -> AnswerKey {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(trimmed) {
            Ok(map) => return key_from_json(map),
            Err(e) => {
                tracing::warn!("answer key is not valid JSON ({e}), reading it as text");
            }
        }
    }

    let body = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);

    let mut key = AnswerKey::new();
    for pair in split_pairs(body) {
        match parse_pair(pair) {
            Some((number, answer)) => key.insert(number, answer),
            None => tracing::warn!("skipping malformed answer key entry {pair:?}"),
        }
    }
    key
}

/// Parse a JSON or text answer sheet into an answer record.
pub fn parse_answer_record(text: &str) -> AnswerRecord {
    parse_answer_key(text)
        .iter()
        .filter_map(|(number, answer)| Some((number.parse().ok()?, answer.clone())))
        .collect()
}

fn key_from_json(map: serde_json::Map<String, serde_json::Value>) -> AnswerKey {
    let mut key = AnswerKey::new();
    for (number, value) in map {
        let Some(number) = parse_number(&number) else {
            tracing::warn!("skipping answer key entry with non-numeric key {number:?}");
            continue;
        };
        let answer = match value {
            serde_json::Value::Array(items) => {
                let items: Option<Vec<String>> = items.iter().map(json_scalar).collect();
                items.map(Answer::Multi)
            }
            other => json_scalar(&other).map(Answer::Single),
        };
        match answer {
            Some(answer) => key.insert(number, answer),
            None => tracing::warn!("skipping answer key entry {number} with unusable value"),
        }
    }
    key
}

fn json_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Split on newlines, commas and semicolons outside brackets.
fn split_pairs(text: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '\n' | ',' | ';' if depth == 0 => {
                pairs.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pairs.push(&text[start..]);
    pairs
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_pair(pair: &str) -> Option<(u32, Answer)> {
    let split = pair.find([':', '='])?;
    let number = parse_number(&pair[..split])?;
    let value = pair[split + 1..].trim();

    let answer = match value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        Some(inner) => {
            let items: Vec<String> = inner
                .split(',')
                .map(unquote)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            Answer::Multi(items)
        }
        None => Answer::Single(unquote(value).to_string()),
    };
    (!answer.is_empty()).then_some((number, answer))
}

fn parse_number(raw: &str) -> Option<u32> {
    let raw = unquote(raw);
    let raw = raw
        .strip_prefix('Q')
        .or_else(|| raw.strip_prefix('q'))
        .unwrap_or(raw);
    raw.trim().parse().ok()
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[paper]
id = "phy-101"
name = "Kinematics drill"
syllabus = "Physics: Kinematics"
mode = "custom"
per_question_secs = 90
answer_key = "1:B, 2:[A,C], 3=9.8"

[[questions]]
number = 1
text = "Which quantity is a vector?"
options = ["Speed", "Velocity", "Distance", "Time"]
subject = "Physics"
chapter = "Kinematics"

[[questions]]
number = 2
text = "Select all SI base units."
kind = "MULTI_CHOICE"
options = ["metre", "newton", "second", "joule"]

[[questions]]
number = 3
text = "g in m/s^2?"
kind = "NUM"

[source]
task_id = "hw-42"
title = "Kinematics homework"
subject = "Physics"
"#;

    #[test]
    fn parse_valid_toml() {
        let paper = parse_paper_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(paper.id, "phy-101");
        assert_eq!(paper.mode, PracticeMode::Custom);
        assert_eq!(paper.questions.len(), 3);
        assert_eq!(paper.questions[1].kind, QuestionKind::MultiChoice);
        assert!(paper.questions[2].options.is_empty());
        assert_eq!(paper.per_question_secs, Some(90));
        let key = paper.answer_key.as_ref().unwrap();
        assert_eq!(key.get(2), Some(&Answer::multi(["A", "C"])));
        assert_eq!(key.get(3), Some(&Answer::single("9.8")));
        assert_eq!(paper.source.unwrap().task_id, "hw-42");
        assert!(validate_paper(&parse_paper_str(VALID_TOML, Path::new("t")).unwrap()).is_empty());
    }

    #[test]
    fn parse_range_paper_defaults() {
        let toml = r#"
[paper]
id = "mock-1"
name = "Mock 1"
mode = "mock"
question_range = "1-3, 10"
"#;
        let paper = parse_paper_str(toml, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(paper.mode, PracticeMode::Mock);
        assert!(paper.answer_key.is_none());
        let numbers: Vec<u32> = paper.resolved_questions().iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 10]);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let toml = r#"
[paper]
id = "x"
name = "X"

[[questions]]
number = 1
kind = "ESSAY"
"#;
        let err = parse_paper_str(toml, &PathBuf::from("test.toml")).unwrap_err();
        assert!(err.to_string().contains("unknown question kind"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_paper_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn validate_flags_problems() {
        let toml = r#"
[paper]
id = "bad"
name = "Bad"
mode = "mock"
per_question_secs = 30
answer_key = "1:A, 2:[A,B], 9:C"

[[questions]]
number = 1
options = ["only one"]

[[questions]]
number = 1

[[questions]]
number = 2
"#;
        let paper = parse_paper_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_paper(&paper);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate")));
        assert!(messages.iter().any(|m| m.contains("at least two options")));
        assert!(messages.iter().any(|m| m.contains("ignored for mock")));
        assert!(messages.iter().any(|m| m.contains("entry 9")));
        assert!(messages.iter().any(|m| m.contains("does not fit")));
    }

    #[test]
    fn validate_empty_range() {
        let toml = r#"
[paper]
id = "empty"
name = "Empty"
question_range = "5-1"
"#;
        let paper = parse_paper_str(toml, &PathBuf::from("test.toml")).unwrap();
        let warnings = validate_paper(&paper);
        assert!(warnings.iter().any(|w| w.message.contains("no questions")));
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.toml"), VALID_TOML).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("broken.toml"), "nope = [").unwrap();

        let papers = load_paper_directory(dir.path()).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, "phy-101");
    }

    #[test]
    fn answer_key_from_json() {
        let key = parse_answer_key(r#"{"1": "b", "2": ["A", "C"], "3": 42, "x": "A", "4": null}"#);
        assert_eq!(key.get(1), Some(&Answer::single("b")));
        assert_eq!(key.get(2), Some(&Answer::multi(["A", "C"])));
        assert_eq!(key.get(3), Some(&Answer::single("42")));
        assert!(key.get(4).is_none());
        assert_eq!(key.len(), 3);
    }

    #[test]
    fn answer_key_from_text() {
        let key = parse_answer_key("1: A\n2=[A, C]; Q3:7\nbogus\n4:");
        assert_eq!(key.get(1), Some(&Answer::single("A")));
        assert_eq!(key.get(2), Some(&Answer::multi(["A", "C"])));
        assert_eq!(key.get(3), Some(&Answer::single("7")));
        assert!(key.get(4).is_none());
        assert_eq!(key.len(), 3);
    }

    #[test]
    fn loose_braces_fall_back_to_text() {
        let key = parse_answer_key("{1:A, 2:B}");
        assert_eq!(key.get(2), Some(&Answer::single("B")));
    }

    #[test]
    fn answer_record_uses_numeric_keys() {
        let record = parse_answer_record(r#"{"1": "A", "3": ["B", "D"]}"#);
        assert_eq!(record.get(&3), Some(&Answer::multi(["B", "D"])));
        assert_eq!(record.len(), 2);
    }
}
