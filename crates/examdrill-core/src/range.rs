//! Question set resolution.
//!
//! Turns a range expression such as `"1-10, 15, 20-25"` or an explicit
//! question list into the ordered sequence a session walks through.

use std::collections::HashSet;

use crate::model::Question;

/// Upper bound on how many numbers a single expression may expand to.
pub const MAX_RANGE_SPAN: usize = 10_000;

/// Where a session's questions come from.
#[derive(Debug, Clone)]
pub enum QuestionSource {
    /// Questions listed explicitly, with their own kind and options.
    Explicit(Vec<Question>),
    /// A textual range expression; every number becomes an `A..D` MCQ.
    Range(String),
}

/// Parse a range expression into an ordered list of distinct numbers.
///
/// Numbers ascend within each range, ranges keep their written order and a
/// repeated number keeps its first position. Any malformed token makes the
/// whole expression resolve to an empty list.
pub fn parse_range_expression(expr: &str) -> Vec<u32> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut numbers = Vec::new();

    for token in compact.split(',') {
        let Some((start, end)) = parse_token(token) else {
            tracing::debug!("malformed range token {token:?} in {expr:?}");
            return Vec::new();
        };
        for n in start..=end {
            if seen.insert(n) {
                numbers.push(n);
            }
        }
        if numbers.len() > MAX_RANGE_SPAN {
            tracing::debug!("range expression {expr:?} exceeds {MAX_RANGE_SPAN} questions");
            return Vec::new();
        }
    }

    numbers
}

fn parse_token(token: &str) -> Option<(u32, u32)> {
    if token.is_empty() {
        return None;
    }
    match token.split_once('-') {
        Some((start, end)) => {
            let start: u32 = start.parse().ok()?;
            let end: u32 = end.parse().ok()?;
            if start > end || (end - start) as usize >= MAX_RANGE_SPAN {
                return None;
            }
            Some((start, end))
        }
        None => {
            let n = token.parse().ok()?;
            Some((n, n))
        }
    }
}

/// Resolve a question source into the ordered question list for a session.
pub fn resolve_questions(source: &QuestionSource) -> Vec<Question> {
    match source {
        QuestionSource::Range(expr) => parse_range_expression(expr)
            .into_iter()
            .map(Question::placeholder)
            .collect(),
        QuestionSource::Explicit(questions) => {
            let mut seen = HashSet::new();
            questions
                .iter()
                .filter(|q| seen.insert(q.number))
                .cloned()
                .collect()
        }
    }
}
