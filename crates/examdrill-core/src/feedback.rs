//! Immediate per-question feedback for practice sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::grading::is_correct;
use crate::model::{Answer, AnswerKey, Question};
use crate::normalize::normalize;

/// Auto-advance delay after graded feedback.
pub const GRADED_ADVANCE_DELAY: Duration = Duration::from_millis(1500);

/// Auto-advance delay after neutral feedback (no key entry to grade against).
pub const UNGRADED_ADVANCE_DELAY: Duration = Duration::from_millis(2500);

/// Outcome of checking one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect { expected: Answer },
    /// Answer recorded, nothing to compare it with.
    Ungraded,
}

impl Verdict {
    /// How long the feedback stays up before moving on.
    pub fn advance_delay(&self) -> Duration {
        match self {
            Verdict::Ungraded => UNGRADED_ADVANCE_DELAY,
            Verdict::Correct | Verdict::Incorrect { .. } => GRADED_ADVANCE_DELAY,
        }
    }
}

/// Check a single answer against the key, if there is one.
pub fn evaluate(question: &Question, answer: &Answer, key: Option<&AnswerKey>) -> Verdict {
    let Some(expected) = key
        .and_then(|k| k.get(question.number))
        .filter(|a| !a.is_empty())
    else {
        return Verdict::Ungraded;
    };

    if is_correct(question.kind, answer, expected) {
        Verdict::Correct
    } else {
        Verdict::Incorrect {
            expected: normalize(Some(expected)),
        }
    }
}
