//! Error types for sessions and external grading.
//!
//! `GradingError` is defined here rather than in `examdrill-grader` so the
//! session driver can downcast provider failures and classify them for retry
//! decisions without string matching.

use thiserror::Error;

use crate::model::QuestionKind;

/// Errors raised by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The question sequence resolved to nothing.
    #[error("no questions to attempt")]
    EmptyQuestionSet,

    /// `start` was called on a session that already left `NotStarted`.
    #[error("session already started")]
    AlreadyStarted,

    /// The operation requires an active session.
    #[error("session is not active")]
    NotActive,

    /// A question transition is still in flight.
    #[error("navigation in progress")]
    Navigating,

    /// Feedback is visible for this question and input is blocked.
    #[error("input locked while feedback for question {0} is shown")]
    InputLocked(u32),

    /// The answer shape does not match the question kind.
    #[error("question {number} is {kind}, answer shape does not match")]
    AnswerKindMismatch { number: u32, kind: QuestionKind },

    /// The option toggled is not offered by the question.
    #[error("question {number} has no option {option}")]
    UnknownOption { number: u32, option: String },
}

/// Errors that can occur when grading through an external AI service.
#[derive(Debug, Error)]
pub enum GradingError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The service answered, but not with a usable grading breakdown.
    #[error("unreadable grading reply: {0}")]
    MalformedReply(String),
}

impl GradingError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            GradingError::AuthenticationFailed(_) | GradingError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GradingError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
