//! examdrill-grader: AI grading service integrations.
//!
//! Implements the `ExternalGrader` trait for Anthropic and OpenAI, so a
//! session finished without an answer key can be graded from a photo of it.

pub mod anthropic;
pub mod config;
mod http;
pub mod mock;
pub mod openai;

pub use config::{create_grader, load_config, ExamdrillConfig, ProviderConfig, SessionSettings};
pub use examdrill_core::error::GradingError;
