//! Trait seams between the session engine and the outside world.
//!
//! `ExternalGrader` is implemented by the `examdrill-grader` crate for each
//! AI service. `SessionHooks` is implemented by the host application to
//! receive results and study tasks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GradingError;
use crate::model::{AnswerRecord, ChapterScore, ExamResult, ResultAnalysis, StudyTask};

// ---------------------------------------------------------------------------
// External grader trait
// ---------------------------------------------------------------------------

/// Trait for AI services that grade a session from an answer-key image.
#[async_trait]
pub trait ExternalGrader: Send + Sync {
    /// Human-readable provider name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Grade the flattened answers against the key image.
    async fn grade(&self, request: &GradingRequest) -> anyhow::Result<GradingResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// An answer-key image as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyImage {
    /// e.g. `image/png`.
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl KeyImage {
    /// Guess the MIME type from a file extension. Unknown extensions fall
    /// back to JPEG.
    pub fn from_bytes(data: Vec<u8>, extension: Option<&str>) -> Self {
        let mime_type = match extension.map(str::to_ascii_lowercase).as_deref() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        };
        Self {
            mime_type: mime_type.to_string(),
            data,
        }
    }
}

/// Request to grade a session externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingRequest {
    /// Model identifier (e.g. "claude-sonnet-4-20250514").
    pub model: String,
    pub key_image: KeyImage,
    /// Question number → answer, multi-select joined by commas.
    pub answers: BTreeMap<String, String>,
    /// Question number → seconds spent.
    pub timings: BTreeMap<String, u64>,
    pub syllabus: String,
    /// Optional system prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl GradingRequest {
    /// The user-turn text sent alongside the key image.
    pub fn prompt(&self) -> String {
        let answers = serde_json::to_string(&self.answers).unwrap_or_else(|_| "{}".into());
        let timings = serde_json::to_string(&self.timings).unwrap_or_else(|_| "{}".into());
        format!(
            "Syllabus: {}\nStudent answers (question number -> answer): {answers}\n\
             Seconds spent per question: {timings}\n\
             Grade these answers against the attached answer key.",
            self.syllabus
        )
    }
}

/// The grading breakdown an AI service returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingReport {
    pub score: i32,
    #[serde(alias = "totalMarks")]
    pub total_marks: i32,
    #[serde(default, alias = "incorrectQuestionNumbers")]
    pub incorrect_questions: Vec<u32>,
    #[serde(default, alias = "subjectTimings")]
    pub subject_timings: BTreeMap<String, u64>,
    #[serde(default, alias = "chapterScores")]
    pub chapter_scores: BTreeMap<String, ChapterScore>,
    #[serde(default, alias = "aiSuggestions")]
    pub suggestions: Vec<String>,
}

impl GradingReport {
    pub fn score_label(&self) -> String {
        format!("{}/{}", self.score, self.total_marks)
    }

    pub fn into_analysis(self) -> ResultAnalysis {
        ResultAnalysis {
            subject_timings: self.subject_timings,
            chapter_scores: self.chapter_scores,
            ai_suggestions: self.suggestions,
            incorrect_question_numbers: self.incorrect_questions,
        }
    }
}

/// Response from an external grading request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingResponse {
    pub report: GradingReport,
    /// The raw reply text.
    pub raw: String,
    /// Model that actually graded.
    pub model: String,
    pub token_usage: TokenUsage,
    pub latency_ms: u64,
}

/// Token usage statistics for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
    /// Cost per 1K input tokens in USD.
    pub cost_per_1k_input: f64,
    /// Cost per 1K output tokens in USD.
    pub cost_per_1k_output: f64,
}

// ---------------------------------------------------------------------------
// Application hooks
// ---------------------------------------------------------------------------

/// Callbacks into the host application. Every method defaults to a no-op.
pub trait SessionHooks: Send + Sync {
    /// Fired once per session, after grading or straight away when there is
    /// nothing to grade against.
    fn on_session_complete(&self, _duration_secs: u64, _solved_count: usize, _skipped: &[u32]) {}

    /// Fired once a result exists.
    fn on_log_result(&self, _result: &ExamResult) {}

    /// Fired when a missed question is tagged with weakness topics.
    fn on_update_weaknesses(&self, _topics: &[String]) {}

    /// Fired for each remediation task.
    fn on_save_task(&self, _task: &StudyTask) {}
}

/// Hooks that ignore everything.
pub struct NoopHooks;

impl SessionHooks for NoopHooks {}

// ---------------------------------------------------------------------------
// Default grading prompt
// ---------------------------------------------------------------------------

/// Default system prompt for grading providers.
pub const DEFAULT_GRADING_PROMPT: &str = "You are an exam grader. The image is the answer key. \
Compare the student's answers with it: +4 for a correct answer, -1 for a wrong single-choice answer, \
0 for unanswered numeric answers. Respond ONLY with a JSON object with the fields \
score, total_marks, incorrect_questions (array of question numbers), subject_timings \
(subject -> seconds), chapter_scores (chapter -> {correct, attempted, total}) and suggestions \
(array of short study tips).";

/// Flatten answers for transport: multi-select entries joined by commas.
pub fn flatten_answers(answers: &AnswerRecord) -> BTreeMap<String, String> {
    answers
        .iter()
        .map(|(number, answer)| (number.to_string(), answer.flatten()))
        .collect()
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Extract a JSON payload from a markdown-formatted model reply.
///
/// Prefers ```json blocks, then generic ``` blocks, then the outermost
/// `{ ... }` span of the raw text.
pub fn extract_json_from_markdown(response: &str) -> String {
    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut is_generic_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            is_generic_block = lang.is_empty();
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current_block.clone());
            } else if is_generic_block {
                generic_blocks.push(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    if let Some(block) = json_blocks.into_iter().next() {
        return block;
    }
    if let Some(block) = generic_blocks.into_iter().next() {
        return block;
    }

    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => response[start..=end].to_string(),
        _ => response.to_string(),
    }
}

/// Parse a model reply into a grading report.
pub fn parse_grading_reply(response: &str) -> Result<GradingReport, GradingError> {
    let payload = extract_json_from_markdown(response);
    serde_json::from_str(&payload).map_err(|e| GradingError::MalformedReply(e.to_string()))
}
