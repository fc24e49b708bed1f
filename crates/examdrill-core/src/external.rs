//! External grading for sessions that finished without an answer key.
//!
//! A finished session with nothing to grade against is parked as an
//! [`AwaitingResult`]. The application can then send the answer-key image to
//! an [`ExternalGrader`] through an [`ExternalGradingAdapter`], retry on
//! failure, supply a key after all, or abandon. Each attempt carries a
//! ticket, and a reply whose ticket is no longer current is dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::error::GradingError;
use crate::grading::grade;
use crate::model::{
    timings_by_label, AnswerKey, AnswerRecord, ExamResult, HomeworkSource, PracticeMode, Question,
    TimingRecord,
};
use crate::remediation::generate_remediation_tasks;
use crate::statistics::build_analysis;
use crate::traits::{
    flatten_answers, ExternalGrader, GradingRequest, GradingResponse, KeyImage, SessionHooks,
};

/// A grading attempt that produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GradingFailure {
    /// Shown to the user as is.
    pub message: String,
    /// Whether trying again could help.
    pub retryable: bool,
}

impl GradingFailure {
    fn from_error(err: &anyhow::Error) -> Self {
        let retryable = match err.downcast_ref::<GradingError>() {
            Some(e) => !e.is_permanent(),
            None => true,
        };
        Self {
            message: format!("{err:#}"),
            retryable,
        }
    }
}

/// Retry settings for transient grading failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Sends sessions to an external grader with retry and backoff.
pub struct ExternalGradingAdapter {
    grader: Arc<dyn ExternalGrader>,
    model: String,
    policy: RetryPolicy,
    system_prompt: Option<String>,
    max_tokens: u32,
    temperature: f64,
}

impl ExternalGradingAdapter {
    pub fn new(grader: Arc<dyn ExternalGrader>, model: impl Into<String>) -> Self {
        Self {
            grader,
            model: model.into(),
            policy: RetryPolicy::default(),
            system_prompt: None,
            max_tokens: 2048,
            temperature: 0.0,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn grader_name(&self) -> &str {
        self.grader.name()
    }

    pub fn build_request(
        &self,
        key_image: KeyImage,
        answers: &AnswerRecord,
        timings: &TimingRecord,
        syllabus: &str,
    ) -> GradingRequest {
        GradingRequest {
            model: self.model.clone(),
            key_image,
            answers: flatten_answers(answers),
            timings: timings_by_label(timings),
            syllabus: syllabus.to_string(),
            system_prompt: self.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// Grade with exponential backoff on transient failures. Permanent
    /// failures return on the first attempt.
    #[tracing::instrument(skip_all, fields(grader = %self.grader.name(), model = %self.model))]
    pub async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, GradingFailure> {
        let mut last_error = None;
        let mut retry_delay = self.policy.retry_delay;

        for retry in 0..=self.policy.max_retries {
            if retry > 0 {
                tracing::debug!(retry, delay_ms = retry_delay.as_millis() as u64, "retrying");
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(self.policy.max_delay);
            }
            match self.grader.grade(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let classified = e.downcast_ref::<GradingError>();
                    if classified.is_some_and(GradingError::is_permanent) {
                        tracing::warn!("permanent grading failure: {e:#}");
                        return Err(GradingFailure::from_error(&e));
                    }
                    if let Some(ms) = classified.and_then(GradingError::retry_after_ms) {
                        retry_delay = Duration::from_millis(ms);
                    }
                    tracing::warn!("grading attempt {} failed: {e:#}", retry + 1);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => GradingFailure::from_error(&e),
            None => GradingFailure {
                message: "grading was never attempted".into(),
                retryable: true,
            },
        })
    }
}

/// Tracks which grading attempt is current.
#[derive(Debug, Default)]
pub struct PendingGrading {
    ticket: Option<Uuid>,
    abandoned: bool,
}

impl PendingGrading {
    /// Open a new attempt. Supersedes any earlier one. `None` once abandoned.
    pub fn begin_attempt(&mut self) -> Option<Uuid> {
        if self.abandoned {
            return None;
        }
        let ticket = Uuid::new_v4();
        self.ticket = Some(ticket);
        Some(ticket)
    }

    /// Claim the reply for `ticket`. False for stale or abandoned tickets.
    pub fn accept(&mut self, ticket: Uuid) -> bool {
        if self.abandoned || self.ticket != Some(ticket) {
            return false;
        }
        self.ticket = None;
        true
    }

    pub fn abandon(&mut self) {
        self.abandoned = true;
        self.ticket = None;
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    pub fn in_flight(&self) -> bool {
        self.ticket.is_some()
    }
}

/// What happened to a grading reply.
#[derive(Debug)]
pub enum Resolution {
    Graded(ExamResult),
    Failed(GradingFailure),
    /// The reply belonged to a superseded or abandoned attempt.
    Stale,
}

/// A finished session waiting for a result.
#[derive(Debug)]
pub struct AwaitingResult {
    pub mode: PracticeMode,
    pub syllabus: String,
    pub questions: Vec<Question>,
    pub answers: AnswerRecord,
    pub timings: TimingRecord,
    pub source: Option<HomeworkSource>,
    pending: PendingGrading,
    result: Option<ExamResult>,
}

impl AwaitingResult {
    pub fn new(
        mode: PracticeMode,
        syllabus: impl Into<String>,
        questions: Vec<Question>,
        answers: AnswerRecord,
        timings: TimingRecord,
        source: Option<HomeworkSource>,
    ) -> Self {
        Self {
            mode,
            syllabus: syllabus.into(),
            questions,
            answers,
            timings,
            source,
            pending: PendingGrading::default(),
            result: None,
        }
    }

    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    pub fn is_abandoned(&self) -> bool {
        self.pending.is_abandoned()
    }

    /// Give up on grading. Replies that arrive later are dropped.
    pub fn abandon(&mut self) {
        tracing::info!("external grading abandoned");
        self.pending.abandon();
    }

    /// Start an attempt and build its request.
    pub fn begin_external(
        &mut self,
        adapter: &ExternalGradingAdapter,
        key_image: KeyImage,
    ) -> Option<(Uuid, GradingRequest)> {
        if self.result.is_some() {
            return None;
        }
        let ticket = self.pending.begin_attempt()?;
        let request = adapter.build_request(key_image, &self.answers, &self.timings, &self.syllabus);
        Some((ticket, request))
    }

    /// Apply the reply for `ticket`.
    pub fn resolve(
        &mut self,
        ticket: Uuid,
        reply: Result<GradingResponse, GradingFailure>,
        hooks: &dyn SessionHooks,
    ) -> Resolution {
        if !self.pending.accept(ticket) {
            tracing::debug!(%ticket, "dropping stale grading reply");
            return Resolution::Stale;
        }
        match reply {
            Ok(response) => {
                let score = response.report.score_label();
                let mistakes = response
                    .report
                    .incorrect_questions
                    .iter()
                    .map(u32::to_string)
                    .collect();
                let result = ExamResult {
                    id: Uuid::new_v4(),
                    date: chrono::Utc::now(),
                    score,
                    mistakes,
                    syllabus: self.syllabus.clone(),
                    timings: timings_by_label(&self.timings),
                    analysis: Some(response.report.into_analysis()),
                };
                hooks.on_log_result(&result);
                self.result = Some(result.clone());
                Resolution::Graded(result)
            }
            Err(failure) => Resolution::Failed(failure),
        }
    }

    /// Run one full attempt against `adapter`.
    pub async fn grade_externally(
        &mut self,
        adapter: &ExternalGradingAdapter,
        key_image: KeyImage,
        hooks: &dyn SessionHooks,
    ) -> Resolution {
        let Some((ticket, request)) = self.begin_external(adapter, key_image) else {
            return Resolution::Stale;
        };
        let started = Instant::now();
        let reply = adapter.grade(&request).await;
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "grading reply");
        self.resolve(ticket, reply, hooks)
    }

    /// Grade locally with a key that turned up after the session ended,
    /// saving re-attempt tasks dated after `today`. Returns `None` when the
    /// key has nothing in it or grading is closed.
    pub fn supply_key(
        &mut self,
        key: &AnswerKey,
        today: NaiveDate,
        hooks: &dyn SessionHooks,
    ) -> Option<ExamResult> {
        if key.is_empty() || self.pending.is_abandoned() || self.result.is_some() {
            return None;
        }
        self.pending.abandon();
        let outcome = grade(&self.questions, &self.answers, key, self.mode);
        let analysis = build_analysis(&self.questions, &outcome, &self.timings);
        let result = outcome.to_result(&self.syllabus, &self.timings, Some(analysis));
        hooks.on_log_result(&result);

        let tasks =
            generate_remediation_tasks(self.mode, Some(key), &outcome, self.source.as_ref(), today);
        for task in &tasks {
            hooks.on_save_task(task);
        }

        self.result = Some(result.clone());
        Some(result)
    }
}
