//! Scripted grader for exercising the grading flow without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examdrill_core::error::GradingError;
use examdrill_core::traits::{
    ExternalGrader, GradingReport, GradingRequest, GradingResponse, ModelInfo, TokenUsage,
};

/// Returns a fixed report, optionally after a queue of scripted failures.
pub struct MockGrader {
    report: GradingReport,
    failures: Mutex<VecDeque<GradingError>>,
    call_count: AtomicU32,
    last_request: Mutex<Option<GradingRequest>>,
}

impl MockGrader {
    pub fn with_report(report: GradingReport) -> Self {
        Self {
            report,
            failures: Mutex::new(VecDeque::new()),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail the next calls with these errors, in order, before succeeding.
    pub fn failing_first(self, errors: impl IntoIterator<Item = GradingError>) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.extend(errors);
        }
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GradingRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl ExternalGrader for MockGrader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn grade(&self, request: &GradingRequest) -> anyhow::Result<GradingResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let scripted = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(err) = scripted {
            return Err(err.into());
        }

        let raw = serde_json::to_string(&self.report)?;
        let prompt_tokens = (request.prompt().len() / 4) as u32;
        let completion_tokens = (raw.len() / 4) as u32;
        Ok(GradingResponse {
            report: self.report.clone(),
            raw,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
        }]
    }
}
