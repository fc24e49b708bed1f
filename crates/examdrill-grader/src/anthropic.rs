//! Anthropic Messages API grader.

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use examdrill_core::error::GradingError;
use examdrill_core::traits::{
    parse_grading_reply, ExternalGrader, GradingRequest, GradingResponse, ModelInfo, TokenUsage,
    DEFAULT_GRADING_PROMPT,
};

use crate::http::{build_client, check_status, send_error};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Grades answer-key images with Claude.
pub struct AnthropicGrader {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicGrader {
    pub fn new(api_key: &str, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: build_client(),
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
    model: String,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl ExternalGrader for AnthropicGrader {
    fn name(&self) -> &str {
        "anthropic"
    }

    #[instrument(skip(self, request), fields(model = %request.model, answers = request.answers.len()))]
    async fn grade(&self, request: &GradingRequest) -> anyhow::Result<GradingResponse> {
        let start = Instant::now();

        let image = base64::engine::general_purpose::STANDARD.encode(&request.key_image.data);
        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request
                .system_prompt
                .as_deref()
                .unwrap_or(DEFAULT_GRADING_PROMPT),
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: &request.key_image.mime_type,
                            data: image,
                        },
                    },
                    ContentBlock::Text {
                        text: request.prompt(),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        let response = check_status(response, &request.model).await?;

        let api_response: AnthropicResponse =
            response.json().await.map_err(|e| GradingError::ApiError {
                status: 0,
                message: format!("failed to parse response: {e}"),
            })?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let raw: String = api_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let report = parse_grading_reply(&raw)?;
        tracing::debug!(score = %report.score_label(), latency_ms, "graded");

        Ok(GradingResponse {
            report,
            raw,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens: api_response.usage.input_tokens,
                completion_tokens: api_response.usage.output_tokens,
                total_tokens: api_response.usage.input_tokens + api_response.usage.output_tokens,
            },
            latency_ms,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-sonnet-4-20250514".into(),
                name: "Claude Sonnet 4".into(),
                provider: "anthropic".into(),
                max_context: 200_000,
                cost_per_1k_input: 0.003,
                cost_per_1k_output: 0.015,
            },
            ModelInfo {
                id: "claude-haiku-4-5-20251001".into(),
                name: "Claude Haiku 4.5".into(),
                provider: "anthropic".into(),
                max_context: 200_000,
                cost_per_1k_input: 0.0008,
                cost_per_1k_output: 0.004,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use examdrill_core::traits::KeyImage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GradingRequest {
        GradingRequest {
            model: "claude-sonnet-4-20250514".into(),
            key_image: KeyImage::from_bytes(b"png-bytes".to_vec(), Some("png")),
            answers: BTreeMap::from([("1".into(), "A".into()), ("2".into(), "B,D".into())]),
            timings: BTreeMap::from([("1".into(), 30)]),
            syllabus: "Optics".into(),
            system_prompt: None,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn successful_grading() {
        let server = MockServer::start().await;

        let reply = "```json\n{\"score\": 3, \"total_marks\": 8, \"incorrect_questions\": [2], \"suggestions\": [\"Review mirrors\"]}\n```";
        let response_body = serde_json::json!({
            "content": [{"type": "text", "text": reply}],
            "model": "claude-sonnet-4-20250514",
            "usage": {"input_tokens": 900, "output_tokens": 60}
        });

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{"role": "user", "content": [{
                    "type": "image",
                    "source": {"type": "base64", "media_type": "image/png", "data": "cG5nLWJ5dGVz"}
                }]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let grader = AnthropicGrader::new("test-key", Some(server.uri()));
        let response = grader.grade(&request()).await.unwrap();
        assert_eq!(response.report.score_label(), "3/8");
        assert_eq!(response.report.incorrect_questions, vec![2]);
        assert_eq!(response.token_usage.total_tokens, 960);
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let grader = AnthropicGrader::new("bad-key", Some(server.uri()));
        let err = grader.grade(&request()).await.unwrap_err();
        let classified = err.downcast_ref::<GradingError>().unwrap();
        assert!(classified.is_permanent());
        assert!(err.to_string().contains("authentication"));
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let grader = AnthropicGrader::new("test-key", Some(server.uri()));
        let err = grader.grade(&request()).await.unwrap_err();
        let classified = err.downcast_ref::<GradingError>().unwrap();
        assert_eq!(classified.retry_after_ms(), Some(7000));
    }

    #[tokio::test]
    async fn unreadable_reply_is_malformed() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "content": [{"type": "text", "text": "The image is too blurry to read."}],
            "model": "claude-sonnet-4-20250514"
        });
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let grader = AnthropicGrader::new("test-key", Some(server.uri()));
        let err = grader.grade(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GradingError>(),
            Some(GradingError::MalformedReply(_))
        ));
    }
}
