//! OpenAI-compatible chat-completions backend (OpenRouter by default)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::traits::{BackendError, ChatBackend, ChatMessage, ChatRequest};
use crate::config::ProviderConfig;

/// Cap on how much of an error body is carried into logs and error messages
const ERROR_BODY_CAP: usize = 2048;

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    response_format: WireFormat,
}

#[derive(Serialize)]
struct WireFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    referer: Option<String>,
    app_title: Option<String>,
}

impl OpenRouterClient {
    pub fn from_config(cfg: &ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
            referer: cfg.referer.clone(),
            app_title: cfg.app_title.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= ERROR_BODY_CAP {
        return text.to_string();
    }
    let mut end = ERROR_BODY_CAP;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a 2xx body onto the assistant text, honouring in-band error objects
fn extract_content(body: &str) -> Result<String, BackendError> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::InvalidResponse(format!("undecodable body: {}", e)))?;

    if let Some(err) = parsed.error {
        let message = err.message.unwrap_or_else(|| "unknown provider error".to_string());
        // Some gateways report upstream throttling with a 200 envelope
        if err.code.as_ref().and_then(|c| c.as_u64()) == Some(429) {
            return Err(BackendError::RateLimited { retry_after: None });
        }
        return Err(BackendError::InvalidResponse(message));
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(BackendError::InvalidResponse(
            "empty completion content".to_string(),
        ));
    }
    Ok(content)
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    async fn complete(
        &self,
        model: &str,
        request: &ChatRequest,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let api_key = self.api_key.as_deref().ok_or(BackendError::MissingCredential)?;

        let body = CompletionBody {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: WireFormat {
                kind: request.response_format.as_wire(),
            },
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&body);
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.app_title {
            builder = builder.header("X-Title", title);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited {
                retry_after: retry_after(resp.headers()),
            });
        }

        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        debug!(model, bytes = text.len(), "chat completion received");
        extract_content(&text)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
