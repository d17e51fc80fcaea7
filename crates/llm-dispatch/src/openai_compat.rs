//! Shared HTTP engine for OpenAI-compatible chat endpoints.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::chat::{ChatRequest, ModelInfo};
use crate::errors::DispatchError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One OpenAI-compatible endpoint with its auth and extra headers.
#[derive(Debug, Clone)]
pub struct OpenAiCompatEndpoint {
    client: Client,
    api_base: String,
    api_key: String,
    extra_headers: Vec<(String, String)>,
}

impl OpenAiCompatEndpoint {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        extra_headers: Vec<(String, String)>,
    ) -> Result<Self, DispatchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DispatchError::MissingConfig(
                "no API key configured".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| DispatchError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            extra_headers,
        })
    }

    fn headers(&self) -> Result<HeaderMap, DispatchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| DispatchError::Transport(format!("bad header name: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| DispatchError::Transport(format!("bad header value: {err}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// POST /chat/completions, returning the assistant content text.
    pub async fn chat(&self, model_hint: &str, request: &ChatRequest) -> Result<String, DispatchError> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .map_err(|err| DispatchError::Transport(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(map_http_error(status, &body, model_hint));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| DispatchError::Transport(format!("response invalid: {err}")))?;

        debug!(
            prompt_tokens = body.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens = body.usage.as_ref().map(|u| u.completion_tokens),
            "chat completion received"
        );

        body.choices
            .first()
            .and_then(|choice| choice.message.content.as_text())
            .filter(|text| !text.trim().is_empty())
            .ok_or(DispatchError::NoContent)
    }

    /// GET /models.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, DispatchError> {
        let url = format!("{}/models", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|err| DispatchError::Transport(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, ""));
        }

        let body: ModelListResponse = response
            .json()
            .await
            .map_err(|err| DispatchError::Transport(format!("model list invalid: {err}")))?;
        Ok(body.data)
    }
}

/// Map an HTTP failure onto the dispatch taxonomy.
fn map_http_error(status: StatusCode, body: &str, model: &str) -> DispatchError {
    let detail = parse_error_body(body);

    if detail
        .code
        .as_deref()
        .or(detail.kind.as_deref())
        .is_some_and(|c| c.contains("json_validate_failed"))
    {
        return DispatchError::JsonValidateFailed(detail.message.unwrap_or_default());
    }

    match status.as_u16() {
        401 | 403 => DispatchError::InvalidKey,
        404 => DispatchError::model_not_found(model),
        code => {
            let message = detail
                .message
                .unwrap_or_else(|| format!("<{}>", truncate(body, 200)));
            if detail
                .code
                .as_deref()
                .is_some_and(|c| c.contains("model_not_found"))
            {
                return DispatchError::model_not_found(model);
            }
            warn!(status = code, %message, "provider HTTP error");
            DispatchError::Transport(format!("provider returned {status}: {message}"))
        }
    }
}

#[derive(Debug, Default)]
struct ErrorDetail {
    message: Option<String>,
    code: Option<String>,
    kind: Option<String>,
}

fn parse_error_body(body: &str) -> ErrorDetail {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: Option<String>,
        #[serde(default)]
        code: Option<serde_json::Value>,
        #[serde(default, rename = "type")]
        kind: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => ErrorDetail {
            message: envelope.error.message,
            code: envelope.error.code.map(|c| c.to_string()),
            kind: envelope.error.kind,
        },
        Err(_) => ErrorDetail::default(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: ChatCompletionContent,
}

/// Providers return either a plain string or content parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
    Null,
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            ChatCompletionContent::Null => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    data: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_invalid_key() {
        let err = map_http_error(StatusCode::UNAUTHORIZED, "{}", "m");
        assert!(matches!(err, DispatchError::InvalidKey));
    }

    #[test]
    fn missing_model_gets_settings_guidance() {
        let err = map_http_error(StatusCode::NOT_FOUND, "{}", "gpt-nonexistent");
        match err {
            DispatchError::ModelNotFound(message) => {
                assert!(message.contains("gpt-nonexistent"));
                assert!(message.contains("Settings"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn json_validate_failures_are_typed() {
        let body = r#"{"error":{"message":"schema mismatch","code":"json_validate_failed"}}"#;
        let err = map_http_error(StatusCode::BAD_REQUEST, body, "m");
        assert!(matches!(err, DispatchError::JsonValidateFailed(_)));
    }

    #[test]
    fn rate_limits_are_transport_errors() {
        let body = r#"{"error":{"message":"slow down"}}"#;
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, body, "m");
        match err {
            DispatchError::Transport(message) => assert!(message.contains("slow down")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn response_content_parts_flatten() {
        let raw = r#"{"choices":[{"message":{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_text().unwrap(),
            "a\nb"
        );
    }
}
