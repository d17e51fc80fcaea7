//! Chat-completions wire types and the provider trait.
//!
//! Both concrete providers speak the OpenAI chat-completions shape; the
//! driver never branches on provider names outside construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DispatchError;

/// Request body, wire-exact for OpenAI-compatible endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    pub r#type: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            r#type: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// Multipart user message: text plus an attached PNG.
    pub fn user_with_image(text: impl Into<String>, png_base64: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{png_base64}"),
                    },
                },
            ]),
        }
    }

    /// The textual portion, image parts elided. Used for history.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Message content: plain text, or alternating text/image parts.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One model advertised by a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
}

/// Provider-neutral chat capability.
#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Send one chat request and return the assistant content text.
    async fn send_chat(&self, request: ChatRequest) -> Result<String, DispatchError>;

    /// Cheap auth check.
    async fn validate(&self) -> Result<(), DispatchError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, DispatchError>;

    /// Whether the given model accepts image parts.
    fn supports_images(&self, model: &str) -> bool;
}

/// Markers shared by both providers for image-capable models.
pub(crate) const VISION_MODEL_MARKERS: &[&str] =
    &["vision", "llava", "gpt-4o", "-vl", "maverick", "scout", "pixtral"];

pub(crate) fn model_accepts_images(model: &str) -> bool {
    let lowered = model.to_lowercase();
    VISION_MODEL_MARKERS.iter().any(|m| lowered.contains(m))
}
