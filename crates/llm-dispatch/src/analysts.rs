//! Optional analyst capabilities attached to a client: the vision analyst
//! (two-step handoff for text-only planners) and the search analyst
//! (web-grounded answers for quiz questions).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chat::{ChatMessage, ChatProvider, ChatRequest, ResponseFormat};
use crate::errors::DispatchError;

const VISION_PROMPT: &str = "You are the eyes for a text-only browser agent. Describe what the screenshot shows, in plain text: the question text if any, images attached to options or tiles, drag labels, and where notable elements sit on the page. Be concrete and brief; no JSON.";

const SEARCH_PROMPT: &str = "Answer the question factually and concisely using web search when available. Reply in plain text with the answer and one short justification; no JSON.";

/// Free-text page description from an image-capable model.
#[async_trait]
pub trait VisionAnalyst: Send + Sync {
    async fn analyze(&self, screenshot_base64: &str, context: &str)
        -> Result<String, DispatchError>;
}

/// Web-grounded answer for the current question.
#[async_trait]
pub trait SearchAnalyst: Send + Sync {
    async fn lookup(&self, question: &str, context: &str) -> Result<String, DispatchError>;
}

/// Vision analyst backed by a chat provider and a declared vision model.
pub struct ModelVisionAnalyst {
    provider: Arc<dyn ChatProvider>,
    model: String,
}

impl ModelVisionAnalyst {
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl VisionAnalyst for ModelVisionAnalyst {
    async fn analyze(
        &self,
        screenshot_base64: &str,
        context: &str,
    ) -> Result<String, DispatchError> {
        debug!(model = %self.model, "vision handoff");
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(VISION_PROMPT),
                ChatMessage::user_with_image(context.to_string(), screenshot_base64),
            ],
            temperature: 0.2,
            max_tokens: 1_024,
            // Free text by design; the planner consumes it as context.
            response_format: ResponseFormat {
                r#type: "text".to_string(),
            },
        };
        self.provider.send_chat(request).await
    }
}

/// Search analyst backed by a chat provider whose model carries web search
/// tool use.
pub struct ModelSearchAnalyst {
    provider: Arc<dyn ChatProvider>,
    model: String,
}

impl ModelSearchAnalyst {
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SearchAnalyst for ModelSearchAnalyst {
    async fn lookup(&self, question: &str, context: &str) -> Result<String, DispatchError> {
        debug!(model = %self.model, "search handoff");
        let mut user = format!("Question: {question}");
        if !context.is_empty() {
            user.push_str("\n\nPage context:\n");
            user.push_str(context);
        }
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(SEARCH_PROMPT), ChatMessage::user(user)],
            temperature: 0.2,
            max_tokens: 1_024,
            response_format: ResponseFormat {
                r#type: "text".to_string(),
            },
        };
        self.provider.send_chat(request).await
    }
}
