//! The dispatcher: one façade the loop talks to for every model exchange.
//!
//! Owns the conversation window, routes screenshots through the vision
//! handoff when the primary model is text-only, and performs the
//! history-clearing retry on provider-side JSON validation failures.

use std::sync::Arc;

use tracing::{debug, warn};

use tabpilot_core_types::{ExecMode, PageContext};

use crate::analysts::{ModelSearchAnalyst, ModelVisionAnalyst, SearchAnalyst, VisionAnalyst};
use crate::chat::{ChatMessage, ChatProvider, ChatRequest, MessageContent, ResponseFormat};
use crate::decision::{parse_decision, ConversationEntry, ModelDecision};
use crate::errors::DispatchError;
use crate::prompts;
use crate::providers::{provider_for, GroqProvider};
use crate::settings::LlmSettings;

/// Conversation window: three user/assistant pairs.
pub const HISTORY_CAP: usize = 6;

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 4_096;

pub struct Dispatcher {
    provider: Arc<dyn ChatProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    vision: Option<Arc<dyn VisionAnalyst>>,
    search: Option<Arc<dyn SearchAnalyst>>,
    history: Vec<ConversationEntry>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            vision: None,
            search: None,
            history: Vec::new(),
        }
    }

    /// Wire up providers and analysts from the stored settings. The vision
    /// analyst always runs on Groq with the declared vision model; the
    /// search analyst runs on the primary provider.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, DispatchError> {
        let provider = provider_for(&settings.provider, &settings.api_key)?;
        let mut dispatcher = Self::new(Arc::clone(&provider), settings.model.clone());

        if let Some(ref vision_model) = settings.vision_model {
            let groq: Arc<dyn ChatProvider> = if settings.provider == "groq" {
                Arc::clone(&provider)
            } else {
                Arc::new(GroqProvider::new(&settings.api_key)?)
            };
            dispatcher = dispatcher
                .with_vision(Arc::new(ModelVisionAnalyst::new(groq, vision_model.clone())));
        }

        if settings.search_enabled {
            if let Some(ref search_model) = settings.search_model {
                dispatcher = dispatcher.with_search(Arc::new(ModelSearchAnalyst::new(
                    Arc::clone(&provider),
                    search_model.clone(),
                )));
            }
        }

        Ok(dispatcher)
    }

    pub fn with_vision(mut self, analyst: Arc<dyn VisionAnalyst>) -> Self {
        self.vision = Some(analyst);
        self
    }

    pub fn with_search(mut self, analyst: Arc<dyn SearchAnalyst>) -> Self {
        self.search = Some(analyst);
        self
    }

    pub fn search_analyst(&self) -> Option<Arc<dyn SearchAnalyst>> {
        self.search.clone()
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Remove the last user/assistant pair; a retry replaces it.
    pub fn drop_last_exchange(&mut self) {
        self.history.truncate(self.history.len().saturating_sub(2));
    }

    /// One full planner exchange for the current step.
    pub async fn send(
        &mut self,
        command: &str,
        message: &str,
        ctx: &PageContext,
        mode: ExecMode,
    ) -> Result<ModelDecision, DispatchError> {
        let mut text = prompts::user_text(command, message, ctx);
        let mut user_message = None;

        if let Some(ref screenshot) = ctx.screenshot {
            if self.provider.supports_images(&self.model) {
                user_message = Some(ChatMessage::user_with_image(text.clone(), screenshot));
            } else if let Some(ref vision) = self.vision {
                // Two-step handoff: the vision model looks, the planner reads.
                match vision
                    .analyze(screenshot, &format!("Command: {command}"))
                    .await
                {
                    Ok(analysis) => {
                        text.push_str(&format!(
                            "\n\n{}\n{analysis}",
                            prompts::VISION_ANALYSIS_HEADER
                        ));
                    }
                    Err(err) => {
                        warn!(%err, "vision analyst failed; continuing without analysis");
                    }
                }
            }
        }
        let user_message = user_message.unwrap_or_else(|| ChatMessage::user(text.clone()));

        let request = self.build_request(mode, user_message);
        let first_attempt = self.provider.send_chat(request).await;
        let raw = match first_attempt {
            Ok(raw) => raw,
            Err(DispatchError::JsonValidateFailed(detail)) => {
                // Poisoned context; drop it and re-ask with the bare command.
                debug!(%detail, "provider JSON validation failed; clearing history and retrying");
                self.history.clear();
                let minimal = ChatMessage::user(format!(
                    "Command: {command}\nRespond with the JSON decision object only."
                ));
                let retry = self.build_request(mode, minimal);
                self.provider.send_chat(retry).await?
            }
            Err(err) => return Err(err),
        };

        let decision = parse_decision(&raw);

        self.history.push(ConversationEntry::user(text));
        self.history.push(ConversationEntry::assistant(raw));
        while self.history.len() > HISTORY_CAP {
            self.history.remove(0);
        }

        Ok(decision)
    }

    fn build_request(&self, mode: ExecMode, user_message: ChatMessage) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(prompts::system_prompt(mode)));
        for entry in &self.history {
            messages.push(ChatMessage {
                role: entry.role.clone(),
                content: MessageContent::Text(entry.content.clone()),
            });
        }
        messages.push(user_message);
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat::json_object(),
        }
    }
}
