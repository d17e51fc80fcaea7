//! LLM dispatch layer: provider-neutral chat, prompts, JSON recovery,
//! analysts, and the conversation window.

pub mod analysts;
pub mod chat;
pub mod decision;
pub mod dispatcher;
pub mod errors;
pub mod mock;
pub mod openai_compat;
pub mod prompts;
pub mod providers;
pub mod settings;

pub use analysts::{ModelSearchAnalyst, ModelVisionAnalyst, SearchAnalyst, VisionAnalyst};
pub use chat::{ChatMessage, ChatProvider, ChatRequest, MessageContent, ModelInfo};
pub use decision::{parse_decision, ConversationEntry, ModelDecision};
pub use dispatcher::{Dispatcher, HISTORY_CAP};
pub use errors::DispatchError;
pub use mock::MockChatProvider;
pub use providers::{provider_for, GroqProvider, OpenRouterProvider};
pub use settings::LlmSettings;
