//! Concrete providers: the OpenRouter billing aggregator and the Groq
//! low-latency inference host. Both are OpenAI-chat-compatible.

use async_trait::async_trait;

use crate::chat::{model_accepts_images, ChatProvider, ChatRequest, ModelInfo};
use crate::errors::DispatchError;
use crate::openai_compat::OpenAiCompatEndpoint;

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Attribution headers OpenRouter requires from clients.
const OPENROUTER_REFERER: &str = "https://github.com/tabpilot/tabpilot";
const OPENROUTER_TITLE: &str = "TabPilot";

#[derive(Debug)]
pub struct OpenRouterProvider {
    endpoint: OpenAiCompatEndpoint,
}

impl OpenRouterProvider {
    pub fn new(api_key: &str) -> Result<Self, DispatchError> {
        Self::with_base(OPENROUTER_API_BASE, api_key)
    }

    pub fn with_base(api_base: &str, api_key: &str) -> Result<Self, DispatchError> {
        let endpoint = OpenAiCompatEndpoint::new(
            api_base,
            api_key,
            vec![
                ("HTTP-Referer".to_string(), OPENROUTER_REFERER.to_string()),
                ("X-Title".to_string(), OPENROUTER_TITLE.to_string()),
            ],
        )?;
        Ok(Self { endpoint })
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn send_chat(&self, request: ChatRequest) -> Result<String, DispatchError> {
        let model = request.model.clone();
        self.endpoint.chat(&model, &request).await
    }

    async fn validate(&self) -> Result<(), DispatchError> {
        self.endpoint.list_models().await.map(|_| ())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, DispatchError> {
        self.endpoint.list_models().await
    }

    fn supports_images(&self, model: &str) -> bool {
        model_accepts_images(model)
    }
}

#[derive(Debug)]
pub struct GroqProvider {
    endpoint: OpenAiCompatEndpoint,
}

impl GroqProvider {
    pub fn new(api_key: &str) -> Result<Self, DispatchError> {
        Self::with_base(GROQ_API_BASE, api_key)
    }

    pub fn with_base(api_base: &str, api_key: &str) -> Result<Self, DispatchError> {
        let endpoint = OpenAiCompatEndpoint::new(api_base, api_key, Vec::new())?;
        Ok(Self { endpoint })
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn send_chat(&self, request: ChatRequest) -> Result<String, DispatchError> {
        let model = request.model.clone();
        self.endpoint.chat(&model, &request).await
    }

    async fn validate(&self) -> Result<(), DispatchError> {
        self.endpoint.list_models().await.map(|_| ())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, DispatchError> {
        self.endpoint.list_models().await
    }

    fn supports_images(&self, model: &str) -> bool {
        model_accepts_images(model)
    }
}

/// Construct the provider named in settings.
pub fn provider_for(
    name: &str,
    api_key: &str,
) -> Result<std::sync::Arc<dyn ChatProvider>, DispatchError> {
    match name {
        "openrouter" => Ok(std::sync::Arc::new(OpenRouterProvider::new(api_key)?)),
        "groq" => Ok(std::sync::Arc::new(GroqProvider::new(api_key)?)),
        other => Err(DispatchError::MissingConfig(format!(
            "unknown provider '{other}'; expected 'openrouter' or 'groq'"
        ))),
    }
}
