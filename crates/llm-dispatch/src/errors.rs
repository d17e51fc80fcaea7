//! Dispatch error taxonomy surfaced to the agent loop.

use thiserror::Error;

/// Errors emitted by the LLM dispatch layer.
#[derive(Debug, Error, Clone)]
pub enum DispatchError {
    /// No provider, model, or key configured.
    #[error("AI is not configured: {0}")]
    MissingConfig(String),

    /// The provider rejected the API key.
    #[error("the provider rejected the API key; check it in Settings")]
    InvalidKey,

    /// The configured model does not exist at the provider. Already
    /// remapped to user guidance.
    #[error("{0}")]
    ModelNotFound(String),

    /// Network failure, 5xx, or rate limiting.
    #[error("provider transport error: {0}")]
    Transport(String),

    /// The provider-side JSON validation failed; one history-clearing retry
    /// is warranted.
    #[error("provider JSON validation failed: {0}")]
    JsonValidateFailed(String),

    /// The response carried no content at all.
    #[error("provider returned no content")]
    NoContent,

    /// The response could not be coerced into a decision.
    #[error("malformed model output: {0}")]
    MalformedJson(String),
}

impl DispatchError {
    /// Friendly remap for a missing model, pointing at Settings.
    pub fn model_not_found(model: &str) -> Self {
        Self::ModelNotFound(format!(
            "model '{model}' was not found at the provider; pick another model in Settings"
        ))
    }

    /// Errors that abort the whole command rather than one step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::MissingConfig(_)
                | DispatchError::InvalidKey
                | DispatchError::ModelNotFound(_)
        )
    }
}
