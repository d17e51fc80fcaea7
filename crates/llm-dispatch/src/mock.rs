//! Deterministic provider for tests and offline development.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chat::{ChatProvider, ChatRequest, ModelInfo};
use crate::errors::DispatchError;

/// Scripted chat provider: replies are popped in order, requests are
/// recorded for assertions.
#[derive(Default, Debug)]
pub struct MockChatProvider {
    replies: Mutex<VecDeque<Result<String, DispatchError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    images_supported: bool,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_support() -> Self {
        Self {
            images_supported: true,
            ..Self::default()
        }
    }

    /// Queue a successful reply.
    pub fn push_ok(&self, content: impl Into<String>) {
        self.replies.lock().push_back(Ok(content.into()));
    }

    /// Queue a failure.
    pub fn push_err(&self, err: DispatchError) {
        self.replies.lock().push_back(Err(err));
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_chat(&self, request: ChatRequest) -> Result<String, DispatchError> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(DispatchError::Transport("mock replies exhausted".to_string())))
    }

    async fn validate(&self) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, DispatchError> {
        Ok(vec![ModelInfo {
            id: "mock-model".to_string(),
        }])
    }

    fn supports_images(&self, _model: &str) -> bool {
        self.images_supported
    }
}
