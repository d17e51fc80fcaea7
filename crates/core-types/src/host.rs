//! Host-provided capabilities the driver is written against.
//!
//! The driver never owns a browser. It receives a `TabHandle` with DOM and
//! debug-channel capabilities and a `Storage` with the user's settings, and
//! stays agnostic of how either is implemented.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FrameId, GroupId, HostError, TabId};

/// One frame of a tab, as reported by the host's navigation-stable
/// enumeration API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInfo {
    pub frame_id: FrameId,
    pub parent_frame_id: Option<FrameId>,
    pub url: String,
}

/// One open tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    /// Zero-based position within the window.
    pub index: usize,
    pub url: String,
    pub title: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
}

/// One tab group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabGroupInfo {
    pub id: GroupId,
    pub title: String,
    pub color: String,
}

/// A live browser tab with DOM and debug capabilities.
///
/// Frame messages use `serde_json::Value` envelopes so the trait stays free
/// of probe-protocol types; `None` replies mean the frame did not answer
/// (restricted page, replaced document).
#[async_trait]
pub trait TabHandle: Send + Sync {
    fn id(&self) -> TabId;

    async fn url(&self) -> Result<String, HostError>;

    async fn title(&self) -> Result<String, HostError>;

    /// Enumerate frames without injecting anything. Must survive iframe
    /// navigation mid-call.
    async fn enumerate_frames(&self) -> Result<Vec<FrameInfo>, HostError>;

    /// Install (or re-install) the probe in every frame. Safe to call
    /// repeatedly; frames guard against double-install.
    async fn inject_probe_in_all_frames(&self) -> Result<(), HostError>;

    async fn send_to_frame(
        &self,
        frame_id: FrameId,
        message: Value,
    ) -> Result<Option<Value>, HostError>;

    async fn update_url(&self, url: &str) -> Result<(), HostError>;

    /// Wait until the tab reports completed loading. Returns `false` on
    /// timeout.
    async fn wait_loaded(&self, timeout: Duration) -> Result<bool, HostError>;

    async fn activate(&self) -> Result<(), HostError>;

    async fn close(&self) -> Result<(), HostError>;

    async fn create_tab(&self, url: Option<&str>) -> Result<Arc<dyn TabHandle>, HostError>;

    /// Handle for another open tab, by id.
    async fn tab_handle(&self, id: TabId) -> Result<Arc<dyn TabHandle>, HostError>;

    async fn list_tabs(&self) -> Result<Vec<TabInfo>, HostError>;

    async fn list_tab_groups(&self) -> Result<Vec<TabGroupInfo>, HostError>;

    async fn group_tabs(
        &self,
        tabs: &[TabId],
        color: Option<&str>,
        title: Option<&str>,
    ) -> Result<GroupId, HostError>;

    async fn add_to_group(&self, group: GroupId, tabs: &[TabId]) -> Result<(), HostError>;

    async fn ungroup(&self, group: GroupId) -> Result<(), HostError>;

    /// Bind the browser's debug channel to this tab. Idempotence is the
    /// caller's concern; hosts may error on double-attach.
    async fn debug_attach(&self) -> Result<(), HostError>;

    async fn debug_detach(&self) -> Result<(), HostError>;

    /// Send a raw debug-channel command (`Input.dispatchMouseEvent`, ...).
    async fn debug_send(&self, method: &str, params: Value) -> Result<Value, HostError>;

    /// Capture the visible viewport as a base64 PNG. Requires an attached
    /// debug channel.
    async fn capture_screenshot(&self) -> Result<String, HostError>;
}

/// Key-value persistence for the user's driver settings.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
}

/// Storage keys the driver reads.
pub mod keys {
    pub const AI_PROVIDER: &str = "aiProvider";
    pub const AI_MODEL: &str = "aiModel";
    pub const AI_API_KEY: &str = "aiApiKey";
    pub const GROQ_VISION_MODEL: &str = "groqVisionModel";
    pub const SEARCH_ENABLED: &str = "searchEnabled";
    pub const SEARCH_MODEL: &str = "searchModel";
}
