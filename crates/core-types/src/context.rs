//! The per-step perception bundle handed to the planner.

use serde::{Deserialize, Serialize};

/// Loop execution mode. Quiz mode tightens break-points, slows pacing, and
/// switches prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    #[default]
    Normal,
    Quiz,
}

impl ExecMode {
    pub fn is_quiz(&self) -> bool {
        matches!(self, ExecMode::Quiz)
    }
}

/// Everything the dispatcher needs to describe the current page to the LLM.
///
/// A `PageContext` lives for exactly one loop step. `visual_map` holds either
/// the full Visual Page Map or, in quiz mode on later steps, the section diff
/// against the previous full map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,

    /// Full Visual Page Map or a `=== PAGE UPDATE (diff) ===` document.
    pub visual_map: String,

    /// Base64-encoded PNG, captured when vision is needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,

    /// Set by the quiz oracle when the page carries image content the map
    /// cannot express.
    #[serde(default)]
    pub needs_vision: bool,

    /// Secondary simplified DOM tree, when a host supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom: Option<serde_json::Value>,
}

impl PageContext {
    pub fn new(url: impl Into<String>, title: impl Into<String>, visual_map: String) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            visual_map,
            screenshot: None,
            needs_vision: false,
            dom: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: impl Into<String>) -> Self {
        self.screenshot = Some(screenshot.into());
        self
    }
}
