//! Action execution layer.
//!
//! Takes planner actions, routes frame-scoped ones to the right probe,
//! and owns the behaviors that live above single frames: the drag protocol
//! fan-out, navigation waits, debug-channel screenshots, and tab and
//! tab-group operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod debug;
pub mod drag;
pub mod executor;
pub mod tabs;

pub use debug::DebugSessions;
pub use executor::ActionExecutor;

/// Executor tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Tab-load wait for navigate actions.
    pub navigate_timeout_ms: u64,
    /// Settle delay after a completed load.
    pub navigate_settle_ms: u64,
    /// Pause between the two clicks of the quiz click-to-place drag.
    pub click_place_pause_ms: u64,
    /// Interpolation steps for the trusted-input drag replay.
    pub trusted_move_steps: u32,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            navigate_timeout_ms: 15_000,
            navigate_settle_ms: 500,
            click_place_pause_ms: 500,
            trusted_move_steps: 15,
        }
    }
}

impl ExecConfig {
    /// Unpaced configuration for tests.
    pub fn test() -> Self {
        Self {
            navigate_timeout_ms: 500,
            navigate_settle_ms: 0,
            click_place_pause_ms: 0,
            trusted_move_steps: 15,
        }
    }
}

/// Outcome of one executed action. Failures are data, not errors; the loop
/// logs them and the batch continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ExecOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, payload: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: Some(payload),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: None,
        }
    }
}

/// The executor's only thrown errors: everything else degrades to an
/// unsuccessful outcome.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Every drag path was tried and failed.
    #[error("drag failed after all fallbacks: {0}")]
    DragFailed(String),
}
