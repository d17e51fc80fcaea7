//! Shared primitives for the tabpilot driver crates.
//!
//! Holds the identifiers, the `Action` sum type that forms the JSON surface
//! between the planner and the executor, the per-step `PageContext` bundle,
//! and the host-facing traits (`TabHandle`, `Storage`).

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub mod action;
pub mod context;
pub mod host;

pub use action::{Action, ScrollDirection};
pub use context::{ExecMode, PageContext};
pub use host::{FrameInfo, Storage, TabGroupInfo, TabHandle, TabInfo};

/// Error type for operations the host performs on the driver's behalf.
///
/// Host failures carry a message only; the driver maps them into its own
/// taxonomy at each layer.
#[derive(Debug, Error, Clone)]
pub enum HostError {
    #[error("{message}")]
    Message { message: String },
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Browser tab identifier, assigned by the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab:{}", self.0)
    }
}

/// Frame identifier within a tab. The top document is always `0`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub i64);

impl FrameId {
    pub const TOP: FrameId = FrameId(0);

    pub fn is_top(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// Tab-group identifier, assigned by the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

/// Identifier for one user command execution (one loop run).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub String);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd:{}", self.0)
    }
}
