//! tabpilot: a browser-automation agent driver.
//!
//! Turns a natural-language command into a grounded sequence of DOM actions
//! executed inside a running browser tab: snapshot the page into a Visual
//! Page Map, ask a language model for a structured action batch, execute it
//! frame-by-frame, and loop until done, stopped, or out of steps.
//!
//! The driver is embedded: the host supplies a [`TabHandle`] with DOM and
//! debug capabilities plus a [`Storage`] with the user's settings, and
//! observes progress on the event bus.

pub mod driver;
pub mod harness;

pub use driver::Driver;

pub use tabpilot_action_executor::{ActionExecutor, DebugSessions, ExecConfig, ExecOutcome};
pub use tabpilot_agent_loop::{
    AgentLoop, DriverState, LoopConfig, LoopError, LoopResult, LoopStatus,
};
pub use tabpilot_core_types::{
    Action, ExecMode, FrameId, GroupId, HostError, PageContext, Storage, TabHandle, TabId,
};
pub use tabpilot_event_bus::{DriverBus, DriverEvent, DriverStatus, EventBus, LogKind};
pub use tabpilot_frame_coordinator::FrameCoordinator;
pub use tabpilot_llm_dispatch::{
    ChatProvider, DispatchError, Dispatcher, LlmSettings, MockChatProvider, ModelDecision,
};
pub use tabpilot_page_probe::{Document, ElementSpec, PageProbe, ProbeConfig};
pub use tabpilot_quiz_oracle as quiz_oracle;
pub use tabpilot_snapshot_service::{compute_diff, SnapshotConfig, UNCHANGED_MARKER};
