//! Agent loop crate: the command session and the step-wise controller.

pub mod config;
pub mod controller;
pub mod session;

pub use config::LoopConfig;
pub use controller::{AgentLoop, LoopError, LoopResult, LoopStatus};
pub use session::{CommandSession, DriverState};
