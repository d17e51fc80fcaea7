//! Embedding façade: wires the subsystems into one driver object.

use std::sync::Arc;

use tokio::sync::broadcast;

use tabpilot_action_executor::{ActionExecutor, DebugSessions, ExecConfig};
use tabpilot_agent_loop::{AgentLoop, DriverState, LoopConfig, LoopError, LoopResult};
use tabpilot_core_types::{Storage, TabHandle};
use tabpilot_event_bus::{DriverBus, DriverEvent};
use tabpilot_frame_coordinator::FrameCoordinator;
use tabpilot_llm_dispatch::{DispatchError, Dispatcher, LlmSettings};
use tabpilot_snapshot_service::SnapshotConfig;

/// The agent driver: one natural-language command in, a grounded sequence
/// of DOM actions out.
pub struct Driver {
    agent_loop: AgentLoop,
    bus: Arc<DriverBus>,
    state: Arc<DriverState>,
}

impl Driver {
    /// Wire up from host storage: providers, analysts, and default pacing.
    pub async fn from_storage(storage: &dyn Storage) -> Result<Self, DispatchError> {
        let settings = LlmSettings::load(storage).await?;
        let dispatcher = Dispatcher::from_settings(&settings)?;
        Ok(Self::new(
            dispatcher,
            ExecConfig::default(),
            LoopConfig::default(),
            SnapshotConfig::default(),
        ))
    }

    /// Wire up with explicit components; tests use unpaced configs and a
    /// scripted dispatcher.
    pub fn new(
        dispatcher: Dispatcher,
        exec_config: ExecConfig,
        loop_config: LoopConfig,
        snapshot_config: SnapshotConfig,
    ) -> Self {
        let bus = DriverBus::new(256);
        let state = DriverState::new();
        let executor = ActionExecutor::new(
            FrameCoordinator::default(),
            Arc::new(DebugSessions::new()),
            exec_config,
        );
        let agent_loop = AgentLoop::new(
            executor,
            dispatcher,
            Arc::clone(&bus),
            Arc::clone(&state),
            loop_config,
            snapshot_config,
        );
        Self {
            agent_loop,
            bus,
            state,
        }
    }

    /// Run one command against a tab. Rejects with `LoopError::Busy` while
    /// another command is executing.
    pub async fn execute_command(
        &mut self,
        tab: &dyn TabHandle,
        command: &str,
    ) -> Result<LoopResult, LoopError> {
        self.agent_loop.run_command(tab, command).await
    }

    /// Cooperatively cancel the running command, if any.
    pub fn stop(&self) {
        self.state.stop();
    }

    pub fn is_executing(&self) -> bool {
        self.state.is_executing()
    }

    /// The shared execution state, for hosts that wire STOP controls.
    pub fn state(&self) -> Arc<DriverState> {
        Arc::clone(&self.state)
    }

    /// Subscribe to status, action-log, and execution-state events.
    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        use tabpilot_event_bus::EventBus;
        self.bus.subscribe()
    }

    pub fn bus(&self) -> Arc<DriverBus> {
        Arc::clone(&self.bus)
    }
}
