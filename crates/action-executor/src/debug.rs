//! Debug-channel session registry.
//!
//! The browser's debug channel is a process-wide resource keyed by tab;
//! attach must be idempotent and detach must clean the registry even when
//! the tab closes underneath us.

use dashmap::DashSet;
use tracing::debug;

use tabpilot_core_types::{HostError, TabHandle, TabId};

/// Tracks which tabs currently hold an attached debug session.
#[derive(Debug, Default)]
pub struct DebugSessions {
    attached: DashSet<TabId>,
}

impl DebugSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self, tab: TabId) -> bool {
        self.attached.contains(&tab)
    }

    /// Attach if not already attached. Safe to call repeatedly.
    pub async fn ensure_attached(&self, tab: &dyn TabHandle) -> Result<(), HostError> {
        let id = tab.id();
        if self.attached.contains(&id) {
            return Ok(());
        }
        tab.debug_attach().await?;
        self.attached.insert(id);
        debug!(%id, "debug channel attached");
        Ok(())
    }

    /// Detach and forget. Missing entries are fine.
    pub async fn detach(&self, tab: &dyn TabHandle) -> Result<(), HostError> {
        let id = tab.id();
        if self.attached.remove(&id).is_some() {
            tab.debug_detach().await?;
            debug!(%id, "debug channel detached");
        }
        Ok(())
    }

    /// Forget a tab that went away without a detach (tab closed).
    pub fn forget(&self, tab: TabId) {
        self.attached.remove(&tab);
    }

    /// Capture a screenshot, attaching first if needed.
    pub async fn capture_screenshot(&self, tab: &dyn TabHandle) -> Result<String, HostError> {
        self.ensure_attached(tab).await?;
        tab.capture_screenshot().await
    }
}
