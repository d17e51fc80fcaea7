//! Exhaustive action dispatch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};

use tabpilot_core_types::{Action, ExecMode, FrameId, ScrollDirection, TabHandle};
use tabpilot_frame_coordinator::FrameCoordinator;
use tabpilot_page_probe::protocol::ScrollDir;
use tabpilot_page_probe::{ProbeAction, ProbeReply, ProbeRequest};

use crate::debug::DebugSessions;
use crate::{drag, tabs, ExecConfig, ExecError, ExecOutcome};

/// Executes planner actions against a tab.
pub struct ActionExecutor {
    coordinator: FrameCoordinator,
    debug_sessions: Arc<DebugSessions>,
    config: ExecConfig,
}

impl ActionExecutor {
    pub fn new(
        coordinator: FrameCoordinator,
        debug_sessions: Arc<DebugSessions>,
        config: ExecConfig,
    ) -> Self {
        Self {
            coordinator,
            debug_sessions,
            config,
        }
    }

    pub fn coordinator(&self) -> &FrameCoordinator {
        &self.coordinator
    }

    pub fn debug_sessions(&self) -> Arc<DebugSessions> {
        Arc::clone(&self.debug_sessions)
    }

    /// Execute one action. Per-action failures come back as unsuccessful
    /// outcomes; only exhausted drag fallbacks throw.
    pub async fn execute(
        &self,
        tab: &dyn TabHandle,
        action: &Action,
        mode: ExecMode,
    ) -> Result<ExecOutcome, ExecError> {
        debug!(action = %action.label(), ?mode, "executing action");
        match action {
            // Frame-scoped actions route through the probe.
            Action::Click { selector, frame_id } => {
                self.probe(tab, *frame_id, ProbeAction::Click { selector: selector.clone() })
                    .await
            }
            Action::Type {
                selector,
                text,
                clear,
                frame_id,
            } => {
                self.probe(
                    tab,
                    *frame_id,
                    ProbeAction::Type {
                        selector: selector.clone(),
                        text: text.clone(),
                        clear: *clear,
                    },
                )
                .await
            }
            Action::Select {
                selector,
                value,
                frame_id,
            } => {
                self.probe(
                    tab,
                    *frame_id,
                    ProbeAction::Select {
                        selector: selector.clone(),
                        value: value.clone(),
                    },
                )
                .await
            }
            Action::Hover { selector, frame_id } => {
                self.probe(tab, *frame_id, ProbeAction::Hover { selector: selector.clone() })
                    .await
            }
            Action::Scroll {
                direction,
                amount,
                selector,
                frame_id,
            } => {
                self.probe(
                    tab,
                    *frame_id,
                    ProbeAction::Scroll {
                        direction: direction.map(to_probe_dir),
                        amount: *amount,
                        selector: selector.clone(),
                    },
                )
                .await
            }
            Action::Extract {
                selector,
                attribute,
                frame_id,
            } => {
                self.probe(
                    tab,
                    *frame_id,
                    ProbeAction::Extract {
                        selector: selector.clone(),
                        attribute: attribute.clone(),
                    },
                )
                .await
            }
            Action::Evaluate {
                expression,
                frame_id,
            } => {
                self.probe(
                    tab,
                    *frame_id,
                    ProbeAction::Evaluate {
                        expression: expression.clone(),
                    },
                )
                .await
            }
            Action::Keyboard { key, frame_id } => {
                self.probe(tab, *frame_id, ProbeAction::Keyboard { key: key.clone() })
                    .await
            }
            Action::Wait {
                selector,
                timeout,
                milliseconds,
                frame_id,
            } => {
                self.probe(
                    tab,
                    *frame_id,
                    ProbeAction::Wait {
                        selector: selector.clone(),
                        timeout: *timeout,
                        milliseconds: *milliseconds,
                    },
                )
                .await
            }
            Action::Describe { text } => {
                self.probe(
                    tab,
                    None,
                    ProbeAction::Describe { text: text.clone() },
                )
                .await
            }

            Action::Drag {
                from_selector,
                to_selector,
                frame_id,
            } => {
                drag::run_drag(
                    &self.coordinator,
                    &self.debug_sessions,
                    &self.config,
                    tab,
                    from_selector,
                    to_selector,
                    *frame_id,
                    mode.is_quiz(),
                )
                .await
            }

            Action::Navigate { url } => Ok(self.navigate(tab, url).await),

            Action::Screenshot => Ok(self.screenshot(tab).await),

            // Break-point markers: the loop re-perceives; nothing to do here.
            Action::Snapshot => Ok(ExecOutcome::ok("snapshot requested")),
            Action::Search { query } => Ok(ExecOutcome::ok_with(
                format!("search requested: {query}"),
                json!({ "query": query }),
            )),

            Action::TabNew { url } => Ok(tabs::new_tab(tab, url.as_deref()).await),
            Action::TabClose { index } => Ok(tabs::close_tab(tab, *index).await),
            Action::TabSwitch { index } => Ok(tabs::switch_tab(tab, *index).await),
            Action::TabList => Ok(tabs::list_tabs(tab).await),
            Action::TabGroupCreate {
                tab_indices,
                color,
                title,
            } => Ok(tabs::group_create(tab, tab_indices, color.as_deref(), title.as_deref()).await),
            Action::TabGroupAdd {
                group_id,
                tab_indices,
            } => Ok(tabs::group_add(tab, *group_id, tab_indices).await),
            Action::TabGroupRemove { group_id } => Ok(tabs::group_remove(tab, *group_id).await),
        }
    }

    async fn probe(
        &self,
        tab: &dyn TabHandle,
        frame_id: Option<FrameId>,
        action: ProbeAction,
    ) -> Result<ExecOutcome, ExecError> {
        let frame = frame_id.unwrap_or(FrameId::TOP);
        let request = ProbeRequest::ExecuteAction { action };
        let outcome = match self.coordinator.send(tab, frame, &request).await {
            Ok(ProbeReply::ActionResult { result }) => ExecOutcome {
                success: result.success,
                message: result.message,
                payload: result.payload,
            },
            Ok(ProbeReply::Error { message, .. }) => ExecOutcome::failed(message),
            Ok(other) => ExecOutcome::failed(format!("unexpected probe reply: {other:?}")),
            Err(err) => ExecOutcome::failed(err.to_string()),
        };
        Ok(outcome)
    }

    async fn navigate(&self, tab: &dyn TabHandle, url: &str) -> ExecOutcome {
        if let Err(err) = tab.update_url(url).await {
            return ExecOutcome::failed(format!("navigation to {url} failed: {err}"));
        }
        let loaded = tab
            .wait_loaded(Duration::from_millis(self.config.navigate_timeout_ms))
            .await
            .unwrap_or(false);
        if self.config.navigate_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.navigate_settle_ms)).await;
        }
        if loaded {
            info!(%url, "navigation complete");
            ExecOutcome::ok(format!("navigated to {url}"))
        } else {
            ExecOutcome::ok(format!("navigated to {url} (load still pending)"))
        }
    }

    async fn screenshot(&self, tab: &dyn TabHandle) -> ExecOutcome {
        match self.debug_sessions.capture_screenshot(tab).await {
            Ok(png) if !png.is_empty() => ExecOutcome::ok_with(
                "captured screenshot",
                json!({ "screenshot": png }),
            ),
            Ok(_) => ExecOutcome::failed("screenshot capture returned no data"),
            Err(err) => ExecOutcome::failed(format!("screenshot failed: {err}")),
        }
    }
}

fn to_probe_dir(direction: ScrollDirection) -> ScrollDir {
    match direction {
        ScrollDirection::Up => ScrollDir::Up,
        ScrollDirection::Down => ScrollDir::Down,
        ScrollDirection::Left => ScrollDir::Left,
        ScrollDirection::Right => ScrollDir::Right,
    }
}
