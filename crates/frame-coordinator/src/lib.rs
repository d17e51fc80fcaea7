//! Frame coordination: enumeration, probe injection, and per-frame
//! messaging with a hard timeout.
//!
//! Iframes can navigate mid-step, so enumeration always goes through the
//! host's navigation-stable API, the probe is (re-)injected before every
//! interaction round, and a wedged frame can cost at most its timeout.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use tabpilot_core_types::{FrameId, FrameInfo, TabHandle};
use tabpilot_page_probe::{ProbeReply, ProbeRequest};

/// Per-frame message timeout. A frame that exceeds it is treated as absent
/// for the current step, never as fatal.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors from frame messaging.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame did not reply within the per-frame timeout.
    #[error("frame {frame} timed out")]
    Timeout { frame: FrameId },

    /// The frame channel returned no reply (replaced document, restricted
    /// page).
    #[error("frame {frame} returned no reply")]
    NoReply { frame: FrameId },

    /// Host-level failure delivering the message.
    #[error("frame transport failed: {0}")]
    Transport(String),

    /// The reply did not parse as a probe reply.
    #[error("frame {frame} sent an unparseable reply: {detail}")]
    BadReply { frame: FrameId, detail: String },
}

/// True for frames the driver never speaks to (non-web schemes, blank
/// documents). Failures on these are swallowed; failures on real content
/// frames are preserved.
pub fn is_restricted_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => !matches!(parsed.scheme(), "http" | "https"),
        // about:blank and friends fail scheme checks in some hosts; anything
        // unparseable is treated as restricted.
        Err(_) => true,
    }
}

/// Routes probe requests to frames.
#[derive(Debug, Clone)]
pub struct FrameCoordinator {
    frame_timeout: Duration,
}

impl Default for FrameCoordinator {
    fn default() -> Self {
        Self {
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
        }
    }
}

impl FrameCoordinator {
    pub fn new(frame_timeout: Duration) -> Self {
        Self { frame_timeout }
    }

    pub fn frame_timeout(&self) -> Duration {
        self.frame_timeout
    }

    /// Enumerate the tab's frames through the navigation-stable host API.
    pub async fn enumerate(&self, tab: &dyn TabHandle) -> Result<Vec<FrameInfo>, FrameError> {
        tab.enumerate_frames()
            .await
            .map_err(|err| FrameError::Transport(err.to_string()))
    }

    /// Enumerate only content frames the driver will talk to.
    pub async fn enumerate_content(
        &self,
        tab: &dyn TabHandle,
    ) -> Result<Vec<FrameInfo>, FrameError> {
        Ok(self
            .enumerate(tab)
            .await?
            .into_iter()
            .filter(|f| !is_restricted_url(&f.url))
            .collect())
    }

    /// Inject (or re-inject) the probe into every frame. Safe to repeat;
    /// frames guard against double install.
    pub async fn inject_all(&self, tab: &dyn TabHandle) -> Result<(), FrameError> {
        tab.inject_probe_in_all_frames()
            .await
            .map_err(|err| FrameError::Transport(err.to_string()))
    }

    /// Send one probe request to one frame, bounded by the frame timeout.
    pub async fn send(
        &self,
        tab: &dyn TabHandle,
        frame: FrameId,
        request: &ProbeRequest,
    ) -> Result<ProbeReply, FrameError> {
        let message = serde_json::to_value(request)
            .map_err(|err| FrameError::Transport(err.to_string()))?;

        let reply = tokio::time::timeout(self.frame_timeout, tab.send_to_frame(frame, message))
            .await
            .map_err(|_| {
                warn!(%frame, timeout_ms = self.frame_timeout.as_millis() as u64, "frame timed out");
                FrameError::Timeout { frame }
            })?
            .map_err(|err| FrameError::Transport(err.to_string()))?
            .ok_or(FrameError::NoReply { frame })?;

        serde_json::from_value(reply).map_err(|err| FrameError::BadReply {
            frame,
            detail: err.to_string(),
        })
    }

    /// Send to a frame, downgrading failures on restricted frames to `None`.
    /// Real content frames keep their errors.
    pub async fn send_lenient(
        &self,
        tab: &dyn TabHandle,
        frame: &FrameInfo,
        request: &ProbeRequest,
    ) -> Result<Option<ProbeReply>, FrameError> {
        match self.send(tab, frame.frame_id, request).await {
            Ok(reply) => Ok(Some(reply)),
            Err(err) if is_restricted_url(&frame.url) => {
                debug!(frame = %frame.frame_id, url = %frame.url, %err, "ignoring restricted frame failure");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use tabpilot_core_types::{
        GroupId, HostError, TabGroupInfo, TabId, TabInfo,
    };

    /// Minimal tab double: one slow frame, one answering frame.
    struct StubTab;

    #[async_trait]
    impl TabHandle for StubTab {
        fn id(&self) -> TabId {
            TabId(1)
        }

        async fn url(&self) -> Result<String, HostError> {
            Ok("https://example.com".to_string())
        }

        async fn title(&self) -> Result<String, HostError> {
            Ok("Example".to_string())
        }

        async fn enumerate_frames(&self) -> Result<Vec<FrameInfo>, HostError> {
            Ok(vec![
                FrameInfo {
                    frame_id: FrameId::TOP,
                    parent_frame_id: None,
                    url: "https://example.com".to_string(),
                },
                FrameInfo {
                    frame_id: FrameId(9),
                    parent_frame_id: Some(FrameId::TOP),
                    url: "about:blank".to_string(),
                },
            ])
        }

        async fn inject_probe_in_all_frames(&self) -> Result<(), HostError> {
            Ok(())
        }

        async fn send_to_frame(
            &self,
            frame_id: FrameId,
            _message: Value,
        ) -> Result<Option<Value>, HostError> {
            match frame_id.0 {
                0 => Ok(Some(
                    serde_json::to_value(ProbeReply::Pong { installed: true }).unwrap(),
                )),
                7 => {
                    // Wedged frame: never answers inside the timeout.
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(None)
                }
                _ => Ok(None),
            }
        }

        async fn update_url(&self, _url: &str) -> Result<(), HostError> {
            Err(HostError::new("unsupported in stub"))
        }

        async fn wait_loaded(&self, _timeout: Duration) -> Result<bool, HostError> {
            Ok(true)
        }

        async fn activate(&self) -> Result<(), HostError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), HostError> {
            Ok(())
        }

        async fn create_tab(
            &self,
            _url: Option<&str>,
        ) -> Result<Arc<dyn TabHandle>, HostError> {
            Err(HostError::new("unsupported in stub"))
        }

        async fn tab_handle(&self, _id: TabId) -> Result<Arc<dyn TabHandle>, HostError> {
            Err(HostError::new("unsupported in stub"))
        }

        async fn list_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
            Ok(Vec::new())
        }

        async fn list_tab_groups(&self) -> Result<Vec<TabGroupInfo>, HostError> {
            Ok(Vec::new())
        }

        async fn group_tabs(
            &self,
            _tabs: &[TabId],
            _color: Option<&str>,
            _title: Option<&str>,
        ) -> Result<GroupId, HostError> {
            Err(HostError::new("unsupported in stub"))
        }

        async fn add_to_group(&self, _group: GroupId, _tabs: &[TabId]) -> Result<(), HostError> {
            Err(HostError::new("unsupported in stub"))
        }

        async fn ungroup(&self, _group: GroupId) -> Result<(), HostError> {
            Err(HostError::new("unsupported in stub"))
        }

        async fn debug_attach(&self) -> Result<(), HostError> {
            Ok(())
        }

        async fn debug_detach(&self) -> Result<(), HostError> {
            Ok(())
        }

        async fn debug_send(&self, _method: &str, _params: Value) -> Result<Value, HostError> {
            Ok(Value::Null)
        }

        async fn capture_screenshot(&self) -> Result<String, HostError> {
            Ok(String::new())
        }
    }

    #[test]
    fn restricted_url_detection() {
        assert!(is_restricted_url("about:blank"));
        assert!(is_restricted_url("chrome-extension://abc/popup.html"));
        assert!(is_restricted_url(""));
        assert!(!is_restricted_url("https://example.com/page"));
        assert!(!is_restricted_url("http://localhost:8080"));
    }

    #[tokio::test]
    async fn send_parses_probe_reply() {
        let coordinator = FrameCoordinator::default();
        let reply = coordinator
            .send(&StubTab, FrameId::TOP, &ProbeRequest::Ping)
            .await
            .unwrap();
        match reply {
            ProbeReply::Pong { installed } => assert!(installed),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wedged_frame_costs_at_most_the_timeout() {
        let coordinator = FrameCoordinator::new(Duration::from_millis(50));
        let started = tokio::time::Instant::now();
        let err = coordinator
            .send(&StubTab, FrameId(7), &ProbeRequest::Ping)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Timeout { frame } if frame == FrameId(7)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn restricted_frame_failures_are_swallowed() {
        let coordinator = FrameCoordinator::default();
        let frames = coordinator.enumerate(&StubTab).await.unwrap();
        let restricted = frames.iter().find(|f| f.url == "about:blank").unwrap();
        let outcome = coordinator
            .send_lenient(&StubTab, restricted, &ProbeRequest::Ping)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn content_frame_filter_drops_non_web_schemes() {
        let coordinator = FrameCoordinator::default();
        let frames = coordinator.enumerate_content(&StubTab).await.unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].frame_id.is_top());
    }
}
