//! Cross-frame map collection and merging.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tabpilot_core_types::TabHandle;
use tabpilot_frame_coordinator::FrameCoordinator;
use tabpilot_page_probe::visual_map::{iframe_header, IFRAME_MARKER, MAP_HEADER};
use tabpilot_page_probe::{ProbeReply, ProbeRequest};

use crate::SnapshotError;

/// Snapshot retry tunables. Quiz iframes navigate between items; a snapshot
/// caught mid-navigation simply lacks the iframe section and is retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub iframe_retries: u32,
    pub iframe_retry_delay_ms: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            iframe_retries: 4,
            iframe_retry_delay_ms: 1_800,
        }
    }
}

impl SnapshotConfig {
    pub fn test() -> Self {
        Self {
            iframe_retries: 2,
            iframe_retry_delay_ms: 1,
        }
    }
}

/// One merged cross-frame snapshot.
#[derive(Debug, Clone)]
pub struct MergedSnapshot {
    /// Top frame's map first, iframe blocks appended under their headers.
    pub map: String,
    /// Content frames that contributed a block (top included).
    pub frame_count: usize,
    /// Whether any iframe block made it into the merge.
    pub has_iframe_content: bool,
}

/// Collect maps from all content frames of a tab and merge them.
///
/// The top frame's map keeps its own header; each content-bearing child
/// frame is appended with its header replaced by the iframe section header.
/// Child frame failures degrade that frame to absent; only a missing top
/// frame is fatal.
pub async fn collect_all_frames(
    coordinator: &FrameCoordinator,
    tab: &dyn TabHandle,
) -> Result<MergedSnapshot, SnapshotError> {
    coordinator.inject_all(tab).await?;
    let frames = coordinator.enumerate_content(tab).await?;

    let mut merged = String::new();
    let mut frame_count = 0usize;
    let mut has_iframe_content = false;

    for frame in &frames {
        let reply = match coordinator
            .send_lenient(tab, frame, &ProbeRequest::BuildVisualMap)
            .await
        {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(err) if frame.frame_id.is_top() => {
                return Err(SnapshotError::NoTopFrame(err.to_string()));
            }
            Err(err) => {
                warn!(frame = %frame.frame_id, %err, "child frame dropped from snapshot");
                continue;
            }
        };

        let map = match reply {
            ProbeReply::VisualMap { map } => map,
            ProbeReply::Error { message, .. } if frame.frame_id.is_top() => {
                return Err(SnapshotError::NoTopFrame(message));
            }
            other => {
                debug!(frame = %frame.frame_id, reply = ?other, "unexpected snapshot reply");
                continue;
            }
        };

        if frame.frame_id.is_top() {
            merged.push_str(&map);
            frame_count += 1;
        } else if has_elements(&map) {
            let block = map.replacen(MAP_HEADER, &iframe_header(frame.frame_id.0), 1);
            merged.push_str(&block);
            frame_count += 1;
            has_iframe_content = true;
        }
    }

    if !merged.starts_with(MAP_HEADER) {
        return Err(SnapshotError::NoTopFrame(
            "no reply from the top frame".to_string(),
        ));
    }

    Ok(MergedSnapshot {
        map: merged,
        frame_count,
        has_iframe_content,
    })
}

/// Quiz-mode collection: retry until an iframe section appears or attempts
/// run out, re-injecting between attempts.
pub async fn collect_with_iframe_retry(
    coordinator: &FrameCoordinator,
    tab: &dyn TabHandle,
    config: &SnapshotConfig,
) -> Result<MergedSnapshot, SnapshotError> {
    let mut last = collect_all_frames(coordinator, tab).await?;
    let mut attempt = 0;
    while !last.map.contains(IFRAME_MARKER) && attempt < config.iframe_retries {
        attempt += 1;
        debug!(attempt, "iframe section missing from snapshot; retrying");
        tokio::time::sleep(Duration::from_millis(config.iframe_retry_delay_ms)).await;
        last = collect_all_frames(coordinator, tab).await?;
    }
    Ok(last)
}

fn has_elements(map: &str) -> bool {
    map.lines().any(|l| l.starts_with('['))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_maps_carry_no_elements() {
        let empty = format!("{MAP_HEADER}\nViewport 800x600, scroll (0,0), 0 elements\n");
        assert!(!has_elements(&empty));
        let with = format!("{empty}[*BUTTON] @(0,0 10x10) sel=\"#b\"\n");
        assert!(has_elements(&with));
    }
}
