//! The drag protocol fan-out.
//!
//! Three paths, tried in order until one works:
//! 1. quiz click-to-place (quiz mode only): accessibility-enabled widgets
//!    accept click-source-then-click-target and it avoids synthetic-move
//!    flakiness;
//! 2. synthesized pointer+mouse+HTML5 sequence inside the frame;
//! 3. trusted-input replay through the debug channel, for frameworks that
//!    ignore untrusted events.
//!
//! When the planner omitted the frame and the top frame misses the source
//! selector, remaining content frames are swept before giving up.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use tabpilot_core_types::{FrameId, TabHandle};
use tabpilot_frame_coordinator::FrameCoordinator;
use tabpilot_page_probe::errors::ProbeErrorKind;
use tabpilot_page_probe::{DragCoords, ProbeAction, ProbeReply, ProbeRequest};

use crate::debug::DebugSessions;
use crate::{ExecConfig, ExecError, ExecOutcome};

pub(crate) async fn run_drag(
    coordinator: &FrameCoordinator,
    debug_sessions: &DebugSessions,
    config: &ExecConfig,
    tab: &dyn TabHandle,
    from: &str,
    to: &str,
    frame_id: Option<FrameId>,
    quiz_mode: bool,
) -> Result<ExecOutcome, ExecError> {
    let frame = match frame_id {
        Some(frame) => frame,
        None => recover_frame(coordinator, tab, from).await,
    };

    if quiz_mode {
        match click_to_place(coordinator, config, tab, frame, from, to).await {
            Ok(outcome) => return Ok(outcome),
            Err(detail) => debug!(%detail, "click-to-place failed; trying synthesized drag"),
        }
    }

    match synthesized(coordinator, tab, frame, from, to).await {
        Ok(outcome) => return Ok(outcome),
        Err(detail) => warn!(%detail, "synthesized drag failed; trying trusted input"),
    }

    trusted(coordinator, debug_sessions, config, tab, frame, from, to).await
}

/// Planner omitted the frame: prefer the top frame, fall back to the first
/// content frame that can resolve the source selector.
async fn recover_frame(
    coordinator: &FrameCoordinator,
    tab: &dyn TabHandle,
    from: &str,
) -> FrameId {
    let probe = ProbeRequest::DragCoords {
        from: from.to_string(),
        to: from.to_string(),
    };
    match coordinator.send(tab, FrameId::TOP, &probe).await {
        Ok(ProbeReply::Error {
            kind: ProbeErrorKind::SelectorNotFound,
            ..
        }) => {}
        _ => return FrameId::TOP,
    }

    let frames = match coordinator.enumerate_content(tab).await {
        Ok(frames) => frames,
        Err(_) => return FrameId::TOP,
    };
    for frame in frames.iter().filter(|f| !f.frame_id.is_top()) {
        if let Ok(ProbeReply::DragCoords { .. }) =
            coordinator.send(tab, frame.frame_id, &probe).await
        {
            debug!(frame = %frame.frame_id, "drag source found by frame sweep");
            return frame.frame_id;
        }
    }
    FrameId::TOP
}

async fn click_to_place(
    coordinator: &FrameCoordinator,
    config: &ExecConfig,
    tab: &dyn TabHandle,
    frame: FrameId,
    from: &str,
    to: &str,
) -> Result<ExecOutcome, String> {
    click_once(coordinator, tab, frame, from).await?;
    tokio::time::sleep(Duration::from_millis(config.click_place_pause_ms)).await;
    click_once(coordinator, tab, frame, to).await?;
    Ok(ExecOutcome::ok(format!(
        "placed {from} onto {to} via click-to-place"
    )))
}

async fn click_once(
    coordinator: &FrameCoordinator,
    tab: &dyn TabHandle,
    frame: FrameId,
    selector: &str,
) -> Result<(), String> {
    let request = ProbeRequest::ExecuteAction {
        action: ProbeAction::Click {
            selector: selector.to_string(),
        },
    };
    match coordinator.send(tab, frame, &request).await {
        Ok(ProbeReply::ActionResult { result }) if result.success => Ok(()),
        Ok(ProbeReply::ActionResult { result }) => Err(result.message),
        Ok(ProbeReply::Error { message, .. }) => Err(message),
        Ok(other) => Err(format!("unexpected reply: {other:?}")),
        Err(err) => Err(err.to_string()),
    }
}

async fn synthesized(
    coordinator: &FrameCoordinator,
    tab: &dyn TabHandle,
    frame: FrameId,
    from: &str,
    to: &str,
) -> Result<ExecOutcome, String> {
    let request = ProbeRequest::ExecuteAction {
        action: ProbeAction::Drag {
            from_selector: from.to_string(),
            to_selector: to.to_string(),
        },
    };
    match coordinator.send(tab, frame, &request).await {
        Ok(ProbeReply::ActionResult { result }) if result.success => {
            Ok(ExecOutcome::ok(result.message))
        }
        Ok(ProbeReply::ActionResult { result }) => Err(result.message),
        Ok(ProbeReply::Error { message, .. }) => Err(message),
        Ok(other) => Err(format!("unexpected reply: {other:?}")),
        Err(err) => Err(err.to_string()),
    }
}

/// Trusted-input replay: resolve coordinates in the frame, offset by the
/// iframe's viewport position, and drive the debug channel's mouse events.
async fn trusted(
    coordinator: &FrameCoordinator,
    debug_sessions: &DebugSessions,
    config: &ExecConfig,
    tab: &dyn TabHandle,
    frame: FrameId,
    from: &str,
    to: &str,
) -> Result<ExecOutcome, ExecError> {
    let coords_request = ProbeRequest::DragCoords {
        from: from.to_string(),
        to: to.to_string(),
    };
    let coords: DragCoords = match coordinator.send(tab, frame, &coords_request).await {
        Ok(ProbeReply::DragCoords { coords }) => coords,
        Ok(ProbeReply::Error { message, .. }) => return Err(ExecError::DragFailed(message)),
        Ok(other) => {
            return Err(ExecError::DragFailed(format!("unexpected reply: {other:?}")))
        }
        Err(err) => return Err(ExecError::DragFailed(err.to_string())),
    };

    let (offset_x, offset_y) = if frame.is_top() {
        (0.0, 0.0)
    } else {
        iframe_offset(coordinator, tab, frame).await
    };

    let from_x = coords.from_x as f64 + offset_x;
    let from_y = coords.from_y as f64 + offset_y;
    let to_x = coords.to_x as f64 + offset_x;
    let to_y = coords.to_y as f64 + offset_y;

    debug_sessions
        .ensure_attached(tab)
        .await
        .map_err(|err| ExecError::DragFailed(format!("debug attach failed: {err}")))?;

    mouse_event(tab, "mousePressed", from_x, from_y)
        .await
        .map_err(ExecError::DragFailed)?;
    let steps = config.trusted_move_steps.max(1);
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let x = from_x + (to_x - from_x) * t;
        let y = from_y + (to_y - from_y) * t;
        mouse_event(tab, "mouseMoved", x, y)
            .await
            .map_err(ExecError::DragFailed)?;
    }
    mouse_event(tab, "mouseReleased", to_x, to_y)
        .await
        .map_err(ExecError::DragFailed)?;

    Ok(ExecOutcome::ok(format!(
        "dragged '{}' to '{}' via trusted input",
        coords.from_label, coords.to_label
    )))
}

async fn iframe_offset(
    coordinator: &FrameCoordinator,
    tab: &dyn TabHandle,
    frame: FrameId,
) -> (f64, f64) {
    let Ok(frames) = coordinator.enumerate(tab).await else {
        return (0.0, 0.0);
    };
    let Some(info) = frames.iter().find(|f| f.frame_id == frame) else {
        return (0.0, 0.0);
    };
    let request = ProbeRequest::IframeOffset {
        url: info.url.clone(),
    };
    match coordinator.send(tab, FrameId::TOP, &request).await {
        Ok(ProbeReply::IframeOffset { x, y, found: true }) => (x, y),
        _ => (0.0, 0.0),
    }
}

async fn mouse_event(tab: &dyn TabHandle, kind: &str, x: f64, y: f64) -> Result<(), String> {
    tab.debug_send(
        "Input.dispatchMouseEvent",
        json!({
            "type": kind,
            "x": x,
            "y": y,
            "button": "left",
            "clickCount": 1,
        }),
    )
    .await
    .map(|_| ())
    .map_err(|err| format!("{kind} failed: {err}"))
}
