//! Probe wire protocol.
//!
//! Requests and replies cross the host's frame channel as JSON envelopes;
//! both sides round-trip through these types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProbeErrorKind;

/// Scroll direction as the probe understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDir {
    Up,
    Down,
    Left,
    Right,
}

/// In-frame action subset the probe can execute. Tab-level actions never
/// reach a frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeAction {
    Click {
        selector: String,
    },
    Type {
        selector: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clear: Option<bool>,
    },
    Hover {
        selector: String,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<ScrollDir>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    Extract {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
    },
    Evaluate {
        expression: String,
    },
    Keyboard {
        key: String,
    },
    Select {
        selector: String,
        value: String,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        milliseconds: Option<u64>,
    },
    Drag {
        #[serde(rename = "fromSelector")]
        from_selector: String,
        #[serde(rename = "toSelector")]
        to_selector: String,
    },
    Describe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

/// Request envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProbeRequest {
    /// Liveness/install check.
    Ping,
    BuildVisualMap,
    ExecuteAction { action: ProbeAction },
    DragCoords { from: String, to: String },
    /// Ask the top frame where a child frame's viewport sits, by URL.
    IframeOffset { url: String },
}

/// Outcome of one in-frame action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ProbeActionResult {
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

/// Element-center coordinates for the trusted drag path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DragCoords {
    pub from_x: i64,
    pub from_y: i64,
    pub to_x: i64,
    pub to_y: i64,
    pub from_label: String,
    pub to_label: String,
}

/// Reply envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProbeReply {
    Pong { installed: bool },
    VisualMap { map: String },
    ActionResult { result: ProbeActionResult },
    DragCoords { coords: DragCoords },
    IframeOffset { x: f64, y: f64, found: bool },
    Error { kind: ProbeErrorKind, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_as_json() {
        let req = ProbeRequest::ExecuteAction {
            action: ProbeAction::Click {
                selector: "#next".to_string(),
            },
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["op"], "execute_action");
        assert_eq!(value["action"]["type"], "click");
        let back: ProbeRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn drag_action_uses_camel_case_selector_fields() {
        let json = r#"{"type":"drag","fromSelector":".tile","toSelector":".zone"}"#;
        let action: ProbeAction = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            ProbeAction::Drag {
                from_selector: ".tile".to_string(),
                to_selector: ".zone".to_string(),
            }
        );
    }
}
