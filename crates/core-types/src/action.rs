//! The action vocabulary shared by the planner, the loop, and the executor.
//!
//! Every action carries a `type` discriminant and, for frame-scoped actions,
//! an optional `frameId`. Absence of `frameId` means the top frame. Field
//! names follow the wire surface the planner emits (`fromSelector`,
//! `toSelector`, `frameId`).

use serde::{Deserialize, Serialize};

use crate::FrameId;

/// Scroll direction for scroll actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// One planner-emitted action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Click {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Type {
        selector: String,
        text: String,
        /// Clear the field before typing. Defaults to true on the probe side.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clear: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Select {
        selector: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Hover {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<ScrollDirection>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<i64>,
        /// Scroll inside this element instead of the window.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Extract {
        selector: String,
        /// `None` extracts textContent; `"innerHTML"` the markup; anything
        /// else is read as an attribute name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Evaluate {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Keyboard {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    #[serde(rename_all = "camelCase")]
    Wait {
        /// Poll for this selector to appear, up to `timeout` ms.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
        /// Plain sleep when no selector is given.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        milliseconds: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    Describe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },

    Snapshot,

    Screenshot,

    Navigate {
        url: String,
    },

    #[serde(rename_all = "camelCase")]
    Drag {
        from_selector: String,
        to_selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<FrameId>,
    },

    Search {
        query: String,
    },

    TabNew {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },

    TabClose {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },

    TabSwitch {
        index: usize,
    },

    TabList,

    #[serde(rename_all = "camelCase")]
    TabGroupCreate {
        tab_indices: Vec<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    TabGroupAdd {
        group_id: i64,
        tab_indices: Vec<usize>,
    },

    #[serde(rename_all = "camelCase")]
    TabGroupRemove {
        group_id: i64,
    },
}

impl Action {
    /// The frame this action targets, if frame-scoped. `None` either means
    /// the action is tab-level or that the planner left routing to the top
    /// frame.
    pub fn frame_id(&self) -> Option<FrameId> {
        match self {
            Action::Click { frame_id, .. }
            | Action::Type { frame_id, .. }
            | Action::Select { frame_id, .. }
            | Action::Hover { frame_id, .. }
            | Action::Scroll { frame_id, .. }
            | Action::Extract { frame_id, .. }
            | Action::Evaluate { frame_id, .. }
            | Action::Keyboard { frame_id, .. }
            | Action::Wait { frame_id, .. }
            | Action::Drag { frame_id, .. } => *frame_id,
            _ => None,
        }
    }

    /// True for narration-only actions that make no progress on their own.
    pub fn is_describe(&self) -> bool {
        matches!(self, Action::Describe { .. })
    }

    /// Break-point actions end the current batch so the loop can re-perceive.
    /// In quiz mode `drag` is also a break-point.
    pub fn is_break_point(&self, quiz_mode: bool) -> bool {
        match self {
            Action::Snapshot | Action::Screenshot | Action::Search { .. } => true,
            Action::Drag { .. } => quiz_mode,
            _ => false,
        }
    }

    /// True when the action performs a click-like gesture; the loop paces
    /// quiz steps more slowly after these.
    pub fn is_click_like(&self) -> bool {
        matches!(self, Action::Click { .. } | Action::Drag { .. })
    }

    /// Short human-readable label for the action log.
    pub fn label(&self) -> String {
        match self {
            Action::Click { selector, .. } => format!("click {selector}"),
            Action::Type { selector, .. } => format!("type into {selector}"),
            Action::Select { selector, value, .. } => format!("select {value} in {selector}"),
            Action::Hover { selector, .. } => format!("hover {selector}"),
            Action::Scroll { direction, .. } => match direction {
                Some(d) => format!("scroll {d:?}").to_lowercase(),
                None => "scroll".to_string(),
            },
            Action::Extract { selector, .. } => format!("extract {selector}"),
            Action::Evaluate { .. } => "evaluate".to_string(),
            Action::Keyboard { key, .. } => format!("press {key}"),
            Action::Wait { selector, .. } => match selector {
                Some(s) => format!("wait for {s}"),
                None => "wait".to_string(),
            },
            Action::Describe { .. } => "describe".to_string(),
            Action::Snapshot => "snapshot".to_string(),
            Action::Screenshot => "screenshot".to_string(),
            Action::Navigate { url } => format!("navigate {url}"),
            Action::Drag {
                from_selector,
                to_selector,
                ..
            } => format!("drag {from_selector} -> {to_selector}"),
            Action::Search { query } => format!("search {query}"),
            Action::TabNew { .. } => "new tab".to_string(),
            Action::TabClose { .. } => "close tab".to_string(),
            Action::TabSwitch { index } => format!("switch to tab {index}"),
            Action::TabList => "list tabs".to_string(),
            Action::TabGroupCreate { .. } => "create tab group".to_string(),
            Action::TabGroupAdd { group_id, .. } => format!("add to group {group_id}"),
            Action::TabGroupRemove { group_id } => format!("ungroup {group_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_round_trips_with_frame_id() {
        let json = r##"{"type":"click","selector":"#next","frameId":7}"##;
        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            Action::Click {
                selector: "#next".to_string(),
                frame_id: Some(FrameId(7)),
            }
        );
        let back = serde_json::to_string(&action).unwrap();
        assert!(back.contains("\"frameId\":7"));
    }

    #[test]
    fn missing_frame_id_means_top() {
        let action: Action =
            serde_json::from_str(r##"{"type":"click","selector":"#a"}"##).unwrap();
        assert_eq!(action.frame_id(), None);
    }

    #[test]
    fn drag_uses_camel_case_selectors() {
        let json = r#"{"type":"drag","fromSelector":".tile","toSelector":".zone","frameId":3}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        match &action {
            Action::Drag {
                from_selector,
                to_selector,
                frame_id,
            } => {
                assert_eq!(from_selector, ".tile");
                assert_eq!(to_selector, ".zone");
                assert_eq!(*frame_id, Some(FrameId(3)));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn break_points_depend_on_mode() {
        let drag: Action = serde_json::from_str(
            r#"{"type":"drag","fromSelector":"a","toSelector":"b"}"#,
        )
        .unwrap();
        assert!(!drag.is_break_point(false));
        assert!(drag.is_break_point(true));

        let snap = Action::Snapshot;
        assert!(snap.is_break_point(false));

        let search = Action::Search {
            query: "capital of France".to_string(),
        };
        assert!(search.is_break_point(false));

        let click: Action =
            serde_json::from_str(r##"{"type":"click","selector":"#a"}"##).unwrap();
        assert!(!click.is_break_point(true));
    }

    #[test]
    fn tab_actions_parse() {
        let action: Action = serde_json::from_str(r#"{"type":"tab_switch","index":2}"#).unwrap();
        assert_eq!(action, Action::TabSwitch { index: 2 });

        let action: Action = serde_json::from_str(
            r#"{"type":"tab_group_create","tabIndices":[0,1],"color":"blue","title":"work"}"#,
        )
        .unwrap();
        match action {
            Action::TabGroupCreate { tab_indices, .. } => assert_eq!(tab_indices, vec![0, 1]),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
