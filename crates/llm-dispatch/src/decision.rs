//! Model decisions and robust JSON recovery.
//!
//! Planners wrap JSON in prose and fences more often than they should. The
//! recovery ladder: strip fences, parse whole; find an object containing an
//! `actions` array; find any object; finally fall back to a neutral decision
//! with no actions so the loop can re-ask.

use serde::{Deserialize, Serialize};

use tabpilot_core_types::{Action, ExecMode};

/// One user/assistant exchange kept for conversational context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationEntry {
    pub role: String,
    pub content: String,
}

impl ConversationEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// The planner's structured step output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDecision {
    #[serde(default)]
    pub thinking: String,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Planner-requested mode switch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecMode>,
}

impl ModelDecision {
    /// Neutral fallback when nothing parseable came back.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// A decision makes progress when it has at least one action that is
    /// not pure narration.
    pub fn has_real_actions(&self) -> bool {
        self.actions.iter().any(|a| !a.is_describe())
    }
}

/// Parse a raw model response into a decision, recovering aggressively.
pub fn parse_decision(raw: &str) -> ModelDecision {
    let stripped = strip_fences(raw.trim());

    if let Ok(decision) = serde_json::from_str::<ModelDecision>(&stripped) {
        if !decision.actions.is_empty() || stripped.contains("\"actions\"") {
            return decision;
        }
    }

    // An object containing an "actions" array, anywhere in the text.
    if let Some(candidate) = find_object_containing(&stripped, "\"actions\"") {
        if let Ok(decision) = serde_json::from_str::<ModelDecision>(&candidate) {
            return decision;
        }
    }

    // Any object at all.
    if let Some(candidate) = first_balanced_object(&stripped) {
        if let Ok(decision) = serde_json::from_str::<ModelDecision>(&candidate) {
            return decision;
        }
    }

    ModelDecision::neutral()
}

/// Strip a markdown code fence, tolerating a language tag.
fn strip_fences(raw: &str) -> String {
    let fence = "```";
    let Some(start) = raw.find(fence) else {
        return raw.to_string();
    };
    let after = &raw[start + fence.len()..];
    let after = after.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
    match after.find(fence) {
        Some(end) => after[..end].trim().to_string(),
        None => raw.to_string(),
    }
}

/// First balanced `{...}` whose body contains `needle`.
fn find_object_containing(text: &str, needle: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(candidate) = balanced_object_at(text, start) {
            if candidate.contains(needle) {
                return Some(candidate);
            }
            search_from = start + 1;
        } else {
            break;
        }
    }
    None
}

fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    balanced_object_at(text, start)
}

/// Balanced-brace scan that respects JSON string literals.
fn balanced_object_at(text: &str, start: usize) -> Option<String> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_parses_directly() {
        let raw = r##"{"thinking":"pick the answer","actions":[{"type":"click","selector":"#opt3","frameId":7}],"done":false}"##;
        let decision = parse_decision(raw);
        assert_eq!(decision.actions.len(), 1);
        assert!(!decision.done);
        assert!(decision.has_real_actions());
    }

    #[test]
    fn fenced_json_is_recovered() {
        let raw = "```json\n{\"thinking\":\"x\",\"actions\":[{\"type\":\"click\",\"selector\":\"#a\"}],\"done\":false}\n```";
        let decision = parse_decision(raw);
        assert_eq!(decision.actions.len(), 1);
        match &decision.actions[0] {
            Action::Click { selector, .. } => assert_eq!(selector, "#a"),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn object_embedded_in_prose_is_extracted() {
        let raw = r#"Here is what I will do next:
{"thinking":"navigate","actions":[{"type":"navigate","url":"https://example.com"}],"done":false}
Let me know how it goes."#;
        let decision = parse_decision(raw);
        assert_eq!(decision.actions.len(), 1);
    }

    #[test]
    fn actions_object_wins_over_earlier_objects() {
        let raw = r#"{"note":"ignore me"} and then {"actions":[{"type":"snapshot"}],"done":true}"#;
        let decision = parse_decision(raw);
        assert_eq!(decision.actions, vec![Action::Snapshot]);
        assert!(decision.done);
    }

    #[test]
    fn braces_inside_strings_do_not_break_the_scan() {
        let raw = r#"{"thinking":"the page shows {curly} text","actions":[{"type":"snapshot"}],"done":false}"#;
        let decision = parse_decision(raw);
        assert_eq!(decision.actions.len(), 1);
    }

    #[test]
    fn garbage_falls_back_to_neutral() {
        let decision = parse_decision("I could not decide what to do.");
        assert!(decision.actions.is_empty());
        assert!(!decision.done);
        assert!(!decision.has_real_actions());
    }

    #[test]
    fn describe_only_batches_are_not_real_progress() {
        let raw = r#"{"actions":[{"type":"describe","text":"the page shows a quiz"}],"done":false}"#;
        let decision = parse_decision(raw);
        assert!(!decision.has_real_actions());
    }

    #[test]
    fn mode_switch_round_trips() {
        let raw = r#"{"actions":[{"type":"snapshot"}],"done":false,"mode":"quiz"}"#;
        let decision = parse_decision(raw);
        assert_eq!(decision.mode, Some(ExecMode::Quiz));
    }
}
