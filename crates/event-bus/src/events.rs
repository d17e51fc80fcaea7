//! Driver event payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Ready,
    Busy,
    Error,
}

/// Severity of an action-log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Pending,
    Success,
    Error,
}

/// Events published on the driver bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverEvent {
    StatusUpdate {
        status: DriverStatus,
        text: String,
        at: DateTime<Utc>,
    },
    ActionLog {
        #[serde(rename = "logType")]
        log_type: LogKind,
        text: String,
        at: DateTime<Utc>,
    },
    ExecutionState {
        running: bool,
        at: DateTime<Utc>,
    },
}

impl DriverEvent {
    pub fn status(status: DriverStatus, text: impl Into<String>) -> Self {
        Self::StatusUpdate {
            status,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn action_log(log_type: LogKind, text: impl Into<String>) -> Self {
        Self::ActionLog {
            log_type,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn execution_state(running: bool) -> Self {
        Self::ExecutionState {
            running,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_their_channel_tag() {
        let json =
            serde_json::to_string(&DriverEvent::status(DriverStatus::Ready, "done")).unwrap();
        assert!(json.contains("\"channel\":\"STATUS_UPDATE\""));
        assert!(json.contains("\"ready\""));

        let json =
            serde_json::to_string(&DriverEvent::action_log(LogKind::Pending, "click")).unwrap();
        assert!(json.contains("\"channel\":\"ACTION_LOG\""));
        assert!(json.contains("\"logType\":\"pending\""));
    }
}
