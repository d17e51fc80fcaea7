//! Loop pacing and budget configuration.

use serde::{Deserialize, Serialize};

use tabpilot_core_types::ExecMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Step budget in normal mode.
    pub max_steps_normal: u32,

    /// Step budget in quiz mode; assessments need more rounds.
    pub max_steps_quiz: u32,

    /// Planner re-asks per step before giving up on a decision.
    pub decision_attempts: u32,

    /// Inter-step pause after a quiz batch containing clicks.
    pub quiz_click_pause_ms: u64,

    /// Default inter-step pause.
    pub step_pause_ms: u64,

    /// Settle delay after a quiz drag break-point.
    pub drag_settle_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps_normal: 15,
            max_steps_quiz: 25,
            decision_attempts: 3,
            quiz_click_pause_ms: 2_500,
            step_pause_ms: 800,
            drag_settle_ms: 800,
        }
    }
}

impl LoopConfig {
    /// Unpaced configuration for tests.
    pub fn test() -> Self {
        Self {
            quiz_click_pause_ms: 1,
            step_pause_ms: 1,
            drag_settle_ms: 1,
            ..Self::default()
        }
    }

    pub fn max_steps(&self, mode: ExecMode) -> u32 {
        match mode {
            ExecMode::Normal => self.max_steps_normal,
            ExecMode::Quiz => self.max_steps_quiz,
        }
    }
}
