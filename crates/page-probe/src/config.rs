//! Probe tunables.

use serde::{Deserialize, Serialize};

/// Configuration for map building and synthetic input pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Hard cap on elements emitted into one Visual Page Map.
    pub max_elements: usize,

    /// Direct-text cap per element, in characters.
    pub max_text_len: usize,

    /// Value cap per element, in characters.
    pub max_value_len: usize,

    /// Options cap per selection control.
    pub max_options: usize,

    /// Keystroke pacing bounds in milliseconds. Each character waits a
    /// value inside this range so typed input resembles a human cadence.
    pub keystroke_delay_min_ms: u64,
    pub keystroke_delay_max_ms: u64,

    /// Delay between synthesized drag movement steps.
    pub drag_step_delay_ms: u64,

    /// Poll interval for `wait`-for-selector.
    pub wait_poll_interval_ms: u64,

    /// Evaluate result cap, in characters.
    pub max_eval_len: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_elements: 500,
            max_text_len: 200,
            max_value_len: 100,
            max_options: 20,
            keystroke_delay_min_ms: 30,
            keystroke_delay_max_ms: 80,
            drag_step_delay_ms: 12,
            wait_poll_interval_ms: 50,
            max_eval_len: 5_000,
        }
    }
}

impl ProbeConfig {
    /// Configuration with all pacing removed, for fast deterministic tests.
    pub fn test() -> Self {
        Self {
            keystroke_delay_min_ms: 0,
            keystroke_delay_max_ms: 0,
            drag_step_delay_ms: 0,
            wait_poll_interval_ms: 1,
            ..Self::default()
        }
    }

    /// Per-character delay. Deterministic jitter derived from the character
    /// index keeps the cadence inside the configured range without a
    /// randomness dependency.
    pub fn keystroke_delay(&self, char_index: usize) -> u64 {
        let span = self
            .keystroke_delay_max_ms
            .saturating_sub(self.keystroke_delay_min_ms);
        if span == 0 {
            return self.keystroke_delay_min_ms;
        }
        self.keystroke_delay_min_ms + (char_index as u64 * 7 + 13) % span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystroke_delay_stays_in_range() {
        let config = ProbeConfig::default();
        for i in 0..50 {
            let d = config.keystroke_delay(i);
            assert!(d >= config.keystroke_delay_min_ms);
            assert!(d < config.keystroke_delay_max_ms);
        }
    }

    #[test]
    fn test_config_is_unpaced() {
        let config = ProbeConfig::test();
        assert_eq!(config.keystroke_delay(3), 0);
        assert_eq!(config.drag_step_delay_ms, 0);
    }
}
