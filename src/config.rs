//! Configuration file model
//!
//! Every section is optional; missing keys fall back to the library defaults.

use anyhow::{ensure, Result};
use page_state::FingerprintPolicy;
use serde::{Deserialize, Serialize};
use tick_timeline::TimelinePolicyView;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inclusion defaults, detach command name and JSONL export settings.
    pub timeline: TimelinePolicyView,
    /// Text handling for generated assertions.
    pub fingerprint: FingerprintPolicy,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.timeline.detach_command_name.trim().is_empty(),
            "timeline.detach_command_name must not be empty"
        );
        ensure!(
            self.timeline.max_payload_bytes > 0,
            "timeline.max_payload_bytes must be positive"
        );
        ensure!(
            !self.timeline.log_enable || !self.timeline.log_path.trim().is_empty(),
            "timeline.log_path is required when timeline.log_enable is set"
        );
        ensure!(
            self.fingerprint.max_text_length > 0,
            "fingerprint.max_text_length must be positive"
        );
        Ok(())
    }
}
