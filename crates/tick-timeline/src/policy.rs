use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::InclusionFlags;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelinePolicyView {
    pub include_interaction_events: bool,
    pub include_commands: bool,
    pub include_paint_events: bool,
    /// Command name whose result carries a detach payload.
    pub detach_command_name: String,
    /// Emit one `init` tick at each tab's creation time.
    pub emit_init_ticks: bool,
    pub max_payload_bytes: usize,
    pub log_enable: bool,
    pub log_path: String,
}

impl Default for TimelinePolicyView {
    fn default() -> Self {
        Self {
            include_interaction_events: false,
            include_commands: false,
            include_paint_events: false,
            detach_command_name: "detachTab".to_string(),
            emit_init_ticks: true,
            max_payload_bytes: 8 * 1024 * 1024,
            log_enable: false,
            log_path: "./exports/ticks.jsonl".to_string(),
        }
    }
}

impl TimelinePolicyView {
    pub fn inclusion_flags(&self) -> InclusionFlags {
        InclusionFlags {
            include_interaction_events: self.include_interaction_events,
            include_commands: self.include_commands,
            include_paint_events: self.include_paint_events,
        }
    }
}

#[derive(Clone)]
pub struct TimelinePolicyHandle {
    inner: Arc<RwLock<TimelinePolicyView>>,
}

impl TimelinePolicyHandle {
    pub fn new_with(view: TimelinePolicyView) -> Self {
        Self {
            inner: Arc::new(RwLock::new(view)),
        }
    }

    pub fn snapshot(&self) -> TimelinePolicyView {
        self.inner.read().clone()
    }

    pub fn update(&self, view: TimelinePolicyView) {
        *self.inner.write() = view;
    }
}

impl crate::ports::PolicyPort for TimelinePolicyHandle {
    fn view(&self) -> TimelinePolicyView {
        self.snapshot()
    }
}
