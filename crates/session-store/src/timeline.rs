use serde::{Deserialize, Serialize};
use timetravel_core_types::Timestamp;

/// Maps wall-clock timestamps onto a session's replay progress.
pub trait TimelineOffsets: Send + Sync {
    /// Position of `timestamp` in percent. Values outside `[0, 100]` are not clamped.
    fn offset_percent(&self, timestamp: Timestamp) -> f64;
}

/// Linear timeline spanning the whole recorded session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandTimeline {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl CommandTimeline {
    pub fn new(start_time: Timestamp, end_time: Timestamp) -> Self {
        Self {
            start_time,
            end_time: end_time.max(start_time),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time - self.start_time
    }
}

impl TimelineOffsets for CommandTimeline {
    fn offset_percent(&self, timestamp: Timestamp) -> f64 {
        let duration = self.duration_ms();
        if duration <= 0 {
            return if timestamp >= self.start_time { 100.0 } else { -1.0 };
        }
        let raw = (timestamp - self.start_time) as f64 / duration as f64 * 100.0;
        (raw * 1000.0).round() / 1000.0
    }
}
