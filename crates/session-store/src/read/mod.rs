pub mod paint;
pub mod query;

pub use paint::{to_dom_recording, DomRecording};
pub use query::sort_dom_changes;
