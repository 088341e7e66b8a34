pub mod api;
pub mod errors;
pub mod model;
pub mod read;
pub mod timeline;

pub use api::{InMemorySessionStore, SessionStore, StoreResult};
pub use errors::{StoreError, StoreErrorKind};
pub use read::paint::{to_dom_recording, DomRecording};
pub use timeline::{CommandTimeline, TimelineOffsets};
