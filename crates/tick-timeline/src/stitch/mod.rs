pub mod build;
pub mod context;
pub mod detach;

pub use build::{build_session_ticks, BuildOptions};
pub use detach::DetachPayload;
