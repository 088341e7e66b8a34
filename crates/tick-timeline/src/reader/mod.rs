pub mod fetch;
pub mod topology;

pub use fetch::{fetch_session_input, SessionInput};
pub use topology::resolve_tab;
