pub mod adapters;
pub mod api;
pub mod errors;
pub mod export;
pub mod model;
pub mod policy;
pub mod ports;
pub mod reader;
pub mod stitch;

pub use api::{TickTimeline, TickTimelineService};
pub use errors::{TlError, TlResult};
pub use model::{
    BuildReport, HighlightNodes, SessionTab, SessionTicks, TabDetails, Tick, TickEventType,
    TicksRequest,
};
pub use policy::{TimelinePolicyHandle, TimelinePolicyView};
