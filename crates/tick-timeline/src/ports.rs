use crate::errors::TlError;
use crate::policy::TimelinePolicyView;
use timetravel_core_types::SessionId;

pub trait PolicyPort: Send + Sync {
    fn view(&self) -> TimelinePolicyView;
}

pub trait EventsPort: Send + Sync {
    fn ticks_build_started(&self, session_id: &SessionId);
    fn ticks_build_fetched(&self, tabs: usize, records: usize);
    fn ticks_build_finished(&self, ok: bool, latency_ms: u128, err: Option<&TlError>);
}
