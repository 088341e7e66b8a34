use crate::errors::TlError;
use crate::ports::EventsPort;
use timetravel_core_types::SessionId;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct NoopEventsPort;

impl EventsPort for NoopEventsPort {
    fn ticks_build_started(&self, _session_id: &SessionId) {}

    fn ticks_build_fetched(&self, _tabs: usize, _records: usize) {}

    fn ticks_build_finished(&self, _ok: bool, _latency_ms: u128, _err: Option<&TlError>) {}
}

/// Reports build progress as structured `tracing` events.
#[derive(Default)]
pub struct TracingEventsPort;

impl EventsPort for TracingEventsPort {
    fn ticks_build_started(&self, session_id: &SessionId) {
        debug!(session = %session_id, "tick build started");
    }

    fn ticks_build_fetched(&self, tabs: usize, records: usize) {
        debug!(tabs, records, "tick build inputs fetched");
    }

    fn ticks_build_finished(&self, ok: bool, latency_ms: u128, err: Option<&TlError>) {
        match err {
            Some(err) => warn!(ok, latency_ms, error = %err, "tick build failed"),
            None => info!(ok, latency_ms, "tick build finished"),
        }
    }
}
