use crate::adapters::{NoopEventsPort, TracingEventsPort};
use crate::errors::TlResult;
use crate::export::jsonl::{export_stats, serialize_lines, session_lines, write_lines};
use crate::model::{ExportResult, SessionTicks, TicksRequest};
use crate::policy::{TimelinePolicyHandle, TimelinePolicyView};
use crate::ports::{EventsPort, PolicyPort};
use crate::reader::fetch_session_input;
use crate::stitch::{build_session_ticks, BuildOptions};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use timetravel_session_store::SessionStore;

#[async_trait]
pub trait TickTimeline: Send + Sync {
    async fn session_ticks(&self, req: TicksRequest) -> TlResult<SessionTicks>;
    async fn export(&self, req: TicksRequest) -> TlResult<ExportResult>;
    fn policy_view(&self) -> TimelinePolicyView;
}

pub struct TickTimelineService {
    store: Arc<dyn SessionStore>,
    policy: Arc<dyn PolicyPort>,
    events: Arc<dyn EventsPort>,
}

impl TickTimelineService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        policy: Arc<dyn PolicyPort>,
        events: Arc<dyn EventsPort>,
    ) -> Self {
        Self {
            store,
            policy,
            events,
        }
    }

    pub fn with_store_and_policy(
        store: Arc<dyn SessionStore>,
        policy_handle: TimelinePolicyHandle,
    ) -> (Self, TimelinePolicyHandle) {
        let policy_port: Arc<dyn PolicyPort> = Arc::new(policy_handle.clone());
        let events_port: Arc<dyn EventsPort> = Arc::new(TracingEventsPort);
        (Self::new(store, policy_port, events_port), policy_handle)
    }

    /// Service that reports nothing; used where build events would only be noise.
    pub fn quiet(store: Arc<dyn SessionStore>, policy_handle: TimelinePolicyHandle) -> Self {
        Self::new(
            store,
            Arc::new(policy_handle),
            Arc::new(NoopEventsPort::default()),
        )
    }

    fn build_options(&self, req: &TicksRequest, policy: &TimelinePolicyView) -> BuildOptions {
        BuildOptions {
            flags: req.flags(policy.inclusion_flags()),
            detach_command_name: policy.detach_command_name.clone(),
            emit_init_ticks: policy.emit_init_ticks,
        }
    }
}

#[async_trait]
impl TickTimeline for TickTimelineService {
    async fn session_ticks(&self, req: TicksRequest) -> TlResult<SessionTicks> {
        let session_id = self.store.session_id();
        self.events.ticks_build_started(&session_id);

        let started_at = Instant::now();
        let policy = self.policy.view();
        let input = match fetch_session_input(self.store.as_ref()).await {
            Ok(input) => input,
            Err(err) => {
                self.events.ticks_build_finished(
                    false,
                    started_at.elapsed().as_millis(),
                    Some(&err),
                );
                return Err(err);
            }
        };
        self.events
            .ticks_build_fetched(input.tabs.len(), input.record_count());

        let ticks = build_session_ticks(input, &self.build_options(&req, &policy));
        self.events
            .ticks_build_finished(true, started_at.elapsed().as_millis(), None);
        Ok(ticks)
    }

    async fn export(&self, req: TicksRequest) -> TlResult<ExportResult> {
        let policy = self.policy.view();
        let ticks = self.session_ticks(req).await?;
        let lines = serialize_lines(&session_lines(&ticks), policy.max_payload_bytes)?;
        let stats = export_stats(&ticks);

        if policy.log_enable {
            let path = write_lines(&policy.log_path, &lines)?;
            Ok(ExportResult {
                path: Some(path),
                lines: None,
                stats,
            })
        } else {
            Ok(ExportResult {
                path: None,
                lines: Some(lines),
                stats,
            })
        }
    }

    fn policy_view(&self) -> TimelinePolicyView {
        self.policy.view()
    }
}
