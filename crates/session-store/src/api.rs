use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use timetravel_core_types::{SessionId, TabId, Timestamp};
use tracing::debug;

use crate::errors::{StoreError, StoreErrorKind};
use crate::model::{
    CommandRecord, DomMutationRecord, FocusRecord, FrameNavigation, FrameRecord, MouseEventRecord,
    ScrollRecord, SessionData, SessionInteractions, SessionRecord, TabRecord,
};
use crate::read::query::sort_dom_changes;
use crate::timeline::CommandTimeline;

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to one recorded session.
///
/// Every read is independent and side-effect free, so callers may fetch concurrently.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn session_id(&self) -> SessionId;
    async fn session(&self) -> StoreResult<SessionRecord>;
    async fn tabs(&self) -> StoreResult<Vec<TabRecord>>;
    async fn frames(&self) -> StoreResult<Vec<FrameRecord>>;
    async fn frame_navigations(&self) -> StoreResult<Vec<FrameNavigation>>;
    async fn commands(&self) -> StoreResult<Vec<CommandRecord>>;
    /// Mutations recorded for `tab_id`, ordered by (timestamp, event index).
    async fn dom_changes(&self, tab_id: TabId) -> StoreResult<Vec<DomMutationRecord>>;
    async fn interactions(&self) -> StoreResult<SessionInteractions>;
    async fn timeline(&self) -> StoreResult<CommandTimeline>;
}

/// Session store backed by a lock-guarded [`SessionData`].
pub struct InMemorySessionStore {
    data: RwLock<SessionData>,
}

impl InMemorySessionStore {
    pub fn new(session: SessionRecord) -> Arc<Self> {
        Self::from_data(SessionData {
            session,
            ..SessionData::default()
        })
    }

    pub fn from_data(data: SessionData) -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(data),
        })
    }

    pub fn from_json(raw: &str) -> StoreResult<Arc<Self>> {
        let data: SessionData = serde_json::from_str(raw)
            .map_err(|err| StoreError::from(StoreErrorKind::Decode(err.to_string())))?;
        Ok(Self::from_data(data))
    }

    pub async fn load_json(path: &Path) -> StoreResult<Arc<Self>> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
            StoreError::from(StoreErrorKind::Read(format!("{}: {err}", path.display())))
        })?;
        let store = Self::from_json(&raw)?;
        debug!(path = %path.display(), session = %store.session_id(), "loaded session file");
        Ok(store)
    }

    pub fn snapshot(&self) -> SessionData {
        self.data.read().clone()
    }

    pub fn append_tab(&self, tab: TabRecord) {
        self.data.write().tabs.push(tab);
    }

    pub fn append_frame(&self, frame: FrameRecord) {
        self.data.write().frames.push(frame);
    }

    pub fn append_navigation(&self, navigation: FrameNavigation) {
        self.data.write().navigations.push(navigation);
    }

    pub fn append_command(&self, command: CommandRecord) {
        self.data.write().commands.push(command);
    }

    pub fn append_dom_changes(&self, records: impl IntoIterator<Item = DomMutationRecord>) {
        self.data.write().dom_changes.extend(records);
    }

    pub fn append_mouse(&self, record: MouseEventRecord) {
        self.data.write().interactions.mouse.push(record);
    }

    pub fn append_focus(&self, record: FocusRecord) {
        self.data.write().interactions.focus.push(record);
    }

    pub fn append_scroll(&self, record: ScrollRecord) {
        self.data.write().interactions.scroll.push(record);
    }

    pub fn close(&self, close_time: Timestamp) {
        self.data.write().session.close_time = Some(close_time);
    }

    fn last_recorded_timestamp(data: &SessionData) -> Timestamp {
        let commands = data
            .commands
            .iter()
            .map(|c| c.end_time.unwrap_or(c.start_time));
        let dom = data.dom_changes.iter().map(|r| r.timestamp);
        let mouse = data.interactions.mouse.iter().map(|r| r.timestamp);
        let focus = data.interactions.focus.iter().map(|r| r.timestamp);
        let scroll = data.interactions.scroll.iter().map(|r| r.timestamp);
        commands
            .chain(dom)
            .chain(mouse)
            .chain(focus)
            .chain(scroll)
            .max()
            .unwrap_or(data.session.start_time)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn session_id(&self) -> SessionId {
        self.data.read().session.id.clone()
    }

    async fn session(&self) -> StoreResult<SessionRecord> {
        Ok(self.data.read().session.clone())
    }

    async fn tabs(&self) -> StoreResult<Vec<TabRecord>> {
        let mut tabs = self.data.read().tabs.clone();
        tabs.sort_by_key(|tab| tab.id);
        Ok(tabs)
    }

    async fn frames(&self) -> StoreResult<Vec<FrameRecord>> {
        let mut frames = self.data.read().frames.clone();
        frames.sort_by_key(|frame| frame.id);
        Ok(frames)
    }

    async fn frame_navigations(&self) -> StoreResult<Vec<FrameNavigation>> {
        let mut navigations = self.data.read().navigations.clone();
        navigations.sort_by_key(|nav| (nav.initiated_time, nav.id));
        Ok(navigations)
    }

    async fn commands(&self) -> StoreResult<Vec<CommandRecord>> {
        let mut commands = self.data.read().commands.clone();
        commands.sort_by_key(|cmd| (cmd.start_time, cmd.id));
        Ok(commands)
    }

    async fn dom_changes(&self, tab_id: TabId) -> StoreResult<Vec<DomMutationRecord>> {
        let data = self.data.read();
        if !data.tabs.iter().any(|tab| tab.id == tab_id) {
            return Err(StoreErrorKind::UnknownTab(tab_id).into());
        }
        let mut records: Vec<DomMutationRecord> = data
            .dom_changes
            .iter()
            .filter(|record| record.tab_id == tab_id)
            .cloned()
            .collect();
        drop(data);
        sort_dom_changes(&mut records);
        Ok(records)
    }

    async fn interactions(&self) -> StoreResult<SessionInteractions> {
        let mut interactions = self.data.read().interactions.clone();
        interactions.mouse.sort_by_key(|r| r.timestamp);
        interactions.focus.sort_by_key(|r| r.timestamp);
        interactions.scroll.sort_by_key(|r| r.timestamp);
        Ok(interactions)
    }

    async fn timeline(&self) -> StoreResult<CommandTimeline> {
        let data = self.data.read();
        let end = data
            .session
            .close_time
            .unwrap_or_else(|| Self::last_recorded_timestamp(&data));
        Ok(CommandTimeline::new(data.session.start_time, end))
    }
}
