use std::collections::BTreeMap;

use futures::future::try_join_all;
use timetravel_core_types::{SessionId, TabId};
use timetravel_session_store::model::{
    CommandRecord, DomMutationRecord, FrameNavigation, FrameRecord, SessionInteractions, TabRecord,
};
use timetravel_session_store::{CommandTimeline, SessionStore};

use crate::errors::TlResult;

/// Raw records for one session, fetched before any derivation runs.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub session_id: SessionId,
    pub tabs: Vec<TabRecord>,
    pub frames: Vec<FrameRecord>,
    pub navigations: Vec<FrameNavigation>,
    pub commands: Vec<CommandRecord>,
    pub interactions: SessionInteractions,
    pub dom_changes_by_tab: BTreeMap<TabId, Vec<DomMutationRecord>>,
    pub timeline: CommandTimeline,
}

impl SessionInput {
    pub fn record_count(&self) -> usize {
        self.commands.len()
            + self.interactions.mouse.len()
            + self.interactions.focus.len()
            + self.interactions.scroll.len()
            + self.dom_changes_by_tab.values().map(Vec::len).sum::<usize>()
    }
}

/// Fetches every stream of a session concurrently; per-tab mutation reads run in parallel.
pub async fn fetch_session_input(store: &dyn SessionStore) -> TlResult<SessionInput> {
    let (tabs, frames, navigations, commands, interactions, timeline) = tokio::try_join!(
        store.tabs(),
        store.frames(),
        store.frame_navigations(),
        store.commands(),
        store.interactions(),
        store.timeline(),
    )?;

    let dom_changes = try_join_all(tabs.iter().map(|tab| {
        let tab_id = tab.id;
        async move { store.dom_changes(tab_id).await.map(|records| (tab_id, records)) }
    }))
    .await?;

    Ok(SessionInput {
        session_id: store.session_id(),
        tabs,
        frames,
        navigations,
        commands,
        interactions,
        dom_changes_by_tab: dom_changes.into_iter().collect(),
        timeline,
    })
}
