use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use timetravel_core_types::{FrameId, SessionId, TabId, Timestamp};
use timetravel_session_store::SessionStore;

use crate::errors::{PageStateError, PageStateResult};

/// Inclusive `[start, end]` range of session timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> PageStateResult<Self> {
        if start > end {
            return Err(PageStateError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

/// Value an assertion query evaluated to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssertResult {
    Count(u64),
    Text(String),
}

impl fmt::Display for AssertResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertResult::Count(count) => write!(f, "{count}"),
            AssertResult::Text(text) => write!(f, "{text:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomAssertion {
    pub query: String,
    pub result: AssertResult,
}

/// Consensus assertions for one named page state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFingerprint {
    pub name: String,
    pub session_ids: BTreeSet<SessionId>,
    pub asserts_by_frame_id: BTreeMap<FrameId, BTreeMap<String, DomAssertion>>,
}

impl StateFingerprint {
    pub fn assertion(&self, frame_id: FrameId, query: &str) -> Option<&DomAssertion> {
        self.asserts_by_frame_id.get(&frame_id)?.get(query)
    }

    pub fn assertion_count(&self) -> usize {
        self.asserts_by_frame_id.values().map(BTreeMap::len).sum()
    }
}

/// One session's registered evidence: a tab and the window in which the state settled.
#[derive(Clone)]
pub struct StateContribution {
    pub session_id: SessionId,
    pub store: Arc<dyn SessionStore>,
    pub tab_id: TabId,
    pub window: TimeWindow,
}

impl fmt::Debug for StateContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateContribution")
            .field("session_id", &self.session_id)
            .field("tab_id", &self.tab_id)
            .field("window", &self.window)
            .finish()
    }
}

/// Serializable form of a generator's evaluated states.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStateSnapshot {
    pub id: String,
    pub states: Vec<StateFingerprint>,
}
