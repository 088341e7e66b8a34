use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use timetravel_core_types::{FrameId, TabId, Timestamp};
use timetravel_session_store::model::{CommandRecord, DomMutationRecord, PaintCommit};

use crate::errors::{TlError, TlResult};

/// Validated result of a tab-detach command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetachPayload {
    pub child_tab_id: TabId,
    pub parent_tab_id: TabId,
    pub timestamp_range: (Timestamp, Timestamp),
    pub index_range: (u32, u32),
    pub url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetachResult {
    detached_tab: RawDetachedTab,
    detached_state: RawDetachedState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetachedTab {
    id: TabId,
    parent_tab_id: TabId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetachedState {
    dom_change_range: RawDomChangeRange,
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDomChangeRange {
    timestamp_range: [Timestamp; 2],
    index_range: [u32; 2],
}

impl DetachPayload {
    pub fn parse(command: &CommandRecord) -> TlResult<Self> {
        let malformed = |reason: String| TlError::malformed_detach(command.id, reason);

        if let Some(result_type) = command.result_type.as_deref() {
            if result_type != "Object" {
                return Err(malformed(format!("unexpected result type {result_type}")));
            }
        }
        let value = match &command.result {
            None | Some(Value::Null) => return Err(malformed("result is absent".into())),
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
                .map_err(|err| malformed(format!("result is not json: {err}")))?,
            Some(value) => value.clone(),
        };
        let raw: RawDetachResult =
            serde_json::from_value(value).map_err(|err| malformed(err.to_string()))?;

        let [start_ts, end_ts] = raw.detached_state.dom_change_range.timestamp_range;
        let [start_idx, end_idx] = raw.detached_state.dom_change_range.index_range;
        if start_ts > end_ts {
            return Err(malformed(format!(
                "timestamp range is inverted ({start_ts} > {end_ts})"
            )));
        }
        if raw.detached_tab.id == raw.detached_tab.parent_tab_id {
            return Err(malformed("tab cannot be detached from itself".into()));
        }

        Ok(Self {
            child_tab_id: raw.detached_tab.id,
            parent_tab_id: raw.detached_tab.parent_tab_id,
            timestamp_range: (start_ts, end_ts),
            index_range: (start_idx, end_idx),
            url: raw.detached_state.url,
        })
    }

    fn includes(&self, commit_timestamp: Timestamp, change: &DomMutationRecord) -> bool {
        let (start_ts, end_ts) = self.timestamp_range;
        let (start_idx, end_idx) = self.index_range;
        if commit_timestamp == start_ts && change.event_index < start_idx {
            return false;
        }
        if commit_timestamp == end_ts && change.event_index > end_idx {
            return false;
        }
        true
    }

    /// Copies the parent's mutations inside the range, preserving their order.
    ///
    /// Returns the copied records and the frames they belong to.
    pub fn collect_changes(
        &self,
        parent_commits: &[PaintCommit],
    ) -> (Vec<DomMutationRecord>, HashSet<FrameId>) {
        let (start_ts, end_ts) = self.timestamp_range;
        let mut changes = Vec::new();
        let mut frame_ids = HashSet::new();

        for commit in parent_commits {
            if commit.timestamp > end_ts {
                break;
            }
            if commit.timestamp < start_ts {
                continue;
            }
            for change in &commit.changes {
                if self.includes(commit.timestamp, change) {
                    frame_ids.insert(change.frame_id);
                    changes.push(change.clone());
                }
            }
        }
        (changes, frame_ids)
    }
}
