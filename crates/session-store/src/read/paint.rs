use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use timetravel_core_types::FrameId;

use crate::model::{DocumentRecord, DomActionKind, DomMutationRecord, PaintCommit};

/// Paint commits and documents derived from one tab's mutation stream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DomRecording {
    pub paint_commits: Vec<PaintCommit>,
    pub documents: Vec<DocumentRecord>,
}

/// Groups an ordered mutation stream into paint commits.
///
/// Records of frames outside `frame_ids` are dropped. Consecutive records sharing a timestamp
/// form one commit. Every new-document record registers a [`DocumentRecord`] pointing at the
/// commit it landed in.
pub fn to_dom_recording(
    records: &[DomMutationRecord],
    frame_ids: &HashSet<FrameId>,
    main_frame_ids: &HashSet<FrameId>,
) -> DomRecording {
    let mut recording = DomRecording::default();

    for record in records {
        if !frame_ids.contains(&record.frame_id) {
            continue;
        }

        let starts_commit = recording
            .paint_commits
            .last()
            .map(|commit| commit.timestamp != record.timestamp)
            .unwrap_or(true);
        if starts_commit {
            recording.paint_commits.push(PaintCommit {
                command_id: record.command_id,
                timestamp: record.timestamp,
                changes: Vec::new(),
            });
        }

        let commit_index = recording.paint_commits.len() - 1;
        if record.action == DomActionKind::NewDocument {
            recording.documents.push(DocumentRecord {
                url: record.text_content.clone().unwrap_or_default(),
                frame_id: record.frame_id,
                is_main_frame: main_frame_ids.contains(&record.frame_id),
                paint_commit_index: commit_index,
                paint_start_timestamp: record.timestamp,
            });
        }
        if let Some(commit) = recording.paint_commits.last_mut() {
            commit.changes.push(record.clone());
        }
    }

    recording
}
