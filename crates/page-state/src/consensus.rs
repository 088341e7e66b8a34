use std::collections::{BTreeMap, BTreeSet};

use timetravel_core_types::{FrameId, SessionId};
use tracing::{debug, trace};

use crate::assertion::Assertion;
use crate::candidates::SessionSample;
use crate::model::{AssertResult, DomAssertion, StateFingerprint};

/// Collapses the samples of one state name into assertions every participant agrees on.
///
/// Samples without candidates do not participate. Every candidate proposed by any participant
/// is evaluated against each participant's final DOM of the same frame; a query survives only
/// when all results are identical.
pub fn fingerprint(
    name: &str,
    session_ids: BTreeSet<SessionId>,
    samples: &BTreeMap<SessionId, &SessionSample>,
) -> StateFingerprint {
    let participants: Vec<(&SessionId, &SessionSample)> = samples
        .iter()
        .filter_map(|(session_id, sample)| {
            if sample.is_empty() {
                debug!(state = name, session = %session_id, "window captured no mutations");
                None
            } else {
                Some((session_id, *sample))
            }
        })
        .collect();

    let mut candidates_by_frame: BTreeMap<FrameId, BTreeSet<&Assertion>> = BTreeMap::new();
    for (_, sample) in &participants {
        for (frame_id, frame) in &sample.frames {
            candidates_by_frame
                .entry(*frame_id)
                .or_default()
                .extend(frame.candidates.iter());
        }
    }

    let mut asserts_by_frame_id = BTreeMap::new();
    for (frame_id, candidates) in candidates_by_frame {
        let asserts: BTreeMap<String, DomAssertion> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let result = unanimous(candidate, frame_id, &participants)?;
                let query = candidate.query();
                Some((query.clone(), DomAssertion { query, result }))
            })
            .collect();
        if !asserts.is_empty() {
            asserts_by_frame_id.insert(frame_id, asserts);
        }
    }

    StateFingerprint {
        name: name.to_string(),
        session_ids,
        asserts_by_frame_id,
    }
}

fn unanimous(
    candidate: &Assertion,
    frame_id: FrameId,
    participants: &[(&SessionId, &SessionSample)],
) -> Option<AssertResult> {
    let mut agreed: Option<AssertResult> = None;
    for (session_id, sample) in participants {
        let Some(frame) = sample.frames.get(&frame_id) else {
            trace!(session = %session_id, frame = %frame_id, "frame missing, query dropped");
            return None;
        };
        let result = candidate.evaluate(&frame.tree);
        match &agreed {
            Some(previous) if *previous != result => {
                trace!(query = %candidate.query(), %previous, %result, "results differ, query dropped");
                return None;
            }
            Some(_) => {}
            None => agreed = Some(result),
        }
    }
    agreed
}
