use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use timetravel_core_types::{FrameId, SessionId, TabId};
use timetravel_session_store::SessionStore;
use tracing::{debug, info};

use crate::candidates::{sample_window, SessionSample};
use crate::consensus::fingerprint;
use crate::errors::PageStateResult;
use crate::model::{PageStateSnapshot, StateContribution, StateFingerprint, TimeWindow};
use crate::policy::FingerprintPolicy;

struct CachedSample {
    tab_id: TabId,
    window: TimeWindow,
    sample: Arc<SessionSample>,
}

impl CachedSample {
    fn matches(&self, contribution: &StateContribution) -> bool {
        self.tab_id == contribution.tab_id && self.window == contribution.window
    }
}

#[derive(Default)]
struct GeneratorState {
    contributions: BTreeMap<SessionId, StateContribution>,
    names: BTreeMap<String, BTreeSet<SessionId>>,
    samples: HashMap<SessionId, CachedSample>,
    states: BTreeMap<String, StateFingerprint>,
}

impl GeneratorState {
    fn cached(&self, contribution: &StateContribution) -> Option<&SessionSample> {
        self.samples
            .get(&contribution.session_id)
            .filter(|cached| cached.matches(contribution))
            .map(|cached| cached.sample.as_ref())
    }

    /// Contributions that carry a state name but have no up-to-date sample.
    fn pending(&self) -> Vec<StateContribution> {
        let labelled: BTreeSet<&SessionId> = self.names.values().flatten().collect();
        self.contributions
            .values()
            .filter(|contribution| labelled.contains(&contribution.session_id))
            .filter(|contribution| self.cached(contribution).is_none())
            .cloned()
            .collect()
    }

    fn compute_states(&self) -> BTreeMap<String, StateFingerprint> {
        let mut states = BTreeMap::new();
        for (name, session_ids) in &self.names {
            let mut contributing = BTreeSet::new();
            let mut samples = BTreeMap::new();
            for session_id in session_ids {
                let Some(contribution) = self.contributions.get(session_id) else {
                    debug!(state = %name, session = %session_id, "state label without a registered session");
                    continue;
                };
                if let Some(sample) = self.cached(contribution) {
                    contributing.insert(session_id.clone());
                    samples.insert(session_id.clone(), sample);
                }
            }
            states.insert(name.clone(), fingerprint(name, contributing, &samples));
        }
        states
    }
}

/// Learns which DOM assertions identify each named page state.
///
/// Sessions are registered with [`add_session`](Self::add_session) and labelled with
/// [`add_state`](Self::add_state), in either order. [`evaluate`](Self::evaluate) samples every
/// labelled contribution that changed since the last call and recomputes the fingerprints. The
/// generator is safe to share behind an `Arc`.
pub struct PageStateGenerator {
    id: String,
    policy: FingerprintPolicy,
    state: Mutex<GeneratorState>,
}

impl PageStateGenerator {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_policy(id, FingerprintPolicy::default())
    }

    pub fn with_policy(id: impl Into<String>, policy: FingerprintPolicy) -> Self {
        Self {
            id: id.into(),
            policy,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Rebuilds a generator from exported states.
    ///
    /// Contributions are not part of a snapshot; sessions registered again under the same ids
    /// are folded back into their states on the next evaluation.
    pub fn restore(snapshot: PageStateSnapshot) -> Self {
        let generator = Self::new(snapshot.id);
        {
            let mut state = generator.state.lock();
            for restored in snapshot.states {
                state
                    .names
                    .insert(restored.name.clone(), restored.session_ids.clone());
                state.states.insert(restored.name.clone(), restored);
            }
        }
        generator
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn policy(&self) -> &FingerprintPolicy {
        &self.policy
    }

    /// Registers (or replaces) the window a session contributes.
    pub fn add_session(
        &self,
        session_id: SessionId,
        store: Arc<dyn SessionStore>,
        tab_id: TabId,
        window: TimeWindow,
    ) {
        let contribution = StateContribution {
            session_id: session_id.clone(),
            store,
            tab_id,
            window,
        };
        self.state.lock().contributions.insert(session_id, contribution);
    }

    pub fn add_state(&self, name: impl Into<String>, session_id: SessionId) {
        self.state
            .lock()
            .names
            .entry(name.into())
            .or_default()
            .insert(session_id);
    }

    pub async fn evaluate(&self) -> PageStateResult<()> {
        let pending = self.state.lock().pending();
        debug!(generator = %self.id, pending = pending.len(), "sampling contributions");

        let fresh = try_join_all(pending.into_iter().map(|contribution| async move {
            let sample = sample_contribution(&contribution, &self.policy).await?;
            PageStateResult::Ok((contribution, sample))
        }))
        .await?;

        let mut state = self.state.lock();
        for (contribution, sample) in fresh {
            state.samples.insert(
                contribution.session_id.clone(),
                CachedSample {
                    tab_id: contribution.tab_id,
                    window: contribution.window,
                    sample: Arc::new(sample),
                },
            );
        }
        let states = state.compute_states();
        info!(
            generator = %self.id,
            states = states.len(),
            assertions = states.values().map(StateFingerprint::assertion_count).sum::<usize>(),
            "page states evaluated"
        );
        state.states = states;
        Ok(())
    }

    pub fn states_by_name(&self) -> BTreeMap<String, StateFingerprint> {
        self.state.lock().states.clone()
    }

    pub fn state(&self, name: &str) -> Option<StateFingerprint> {
        self.state.lock().states.get(name).cloned()
    }

    pub fn export_states(&self) -> PageStateSnapshot {
        PageStateSnapshot {
            id: self.id.clone(),
            states: self.state.lock().states.values().cloned().collect(),
        }
    }
}

async fn sample_contribution(
    contribution: &StateContribution,
    policy: &FingerprintPolicy,
) -> PageStateResult<SessionSample> {
    let store = contribution.store.as_ref();
    let (frames, records) =
        tokio::try_join!(store.frames(), store.dom_changes(contribution.tab_id))?;
    let frame_ids: HashSet<FrameId> = frames
        .iter()
        .filter(|frame| frame.tab_id == contribution.tab_id)
        .map(|frame| frame.id)
        .collect();

    let sample = sample_window(&records, &frame_ids, contribution.window, policy);
    debug!(
        session = %contribution.session_id,
        tab = %contribution.tab_id,
        records = records.len(),
        candidates = sample.candidate_count(),
        "contribution sampled"
    );
    Ok(sample)
}
