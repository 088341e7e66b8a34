use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use futures::future::try_join_all;
use page_state::{
    anchored_window, FingerprintPolicy, PageStateGenerator, PageStateSnapshot, TimeWindow,
};
use serde::{Deserialize, Serialize};
use timetravel_core_types::{SessionId, TabId, Timestamp};
use timetravel_session_store::{InMemorySessionStore, SessionStore};
use tokio::fs;
use tracing::{debug, info};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct FingerprintArgs {
    /// Manifest (YAML) listing the labelled session windows
    #[arg(long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Also write the evaluated states to this file as JSON
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,
}

/// Which session windows demonstrate which page state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    /// Generator id, usually the page or step the states belong to.
    pub id: String,
    #[serde(default)]
    pub contributions: Vec<ManifestEntry>,
}

/// One contribution: either an explicit `window` or an `anchor_end`.
///
/// Anchored entries open their window at the tab's settled navigation and, when `state` is
/// omitted, are labelled with the URL the tab landed on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Session file, relative to the manifest.
    pub session: PathBuf,
    pub tab_id: TabId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub window: Option<[Timestamp; 2]>,
    #[serde(default)]
    pub anchor_end: Option<Timestamp>,
}

impl Manifest {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("failed to parse manifest")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid manifest {}", path.display()))
    }

    /// Loads every referenced session and registers its window with a fresh generator.
    pub async fn build_generator(
        &self,
        base_dir: &Path,
        policy: FingerprintPolicy,
    ) -> Result<PageStateGenerator> {
        let mut stores: BTreeMap<PathBuf, Arc<InMemorySessionStore>> = BTreeMap::new();
        for entry in &self.contributions {
            let path = base_dir.join(&entry.session);
            if !stores.contains_key(&path) {
                let store = InMemorySessionStore::load_json(&path)
                    .await
                    .with_context(|| format!("failed to load session {}", path.display()))?;
                stores.insert(path, store);
            }
        }

        let resolved = try_join_all(self.contributions.iter().map(|entry| {
            let store = stores[&base_dir.join(&entry.session)].clone();
            async move { resolve_entry(entry, store).await }
        }))
        .await?;

        let generator = PageStateGenerator::with_policy(self.id.clone(), policy);
        let mut seen: HashSet<SessionId> = HashSet::new();
        for (entry, store, window, state) in resolved {
            let session_id = store.session_id();
            if !seen.insert(session_id.clone()) {
                bail!(
                    "session {} ({}) is listed more than once",
                    session_id,
                    entry.session.display()
                );
            }
            debug!(session = %session_id, state = %state, ?window, "registering contribution");
            generator.add_session(session_id.clone(), store, entry.tab_id, window);
            generator.add_state(state, session_id);
        }
        Ok(generator)
    }
}

async fn resolve_entry(
    entry: &ManifestEntry,
    store: Arc<InMemorySessionStore>,
) -> Result<(&ManifestEntry, Arc<InMemorySessionStore>, TimeWindow, String)> {
    let (window, landed_url) = match (entry.window, entry.anchor_end) {
        (Some([start, end]), None) => (TimeWindow::new(start, end)?, None),
        (None, Some(end)) => {
            let (window, url) = anchored_window(store.as_ref(), entry.tab_id, end).await?;
            (window, Some(url))
        }
        _ => bail!(
            "contribution {} needs exactly one of `window` or `anchor_end`",
            entry.session.display()
        ),
    };
    let state = entry
        .state
        .clone()
        .or(landed_url)
        .ok_or_else(|| anyhow!("contribution {} has no state name", entry.session.display()))?;
    Ok((entry, store, window, state))
}

pub async fn cmd_fingerprint(
    args: FingerprintArgs,
    ctx: &CliContext,
    format: OutputFormat,
) -> Result<()> {
    let manifest = Manifest::load(&args.manifest).await?;
    let base_dir = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let generator = manifest
        .build_generator(&base_dir, ctx.config().fingerprint.clone())
        .await?;
    generator
        .evaluate()
        .await
        .context("fingerprint evaluation failed")?;

    let snapshot = generator.export_states();
    info!(
        generator = %snapshot.id,
        states = snapshot.states.len(),
        "fingerprints generated"
    );
    if let Some(path) = &args.save {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create output directory {}", parent.display())
            })?;
        }
        fs::write(path, serde_json::to_string_pretty(&snapshot)?)
            .await
            .with_context(|| format!("failed to write states to {}", path.display()))?;
        println!("States written to {}", path.display());
    }

    match format.render(&snapshot)? {
        Some(rendered) => println!("{rendered}"),
        None => print!("{}", render_states_human(&snapshot)?),
    }
    Ok(())
}

pub fn render_states_human(snapshot: &PageStateSnapshot) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "Generator {}: {} states",
        snapshot.id,
        snapshot.states.len()
    )?;
    for state in &snapshot.states {
        let sessions: Vec<String> = state.session_ids.iter().map(ToString::to_string).collect();
        writeln!(
            out,
            "State {:?} from {} sessions [{}]",
            state.name,
            sessions.len(),
            sessions.join(", ")
        )?;
        if state.asserts_by_frame_id.is_empty() {
            writeln!(out, "  (no agreed assertions)")?;
        }
        for (frame_id, asserts) in &state.asserts_by_frame_id {
            writeln!(out, "  Frame {frame_id}")?;
            for assertion in asserts.values() {
                writeln!(out, "    {} = {}", assertion.query, assertion.result)?;
            }
        }
    }
    Ok(out)
}
