use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use timetravel_core_types::{CommandId, FrameId, TabId};
use timetravel_session_store::model::{
    CommandRecord, DocumentRecord, DomActionKind, DomMutationRecord, FocusRecord,
    InteractionRecord, MouseEventRecord, PaintCommit, ScrollRecord,
};
use timetravel_session_store::{to_dom_recording, TimelineOffsets};
use tracing::{debug, warn};

use super::context::{carry_forward, TabLookups};
use super::detach::DetachPayload;
use crate::errors::TlError;
use crate::model::{
    BuildReport, HighlightNodes, InclusionFlags, SessionTab, SessionTicks, TabDetails, TabFailure,
    Tick, TickEventType,
};
use crate::reader::{resolve_tab, SessionInput};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub flags: InclusionFlags,
    pub detach_command_name: String,
    pub emit_init_ticks: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            flags: InclusionFlags::default(),
            detach_command_name: "detachTab".to_string(),
            emit_init_ticks: true,
        }
    }
}

struct Splice {
    command_id: CommandId,
    url: String,
}

/// Everything collected for one tab before ordering.
struct TabAccumulator {
    tab: SessionTab,
    ticks: Vec<Tick>,
    documents: Vec<DocumentRecord>,
    commands: Vec<CommandRecord>,
    mouse: Vec<MouseEventRecord>,
    focus: Vec<FocusRecord>,
    scroll: Vec<ScrollRecord>,
    paint_commits: Vec<PaintCommit>,
    splice: Option<Splice>,
}

impl TabAccumulator {
    fn new(tab: SessionTab) -> Self {
        Self {
            tab,
            ticks: Vec::new(),
            documents: Vec::new(),
            commands: Vec::new(),
            mouse: Vec::new(),
            focus: Vec::new(),
            scroll: Vec::new(),
            paint_commits: Vec::new(),
            splice: None,
        }
    }
}

type Accumulators = BTreeMap<TabId, TabAccumulator>;

/// Builds every tab's ordered tick sequence.
///
/// Tabs that cannot be resolved and detach commands that cannot be spliced are recorded in the
/// report; the rest of the session still builds.
pub fn build_session_ticks(input: SessionInput, options: &BuildOptions) -> SessionTicks {
    let SessionInput {
        session_id,
        tabs,
        frames,
        navigations,
        commands,
        interactions,
        mut dom_changes_by_tab,
        timeline,
    } = input;

    let mut report = BuildReport::default();
    let mut accumulators = Accumulators::new();
    for tab in &tabs {
        match resolve_tab(tab, &frames, &navigations) {
            Ok(resolved) => {
                accumulators.insert(tab.id, TabAccumulator::new(resolved));
            }
            Err(error) => {
                warn!(tab = %tab.id, error = %error, "tab excluded from tick build");
                report.failed_tabs.push(TabFailure {
                    tab_id: tab.id,
                    error,
                });
            }
        }
    }

    add_command_ticks(&mut accumulators, &commands);
    add_interaction_ticks(&mut accumulators, interactions.mouse, TickEventType::Mouse, |acc| {
        &mut acc.mouse
    });
    add_interaction_ticks(&mut accumulators, interactions.focus, TickEventType::Focus, |acc| {
        &mut acc.focus
    });
    add_interaction_ticks(&mut accumulators, interactions.scroll, TickEventType::Scroll, |acc| {
        &mut acc.scroll
    });

    for (tab_id, acc) in accumulators.iter_mut() {
        let records = dom_changes_by_tab.remove(tab_id).unwrap_or_default();
        record_paint_commits(acc, &records);
    }

    for command in commands
        .iter()
        .filter(|command| command.name == options.detach_command_name)
    {
        if let Err(error) = splice_detached_tab(&mut accumulators, command) {
            warn!(command = %command.id, error = %error, "detach splice skipped");
            report.skipped_detaches.push(error);
        }
    }

    let mut tab_details = Vec::with_capacity(accumulators.len());
    for acc in accumulators.into_values() {
        let acc = add_paint_ticks(acc, options.emit_init_ticks);
        tab_details.push(finalize_tab(acc, &timeline, options.flags));
    }

    SessionTicks {
        session_id,
        tab_details,
        report,
    }
}

fn add_command_ticks(accumulators: &mut Accumulators, commands: &[CommandRecord]) {
    let fallback = accumulators.keys().next().copied();
    for (index, command) in commands.iter().enumerate() {
        let Some(acc) = command
            .tab_id
            .or(fallback)
            .and_then(|tab_id| accumulators.get_mut(&tab_id))
        else {
            debug!(command = %command.id, "command has no resolvable tab");
            continue;
        };
        let mut tick = Tick::new(TickEventType::Command, index, command.start_time);
        tick.command_id = Some(command.id);
        tick.label = command.label.clone();
        acc.ticks.push(tick);
        acc.commands.push(command.clone());
    }
}

fn add_interaction_ticks<R, F>(
    accumulators: &mut Accumulators,
    records: Vec<R>,
    event_type: TickEventType,
    collection: F,
) where
    R: InteractionRecord,
    F: Fn(&mut TabAccumulator) -> &mut Vec<R>,
{
    for record in records {
        let Some(acc) = accumulators.get_mut(&record.tab_id()) else {
            debug!(tab = %record.tab_id(), kind = event_type.as_str(), "interaction for unknown tab");
            continue;
        };
        let index = collection(acc).len();
        acc.ticks.push(Tick::new(event_type, index, record.timestamp()));
        collection(acc).push(record);
    }
}

fn record_paint_commits(acc: &mut TabAccumulator, records: &[DomMutationRecord]) {
    let frame_ids: HashSet<FrameId> = acc.tab.frames.iter().map(|frame| frame.id).collect();
    let main_frame_ids: HashSet<FrameId> = acc.tab.main_frame_ids().collect();
    let recording = to_dom_recording(records, &frame_ids, &main_frame_ids);
    acc.paint_commits = recording.paint_commits;
    acc.documents = recording.documents;
}

/// Copies the parent's mutations inside the detach range into one commit at the front of the
/// child's paint history.
fn splice_detached_tab(
    accumulators: &mut Accumulators,
    command: &CommandRecord,
) -> Result<(), TlError> {
    let payload = DetachPayload::parse(command)?;
    let unknown = |tab_id: TabId| {
        TlError::malformed_detach(command.id, format!("tab {tab_id} is not part of the session"))
    };

    let parent = accumulators
        .get(&payload.parent_tab_id)
        .ok_or_else(|| unknown(payload.parent_tab_id))?;
    let (changes, frame_ids) = payload.collect_changes(&parent.paint_commits);
    let copied_documents: Vec<DocumentRecord> = parent
        .documents
        .iter()
        .filter(|doc| frame_ids.contains(&doc.frame_id))
        .map(|doc| DocumentRecord {
            paint_commit_index: 0,
            ..doc.clone()
        })
        .collect();

    let child = accumulators
        .get_mut(&payload.child_tab_id)
        .ok_or_else(|| unknown(payload.child_tab_id))?;
    if child.splice.is_some() {
        return Err(TlError::malformed_detach(
            command.id,
            format!("tab {} was already detached", payload.child_tab_id),
        ));
    }

    debug!(
        child = %payload.child_tab_id,
        parent = %payload.parent_tab_id,
        changes = changes.len(),
        "splicing detached tab history"
    );
    child.paint_commits.insert(
        0,
        PaintCommit {
            command_id: Some(command.id),
            timestamp: child.tab.created_time + 1,
            changes,
        },
    );
    for doc in child.documents.iter_mut() {
        doc.paint_commit_index += 1;
    }
    child.documents.splice(0..0, copied_documents);
    child.splice = Some(Splice {
        command_id: command.id,
        url: payload.url,
    });
    Ok(())
}

fn add_paint_ticks(mut acc: TabAccumulator, emit_init_tick: bool) -> TabAccumulator {
    let main_frame_ids: HashSet<FrameId> = acc.tab.main_frame_ids().collect();

    for (index, commit) in acc.paint_commits.iter().enumerate() {
        let mut tick = Tick::new(TickEventType::Paint, index, commit.timestamp);
        tick.command_id = commit.command_id;

        match (&acc.splice, index) {
            (Some(splice), 0) => {
                tick.command_id = Some(splice.command_id);
                tick.is_new_document_tick = true;
                tick.document_url = splice.url.clone();
            }
            _ => {
                if let Some(first) = commit.changes.first() {
                    if first.action == DomActionKind::NewDocument
                        && main_frame_ids.contains(&first.frame_id)
                    {
                        tick.is_new_document_tick = true;
                        tick.document_url = first.text_content.clone().unwrap_or_default();
                    }
                }
            }
        }
        acc.ticks.push(tick);
    }

    if emit_init_tick {
        acc.ticks.push(Tick::new(TickEventType::Init, 0, acc.tab.created_time));
    }
    acc
}

/// Total order of a tab's ticks: offset, then event-type name, then per-type index.
pub fn tick_order(a: &Tick, b: &Tick) -> Ordering {
    a.offset()
        .total_cmp(&b.offset())
        .then_with(|| a.event_type.as_str().cmp(b.event_type.as_str()))
        .then_with(|| a.event_type_index.cmp(&b.event_type_index))
}

fn finalize_tab(
    acc: TabAccumulator,
    timeline: &dyn TimelineOffsets,
    flags: InclusionFlags,
) -> TabDetails {
    let command_highlights: HashMap<CommandId, HighlightNodes> = acc
        .commands
        .iter()
        .filter_map(|command| {
            let node_ids = command.result_node_ids.as_ref()?;
            Some((
                command.id,
                HighlightNodes {
                    frame_id: command.frame_id,
                    node_ids: node_ids.clone(),
                },
            ))
        })
        .collect();

    let mut ticks: Vec<Tick> = acc
        .ticks
        .into_iter()
        .filter_map(|mut tick| {
            let timestamp = tick.timestamp;
            let offset = *tick
                .timeline_offset_percent
                .get_or_insert_with(|| timeline.offset_percent(timestamp));
            (0.0..=100.0).contains(&offset).then_some(tick)
        })
        .collect();
    ticks.sort_by(tick_order);

    let lookups = TabLookups {
        command_highlights,
        focus: &acc.focus,
        mouse: &acc.mouse,
    };
    let ticks = carry_forward(ticks, &acc.tab.start_url, &lookups);
    debug!(tab = %acc.tab.id, ticks = ticks.len(), "tab ticks ordered");

    TabDetails {
        tab: acc.tab,
        ticks,
        documents: acc.documents,
        mouse: flags.include_interaction_events.then_some(acc.mouse),
        focus: flags.include_interaction_events.then_some(acc.focus),
        scroll: flags.include_interaction_events.then_some(acc.scroll),
        commands: flags.include_commands.then_some(acc.commands),
        paint_events: flags.include_paint_events.then_some(acc.paint_commits),
    }
}
