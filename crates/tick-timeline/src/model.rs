use serde::{Deserialize, Serialize};
use timetravel_core_types::{CommandId, FrameId, NodeId, SessionId, TabId, Timestamp};
use timetravel_session_store::model::{
    CommandRecord, DocumentRecord, FocusRecord, MouseEventRecord, PaintCommit, ScrollRecord,
};

use crate::errors::TlError;

/// Stream a tick was derived from. Declared in name order, which is the tie-break order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickEventType {
    Command,
    Focus,
    Init,
    Mouse,
    Paint,
    Scroll,
}

impl TickEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickEventType::Command => "command",
            TickEventType::Focus => "focus",
            TickEventType::Init => "init",
            TickEventType::Mouse => "mouse",
            TickEventType::Paint => "paint",
            TickEventType::Scroll => "scroll",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightNodes {
    pub frame_id: Option<FrameId>,
    pub node_ids: Vec<NodeId>,
}

/// One point in a tab's replay timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub event_type: TickEventType,
    pub event_type_index: usize,
    pub command_id: Option<CommandId>,
    pub timestamp: Timestamp,
    pub timeline_offset_percent: Option<f64>,
    pub is_major: bool,
    pub label: Option<String>,
    pub is_new_document_tick: bool,
    pub document_url: String,
    pub document_load_paint_index: Option<usize>,
    pub highlight_node_ids: Option<HighlightNodes>,
    pub paint_event_index: Option<usize>,
    pub scroll_event_index: Option<usize>,
    pub focus_event_index: Option<usize>,
    pub mouse_event_index: Option<usize>,
}

impl Tick {
    pub fn new(event_type: TickEventType, event_type_index: usize, timestamp: Timestamp) -> Self {
        Self {
            event_type,
            event_type_index,
            command_id: None,
            timestamp,
            timeline_offset_percent: None,
            is_major: event_type == TickEventType::Command,
            label: None,
            is_new_document_tick: false,
            document_url: String::new(),
            document_load_paint_index: None,
            highlight_node_ids: None,
            paint_event_index: None,
            scroll_event_index: None,
            focus_event_index: None,
            mouse_event_index: None,
        }
    }

    /// Offset used for ordering; ticks without one sort last.
    pub fn offset(&self) -> f64 {
        self.timeline_offset_percent.unwrap_or(f64::MAX)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFrame {
    pub id: FrameId,
    pub is_main_frame: bool,
    pub dom_node_path: Option<String>,
}

/// Tab topology resolved against frames and navigations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTab {
    pub id: TabId,
    pub created_time: Timestamp,
    pub detached_from_tab_id: Option<TabId>,
    pub start_url: String,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<SessionFrame>,
}

impl SessionTab {
    pub fn main_frame_ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frames.iter().filter(|f| f.is_main_frame).map(|f| f.id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabDetails {
    pub tab: SessionTab,
    pub ticks: Vec<Tick>,
    pub documents: Vec<DocumentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse: Option<Vec<MouseEventRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<Vec<FocusRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<Vec<ScrollRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<CommandRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paint_events: Option<Vec<PaintCommit>>,
}

/// Which raw collections accompany the ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionFlags {
    pub include_interaction_events: bool,
    pub include_commands: bool,
    pub include_paint_events: bool,
}

/// Per-call overrides; unset fields fall back to the policy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TicksRequest {
    pub include_interaction_events: Option<bool>,
    pub include_commands: Option<bool>,
    pub include_paint_events: Option<bool>,
}

impl TicksRequest {
    pub fn flags(&self, defaults: InclusionFlags) -> InclusionFlags {
        InclusionFlags {
            include_interaction_events: self
                .include_interaction_events
                .unwrap_or(defaults.include_interaction_events),
            include_commands: self.include_commands.unwrap_or(defaults.include_commands),
            include_paint_events: self
                .include_paint_events
                .unwrap_or(defaults.include_paint_events),
        }
    }
}

#[derive(Debug)]
pub struct TabFailure {
    pub tab_id: TabId,
    pub error: TlError,
}

/// Per-tab failures and skipped detach splices; never fatal to the whole build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub failed_tabs: Vec<TabFailure>,
    pub skipped_detaches: Vec<TlError>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failed_tabs.is_empty() && self.skipped_detaches.is_empty()
    }
}

#[derive(Debug)]
pub struct SessionTicks {
    pub session_id: SessionId,
    pub tab_details: Vec<TabDetails>,
    pub report: BuildReport,
}

impl SessionTicks {
    pub fn tab(&self, tab_id: TabId) -> Option<&TabDetails> {
        self.tab_details.iter().find(|details| details.tab.id == tab_id)
    }

    pub fn total_ticks(&self) -> usize {
        self.tab_details.iter().map(|details| details.ticks.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportStats {
    pub total_tabs: usize,
    pub total_ticks: usize,
    pub failed_tabs: usize,
    pub skipped_detaches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportResult {
    pub path: Option<String>,
    pub lines: Option<Vec<String>>,
    pub stats: ExportStats,
}
