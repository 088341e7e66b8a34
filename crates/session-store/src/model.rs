use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use timetravel_core_types::{CommandId, FrameId, NodeId, SessionId, TabId, Timestamp};

/// Top-level record describing one recorded automation session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub start_time: Timestamp,
    #[serde(default)]
    pub close_time: Option<Timestamp>,
}

/// Tab as persisted by the capture layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TabRecord {
    pub id: TabId,
    #[serde(default)]
    pub parent_id: Option<TabId>,
    #[serde(default)]
    pub detached_at_command_id: Option<CommandId>,
    pub created_time: Timestamp,
    #[serde(default)]
    pub viewport_width: u32,
    #[serde(default)]
    pub viewport_height: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    pub id: FrameId,
    pub tab_id: TabId,
    #[serde(default)]
    pub parent_id: Option<FrameId>,
    /// Path of the owning `<iframe>` node from the root frame; empty for main frames.
    #[serde(default)]
    pub dom_node_path: Option<String>,
}

impl FrameRecord {
    pub fn is_main_frame(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameNavigation {
    pub id: u32,
    pub tab_id: TabId,
    pub frame_id: FrameId,
    pub requested_url: String,
    #[serde(default)]
    pub final_url: Option<String>,
    pub initiated_time: Timestamp,
    #[serde(default)]
    pub http_responded_time: Option<Timestamp>,
    #[serde(default)]
    pub http_redirected_time: Option<Timestamp>,
}

impl FrameNavigation {
    /// Redirected navigations never become the effective start of a document.
    pub fn is_redirect(&self) -> bool {
        self.http_redirected_time.is_some()
    }

    pub fn effective_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.requested_url)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomActionKind {
    NewDocument,
    Location,
    Added,
    Removed,
    Text,
    Attribute,
    Property,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Document,
    DocumentType,
    DocumentFragment,
    #[serde(other)]
    Other,
}

/// One atomic DOM change. Records are append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomMutationRecord {
    pub tab_id: TabId,
    pub frame_id: FrameId,
    pub timestamp: Timestamp,
    pub event_index: u32,
    #[serde(default)]
    pub command_id: Option<CommandId>,
    pub action: DomActionKind,
    pub node_id: NodeId,
    #[serde(default)]
    pub parent_node_id: Option<NodeId>,
    #[serde(default)]
    pub previous_sibling_id: Option<NodeId>,
    #[serde(default)]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub tag_name: Option<String>,
    /// Text for text nodes; the navigated url for new-document records.
    #[serde(default)]
    pub text_content: Option<String>,
    /// Attribute changes; `None` values remove the attribute.
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<String>>,
}

impl DomMutationRecord {
    pub fn sort_key(&self) -> (Timestamp, u32) {
        (self.timestamp, self.event_index)
    }
}

/// Batch of mutations applied together as one visual update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaintCommit {
    pub command_id: Option<CommandId>,
    pub timestamp: Timestamp,
    pub changes: Vec<DomMutationRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    pub url: String,
    pub frame_id: FrameId,
    pub is_main_frame: bool,
    pub paint_commit_index: usize,
    pub paint_start_timestamp: Timestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: CommandId,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub start_time: Timestamp,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub tab_id: Option<TabId>,
    #[serde(default)]
    pub frame_id: Option<FrameId>,
    #[serde(default)]
    pub result_node_ids: Option<Vec<NodeId>>,
    #[serde(default)]
    pub result_type: Option<String>,
    /// Structured result; may arrive as a JSON encoded string.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseEventKind {
    Move,
    Down,
    Up,
    Over,
    Leave,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MouseEventRecord {
    pub tab_id: TabId,
    pub frame_id: FrameId,
    pub timestamp: Timestamp,
    pub event: MouseEventKind,
    #[serde(default)]
    pub target_node_id: Option<NodeId>,
    #[serde(default)]
    pub page_x: i32,
    #[serde(default)]
    pub page_y: i32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusEventKind {
    In,
    Out,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FocusRecord {
    pub tab_id: TabId,
    pub frame_id: FrameId,
    pub timestamp: Timestamp,
    pub event: FocusEventKind,
    #[serde(default)]
    pub target_node_id: Option<NodeId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrollRecord {
    pub tab_id: TabId,
    pub frame_id: FrameId,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub scroll_x: i32,
    #[serde(default)]
    pub scroll_y: i32,
}

/// Common accessors for the low-level input streams.
pub trait InteractionRecord {
    fn tab_id(&self) -> TabId;
    fn timestamp(&self) -> Timestamp;
}

macro_rules! interaction_record {
    ($($ty:ty),*) => {
        $(impl InteractionRecord for $ty {
            fn tab_id(&self) -> TabId {
                self.tab_id
            }

            fn timestamp(&self) -> Timestamp {
                self.timestamp
            }
        })*
    };
}

interaction_record!(MouseEventRecord, FocusRecord, ScrollRecord);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionInteractions {
    #[serde(default)]
    pub mouse: Vec<MouseEventRecord>,
    #[serde(default)]
    pub focus: Vec<FocusRecord>,
    #[serde(default)]
    pub scroll: Vec<ScrollRecord>,
}

/// Everything recorded for one session; the on-disk session file format.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub session: SessionRecord,
    #[serde(default)]
    pub tabs: Vec<TabRecord>,
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
    #[serde(default)]
    pub navigations: Vec<FrameNavigation>,
    #[serde(default)]
    pub commands: Vec<CommandRecord>,
    #[serde(default)]
    pub dom_changes: Vec<DomMutationRecord>,
    #[serde(default)]
    pub interactions: SessionInteractions,
}
