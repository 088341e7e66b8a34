//! Windowed sampling of a tab's mutation stream into candidate assertions.
//!
//! Records before the window build the baseline DOM. Records inside the window are applied too,
//! and each one proposes assertions scoped to the nearest stable ancestor of the node it touched:
//! a node that was attached before the window, has not been added, moved or removed since, and
//! whose ancestors are stable as well. The document root is always stable.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use timetravel_core_types::{FrameId, NodeId};
use timetravel_session_store::model::{DomActionKind, DomMutationRecord};
use tracing::trace;

use crate::assertion::Assertion;
use crate::dom::{DomNode, DomTree};
use crate::model::TimeWindow;
use crate::policy::FingerprintPolicy;

/// Final DOM of one frame plus the candidates its window produced.
#[derive(Clone, Debug, Default)]
pub struct FrameSample {
    pub tree: DomTree,
    pub candidates: BTreeSet<Assertion>,
}

/// Everything one contribution yields, keyed by frame.
#[derive(Clone, Debug, Default)]
pub struct SessionSample {
    pub frames: BTreeMap<FrameId, FrameSample>,
}

impl SessionSample {
    pub fn candidate_count(&self) -> usize {
        self.frames.values().map(|frame| frame.candidates.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.candidate_count() == 0
    }
}

/// Per-frame bookkeeping while inside the window.
#[derive(Default)]
struct WindowTracker {
    baseline: HashSet<NodeId>,
    touched: HashSet<NodeId>,
    text_parents: BTreeSet<NodeId>,
    attribute_targets: BTreeSet<NodeId>,
    candidates: BTreeSet<Assertion>,
}

impl WindowTracker {
    fn starting_from(tree: &DomTree) -> Self {
        Self {
            baseline: tree.attached_ids(),
            ..Self::default()
        }
    }

    fn is_stable(&self, tree: &DomTree, id: NodeId) -> bool {
        std::iter::once(id)
            .chain(tree.ancestors(id))
            .all(|node| {
                Some(node) == tree.root()
                    || (self.baseline.contains(&node) && !self.touched.contains(&node))
            })
            && tree.is_attached(id)
    }

    /// Topmost unstable node on the way from `id` to its nearest stable ancestor.
    fn climb(&self, tree: &DomTree, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = tree.parent(current)?;
            if self.is_stable(tree, parent) {
                return Some(current);
            }
            current = parent;
        }
    }

    fn structural_count(&self, tree: &DomTree, id: NodeId) -> Option<Assertion> {
        let anchor_child = self.climb(tree, id)?;
        let node = tree.node(anchor_child)?;
        if !node.is_element() {
            return None;
        }
        Some(Assertion::Count {
            path: tree.tag_path(anchor_child)?,
        })
    }

    fn observe(&mut self, tree: &mut DomTree, record: &DomMutationRecord) {
        match record.action {
            DomActionKind::NewDocument => {
                tree.apply(record);
                *self = Self::starting_from(tree);
                trace!(frame = %record.frame_id, "document replaced inside window");
            }
            DomActionKind::Added => {
                tree.apply(record);
                self.touched.insert(record.node_id);
                match tree.node(record.node_id) {
                    Some(node) if node.is_text() => {
                        if let Some(parent) = node.parent {
                            self.text_parents.insert(parent);
                        }
                    }
                    Some(_) => {
                        if let Some(count) = self.structural_count(tree, record.node_id) {
                            self.candidates.insert(count);
                        }
                    }
                    None => {}
                }
            }
            DomActionKind::Removed => {
                match tree.node(record.node_id) {
                    Some(node) if node.is_text() => {
                        if let Some(parent) = node.parent {
                            self.text_parents.insert(parent);
                        }
                    }
                    Some(_) => {
                        if let Some(count) = self.structural_count(tree, record.node_id) {
                            self.candidates.insert(count);
                        }
                    }
                    None => {}
                }
                self.touched.insert(record.node_id);
                tree.apply(record);
            }
            DomActionKind::Text => {
                tree.apply(record);
                if let Some(parent) = tree.parent(record.node_id) {
                    self.text_parents.insert(parent);
                }
            }
            DomActionKind::Attribute => {
                tree.apply(record);
                self.attribute_targets.insert(record.node_id);
            }
            DomActionKind::Location | DomActionKind::Property => {}
        }
    }

    /// Resolves deferred text and attribute candidates against the window's final tree.
    fn finish(mut self, tree: &DomTree, policy: &FingerprintPolicy) -> BTreeSet<Assertion> {
        let elements = tree.elements();
        for parent in std::mem::take(&mut self.text_parents) {
            let Some(node) = tree.node(parent).filter(|node| node.is_element()) else {
                continue;
            };
            let Some(path) = tree.tag_path(parent) else {
                continue;
            };
            let value = tree.text_content(parent);
            if !value.is_empty() && !policy.is_assertable(&value) {
                continue;
            }
            // string() reads the first match, which must be the node whose text changed.
            if first_with_path(&elements, &path) == Some(parent) {
                self.candidates.insert(Assertion::StringValue { path });
            }
            if let Some(tag) = node.tag.as_deref() {
                for text in tree.child_texts(parent).filter(|text| policy.is_quotable(text)) {
                    self.candidates.insert(Assertion::CountText {
                        tag: tag.to_string(),
                        text: text.to_string(),
                    });
                }
            }
        }

        for target in std::mem::take(&mut self.attribute_targets) {
            let Some(node) = tree.node(target).filter(|node| node.is_element()) else {
                continue;
            };
            if self.is_stable(tree, target) {
                if let Some(path) = tree.tag_path(target) {
                    self.candidates.insert(Assertion::CountWithAttributes {
                        path,
                        attributes: node.attributes.clone(),
                    });
                }
            } else if let Some(count) = self.structural_count(tree, target) {
                self.candidates.insert(count);
            }
        }
        self.candidates
    }
}

fn first_with_path(elements: &[(&DomNode, String)], path: &str) -> Option<NodeId> {
    elements
        .iter()
        .find(|(_, candidate)| candidate == path)
        .map(|(node, _)| node.id)
}

/// Replays `records` up to the end of `window` and collects candidates per frame.
///
/// `records` must be ordered by (timestamp, event index). Records of frames outside `frame_ids`
/// are ignored.
pub fn sample_window(
    records: &[DomMutationRecord],
    frame_ids: &HashSet<FrameId>,
    window: TimeWindow,
    policy: &FingerprintPolicy,
) -> SessionSample {
    let mut trees: BTreeMap<FrameId, DomTree> = BTreeMap::new();
    let mut trackers: BTreeMap<FrameId, WindowTracker> = BTreeMap::new();

    for record in records.iter().filter(|r| frame_ids.contains(&r.frame_id)) {
        if record.timestamp > window.end {
            break;
        }
        let tree = trees.entry(record.frame_id).or_default();
        if !window.contains(record.timestamp) {
            tree.apply(record);
            continue;
        }
        trackers
            .entry(record.frame_id)
            .or_insert_with(|| WindowTracker::starting_from(tree))
            .observe(tree, record);
    }

    let mut sample = SessionSample::default();
    for (frame_id, tree) in trees {
        let candidates = match trackers.remove(&frame_id) {
            Some(tracker) => tracker.finish(&tree, policy),
            None => BTreeSet::new(),
        };
        sample.frames.insert(frame_id, FrameSample { tree, candidates });
    }
    sample
}
