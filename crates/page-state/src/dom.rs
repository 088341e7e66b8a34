use std::collections::{BTreeMap, HashMap, HashSet};

use timetravel_core_types::NodeId;
use timetravel_session_store::model::{DomActionKind, DomMutationRecord, NodeType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomNode {
    pub id: NodeId,
    pub node_type: NodeType,
    /// Upper-cased tag name for elements.
    pub tag: Option<String>,
    pub text: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl DomNode {
    fn from_record(record: &DomMutationRecord) -> Self {
        let node_type = record.node_type.unwrap_or(match (&record.tag_name, &record.text_content) {
            (Some(_), _) => NodeType::Element,
            (None, Some(_)) => NodeType::Text,
            (None, None) => NodeType::Other,
        });
        Self {
            id: record.node_id,
            node_type,
            tag: record.tag_name.as_deref().map(str::to_ascii_uppercase),
            text: record.text_content.clone(),
            attributes: record
                .attributes
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.clone()?)))
                .collect(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }
}

/// DOM of one frame rebuilt from its mutation records.
#[derive(Clone, Debug, Default)]
pub struct DomTree {
    root: Option<NodeId>,
    nodes: HashMap<NodeId, DomNode>,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(&id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id)?.parent
    }

    pub fn apply(&mut self, record: &DomMutationRecord) {
        match record.action {
            DomActionKind::NewDocument => {
                self.nodes.clear();
                let mut document = DomNode::from_record(record);
                document.node_type = NodeType::Document;
                document.tag = None;
                document.text = None;
                self.root = Some(record.node_id);
                self.nodes.insert(record.node_id, document);
            }
            DomActionKind::Added => {
                if self.nodes.contains_key(&record.node_id) {
                    self.detach(record.node_id);
                } else {
                    self.nodes.insert(record.node_id, DomNode::from_record(record));
                }
                if let Some(parent) = record.parent_node_id {
                    self.attach(record.node_id, parent, record.previous_sibling_id);
                }
            }
            DomActionKind::Removed => self.detach(record.node_id),
            DomActionKind::Text => {
                if let Some(node) = self.nodes.get_mut(&record.node_id) {
                    node.text = record.text_content.clone();
                }
            }
            DomActionKind::Attribute => {
                if let Some(node) = self.nodes.get_mut(&record.node_id) {
                    for (name, value) in &record.attributes {
                        match value {
                            Some(value) => {
                                node.attributes.insert(name.clone(), value.clone());
                            }
                            None => {
                                node.attributes.remove(name);
                            }
                        }
                    }
                }
            }
            DomActionKind::Location | DomActionKind::Property => {}
        }
    }

    fn attach(&mut self, id: NodeId, parent: NodeId, previous_sibling: Option<NodeId>) {
        if id == parent || self.ancestors(parent).any(|ancestor| ancestor == id) {
            return;
        }
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            return;
        };
        let position = match previous_sibling {
            None => 0,
            Some(sibling) => parent_node
                .children
                .iter()
                .position(|child| *child == sibling)
                .map(|index| index + 1)
                .unwrap_or(parent_node.children.len()),
        };
        parent_node.children.insert(position, id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(parent);
        }
    }

    /// Unlinks a subtree from its parent; the subtree stays addressable by id.
    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(&id).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != id);
        }
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        Some(id) == self.root || self.ancestors(id).any(|ancestor| Some(ancestor) == self.root)
    }

    /// Ids of every node currently reachable from the document root.
    pub fn attached_ids(&self) -> HashSet<NodeId> {
        self.preorder().into_iter().map(|node| node.id).collect()
    }

    /// Element tag path from the document, e.g. `/HTML/BODY/UL/LI`.
    pub fn tag_path(&self, id: NodeId) -> Option<String> {
        if !self.is_attached(id) {
            return None;
        }
        let mut tags: Vec<&str> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|node_id| {
                let node = self.nodes.get(&node_id)?;
                node.is_element().then_some(node.tag.as_deref()?)
            })
            .collect();
        if tags.is_empty() {
            return None;
        }
        tags.reverse();
        Some(format!("/{}", tags.join("/")))
    }

    /// Attached nodes in document order.
    pub fn preorder(&self) -> Vec<&DomNode> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            ordered.push(node);
            stack.extend(node.children.iter().rev().copied());
        }
        ordered
    }

    /// Attached elements in document order, paired with their tag paths.
    pub fn elements(&self) -> Vec<(&DomNode, String)> {
        let mut elements = Vec::new();
        let mut stack: Vec<(NodeId, String)> =
            self.root.map(|id| (id, String::new())).into_iter().collect();
        while let Some((id, parent_path)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let path = match (&node.tag, node.is_element()) {
                (Some(tag), true) => format!("{parent_path}/{tag}"),
                _ => parent_path,
            };
            for child in node.children.iter().rev() {
                stack.push((*child, path.clone()));
            }
            if node.is_element() {
                elements.push((node, path));
            }
        }
        elements
    }

    /// Concatenated text of every descendant text node, the XPath string-value of an element.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            if node.is_text() {
                text.push_str(node.text.as_deref().unwrap_or_default());
            }
            stack.extend(node.children.iter().rev().copied());
        }
        text
    }

    /// Direct text children of `id`.
    pub fn child_texts(&self, id: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(move |child| {
                let child = self.nodes.get(child)?;
                if child.is_text() {
                    child.text.as_deref()
                } else {
                    None
                }
            })
    }
}
