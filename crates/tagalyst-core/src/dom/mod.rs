//! In-memory model of the host page.
//!
//! The host document is an indextree arena of Document/Element/Text nodes.
//! Node handles stay valid after a node leaves the tree (nodes are detached,
//! never freed), so stale handles can always be asked `is_connected`.
//! Every structural write is reported to registered observers as a
//! [`MutationRecord`], whether it came from the host or from us.

mod mutation;

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;

use indextree::Arena;
pub use indextree::NodeId;
use tokio::sync::mpsc;

use crate::constants::{BLOCK_TAGS, EXT_ATTR};

pub use mutation::{
    MutationKind, MutationRecord, MutationStream, ObserveOptions, ObserverId,
};
use mutation::ObserverEntry;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    Missing(NodeId),
    #[error("node {0:?} is detached from the document")]
    Detached(NodeId),
    #[error("node {0:?} is not an element")]
    NotElement(NodeId),
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("invalid tree operation: {0}")]
    Hierarchy(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element { tag: String },
    Text { text: String },
}

/// Geometry stand-in for `getBoundingClientRect` and overflow detection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Layout {
    pub top: Option<f64>,
    pub height: Option<f64>,
    pub scrollable: bool,
}

#[derive(Debug, Clone)]
pub struct DomNode {
    pub kind: NodeKind,
    pub attrs: Vec<(String, String)>,
    pub layout: Layout,
}

impl DomNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: Vec::new(),
            layout: Layout::default(),
        }
    }
}

#[derive(Debug)]
pub struct Document {
    arena: Arena<DomNode>,
    root: NodeId,
    body: NodeId,
    observers: Vec<ObserverEntry>,
    next_observer: u64,
    scrolled_to: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(DomNode::new(NodeKind::Document));
        let body = arena.new_node(DomNode::new(NodeKind::Element {
            tag: "body".to_string(),
        }));
        root.append(body, &mut arena);
        Self {
            arena,
            root,
            body,
            observers: Vec::new(),
            next_observer: 0,
            scrolled_to: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn node(&self, id: NodeId) -> Result<&DomNode, DomError> {
        self.arena
            .get(id)
            .filter(|n| !n.is_removed())
            .map(|n| n.get())
            .ok_or(DomError::Missing(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DomNode, DomError> {
        self.arena
            .get_mut(id)
            .filter(|n| !n.is_removed())
            .map(|n| n.get_mut())
            .ok_or(DomError::Missing(id))
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    // =========================================================================
    // Construction and tree writes
    // =========================================================================

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(DomNode::new(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(DomNode::new(NodeKind::Text {
            text: text.to_string(),
        }))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.node(parent)?;
        self.remove(child)?;
        parent
            .checked_append(child, &mut self.arena)
            .map_err(|e| DomError::Hierarchy(format!("{:?}", e)))?;
        self.notify_child_list(parent, vec![child], Vec::new());
        Ok(())
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.node(parent)?;
        self.remove(child)?;
        parent
            .checked_prepend(child, &mut self.arena)
            .map_err(|e| DomError::Hierarchy(format!("{:?}", e)))?;
        self.notify_child_list(parent, vec![child], Vec::new());
        Ok(())
    }

    /// Insert `new_node` as the previous sibling of `reference`.
    pub fn insert_before(&mut self, reference: NodeId, new_node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(reference).ok_or(DomError::Detached(reference))?;
        self.remove(new_node)?;
        reference
            .checked_insert_before(new_node, &mut self.arena)
            .map_err(|e| DomError::Hierarchy(format!("{:?}", e)))?;
        self.notify_child_list(parent, vec![new_node], Vec::new());
        Ok(())
    }

    /// Detach a node from its parent. Detached nodes keep their subtree and
    /// attributes and can be re-inserted; removing a parentless node is a no-op.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.node(node)?;
        let Some(parent) = self.parent(node) else {
            return Ok(());
        };
        node.detach(&mut self.arena);
        self.notify_child_list(parent, Vec::new(), vec![node]);
        Ok(())
    }

    /// Remove every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) -> Result<(), DomError> {
        for child in self.children(node) {
            self.remove(child)?;
        }
        Ok(())
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let entry = self.node_mut(node)?;
        if !matches!(entry.kind, NodeKind::Element { .. }) {
            return Err(DomError::NotElement(node));
        }
        match entry.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) if v.as_str() == value => return Ok(()),
            Some((_, v)) => *v = value.to_string(),
            None => entry.attrs.push((name.to_string(), value.to_string())),
        }
        self.notify(MutationRecord {
            target: node,
            kind: MutationKind::Attributes {
                name: name.to_string(),
            },
        });
        Ok(())
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let entry = self.node_mut(node)?;
        let before = entry.attrs.len();
        entry.attrs.retain(|(k, _)| k != name);
        if entry.attrs.len() != before {
            self.notify(MutationRecord {
                target: node,
                kind: MutationKind::Attributes {
                    name: name.to_string(),
                },
            });
        }
        Ok(())
    }

    /// Replace the data of a text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text { text: current } => {
                if current == text {
                    return Ok(());
                }
                *current = text.to_string();
            }
            _ => return Err(DomError::NotText(node)),
        }
        self.notify(MutationRecord {
            target: node,
            kind: MutationKind::CharacterData,
        });
        Ok(())
    }

    /// Replace all children of an element with a single text node.
    /// Leaves the tree untouched when it already holds exactly that text.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        let children = self.children(node);
        let single_text = match children.as_slice() {
            [only] => match self.kind(*only) {
                Some(NodeKind::Text { text: current }) => Some((*only, current == text)),
                _ => None,
            },
            _ => None,
        };
        if let Some((only, unchanged)) = single_text {
            if unchanged {
                return Ok(());
            }
            return self.set_text(only, text);
        }
        self.clear_children(node)?;
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(node, text_node)?;
        }
        Ok(())
    }

    pub fn set_layout(&mut self, node: NodeId, layout: Layout) -> Result<(), DomError> {
        self.node_mut(node)?.layout = layout;
        Ok(())
    }

    pub fn scroll_into_view(&mut self, node: NodeId) -> Result<(), DomError> {
        if !self.is_connected(node) {
            return Err(DomError::Detached(node));
        }
        self.scrolled_to = Some(node);
        Ok(())
    }

    /// Last node passed to [`Document::scroll_into_view`]
    pub fn scrolled_to(&self) -> Option<NodeId> {
        self.scrolled_to
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.node(node).ok().map(|n| &n.kind)
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { tag } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.tag(node).is_some()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)
            .ok()?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn layout(&self, node: NodeId) -> Layout {
        self.node(node).map(|n| n.layout).unwrap_or_default()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena
            .get(node)
            .filter(|n| !n.is_removed())
            .and_then(|n| n.parent())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        if !self.exists(node) {
            return Vec::new();
        }
        node.children(&self.arena).collect()
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Elements strictly below `node`, in document order
    pub fn descendant_elements(&self, node: NodeId) -> Vec<NodeId> {
        if !self.exists(node) {
            return Vec::new();
        }
        node.descendants(&self.arena)
            .skip(1)
            .filter(|d| self.is_element(*d))
            .collect()
    }

    /// Position among the parent's host element children; injected
    /// siblings are not counted.
    pub fn sibling_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.element_children(parent)
            .into_iter()
            .filter(|c| *c == node || !self.is_extension_owned(*c))
            .position(|c| c == node)
    }

    /// True when the node is reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.exists(node) && node.ancestors(&self.arena).any(|a| a == self.root)
    }

    /// True when `node` is `ancestor` or lies below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.exists(node) && node.ancestors(&self.arena).any(|a| a == ancestor)
    }

    /// True when the node or one of its ancestors was injected by us.
    pub fn is_extension_owned(&self, node: NodeId) -> bool {
        self.exists(node)
            && node
                .ancestors(&self.arena)
                .any(|a| self.has_attr(a, EXT_ATTR))
    }

    /// First element below `node` (document order) matching `pred`
    pub fn find_descendant(
        &self,
        node: NodeId,
        pred: impl Fn(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.descendant_elements(node)
            .into_iter()
            .find(|d| pred(self, *d))
    }

    /// Rendered text of a subtree, skipping extension-owned elements.
    /// Block-level elements are separated by newlines, like `innerText`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Ok(entry) = self.node(node) else {
            return;
        };
        match &entry.kind {
            NodeKind::Text { text } => out.push_str(text),
            NodeKind::Element { tag } => {
                if self.has_attr(node, EXT_ATTR) {
                    return;
                }
                let block = BLOCK_TAGS.contains(&tag.as_str());
                if block {
                    out.push('\n');
                }
                for child in node.children(&self.arena) {
                    self.collect_text(child, out);
                }
                if block {
                    out.push('\n');
                }
            }
            NodeKind::Document => {
                for child in node.children(&self.arena) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Vertical positions used for top-to-bottom ordering.
    ///
    /// A node's explicit `layout.top` wins; nodes without one fall back to
    /// their document-order index.
    pub fn vertical_positions(&self, nodes: &[NodeId]) -> Vec<f64> {
        let mut order: Option<HashMap<NodeId, usize>> = None;
        nodes
            .iter()
            .map(|node| {
                if let Some(top) = self.layout(*node).top {
                    return top;
                }
                let order = order.get_or_insert_with(|| {
                    self.root
                        .descendants(&self.arena)
                        .enumerate()
                        .map(|(i, id)| (id, i))
                        .collect()
                });
                order.get(node).map(|i| *i as f64).unwrap_or(f64::MAX)
            })
            .collect()
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn observe(&mut self, root: NodeId, options: ObserveOptions) -> (ObserverId, MutationStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(ObserverEntry {
            id,
            root,
            options,
            tx,
        });
        (id, rx)
    }

    pub fn disconnect(&mut self, id: ObserverId) {
        self.observers.retain(|o| o.id != id);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify_child_list(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        self.notify(MutationRecord {
            target,
            kind: MutationKind::ChildList { added, removed },
        });
    }

    fn notify(&mut self, record: MutationRecord) {
        if self.observers.is_empty() {
            return;
        }
        let path: Vec<NodeId> = record.target.ancestors(&self.arena).collect();
        // Receivers dropped without disconnect are pruned here
        self.observers.retain(|observer| {
            if !observer.accepts(&record, &path) {
                return !observer.tx.is_closed();
            }
            observer.tx.send(record.clone()).is_ok()
        });
    }
}

/// The page the engine runs in: one document plus its location.
#[derive(Debug)]
pub struct HostPage {
    document: RefCell<Document>,
    location: RefCell<String>,
}

impl HostPage {
    pub fn new(location: &str) -> Self {
        Self::with_document(location, Document::new())
    }

    pub fn with_document(location: &str, document: Document) -> Self {
        Self {
            document: RefCell::new(document),
            location: RefCell::new(location.to_string()),
        }
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.document.borrow_mut()
    }

    pub fn location(&self) -> String {
        self.location.borrow().clone()
    }

    /// SPA-style navigation: the URL changes, the document stays.
    pub fn set_location(&self, location: &str) {
        *self.location.borrow_mut() = location.to_string();
    }
}
