use std::cell::Cell;

use crate::constants::{BLOCK_TAGS, MIN_HEURISTIC_TEXT, ROLE_ASSISTANT, ROLE_USER};
use crate::dom::{Document, MutationStream, NodeId, ObserveOptions, ObserverId};
use crate::identity::normalize;

use super::{AdapterError, ThreadAdapter};

/// Where a host keeps its messages and how they are marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostProfile {
    pub name: &'static str,
    /// Attributes whose presence marks a message element; the value is the role
    pub role_attrs: &'static [&'static str],
    pub id_attr: Option<&'static str>,
    /// Tag of the transcript root; `None` searches scrollable regions instead
    pub root_tag: Option<&'static str>,
    /// Class tokens of the element holding the rendered message body
    pub content_classes: &'static [&'static str],
    /// Fall back to the text-length/block-content scan when nothing is marked
    pub heuristic: bool,
}

impl HostProfile {
    pub const fn chatgpt() -> Self {
        Self {
            name: "chatgpt",
            role_attrs: &["data-message-author-role"],
            id_attr: Some("data-message-id"),
            root_tag: Some("main"),
            content_classes: &["markdown", "whitespace-pre-wrap"],
            heuristic: false,
        }
    }

    pub const fn generic() -> Self {
        Self {
            name: "generic",
            role_attrs: &["data-message-author-role", "data-role"],
            id_attr: None,
            root_tag: None,
            content_classes: &[],
            heuristic: true,
        }
    }
}

fn has_class(doc: &Document, node: NodeId, class: &str) -> bool {
    doc.attr(node, "class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

fn is_block(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|tag| BLOCK_TAGS.contains(&tag))
}

/// Thread adapter for hosts that mark message elements with a role attribute.
pub struct MarkedThreadAdapter {
    profile: HostProfile,
    observer: Cell<Option<ObserverId>>,
}

impl MarkedThreadAdapter {
    pub fn new(profile: HostProfile) -> Self {
        Self {
            profile,
            observer: Cell::new(None),
        }
    }

    pub fn profile(&self) -> &HostProfile {
        &self.profile
    }

    fn role_of(&self, doc: &Document, node: NodeId) -> Option<String> {
        self.profile
            .role_attrs
            .iter()
            .find_map(|attr| doc.attr(node, attr))
            .map(str::to_string)
    }

    fn is_marked(&self, doc: &Document, node: NodeId) -> bool {
        self.profile.role_attrs.iter().any(|attr| doc.has_attr(node, attr))
    }

    fn has_marked_descendant(&self, doc: &Document, node: NodeId) -> bool {
        doc.find_descendant(node, |d, n| self.is_marked(d, n)).is_some()
    }

    /// Largest scrollable region, preferring regions that hold marked messages.
    fn largest_scroll_region(&self, doc: &Document) -> Option<NodeId> {
        let regions: Vec<NodeId> = doc
            .descendant_elements(doc.root())
            .into_iter()
            .filter(|n| doc.layout(*n).scrollable && !doc.is_extension_owned(*n))
            .collect();
        let marked: Vec<NodeId> = regions
            .iter()
            .copied()
            .filter(|r| self.has_marked_descendant(doc, *r))
            .collect();
        let pool = if marked.is_empty() { regions } else { marked };
        // Ties keep the outermost (first in document order) region
        pool.into_iter()
            .map(|r| {
                let height = doc.layout(r).height.unwrap_or(0.0);
                let size = doc.descendant_elements(r).len();
                (r, height, size)
            })
            .fold(None::<(NodeId, f64, usize)>, |best, cand| match best {
                Some(b) if (b.1, b.2) >= (cand.1, cand.2) => Some(b),
                _ => Some(cand),
            })
            .map(|(r, _, _)| r)
    }

    /// Marked elements that are not nested in another marked element
    fn outermost_marked(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for node in doc.descendant_elements(root) {
            if !self.is_marked(doc, node) || doc.is_extension_owned(node) {
                continue;
            }
            if out.iter().any(|outer| doc.contains(*outer, node)) {
                continue;
            }
            out.push(node);
        }
        out
    }

    /// Unmarked hosts: descend through single-child wrappers, then keep
    /// children with real text and block-level content.
    fn heuristic_messages(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        let mut container = root;
        loop {
            let children: Vec<NodeId> = doc
                .element_children(container)
                .into_iter()
                .filter(|c| !doc.is_extension_owned(*c))
                .collect();
            match children.as_slice() {
                [only] => container = *only,
                _ => break,
            }
        }
        doc.element_children(container)
            .into_iter()
            .filter(|c| !doc.is_extension_owned(*c))
            .filter(|c| normalize(&doc.text_content(*c)).chars().count() >= MIN_HEURISTIC_TEXT)
            .filter(|c| is_block(doc, *c) || doc.find_descendant(*c, is_block).is_some())
            .collect()
    }
}

impl ThreadAdapter for MarkedThreadAdapter {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn native_id_attr(&self) -> Option<&str> {
        self.profile.id_attr
    }

    fn transcript_root(&self, doc: &Document) -> Option<NodeId> {
        match self.profile.root_tag {
            Some(tag) => doc
                .find_descendant(doc.root(), |d, n| d.tag(n) == Some(tag))
                .filter(|root| self.has_marked_descendant(doc, *root)),
            None => self.largest_scroll_region(doc),
        }
    }

    fn message_elements(&self, doc: &Document, root: NodeId) -> Vec<(NodeId, String)> {
        let marked = self.outermost_marked(doc, root);
        if !marked.is_empty() {
            return marked
                .into_iter()
                .map(|node| {
                    let role = self.role_of(doc, node).unwrap_or_default();
                    (node, role)
                })
                .collect();
        }
        if !self.profile.heuristic {
            return Vec::new();
        }
        self.heuristic_messages(doc, root)
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                let role = if i % 2 == 0 { ROLE_USER } else { ROLE_ASSISTANT };
                (node, role.to_string())
            })
            .collect()
    }

    fn message_text(&self, doc: &Document, element: NodeId) -> Result<String, AdapterError> {
        if !doc.is_connected(element) {
            return Err(AdapterError::Detached(element));
        }
        let content = self.profile.content_classes.iter().find_map(|class| {
            doc.find_descendant(element, |d, n| has_class(d, n, class))
        });
        let text = doc.text_content(content.unwrap_or(element));
        if text.trim().is_empty() {
            return Err(AdapterError::NoContent(element));
        }
        Ok(text)
    }

    fn observe(&self, doc: &mut Document, root: NodeId) -> MutationStream {
        self.disconnect(doc);
        let (id, stream) = doc.observe(root, ObserveOptions::child_list_subtree());
        self.observer.set(Some(id));
        stream
    }

    fn disconnect(&self, doc: &mut Document) {
        if let Some(id) = self.observer.take() {
            doc.disconnect(id);
        }
    }
}
