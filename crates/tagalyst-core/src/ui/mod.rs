//! Injected affordances.
//!
//! Every node we add carries [`EXT_ATTR`] on its outermost element, naming
//! the affordance; inner elements are located by [`EXT_PART_ATTR`]. All
//! writes go through `ensure_*` helpers that only touch the tree when the
//! desired state differs, so repeated passes settle without mutations.

pub mod header;
pub mod nav;
pub mod notice;
pub mod overview;
pub mod panel;
pub mod toolbar;

use crate::constants::{EXT_ATTR, EXT_PART_ATTR};
use crate::dom::{Document, DomError, NodeId};

/// Create a detached affordance root named `name`.
pub fn create_affordance(doc: &mut Document, tag: &str, name: &str) -> Result<NodeId, DomError> {
    let node = doc.create_element(tag);
    doc.set_attr(node, EXT_ATTR, name)?;
    Ok(node)
}

/// Direct child of `parent` that is the affordance `name`
pub fn find_affordance(doc: &Document, parent: NodeId, name: &str) -> Option<NodeId> {
    doc.element_children(parent)
        .into_iter()
        .find(|c| doc.attr(*c, EXT_ATTR) == Some(name))
}

/// Any connected affordance named `name`
pub fn find_affordance_anywhere(doc: &Document, name: &str) -> Option<NodeId> {
    doc.find_descendant(doc.root(), |d, n| d.attr(n, EXT_ATTR) == Some(name))
}

pub fn find_part(doc: &Document, root: NodeId, part: &str) -> Option<NodeId> {
    doc.find_descendant(root, |d, n| d.attr(n, EXT_PART_ATTR) == Some(part))
}

/// Child of `parent` tagged `part`, appended when missing.
pub fn ensure_part(
    doc: &mut Document,
    parent: NodeId,
    tag: &str,
    part: &str,
) -> Result<NodeId, DomError> {
    let existing = doc
        .element_children(parent)
        .into_iter()
        .find(|c| doc.attr(*c, EXT_PART_ATTR) == Some(part));
    if let Some(node) = existing {
        return Ok(node);
    }
    let node = doc.create_element(tag);
    doc.set_attr(node, EXT_PART_ATTR, part)?;
    doc.append_child(parent, node)?;
    Ok(node)
}

pub fn set_bool_attr(doc: &mut Document, node: NodeId, name: &str, value: bool) -> Result<(), DomError> {
    doc.set_attr(node, name, if value { "true" } else { "false" })
}

/// Show or hide via the `hidden` attribute
pub fn set_hidden(doc: &mut Document, node: NodeId, hidden: bool) -> Result<(), DomError> {
    if hidden {
        doc.set_attr(node, "hidden", "")
    } else {
        doc.remove_attr(node, "hidden")
    }
}

/// Rebuild the children of `list` as `tag` elements with the given texts,
/// leaving it untouched when the texts already match.
pub fn sync_text_list(
    doc: &mut Document,
    list: NodeId,
    tag: &str,
    part: &str,
    texts: &[String],
) -> Result<Vec<NodeId>, DomError> {
    let current = doc.element_children(list);
    let unchanged = current.len() == texts.len()
        && current
            .iter()
            .zip(texts)
            .all(|(node, text)| doc.text_content(*node).trim() == text.trim());
    if unchanged {
        return Ok(current);
    }
    doc.clear_children(list)?;
    let mut nodes = Vec::with_capacity(texts.len());
    for text in texts {
        let node = doc.create_element(tag);
        doc.set_attr(node, EXT_PART_ATTR, part)?;
        doc.set_text_content(node, text)?;
        doc.append_child(list, node)?;
        nodes.push(node);
    }
    Ok(nodes)
}

/// Detach every injected affordance. Returns how many roots were removed.
pub fn remove_all(doc: &mut Document) -> usize {
    let roots: Vec<NodeId> = doc
        .descendant_elements(doc.root())
        .into_iter()
        .filter(|n| doc.has_attr(*n, EXT_ATTR))
        .filter(|n| doc.parent(*n).map_or(true, |p| !doc.is_extension_owned(p)))
        .collect();
    let mut removed = 0;
    for node in roots {
        match doc.remove(node) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to remove affordance {:?}: {}", node, e),
        }
    }
    removed
}
