//! Overview ruler: a miniature vertical map of the thread with one marker
//! per message.

use serde::Serialize;

use crate::dom::{Document, DomError, NodeId};

use super::{create_affordance, find_affordance, set_bool_attr, set_hidden};

pub const OVERVIEW: &str = "overview";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewEntry {
    #[serde(skip)]
    pub element: NodeId,
    pub role: String,
    /// Relative position in `[0, 1]`, top to bottom
    pub ratio: f64,
    pub starred: bool,
    pub tagged: bool,
    pub focused: bool,
}

/// Entries for `items` (element, role, starred, tagged, focused), with
/// ratios from the elements' vertical positions.
pub fn layout_entries(
    doc: &Document,
    items: Vec<(NodeId, String, bool, bool, bool)>,
) -> Vec<OverviewEntry> {
    let elements: Vec<NodeId> = items.iter().map(|i| i.0).collect();
    let positions = doc.vertical_positions(&elements);
    let min = positions.iter().copied().fold(f64::INFINITY, f64::min);
    let max = positions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let mut entries: Vec<OverviewEntry> = items
        .into_iter()
        .zip(positions)
        .map(|((element, role, starred, tagged, focused), pos)| OverviewEntry {
            element,
            role,
            ratio: if span > 0.0 { (pos - min) / span } else { 0.0 },
            starred,
            tagged,
            focused,
        })
        .collect();
    entries.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));
    entries
}

#[derive(Debug, Default)]
pub struct OverviewRuler {
    entries: Vec<OverviewEntry>,
}

impl OverviewRuler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[OverviewEntry] {
        &self.entries
    }

    /// Replace the markers. The ruler is mounted on first use.
    pub fn update(&mut self, doc: &mut Document, entries: Vec<OverviewEntry>) -> Result<(), DomError> {
        let ruler = match find_affordance(doc, doc.body(), OVERVIEW) {
            Some(ruler) => ruler,
            None => {
                let ruler = create_affordance(doc, "div", OVERVIEW)?;
                let body = doc.body();
                doc.append_child(body, ruler)?;
                ruler
            }
        };
        set_hidden(doc, ruler, false)?;
        if entries != self.entries || doc.element_children(ruler).len() != entries.len() {
            doc.clear_children(ruler)?;
            for entry in &entries {
                let marker = doc.create_element("span");
                doc.set_attr(marker, "data-role", &entry.role)?;
                doc.set_attr(marker, "data-ratio", &format!("{:.4}", entry.ratio))?;
                set_bool_attr(doc, marker, "data-starred", entry.starred)?;
                set_bool_attr(doc, marker, "data-tagged", entry.tagged)?;
                set_bool_attr(doc, marker, "data-focused", entry.focused)?;
                doc.append_child(ruler, marker)?;
            }
        }
        self.entries = entries;
        Ok(())
    }

    /// Drop all markers and unmount.
    pub fn reset(&mut self, doc: &mut Document) -> Result<(), DomError> {
        self.entries.clear();
        match find_affordance(doc, doc.body(), OVERVIEW) {
            Some(ruler) => doc.remove(ruler),
            None => Ok(()),
        }
    }

    /// Forget markers without touching the document (after a bulk removal).
    pub fn forget(&mut self) {
        self.entries.clear();
    }

    /// Message closest to a click/drag position on the ruler
    pub fn message_at_ratio(&self, ratio: f64) -> Option<NodeId> {
        let ratio = ratio.clamp(0.0, 1.0);
        self.entries
            .iter()
            .min_by(|a, b| (a.ratio - ratio).abs().total_cmp(&(b.ratio - ratio).abs()))
            .map(|e| e.element)
    }
}
