//! Thread header: stored name, tags, note and star plus live stats, placed
//! just before the transcript root.

use crate::dom::{Document, DomError, NodeId};
use crate::models::{ThreadMetadata, ThreadStats};

use super::{create_affordance, ensure_part, find_affordance_anywhere, set_bool_attr, set_hidden, sync_text_list};

pub const HEADER: &str = "header";

pub fn find_header(doc: &Document) -> Option<NodeId> {
    find_affordance_anywhere(doc, HEADER)
}

fn ensure_header(doc: &mut Document, container: NodeId) -> Result<NodeId, DomError> {
    if let Some(header) = find_header(doc) {
        if doc.parent(header) == doc.parent(container) {
            return Ok(header);
        }
        doc.remove(header)?;
    }
    let header = create_affordance(doc, "header", HEADER)?;
    ensure_part(doc, header, "button", "star")?;
    ensure_part(doc, header, "h2", "name")?;
    ensure_part(doc, header, "span", "stats")?;
    ensure_part(doc, header, "span", "tags")?;
    ensure_part(doc, header, "p", "note")?;
    match doc.parent(container) {
        Some(_) => doc.insert_before(container, header)?,
        None => return Err(DomError::Detached(container)),
    }
    Ok(header)
}

pub fn render_header(
    doc: &mut Document,
    container: NodeId,
    meta: &ThreadMetadata,
    stats: &ThreadStats,
) -> Result<NodeId, DomError> {
    let header = ensure_header(doc, container)?;

    let star = ensure_part(doc, header, "button", "star")?;
    set_bool_attr(doc, star, "aria-pressed", meta.is_starred())?;
    doc.set_text_content(star, if meta.is_starred() { "★" } else { "☆" })?;

    let name = ensure_part(doc, header, "h2", "name")?;
    doc.set_text_content(name, meta.name.as_deref().unwrap_or("Untitled thread"))?;

    let stats_node = ensure_part(doc, header, "span", "stats")?;
    doc.set_text_content(stats_node, &format_stats(stats))?;

    let tags = ensure_part(doc, header, "span", "tags")?;
    sync_text_list(doc, tags, "span", "tag", meta.tags())?;
    set_hidden(doc, tags, meta.tags().is_empty())?;

    let note = ensure_part(doc, header, "p", "note")?;
    let note_text = meta.note.as_deref().map(str::trim).unwrap_or("");
    doc.set_text_content(note, note_text)?;
    set_hidden(doc, note, note_text.is_empty())?;

    Ok(header)
}

pub fn remove_header(doc: &mut Document) -> Result<(), DomError> {
    match find_header(doc) {
        Some(header) => doc.remove(header),
        None => Ok(()),
    }
}

fn format_stats(stats: &ThreadStats) -> String {
    format!(
        "{} messages · {} prompts · {} chars",
        stats.messages, stats.prompts, stats.chars
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::find_part;
    use serde_json::json;

    #[test]
    fn test_header_sits_before_container() {
        let mut doc = Document::new();
        let main = doc.create_element("main");
        doc.append_child(doc.body(), main).unwrap();
        let meta = ThreadMetadata::from_json(&json!({"name": "Design", "starred": true, "tags": ["a"]}));
        let stats = ThreadStats {
            messages: 4,
            prompts: 2,
            chars: 100,
        };
        let header = render_header(&mut doc, main, &meta, &stats).unwrap();
        assert_eq!(doc.children(doc.body()), vec![header, main]);
        let name = find_part(&doc, header, "name").unwrap();
        assert_eq!(doc.text_content(name).trim(), "Design");
        let stats_node = find_part(&doc, header, "stats").unwrap();
        assert_eq!(doc.text_content(stats_node), "4 messages · 2 prompts · 100 chars");

        assert_eq!(render_header(&mut doc, main, &meta, &stats).unwrap(), header);
        remove_header(&mut doc).unwrap();
        assert!(find_header(&doc).is_none());
    }

    #[test]
    fn test_header_needs_attached_container() {
        let mut doc = Document::new();
        let orphan = doc.create_element("main");
        let result = render_header(&mut doc, orphan, &ThreadMetadata::default(), &ThreadStats::default());
        assert_eq!(result, Err(DomError::Detached(orphan)));
    }
}
