//! Per-message toolbar: focus button, pair badge, length badge, tag chips
//! and note indicator, prepended inside the message element.

use crate::dom::{Document, DomError, NodeId};
use crate::focus::FocusMode;
use crate::models::MessageValue;

use super::{create_affordance, ensure_part, find_affordance, find_part, set_bool_attr, set_hidden, sync_text_list};

pub const TOOLBAR: &str = "toolbar";
pub const FOCUS_BUTTON: &str = "focus";
const PAIR_BADGE: &str = "pair";
const LENGTH_BADGE: &str = "length";
const TAG_LIST: &str = "tags";
const NOTE_INDICATOR: &str = "note";

/// Everything a toolbar displays for one message in one pass
#[derive(Debug, Clone, Copy)]
pub struct ToolbarView<'a> {
    pub key: &'a str,
    pub pair_index: Option<usize>,
    pub char_count: usize,
    pub value: &'a MessageValue,
    pub mode: FocusMode,
    pub focused: bool,
}

pub fn toolbar_of(doc: &Document, message: NodeId) -> Option<NodeId> {
    find_affordance(doc, message, TOOLBAR)
}

/// Toolbar of `message`, prepended when missing. Never duplicates.
pub fn ensure_toolbar(doc: &mut Document, message: NodeId) -> Result<NodeId, DomError> {
    if let Some(existing) = toolbar_of(doc, message) {
        return Ok(existing);
    }
    let toolbar = create_affordance(doc, "div", TOOLBAR)?;
    let button = ensure_part(doc, toolbar, "button", FOCUS_BUTTON)?;
    doc.set_attr(button, "type", "button")?;
    ensure_part(doc, toolbar, "span", PAIR_BADGE)?;
    ensure_part(doc, toolbar, "span", LENGTH_BADGE)?;
    ensure_part(doc, toolbar, "span", TAG_LIST)?;
    ensure_part(doc, toolbar, "span", NOTE_INDICATOR)?;
    doc.prepend_child(message, toolbar)?;
    Ok(toolbar)
}

pub fn render_toolbar(doc: &mut Document, message: NodeId, view: &ToolbarView<'_>) -> Result<NodeId, DomError> {
    let toolbar = ensure_toolbar(doc, message)?;
    doc.set_attr(toolbar, "data-key", view.key)?;
    set_bool_attr(doc, toolbar, "data-starred", view.value.is_starred())?;
    set_bool_attr(doc, toolbar, "data-highlighted", view.value.has_highlights())?;

    let pair = ensure_part(doc, toolbar, "span", PAIR_BADGE)?;
    match view.pair_index {
        Some(index) => {
            doc.set_text_content(pair, &format!("#{}", index + 1))?;
            set_hidden(doc, pair, false)?;
        }
        None => {
            doc.set_text_content(pair, "")?;
            set_hidden(doc, pair, true)?;
        }
    }

    let length = ensure_part(doc, toolbar, "span", LENGTH_BADGE)?;
    doc.set_text_content(length, &format_length(view.char_count))?;

    let tags = ensure_part(doc, toolbar, "span", TAG_LIST)?;
    sync_text_list(doc, tags, "span", "tag", view.value.tags())?;
    set_hidden(doc, tags, view.value.tags().is_empty())?;

    let note = ensure_part(doc, toolbar, "span", NOTE_INDICATOR)?;
    match view.value.note() {
        Some(text) => {
            doc.set_text_content(note, "✎")?;
            doc.set_attr(note, "title", text)?;
            set_hidden(doc, note, false)?;
        }
        None => {
            doc.set_text_content(note, "")?;
            doc.remove_attr(note, "title")?;
            set_hidden(doc, note, true)?;
        }
    }

    update_focus_button(doc, toolbar, view.mode, view.focused)?;
    Ok(toolbar)
}

/// Sync one focus button with the current mode and membership
pub fn update_focus_button(
    doc: &mut Document,
    toolbar: NodeId,
    mode: FocusMode,
    focused: bool,
) -> Result<(), DomError> {
    let Some(button) = find_part(doc, toolbar, FOCUS_BUTTON) else {
        return Ok(());
    };
    set_bool_attr(doc, button, "aria-pressed", focused)?;
    doc.set_attr(button, "data-focus-mode", mode.as_str())?;
    doc.set_text_content(button, mode.glyph(focused))
}

pub fn remove_toolbar(doc: &mut Document, message: NodeId) -> Result<(), DomError> {
    match toolbar_of(doc, message) {
        Some(toolbar) => doc.remove(toolbar),
        None => Ok(()),
    }
}

fn format_length(chars: usize) -> String {
    if chars >= 1000 {
        format!("{:.1}k chars", chars as f64 / 1000.0)
    } else {
        format!("{} chars", chars)
    }
}
