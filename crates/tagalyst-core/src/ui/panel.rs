//! Top panel: tag list with counts, search query and result counter, and
//! the focus mode label. Lives at the top of `body`, outside the transcript.

use crate::config::Config;
use crate::dom::{Document, DomError, NodeId};
use crate::focus::{FocusMode, FocusService};
use crate::models::TagCount;

use super::{
    create_affordance, ensure_part, find_affordance, find_part, set_bool_attr, set_hidden,
};

pub const PANEL: &str = "panel";
const SEARCH_SECTION: &str = "search";
const TAGS_SECTION: &str = "tags";
const OVERVIEW_SECTION: &str = "overview";
const MODE_LABEL: &str = "mode";

pub struct PanelView<'a> {
    pub config: &'a Config,
    pub tags: &'a [TagCount],
    pub focus: &'a FocusService,
    /// Result count while a search is active
    pub search_count: Option<usize>,
}

pub fn find_panel(doc: &Document) -> Option<NodeId> {
    find_affordance(doc, doc.body(), PANEL)
}

fn ensure_panel(doc: &mut Document) -> Result<NodeId, DomError> {
    if let Some(panel) = find_panel(doc) {
        return Ok(panel);
    }
    let panel = create_affordance(doc, "aside", PANEL)?;
    ensure_part(doc, panel, "div", MODE_LABEL)?;
    ensure_part(doc, panel, "section", SEARCH_SECTION)?;
    ensure_part(doc, panel, "section", TAGS_SECTION)?;
    ensure_part(doc, panel, "section", OVERVIEW_SECTION)?;
    let body = doc.body();
    doc.prepend_child(body, panel)?;
    Ok(panel)
}

pub fn render_panel(doc: &mut Document, view: &PanelView<'_>) -> Result<NodeId, DomError> {
    let panel = ensure_panel(doc)?;
    update_mode_label(doc, view.focus.mode())?;

    let search = ensure_part(doc, panel, "section", SEARCH_SECTION)?;
    set_hidden(doc, search, !view.config.search_enabled)?;
    set_bool_attr(doc, search, "data-expanded", view.config.search_expands)?;
    let query = ensure_part(doc, search, "span", "query")?;
    doc.set_text_content(query, view.focus.search_query())?;
    update_search_count(doc, view.search_count)?;

    let tags = ensure_part(doc, panel, "section", TAGS_SECTION)?;
    set_hidden(doc, tags, !view.config.tags_enabled)?;
    set_bool_attr(doc, tags, "data-expanded", view.config.tags_expands)?;
    let list = ensure_part(doc, tags, "ul", "tag-list")?;
    sync_tag_list(doc, list, view.tags, view.focus)?;

    let overview = ensure_part(doc, panel, "section", OVERVIEW_SECTION)?;
    set_hidden(doc, overview, !view.config.overview_enabled)?;
    set_bool_attr(doc, overview, "data-expanded", view.config.overview_expands)?;

    Ok(panel)
}

fn sync_tag_list(
    doc: &mut Document,
    list: NodeId,
    tags: &[TagCount],
    focus: &FocusService,
) -> Result<(), DomError> {
    let current = doc.element_children(list);
    let same_tags = current.len() == tags.len()
        && current
            .iter()
            .zip(tags)
            .all(|(node, tag)| doc.attr(*node, "data-tag") == Some(tag.tag.as_str()));
    let items = if same_tags {
        current
    } else {
        doc.clear_children(list)?;
        let mut items = Vec::with_capacity(tags.len());
        for tag in tags {
            let item = doc.create_element("li");
            doc.set_attr(item, "data-tag", &tag.tag)?;
            let name = ensure_part(doc, item, "span", "tag-name")?;
            doc.set_text_content(name, &tag.tag)?;
            ensure_part(doc, item, "span", "tag-count")?;
            doc.append_child(list, item)?;
            items.push(item);
        }
        items
    };
    for (item, tag) in items.into_iter().zip(tags) {
        let count = ensure_part(doc, item, "span", "tag-count")?;
        doc.set_text_content(count, &tag.count.to_string())?;
        set_bool_attr(doc, item, "aria-selected", focus.is_tag_selected(&tag.tag))?;
    }
    Ok(())
}

pub fn update_mode_label(doc: &mut Document, mode: FocusMode) -> Result<(), DomError> {
    let Some(panel) = find_panel(doc) else {
        return Ok(());
    };
    let label = ensure_part(doc, panel, "div", MODE_LABEL)?;
    doc.set_attr(label, "data-focus-mode", mode.as_str())?;
    doc.set_text_content(label, mode.label())
}

/// Show the search result count, or clear it when no search is active
pub fn update_search_count(doc: &mut Document, count: Option<usize>) -> Result<(), DomError> {
    let Some(panel) = find_panel(doc) else {
        return Ok(());
    };
    let search = ensure_part(doc, panel, "section", SEARCH_SECTION)?;
    let counter = ensure_part(doc, search, "span", "count")?;
    match count {
        Some(1) => doc.set_text_content(counter, "1 match"),
        Some(n) => doc.set_text_content(counter, &format!("{} matches", n)),
        None => doc.set_text_content(counter, ""),
    }
}

pub fn search_count_text(doc: &Document) -> Option<String> {
    let panel = find_panel(doc)?;
    let counter = find_part(doc, panel, "count")?;
    Some(doc.text_content(counter))
}
