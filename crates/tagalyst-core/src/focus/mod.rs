//! Focus state machine: which lens (stars, tags or search) is active and
//! which messages fall inside it.

pub mod controller;

use std::collections::BTreeSet;
use std::rc::Rc;

use serde::Serialize;

use crate::adapters::MessageAdapter;
use crate::config::Config;
use crate::dom::Document;
use crate::registry::{MessageMeta, MessageMetaRegistry};
use crate::search::{any_contains_query, prepare_query, text_contains_query};

pub use controller::FocusController;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    #[default]
    Stars,
    Tags,
    Search,
}

impl FocusMode {
    /// Precedence is SEARCH > TAGS > STARS; a lens only counts when its
    /// feature is enabled.
    pub fn compute(config: &Config, has_tags: bool, has_query: bool) -> Self {
        if config.search_enabled && has_query {
            FocusMode::Search
        } else if config.tags_enabled && has_tags {
            FocusMode::Tags
        } else {
            FocusMode::Stars
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusMode::Stars => "stars",
            FocusMode::Tags => "tags",
            FocusMode::Search => "search",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FocusMode::Stars => "Starred",
            FocusMode::Tags => "Tagged",
            FocusMode::Search => "Search results",
        }
    }

    /// Glyph of a focus button in this mode
    pub fn glyph(&self, focused: bool) -> &'static str {
        match (self, focused) {
            (FocusMode::Stars, true) => "★",
            (FocusMode::Stars, false) => "☆",
            (FocusMode::Tags, true) => "●",
            (FocusMode::Tags, false) => "○",
            (FocusMode::Search, true) => "◆",
            (FocusMode::Search, false) => "◇",
        }
    }
}

/// Explicit instance, constructed at activation and reset on teardown.
#[derive(Debug, Default)]
pub struct FocusService {
    search_enabled: bool,
    tags_enabled: bool,
    /// Lowercased
    selected_tags: BTreeSet<String>,
    /// Normalized query as typed
    search_query: String,
    /// Prepared comparison copy of `search_query`
    search_lower: String,
    mode: FocusMode,
    nav_index: Option<usize>,
}

impl FocusService {
    pub fn new(config: &Config) -> Self {
        let mut service = Self::default();
        service.apply_config(config);
        service
    }

    pub fn mode(&self) -> FocusMode {
        self.mode
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn selected_tags(&self) -> impl Iterator<Item = &str> {
        self.selected_tags.iter().map(String::as_str)
    }

    pub fn nav_index(&self) -> Option<usize> {
        self.nav_index
    }

    pub fn set_search_query(&mut self, raw: &str) {
        self.search_query = crate::identity::normalize(raw);
        self.search_lower = prepare_query(raw);
        self.sync_mode();
    }

    /// Returns whether the tag is selected afterwards.
    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return false;
        }
        let selected = if self.selected_tags.remove(&tag) {
            false
        } else {
            self.selected_tags.insert(tag);
            true
        };
        self.sync_mode();
        selected
    }

    pub fn clear_tags(&mut self) {
        self.selected_tags.clear();
        self.sync_mode();
    }

    pub fn is_tag_selected(&self, tag: &str) -> bool {
        self.selected_tags.contains(&tag.trim().to_lowercase())
    }

    /// Recompute the mode from flags and state. Always invalidates the
    /// navigation cursor.
    pub fn sync_mode(&mut self) {
        let config = Config {
            search_enabled: self.search_enabled,
            tags_enabled: self.tags_enabled,
            ..Config::default()
        };
        self.mode = FocusMode::compute(
            &config,
            !self.selected_tags.is_empty(),
            !self.search_lower.is_empty(),
        );
        self.nav_index = None;
    }

    pub fn apply_config(&mut self, config: &Config) {
        self.search_enabled = config.search_enabled;
        self.tags_enabled = config.tags_enabled;
        self.sync_mode();
    }

    /// Drop selection and query; flags are kept.
    pub fn reset(&mut self) {
        self.selected_tags.clear();
        self.search_query.clear();
        self.search_lower.clear();
        self.sync_mode();
    }

    pub fn is_message_focused(&self, meta: &MessageMeta) -> bool {
        match self.mode {
            FocusMode::Stars => meta.value.is_starred(),
            FocusMode::Tags => {
                if self.selected_tags.is_empty() {
                    return false;
                }
                meta.value
                    .tags()
                    .iter()
                    .any(|t| self.selected_tags.contains(&t.to_lowercase()))
            }
            FocusMode::Search => {
                let text_hit = meta
                    .adapter
                    .as_ref()
                    .is_some_and(|a| text_contains_query(&a.text, &self.search_lower));
                text_hit
                    || any_contains_query(meta.value.tags(), &self.search_lower)
                    || meta
                        .value
                        .note()
                        .is_some_and(|n| text_contains_query(n, &self.search_lower))
            }
        }
    }

    /// Focused messages, top to bottom. Evicts detached nodes as a side effect.
    pub fn get_matches(
        &self,
        registry: &mut MessageMetaRegistry,
        doc: &Document,
    ) -> Vec<Rc<MessageAdapter>> {
        let mut matches: Vec<Rc<MessageAdapter>> = Vec::new();
        registry.for_each(doc, |_, meta| {
            if let Some(adapter) = &meta.adapter {
                if self.is_message_focused(meta) {
                    matches.push(Rc::clone(adapter));
                }
            }
        });
        let elements: Vec<_> = matches.iter().map(|m| m.element).collect();
        let positions = doc.vertical_positions(&elements);
        let mut ordered: Vec<(f64, Rc<MessageAdapter>)> =
            positions.into_iter().zip(matches).collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
        ordered.into_iter().map(|(_, m)| m).collect()
    }

    /// Move the cursor by `delta` and clamp it to `[0, total - 1]`.
    ///
    /// An unset cursor counts as -1, so the first step forward lands on 0.
    /// Returns `None` (and clears the cursor) when there is nothing to visit.
    pub fn adjust_nav(&mut self, delta: isize, total: usize) -> Option<usize> {
        if total == 0 {
            self.nav_index = None;
            return None;
        }
        let current = self.nav_index.map(|i| i as isize).unwrap_or(-1);
        let max = total as isize - 1;
        let next = current.saturating_add(delta).clamp(0, max) as usize;
        self.nav_index = Some(next);
        Some(next)
    }

    pub fn set_nav_index(&mut self, index: Option<usize>) {
        self.nav_index = index;
    }
}
