//! Sidebar labels: stored thread name and star next to host links to
//! threads, fetched with one bulk read.

use std::collections::HashSet;

use crate::config::Config;
use crate::constants::EXT_ATTR;
use crate::dom::{Document, DomError, HostPage, NodeId};
use crate::identity::thread_storage_key;
use crate::models::ThreadMetadata;
use crate::page::thread_link_target;
use crate::storage::{StorageGateway, StorageRecord};
use crate::ui::{create_affordance, find_affordance};

pub const SIDEBAR_LABEL: &str = "sidebar-label";

/// Host links that point at threads, with their thread ids
fn thread_links(doc: &Document, config: &Config) -> Vec<(NodeId, String)> {
    doc.descendant_elements(doc.root())
        .into_iter()
        .filter(|n| doc.tag(*n) == Some("a") && !doc.is_extension_owned(*n))
        .filter_map(|n| {
            let (id, in_project) = thread_link_target(doc.attr(n, "href")?)?;
            if in_project && !config.project_labels_enabled {
                return None;
            }
            Some((n, id))
        })
        .collect()
}

fn label_text(meta: &ThreadMetadata) -> Option<String> {
    let star = if meta.is_starred() { "★" } else { "" };
    let name = meta.name.as_deref().unwrap_or("");
    let text = format!("{} {}", star, name).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn apply_label(doc: &mut Document, link: NodeId, text: Option<&str>) -> Result<(), DomError> {
    let existing = find_affordance(doc, link, SIDEBAR_LABEL);
    match (existing, text) {
        (Some(label), Some(text)) => doc.set_text_content(label, text),
        (Some(label), None) => doc.remove(label),
        (None, Some(text)) => {
            let label = create_affordance(doc, "span", SIDEBAR_LABEL)?;
            doc.set_text_content(label, text)?;
            doc.append_child(link, label)
        }
        (None, None) => Ok(()),
    }
}

/// Remove every sidebar label
pub fn clear_labels(doc: &mut Document) -> usize {
    let labels: Vec<NodeId> = doc
        .descendant_elements(doc.root())
        .into_iter()
        .filter(|n| doc.attr(*n, EXT_ATTR) == Some(SIDEBAR_LABEL))
        .collect();
    let count = labels.len();
    for label in labels {
        if let Err(e) = doc.remove(label) {
            tracing::warn!("Failed to remove sidebar label: {}", e);
        }
    }
    count
}

/// Label every thread link in the page. Returns the number of labels shown.
pub async fn refresh_labels(page: &HostPage, storage: &dyn StorageGateway, config: &Config) -> usize {
    if !config.sidebar_labels_enabled {
        clear_labels(&mut page.document_mut());
        return 0;
    }
    let links = thread_links(&page.document(), config);
    if links.is_empty() {
        return 0;
    }
    let keys: Vec<String> = links
        .iter()
        .map(|(_, id)| thread_storage_key(id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let record = match storage.read(&keys).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("Sidebar metadata read failed: {}", e);
            StorageRecord::new()
        }
    };

    let mut doc = page.document_mut();
    let mut shown = 0;
    for (link, id) in links {
        // The host may have replaced the link while we were reading
        if !doc.is_connected(link) {
            continue;
        }
        let text = record
            .get(&thread_storage_key(&id))
            .map(ThreadMetadata::from_json)
            .and_then(|meta| label_text(&meta));
        if text.is_some() {
            shown += 1;
        }
        if let Err(e) = apply_label(&mut doc, link, text.as_deref()) {
            tracing::warn!("Sidebar label for {} failed: {}", id, e);
        }
    }
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{PageFixture, SidebarLink};
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn page() -> HostPage {
        PageFixture {
            location: "https://chatgpt.com/c/a".to_string(),
            turns: Vec::new(),
            sidebar: vec![
                SidebarLink { href: "/c/a".into(), title: "A".into() },
                SidebarLink { href: "/c/b".into(), title: "B".into() },
                SidebarLink { href: "/g/p/c/c".into(), title: "C".into() },
                SidebarLink { href: "/library".into(), title: "Library".into() },
            ],
        }
        .build()
        .unwrap()
    }

    fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.insert(&thread_storage_key("a"), json!({"name": "Alpha", "starred": true}));
        storage.insert(&thread_storage_key("c"), json!({"name": "Gamma"}));
        storage
    }

    #[tokio::test]
    async fn test_refresh_labels_single_read() {
        let page = page();
        let storage = storage();
        let shown = refresh_labels(&page, &storage, &Config::default()).await;
        assert_eq!(shown, 2);
        assert_eq!(storage.read_count(), 1);

        // Labels are ours and idempotent
        assert_eq!(refresh_labels(&page, &storage, &Config::default()).await, 2);
        let doc = page.document();
        let labels: Vec<String> = doc
            .descendant_elements(doc.root())
            .into_iter()
            .filter(|n| doc.attr(*n, EXT_ATTR) == Some(SIDEBAR_LABEL))
            .map(|n| doc.text_content(n))
            .collect();
        assert_eq!(labels, vec!["★ Alpha".to_string(), "Gamma".to_string()]);
    }

    #[tokio::test]
    async fn test_project_labels_flag() {
        let page = page();
        let storage = storage();
        let config = Config {
            project_labels_enabled: false,
            ..Config::default()
        };
        assert_eq!(refresh_labels(&page, &storage, &config).await, 1);
    }

    #[tokio::test]
    async fn test_disabled_clears_labels() {
        let page = page();
        let storage = storage();
        refresh_labels(&page, &storage, &Config::default()).await;
        let config = Config {
            sidebar_labels_enabled: false,
            ..Config::default()
        };
        assert_eq!(refresh_labels(&page, &storage, &config).await, 0);
        assert_eq!(clear_labels(&mut page.document_mut()), 0);
    }
}
