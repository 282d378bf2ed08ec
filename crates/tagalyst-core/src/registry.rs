//! Per-pass cache of message metadata keyed by element node.
//!
//! Rebuilt from scratch by every render pass. Records whose element has left
//! the document are evicted lazily, on the next iteration.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::adapters::MessageAdapter;
use crate::dom::{Document, NodeId};
use crate::models::MessageValue;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageMeta {
    pub key: String,
    pub value: MessageValue,
    pub pair_index: Option<usize>,
    pub adapter: Option<Rc<MessageAdapter>>,
}

/// Field-wise update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct MetaPatch {
    pub key: Option<String>,
    pub value: Option<MessageValue>,
    pub pair_index: Option<usize>,
    pub adapter: Option<Rc<MessageAdapter>>,
}

/// Keyed by `NodeId`, so iteration follows node creation order.
#[derive(Debug, Default)]
pub struct MessageMetaRegistry {
    records: BTreeMap<NodeId, MessageMeta>,
}

impl MessageMetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, element: NodeId) -> Option<&MessageMeta> {
        self.records.get(&element)
    }

    pub fn delete(&mut self, element: NodeId) -> Option<MessageMeta> {
        self.records.remove(&element)
    }

    /// Visit every live record, evicting those whose element is detached.
    pub fn for_each(&mut self, doc: &Document, mut f: impl FnMut(NodeId, &MessageMeta)) {
        self.records.retain(|el, _| {
            let live = doc.is_connected(*el);
            if !live {
                tracing::debug!("Evicting metadata for detached node {:?}", el);
            }
            live
        });
        for (el, meta) in &self.records {
            f(*el, meta);
        }
    }

    /// Get or create the record for `element`, filling key and adapter when
    /// supplied.
    pub fn ensure(
        &mut self,
        element: NodeId,
        key: Option<&str>,
        adapter: Option<Rc<MessageAdapter>>,
    ) -> &mut MessageMeta {
        let meta = self.records.entry(element).or_default();
        if let Some(key) = key {
            meta.key = key.to_string();
        }
        if let Some(adapter) = adapter {
            meta.adapter = Some(adapter);
        }
        meta
    }

    pub fn update(&mut self, element: NodeId, patch: MetaPatch) -> &MessageMeta {
        let meta = self.records.entry(element).or_default();
        if let Some(key) = patch.key {
            meta.key = key;
        }
        if let Some(value) = patch.value {
            meta.value = value;
        }
        if let Some(pair_index) = patch.pair_index {
            meta.pair_index = Some(pair_index);
        }
        if let Some(adapter) = patch.adapter {
            meta.adapter = Some(adapter);
        }
        meta
    }

    /// The record's adapter, building and storing one with `make` if absent.
    pub fn resolve_adapter(
        &mut self,
        element: NodeId,
        make: impl FnOnce() -> Rc<MessageAdapter>,
    ) -> Rc<MessageAdapter> {
        let meta = self.records.entry(element).or_default();
        match &meta.adapter {
            Some(adapter) => Rc::clone(adapter),
            None => {
                let adapter = make();
                if meta.key.is_empty() {
                    meta.key = adapter.key.clone();
                }
                meta.adapter = Some(Rc::clone(&adapter));
                adapter
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(element: NodeId, key: &str) -> Rc<MessageAdapter> {
        Rc::new(MessageAdapter::new(element, key.to_string(), "user".to_string(), String::new()))
    }

    #[test]
    fn test_ensure_is_one_record_per_node() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        let mut registry = MessageMetaRegistry::new();
        registry.ensure(el, Some("k1"), None);
        registry.ensure(el, None, Some(adapter(el, "k1")));
        assert_eq!(registry.len(), 1);
        let meta = registry.get(el).unwrap();
        assert_eq!(meta.key, "k1");
        assert!(meta.adapter.is_some());
    }

    #[test]
    fn test_update_merges_fields() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        let mut registry = MessageMetaRegistry::new();
        registry.update(el, MetaPatch { key: Some("k".into()), pair_index: Some(3), ..MetaPatch::default() });
        let mut value = MessageValue::default();
        value.toggle_star();
        registry.update(el, MetaPatch { value: Some(value), ..MetaPatch::default() });

        let meta = registry.get(el).unwrap();
        assert_eq!(meta.key, "k");
        assert_eq!(meta.pair_index, Some(3));
        assert!(meta.value.is_starred());
    }

    #[test]
    fn test_for_each_evicts_detached() {
        let mut doc = Document::new();
        let live = doc.create_element("div");
        let gone = doc.create_element("div");
        doc.append_child(doc.body(), live).unwrap();
        doc.append_child(doc.body(), gone).unwrap();
        let mut registry = MessageMetaRegistry::new();
        registry.ensure(live, Some("a"), None);
        registry.ensure(gone, Some("b"), None);

        doc.remove(gone).unwrap();
        // Still present until the next iteration
        assert!(registry.get(gone).is_some());

        let mut seen = Vec::new();
        registry.for_each(&doc, |el, _| seen.push(el));
        assert_eq!(seen, vec![live]);
        assert!(registry.get(gone).is_none());
    }

    #[test]
    fn test_resolve_adapter_builds_once() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        let mut registry = MessageMetaRegistry::new();
        let mut built = 0;
        let first = registry.resolve_adapter(el, || {
            built += 1;
            adapter(el, "k")
        });
        let second = registry.resolve_adapter(el, || adapter(el, "other"));
        assert_eq!(built, 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.get(el).unwrap().key, "k");
        assert!(registry.delete(el).is_some());
        assert!(registry.is_empty());
    }
}
