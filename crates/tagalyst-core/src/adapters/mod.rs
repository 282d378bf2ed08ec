//! Host adapters: the only place that knows how a chat page lays out its
//! messages. Everything downstream works on [`MessageAdapter`] and
//! [`PairAdapter`] values produced here.

mod marked;
mod registry;

use std::rc::Rc;

use crate::dom::{Document, MutationStream, NodeId};
use crate::identity::{derive_message_key, normalize};

pub use marked::{HostProfile, MarkedThreadAdapter};
pub use registry::{AdapterDescriptor, AdapterRegistry};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    #[error("message element {0:?} is no longer in the document")]
    Detached(NodeId),
    #[error("message element {0:?} has no readable content")]
    NoContent(NodeId),
}

/// One conversational turn on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageAdapter {
    /// Stable storage identity (native id or content hash)
    pub key: String,
    /// Opaque, case-significant role string from the host
    pub role: String,
    pub element: NodeId,
    /// Normalized text used for search, stats and badges
    pub text: String,
}

impl MessageAdapter {
    pub fn new(element: NodeId, key: String, role: String, text: String) -> Self {
        Self {
            key,
            role,
            element,
            text,
        }
    }

    /// Build an adapter for `element`, resolving its text through the thread
    /// adapter and falling back to the raw subtree text if that fails.
    pub fn resolve<A: ThreadAdapter + ?Sized>(
        doc: &Document,
        adapter: &A,
        element: NodeId,
        role: &str,
    ) -> Self {
        let raw = adapter.message_text(doc, element).unwrap_or_else(|e| {
            tracing::debug!("{} text extraction failed, using raw text: {}", adapter.name(), e);
            doc.text_content(element)
        });
        let key = derive_message_key(doc, element, adapter.native_id_attr());
        Self::new(element, key, role.to_string(), normalize(&raw))
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A query and its response, grouped positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct PairAdapter {
    pub index: usize,
    pub query: Option<Rc<MessageAdapter>>,
    pub response: Option<Rc<MessageAdapter>>,
}

impl PairAdapter {
    pub fn messages(&self) -> impl Iterator<Item = &Rc<MessageAdapter>> {
        self.query.iter().chain(self.response.iter())
    }
}

/// Every two consecutive messages form a pair; a trailing query pairs with
/// nothing. Runs of same-role messages are not special-cased.
pub fn pair_positionally(messages: &[Rc<MessageAdapter>]) -> Vec<PairAdapter> {
    messages
        .chunks(2)
        .enumerate()
        .map(|(index, chunk)| PairAdapter {
            index,
            query: chunk.first().cloned(),
            response: chunk.get(1).cloned(),
        })
        .collect()
}

/// Contract between the engine and one host application's page structure.
///
/// Implementors provide discovery (`transcript_root`, `message_elements`,
/// `message_text`) and observation; pairing and navigation helpers have
/// positional defaults that an adapter may override.
pub trait ThreadAdapter {
    fn name(&self) -> &str;

    /// Attribute carrying the host's own message id, if it has one
    fn native_id_attr(&self) -> Option<&str> {
        None
    }

    fn transcript_root(&self, doc: &Document) -> Option<NodeId>;

    /// Message elements below `root` with their roles, in document order
    fn message_elements(&self, doc: &Document, root: NodeId) -> Vec<(NodeId, String)>;

    fn message_text(&self, doc: &Document, element: NodeId) -> Result<String, AdapterError>;

    fn messages(&self, doc: &Document, root: NodeId) -> Vec<Rc<MessageAdapter>> {
        self.message_elements(doc, root)
            .into_iter()
            .map(|(el, role)| Rc::new(MessageAdapter::resolve(doc, self, el, &role)))
            .collect()
    }

    /// Group already resolved messages into pairs
    fn pair_messages(&self, messages: &[Rc<MessageAdapter>]) -> Vec<PairAdapter> {
        pair_positionally(messages)
    }

    fn pairs(&self, doc: &Document, root: NodeId) -> Vec<PairAdapter> {
        self.pair_messages(&self.messages(doc, root))
    }

    /// Navigation anchors: the query side of each pair
    fn prompt_messages(&self, doc: &Document, root: NodeId) -> Vec<Rc<MessageAdapter>> {
        self.pairs(doc, root)
            .into_iter()
            .filter_map(|p| p.query)
            .collect()
    }

    fn navigation_messages(&self, doc: &Document, root: NodeId) -> Vec<Rc<MessageAdapter>> {
        let prompts = self.prompt_messages(doc, root);
        if prompts.is_empty() {
            self.messages(doc, root)
        } else {
            prompts
        }
    }

    fn pair_at(&self, doc: &Document, root: NodeId, index: usize) -> Option<PairAdapter> {
        self.pairs(doc, root).into_iter().nth(index)
    }

    /// Start observing `root`; replaces any earlier observation.
    fn observe(&self, doc: &mut Document, root: NodeId) -> MutationStream;

    fn disconnect(&self, doc: &mut Document);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ObserveOptions;

    /// Every element child of the root is a message; `responses_only`
    /// pairs each message as a lone response.
    struct ChildAdapter {
        responses_only: bool,
    }

    impl ThreadAdapter for ChildAdapter {
        fn name(&self) -> &str {
            "child"
        }

        fn transcript_root(&self, doc: &Document) -> Option<NodeId> {
            Some(doc.body())
        }

        fn message_elements(&self, doc: &Document, root: NodeId) -> Vec<(NodeId, String)> {
            doc.element_children(root)
                .into_iter()
                .map(|c| (c, doc.attr(c, "data-role").unwrap_or_default().to_string()))
                .collect()
        }

        fn message_text(&self, doc: &Document, element: NodeId) -> Result<String, AdapterError> {
            Ok(doc.text_content(element))
        }

        fn pair_messages(&self, messages: &[Rc<MessageAdapter>]) -> Vec<PairAdapter> {
            if !self.responses_only {
                return pair_positionally(messages);
            }
            messages
                .iter()
                .enumerate()
                .map(|(index, m)| PairAdapter {
                    index,
                    query: None,
                    response: Some(Rc::clone(m)),
                })
                .collect()
        }

        fn observe(&self, doc: &mut Document, root: NodeId) -> MutationStream {
            doc.observe(root, ObserveOptions::child_list_subtree()).1
        }

        fn disconnect(&self, _doc: &mut Document) {}
    }

    fn thread(texts: &[(&str, &str)]) -> Document {
        let mut doc = Document::new();
        for (role, text) in texts {
            let el = doc.create_element("div");
            doc.set_attr(el, "data-role", role).unwrap();
            let t = doc.create_text(text);
            doc.append_child(el, t).unwrap();
            doc.append_child(doc.body(), el).unwrap();
        }
        doc
    }

    fn texts(messages: &[Rc<MessageAdapter>]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn test_pair_at_bounds() {
        let doc = thread(&[("user", "q1"), ("assistant", "r1"), ("user", "q2")]);
        let adapter = ChildAdapter { responses_only: false };
        let root = doc.body();

        let first = adapter.pair_at(&doc, root, 0).unwrap();
        assert_eq!(first.query.as_ref().unwrap().text, "q1");
        assert_eq!(first.response.as_ref().unwrap().text, "r1");

        let trailing = adapter.pair_at(&doc, root, 1).unwrap();
        assert_eq!(trailing.index, 1);
        assert_eq!(trailing.query.as_ref().unwrap().text, "q2");
        assert!(trailing.response.is_none());

        assert!(adapter.pair_at(&doc, root, 2).is_none());
    }

    #[test]
    fn test_navigation_messages_prefers_prompts() {
        let doc = thread(&[("user", "q1"), ("assistant", "r1"), ("user", "q2")]);
        let adapter = ChildAdapter { responses_only: false };
        let nav = adapter.navigation_messages(&doc, doc.body());
        assert_eq!(texts(&nav), vec!["q1", "q2"]);
    }

    #[test]
    fn test_navigation_messages_falls_back_without_prompts() {
        let doc = thread(&[("assistant", "a1"), ("assistant", "a2"), ("assistant", "a3")]);
        let adapter = ChildAdapter { responses_only: true };
        assert!(adapter.prompt_messages(&doc, doc.body()).is_empty());
        let nav = adapter.navigation_messages(&doc, doc.body());
        assert_eq!(texts(&nav), vec!["a1", "a2", "a3"]);
    }

    fn adapter(doc: &mut Document, text: &str) -> Rc<MessageAdapter> {
        let el = doc.create_element("div");
        Rc::new(MessageAdapter::new(el, text.to_string(), "user".to_string(), text.to_string()))
    }

    #[test]
    fn test_pair_positionally_with_trailing_query() {
        let mut doc = Document::new();
        let messages: Vec<_> = ["q1", "r1", "q2"].iter().map(|t| adapter(&mut doc, t)).collect();
        let pairs = pair_positionally(&messages);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].index, 0);
        assert_eq!(pairs[0].query.as_ref().unwrap().key, "q1");
        assert_eq!(pairs[0].response.as_ref().unwrap().key, "r1");
        assert_eq!(pairs[1].index, 1);
        assert_eq!(pairs[1].query.as_ref().unwrap().key, "q2");
        assert!(pairs[1].response.is_none());
        assert_eq!(pairs[1].messages().count(), 1);
    }

    #[test]
    fn test_pair_positionally_empty() {
        assert!(pair_positionally(&[]).is_empty());
    }
}
