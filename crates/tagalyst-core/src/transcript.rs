//! One snapshot of the conversation: messages, pairs and the reverse lookup
//! from message node to pair index.

use std::collections::HashMap;
use std::rc::Rc;

use crate::adapters::{MessageAdapter, PairAdapter, ThreadAdapter};
use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub messages: Vec<Rc<MessageAdapter>>,
    pub pairs: Vec<PairAdapter>,
    pub pair_index_by_message: HashMap<NodeId, usize>,
}

impl Transcript {
    pub fn pair_index(&self, element: NodeId) -> Option<usize> {
        self.pair_index_by_message.get(&element).copied()
    }

    pub fn prompt_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.query.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Resolve adapters under `root` and group them into pairs.
///
/// Never fails: missing text falls back to raw subtree text inside
/// [`MessageAdapter::resolve`], and an empty root yields an empty transcript.
pub fn build_transcript(doc: &Document, root: NodeId, adapter: &dyn ThreadAdapter) -> Transcript {
    let messages = adapter.messages(doc, root);
    let pairs = adapter.pair_messages(&messages);
    let mut pair_index_by_message = HashMap::with_capacity(messages.len());
    for pair in &pairs {
        for message in pair.messages() {
            pair_index_by_message.insert(message.element, pair.index);
        }
    }
    Transcript {
        messages,
        pairs,
        pair_index_by_message,
    }
}
