//! Script-facing inspection API: serializable pair snapshots read from the
//! transcript root detected at call time.

use std::rc::Rc;

use serde::Serialize;

use crate::adapters::{AdapterRegistry, MessageAdapter, PairAdapter, ThreadAdapter};
use crate::dom::HostPage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSnapshot {
    pub key: String,
    pub role: String,
    pub text: String,
    pub chars: usize,
}

impl From<&MessageAdapter> for MessageSnapshot {
    fn from(message: &MessageAdapter) -> Self {
        Self {
            key: message.key.clone(),
            role: message.role.clone(),
            text: message.text.clone(),
            chars: message.char_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSnapshot {
    pub index: usize,
    pub query: Option<MessageSnapshot>,
    pub response: Option<MessageSnapshot>,
}

impl From<&PairAdapter> for PairSnapshot {
    fn from(pair: &PairAdapter) -> Self {
        Self {
            index: pair.index,
            query: pair.query.as_deref().map(MessageSnapshot::from),
            response: pair.response.as_deref().map(MessageSnapshot::from),
        }
    }
}

enum AdapterSource {
    Fixed(Rc<dyn ThreadAdapter>),
    Registry(Rc<AdapterRegistry>),
}

pub struct ScriptApi {
    page: Rc<HostPage>,
    source: AdapterSource,
}

impl ScriptApi {
    /// Pick the adapter from `adapters` for the page's location on every call
    pub fn new(page: Rc<HostPage>, adapters: Rc<AdapterRegistry>) -> Self {
        Self {
            page,
            source: AdapterSource::Registry(adapters),
        }
    }

    pub fn with_adapter(page: Rc<HostPage>, adapter: Rc<dyn ThreadAdapter>) -> Self {
        Self {
            page,
            source: AdapterSource::Fixed(adapter),
        }
    }

    fn adapter(&self) -> Option<Rc<dyn ThreadAdapter>> {
        match &self.source {
            AdapterSource::Fixed(adapter) => Some(Rc::clone(adapter)),
            AdapterSource::Registry(registry) => registry.select(&self.page.location()),
        }
    }

    fn pairs(&self) -> Vec<PairAdapter> {
        let Some(adapter) = self.adapter() else {
            return Vec::new();
        };
        let doc = self.page.document();
        match adapter.transcript_root(&doc) {
            Some(root) => adapter.pairs(&doc, root),
            None => Vec::new(),
        }
    }

    pub fn get_thread_pairs(&self) -> Vec<PairSnapshot> {
        self.pairs().iter().map(PairSnapshot::from).collect()
    }

    pub fn get_thread_pair(&self, index: usize) -> Option<PairSnapshot> {
        self.pairs().get(index).map(PairSnapshot::from)
    }
}
