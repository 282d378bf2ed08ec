use tokio::sync::mpsc;

use super::NodeId;

/// Handle returned by [`super::Document::observe`]; pass it back to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Which mutations an observer wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub character_data: bool,
    pub attributes: bool,
    /// Deliver mutations anywhere below the root, not only on the root itself
    pub subtree: bool,
}

impl ObserveOptions {
    /// childList + subtree, the shape the watcher and adapters use
    pub const fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            character_data: false,
            attributes: false,
            subtree: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData,
    Attributes {
        name: String,
    },
}

/// One observed change. `target` is the parent for child-list changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn added(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { added, .. } => added,
            _ => &[],
        }
    }

    pub fn removed(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { removed, .. } => removed,
            _ => &[],
        }
    }

    fn wanted_by(&self, options: &ObserveOptions) -> bool {
        match self.kind {
            MutationKind::ChildList { .. } => options.child_list,
            MutationKind::CharacterData => options.character_data,
            MutationKind::Attributes { .. } => options.attributes,
        }
    }
}

pub type MutationStream = mpsc::UnboundedReceiver<MutationRecord>;

#[derive(Debug)]
pub(crate) struct ObserverEntry {
    pub id: ObserverId,
    pub root: NodeId,
    pub options: ObserveOptions,
    pub tx: mpsc::UnboundedSender<MutationRecord>,
}

impl ObserverEntry {
    /// `path` is the target followed by its ancestors.
    pub fn accepts(&self, record: &MutationRecord, path: &[NodeId]) -> bool {
        if !record.wanted_by(&self.options) {
            return false;
        }
        if self.options.subtree {
            path.contains(&self.root)
        } else {
            record.target == self.root
        }
    }
}
