use std::sync::{Arc, OnceLock, Weak};

use super::{Node, NodeId, RaftError};

/// Fixed cluster membership, wired once after every node exists.
///
/// Holds weak handles so the membership view does not keep nodes alive; the run driver
/// owns the strong ones. The list includes the owning node itself, and its length is the
/// cluster size used for the majority check.
#[derive(Default)]
pub struct PeerList {
    members: OnceLock<Vec<Weak<Node>>>,
}

impl PeerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn populate(&self, nodes: &[Arc<Node>]) -> Result<(), RaftError> {
        self.members
            .set(nodes.iter().map(Arc::downgrade).collect())
            .map_err(|_| RaftError::PeersAlreadyPopulated)
    }

    pub fn is_populated(&self) -> bool {
        self.members.get().is_some()
    }

    pub fn cluster_size(&self) -> usize {
        self.members().len()
    }

    /// Every live member other than `id`.
    pub fn others(&self, id: NodeId) -> impl Iterator<Item = Arc<Node>> + '_ {
        self.members()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(move |node| node.id() != id)
    }

    pub fn find(&self, id: NodeId) -> Option<Arc<Node>> {
        self.members()
            .iter()
            .filter_map(Weak::upgrade)
            .find(|node| node.id() == id)
    }

    fn members(&self) -> &[Weak<Node>] {
        self.members.get().map(Vec::as_slice).unwrap_or(&[])
    }
}
