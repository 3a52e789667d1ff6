use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub type NodeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Follower,
    Candidate,
    Leader,
}

/// Mutable election state of a single node.
///
/// `voted_for` is only ever set, never cleared when the term advances; a node that has
/// voted (or started an election) never grants another vote for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub role: NodeRole,
    pub current_term: u64,
    pub voted_for: Option<NodeId>,
    /// Only meaningful while `role == Candidate`.
    pub votes_received: u64,
    pub election_deadline: Instant,
    pub election_count: u64,
    /// Votes this node has granted to other candidates.
    pub votes_granted: u64,
}

impl NodeState {
    pub fn new(election_deadline: Instant) -> Self {
        Self {
            role: NodeRole::Follower,
            current_term: 0,
            voted_for: None,
            votes_received: 0,
            election_deadline,
            election_count: 0,
            votes_granted: 0,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, NodeRole::Leader)
    }
}
