use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio::runtime::Handle;
use tokio::time::Instant;

use super::heartbeat::run_heartbeat;
use super::timer::run_election_timer;
use super::{ElectionClock, ElectionConfig, NodeId, NodeRole, NodeState, PeerList, Scoreboard};

/// One cluster member and its election state machine.
///
/// Every protocol operation takes the node's own lock for its local state change and
/// releases it before calling into another node, so a candidate receiving a vote from a
/// peer it is currently asking never deadlocks.
pub struct Node {
    id: NodeId,
    peers: Arc<PeerList>,
    scoreboard: Arc<Scoreboard>,
    config: ElectionConfig,
    clock: ElectionClock,
    runtime: Handle,
    state: Mutex<NodeState>,
    // Set while a heartbeat task owns this node; at most one runs at a time.
    heartbeating: AtomicBool,
}

impl Node {
    /// Creates a node and starts its election timer.
    ///
    /// Must be called from within a Tokio runtime; the timer and any later heartbeat task
    /// run on that runtime and are tracked by the scoreboard.
    pub fn spawn(
        id: NodeId,
        peers: Arc<PeerList>,
        scoreboard: Arc<Scoreboard>,
        config: ElectionConfig,
    ) -> Arc<Self> {
        let node = Arc::new(Self::new(id, peers, scoreboard, config, Handle::current()));
        node.spawn_task(run_election_timer(Arc::clone(&node)));
        node
    }

    pub(crate) fn new(
        id: NodeId,
        peers: Arc<PeerList>,
        scoreboard: Arc<Scoreboard>,
        config: ElectionConfig,
        runtime: Handle,
    ) -> Self {
        let clock = ElectionClock::from_config(&config);
        Self {
            id,
            peers,
            scoreboard,
            config,
            clock,
            runtime,
            state: Mutex::new(NodeState::new(clock.generate_deadline())),
            heartbeating: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    pub fn peers(&self) -> &Arc<PeerList> {
        &self.peers
    }

    pub fn scoreboard(&self) -> &Arc<Scoreboard> {
        &self.scoreboard
    }

    pub fn snapshot(&self) -> NodeState {
        self.lock_state().clone()
    }

    pub fn role(&self) -> NodeRole {
        self.lock_state().role
    }

    pub fn is_leader(&self) -> bool {
        self.lock_state().is_leader()
    }

    pub fn election_count(&self) -> u64 {
        self.lock_state().election_count
    }

    /// Becomes a candidate for the next term and asks every other member for its vote.
    /// Always bumps the term, even when already a candidate.
    pub fn start_election(self: &Arc<Self>) {
        let term = {
            let mut state = self.lock_state();
            state.role = NodeRole::Candidate;
            state.current_term += 1;
            state.voted_for = Some(self.id);
            state.votes_received = 1;
            state.election_deadline = self.clock.generate_deadline();
            state.election_count += 1;
            state.current_term
        };

        info!("Node {} starting election for term {}", self.id, term);

        for peer in self.peers.others(self.id) {
            peer.receive_vote_request(self.id, term);
        }

        self.check_if_won();
    }

    /// Grants the vote iff `term` is newer than ours and we have never voted. A refusal is
    /// silent: the candidate simply never hears back. Returns whether the vote was granted.
    pub fn receive_vote_request(&self, candidate_id: NodeId, term: u64) -> bool {
        let granted = {
            let mut state = self.lock_state();
            if term > state.current_term && state.voted_for.is_none() {
                state.voted_for = Some(candidate_id);
                state.current_term = term;
                state.votes_granted += 1;
                true
            } else {
                false
            }
        };

        if !granted {
            debug!(
                "Node {} declined vote for node {} in term {}",
                self.id, candidate_id, term
            );
            return false;
        }

        debug!(
            "Node {} granted vote to node {} for term {}",
            self.id, candidate_id, term
        );
        self.scoreboard.record_vote_granted();

        if let Some(candidate) = self.peers.find(candidate_id) {
            candidate.receive_vote();
        }

        true
    }

    /// Counts a granted vote. Votes are counted whatever the current role or term; only the
    /// victory check is restricted to candidates.
    pub fn receive_vote(self: &Arc<Self>) {
        let promoted = {
            let mut state = self.lock_state();
            state.votes_received += 1;
            self.promote_if_won(&mut state)
        };

        if let Some(term) = promoted {
            self.announce_leadership(term);
        }
    }

    /// Promotes a candidate holding a strict majority. No-op for any other role.
    pub fn check_if_won(self: &Arc<Self>) -> bool {
        let promoted = {
            let mut state = self.lock_state();
            self.promote_if_won(&mut state)
        };

        match promoted {
            Some(term) => {
                self.announce_leadership(term);
                true
            }
            None => false,
        }
    }

    /// Takes the leader role, records the run's first leader if none was recorded yet, and
    /// starts heartbeating. Calling it on a node that is already leader changes nothing.
    pub fn become_leader(self: &Arc<Self>) {
        let (was_leader, term) = {
            let mut state = self.lock_state();
            let was_leader = state.is_leader();
            state.role = NodeRole::Leader;
            (was_leader, state.current_term)
        };

        if !was_leader {
            self.announce_leadership(term);
        }
    }

    pub fn reset_deadline(&self) {
        let deadline = self.clock.generate_deadline();
        self.lock_state().election_deadline = deadline;
    }

    /// Whether the election timer should fire at `now`. Nothing fires before the peer list
    /// is wired.
    pub fn election_due(&self, now: Instant) -> bool {
        if !self.peers.is_populated() {
            return false;
        }
        let state = self.lock_state();
        !state.is_leader() && now > state.election_deadline
    }

    fn promote_if_won(&self, state: &mut NodeState) -> Option<u64> {
        let majority = (self.peers.cluster_size() / 2) as u64;
        if state.role == NodeRole::Candidate && state.votes_received > majority {
            state.role = NodeRole::Leader;
            Some(state.current_term)
        } else {
            None
        }
    }

    fn announce_leadership(self: &Arc<Self>, term: u64) {
        if self.scoreboard.record_leader(self.id, term) {
            info!(
                "Node {} elected leader for term {} after {:?}",
                self.id,
                term,
                self.scoreboard.start_time().elapsed()
            );
        } else {
            info!(
                "Node {} became leader for term {} after another leader was recorded",
                self.id, term
            );
        }

        if self.claim_heartbeat() {
            self.spawn_task(run_heartbeat(Arc::clone(self)));
        } else {
            debug!("Node {} already has a heartbeat task running", self.id);
        }
    }

    /// Returns true if the caller now owns the node's heartbeat slot.
    pub(crate) fn claim_heartbeat(&self) -> bool {
        !self.heartbeating.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release_heartbeat(&self) {
        self.heartbeating.store(false, Ordering::Release);
    }

    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.scoreboard.tasks().spawn_on(task, &self.runtime);
    }

    fn lock_state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Long enough that no deadline elapses while a test runs.
    fn quiet_config() -> ElectionConfig {
        ElectionConfig::new(
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_millis(20),
        )
    }

    fn cluster(size: u64) -> (Vec<Arc<Node>>, Arc<Scoreboard>) {
        let board = Arc::new(Scoreboard::new());
        let peers = Arc::new(PeerList::new());
        let nodes: Vec<Arc<Node>> = (0..size)
            .map(|id| {
                Arc::new(Node::new(
                    id,
                    Arc::clone(&peers),
                    Arc::clone(&board),
                    quiet_config(),
                    Handle::current(),
                ))
            })
            .collect();
        peers.populate(&nodes).expect("populate peers");
        (nodes, board)
    }

    async fn finish(board: &Scoreboard) {
        assert!(board.stop_and_wait(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn start_election_with_empty_peer_set_becomes_leader() {
        let board = Arc::new(Scoreboard::new());
        let peers = Arc::new(PeerList::new());
        peers.populate(&[]).expect("populate");
        let node = Arc::new(Node::new(
            0,
            peers,
            Arc::clone(&board),
            quiet_config(),
            Handle::current(),
        ));

        node.start_election();

        let state = node.snapshot();
        assert_eq!(state.role, NodeRole::Leader);
        assert_eq!(state.current_term, 1);
        assert_eq!(state.voted_for, Some(0));
        assert_eq!(state.votes_received, 1);
        assert_eq!(state.election_count, 1);
        assert_eq!(board.first_leader().map(|l| l.node_id), Some(0));
        finish(&board).await;
    }

    #[tokio::test]
    async fn start_election_collects_vote_from_fresh_peer() {
        let (nodes, board) = cluster(2);

        nodes[0].start_election();

        let candidate = nodes[0].snapshot();
        assert_eq!(candidate.votes_received, 2);
        assert_eq!(candidate.voted_for, Some(0));
        assert_eq!(candidate.role, NodeRole::Leader);

        let voter = nodes[1].snapshot();
        assert_eq!(voter.voted_for, Some(0));
        assert_eq!(voter.current_term, 1);
        assert_eq!(voter.votes_granted, 1);
        assert_eq!(voter.role, NodeRole::Follower);
        assert_eq!(board.votes_granted(), 1);
        finish(&board).await;
    }

    #[tokio::test]
    async fn start_election_bumps_term_when_already_candidate() {
        let (nodes, board) = cluster(3);
        for peer in &nodes[1..] {
            peer.lock_state().voted_for = Some(peer.id());
        }
        {
            let mut state = nodes[0].lock_state();
            state.role = NodeRole::Candidate;
            state.current_term = 4;
            state.votes_received = 1;
        }

        nodes[0].start_election();

        let state = nodes[0].snapshot();
        assert_eq!(state.role, NodeRole::Candidate);
        assert_eq!(state.current_term, 5);
        assert_eq!(state.votes_received, 1);
        assert_eq!(state.election_count, 1);
        assert!(!board.leader_elected());
        finish(&board).await;
    }

    #[tokio::test]
    async fn start_election_pushes_deadline_forward() {
        let (nodes, board) = cluster(3);
        let before = Instant::now();
        nodes[0].lock_state().election_deadline = before;

        nodes[0].start_election();

        assert!(nodes[0].snapshot().election_deadline >= before + Duration::from_secs(30));
        finish(&board).await;
    }

    #[tokio::test]
    async fn receive_vote_request_grants_for_higher_term() {
        let (nodes, board) = cluster(2);
        nodes[0].lock_state().current_term = 1;

        assert!(nodes[0].receive_vote_request(1, 2));

        let voter = nodes[0].snapshot();
        assert_eq!(voter.voted_for, Some(1));
        assert_eq!(voter.current_term, 2);
        // The callback reached the candidate even though it is not campaigning.
        assert_eq!(nodes[1].snapshot().votes_received, 1);
        assert_eq!(nodes[1].role(), NodeRole::Follower);
        finish(&board).await;
    }

    #[tokio::test]
    async fn receive_vote_request_declines_same_or_older_term() {
        let (nodes, board) = cluster(2);
        nodes[0].lock_state().current_term = 2;
        let before = nodes[0].snapshot();

        assert!(!nodes[0].receive_vote_request(1, 2));
        assert!(!nodes[0].receive_vote_request(1, 1));

        assert_eq!(nodes[0].snapshot(), before);
        assert_eq!(nodes[1].snapshot().votes_received, 0);
        assert_eq!(board.votes_granted(), 0);
        finish(&board).await;
    }

    #[tokio::test]
    async fn receive_vote_request_declines_after_voting() {
        let (nodes, board) = cluster(3);

        assert!(nodes[0].receive_vote_request(1, 1));
        assert!(!nodes[0].receive_vote_request(2, 5));
        assert!(!nodes[0].receive_vote_request(1, 6));

        let state = nodes[0].snapshot();
        assert_eq!(state.voted_for, Some(1));
        assert_eq!(state.current_term, 1);
        assert_eq!(state.votes_granted, 1);
        finish(&board).await;
    }

    #[tokio::test]
    async fn receive_vote_request_from_unknown_candidate_still_records_vote() {
        let (nodes, board) = cluster(1);

        assert!(nodes[0].receive_vote_request(42, 1));
        assert_eq!(nodes[0].snapshot().voted_for, Some(42));
        finish(&board).await;
    }

    #[tokio::test]
    async fn receive_vote_reaching_majority_promotes_candidate() {
        let (nodes, board) = cluster(3);
        {
            let mut state = nodes[0].lock_state();
            state.role = NodeRole::Candidate;
            state.current_term = 1;
            state.votes_received = 1;
        }

        nodes[0].receive_vote();

        assert_eq!(nodes[0].snapshot().votes_received, 2);
        assert!(nodes[0].is_leader());
        assert_eq!(board.first_leader().map(|l| l.term), Some(1));
        finish(&board).await;
    }

    #[tokio::test]
    async fn receive_vote_after_leaving_candidate_only_counts() {
        let (nodes, board) = cluster(3);
        nodes[0].lock_state().votes_received = 1;

        nodes[0].receive_vote();
        nodes[0].receive_vote();

        let state = nodes[0].snapshot();
        assert_eq!(state.votes_received, 3);
        assert_eq!(state.role, NodeRole::Follower);
        assert!(!board.leader_elected());
        finish(&board).await;
    }

    #[tokio::test]
    async fn check_if_won_is_noop_unless_candidate() {
        let (nodes, board) = cluster(3);
        nodes[0].lock_state().votes_received = 10;

        assert!(!nodes[0].check_if_won());
        assert_eq!(nodes[0].role(), NodeRole::Follower);
        assert!(board.tasks().is_empty());
        finish(&board).await;
    }

    #[tokio::test]
    async fn check_if_won_requires_strict_majority() {
        let (nodes, board) = cluster(4);
        {
            let mut state = nodes[0].lock_state();
            state.role = NodeRole::Candidate;
            state.votes_received = 2;
        }

        assert!(!nodes[0].check_if_won());
        assert_eq!(nodes[0].role(), NodeRole::Candidate);

        nodes[0].lock_state().votes_received = 3;
        assert!(nodes[0].check_if_won());
        assert_eq!(nodes[0].role(), NodeRole::Leader);

        // Already leader: the guard no longer applies.
        assert!(!nodes[0].check_if_won());
        finish(&board).await;
    }

    #[tokio::test]
    async fn become_leader_records_only_first_leader() {
        let (nodes, board) = cluster(3);

        nodes[1].become_leader();
        let first = board.first_leader().expect("first leader");
        tokio::time::sleep(Duration::from_millis(5)).await;
        nodes[2].become_leader();

        assert!(nodes[1].is_leader());
        assert!(nodes[2].is_leader());
        assert_eq!(board.first_leader(), Some(first));
        assert_eq!(first.node_id, 1);
        finish(&board).await;
    }

    #[tokio::test]
    async fn become_leader_twice_starts_one_heartbeat() {
        let (nodes, board) = cluster(2);

        nodes[0].become_leader();
        nodes[0].become_leader();

        assert_eq!(board.tasks().len(), 1);
        finish(&board).await;
    }

    #[tokio::test]
    async fn re_election_of_sole_member_keeps_one_heartbeat() {
        let (nodes, board) = cluster(1);

        nodes[0].start_election();
        tokio::task::yield_now().await;
        nodes[0].start_election();
        tokio::task::yield_now().await;

        let state = nodes[0].snapshot();
        assert_eq!(state.role, NodeRole::Leader);
        assert_eq!(state.current_term, 2);
        assert_eq!(board.tasks().len(), 1);
        finish(&board).await;
    }

    #[tokio::test]
    async fn heartbeat_restarts_after_previous_task_exits() {
        let (nodes, board) = cluster(2);

        nodes[0].become_leader();
        assert_eq!(board.tasks().len(), 1);

        nodes[0].lock_state().role = NodeRole::Follower;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(board.tasks().is_empty());

        nodes[0].become_leader();
        assert_eq!(board.tasks().len(), 1);
        finish(&board).await;
    }

    #[tokio::test]
    async fn leader_heartbeat_pushes_follower_deadlines() {
        let (nodes, board) = cluster(3);
        let stale = Instant::now();
        for follower in &nodes[1..] {
            follower.lock_state().election_deadline = stale;
        }

        nodes[0].become_leader();
        tokio::time::sleep(Duration::from_millis(50)).await;

        for follower in &nodes[1..] {
            assert!(follower.snapshot().election_deadline > stale + Duration::from_secs(29));
            assert!(!follower.election_due(Instant::now()));
        }
        assert!(board.heartbeats_sent() >= 2);
        finish(&board).await;
    }

    #[tokio::test]
    async fn election_due_follows_role_and_deadline() {
        let (nodes, board) = cluster(3);
        let now = Instant::now();

        assert!(!nodes[0].election_due(now));

        nodes[0].lock_state().election_deadline = now;
        assert!(nodes[0].election_due(now + Duration::from_millis(1)));

        nodes[0].lock_state().role = NodeRole::Leader;
        assert!(!nodes[0].election_due(now + Duration::from_millis(1)));
        finish(&board).await;
    }

    #[tokio::test]
    async fn election_due_waits_for_peer_list() {
        let board = Arc::new(Scoreboard::new());
        let node = Node::new(
            0,
            Arc::new(PeerList::new()),
            Arc::clone(&board),
            quiet_config(),
            Handle::current(),
        );
        let now = Instant::now();
        node.lock_state().election_deadline = now;

        assert!(!node.election_due(now + Duration::from_secs(1)));
    }

    #[test]
    fn populate_twice_is_rejected() {
        let peers = PeerList::new();
        peers.populate(&[]).expect("first populate");
        assert_eq!(
            peers.populate(&[]),
            Err(crate::raft::RaftError::PeersAlreadyPopulated)
        );
    }
}
