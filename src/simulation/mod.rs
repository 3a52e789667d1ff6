mod report;

pub use self::report::{write_report, write_report_to, REPORT_HEADERS};

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::raft::{ElectionConfig, Node, NodeId, NodeRole, PeerList, Scoreboard};

/// What a single run produced, harvested after its tasks stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub cluster_size: usize,
    pub leader: Option<NodeId>,
    pub time_to_leader: Option<Duration>,
    /// Elections started across all nodes.
    pub elections_held: u64,
    /// Nodes holding the leader role at the end of the run.
    pub leaders: usize,
    pub votes_granted: u64,
    pub heartbeats_sent: u64,
}

impl RunOutcome {
    /// A run is stable when a single election was enough.
    pub fn is_stable(&self) -> bool {
        self.elections_held == 1
    }
}

/// A set of nodes sharing one scoreboard and one peer list for the duration of a run.
pub struct Cluster {
    nodes: Vec<Arc<Node>>,
    scoreboard: Arc<Scoreboard>,
}

impl Cluster {
    /// Creates `size` nodes with ids `0..size` and wires their shared peer list. Each
    /// node's election timer is already running when this returns.
    pub fn launch(size: usize, config: ElectionConfig) -> Result<Self> {
        if size == 0 {
            return Err(SimError::InvalidConfig(
                "cluster size must be at least 1".to_string(),
            ));
        }
        config.validate()?;

        let scoreboard = Arc::new(Scoreboard::new());
        let peers = Arc::new(PeerList::new());
        let nodes: Vec<Arc<Node>> = (0..size as NodeId)
            .map(|id| Node::spawn(id, Arc::clone(&peers), Arc::clone(&scoreboard), config))
            .collect();
        peers.populate(&nodes)?;

        Ok(Self { nodes, scoreboard })
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn scoreboard(&self) -> &Arc<Scoreboard> {
        &self.scoreboard
    }

    /// Waits until some node is recorded as leader, or `timeout` elapses.
    pub async fn wait_for_leader(&self, timeout: Duration) -> bool {
        let mut leader = self.scoreboard.subscribe_leader();
        let elected = tokio::time::timeout(timeout, leader.wait_for(Option::is_some)).await;
        matches!(elected, Ok(Ok(_)))
    }

    /// Signals every task to stop and waits for them, up to `grace`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let stopped = self.scoreboard.stop_and_wait(grace).await;
        if !stopped {
            warn!(
                "{} background tasks still running after {:?}",
                self.scoreboard.tasks().len(),
                grace
            );
        }
        stopped
    }

    pub fn outcome(&self) -> RunOutcome {
        let leader = self.scoreboard.first_leader();
        RunOutcome {
            cluster_size: self.nodes.len(),
            leader: leader.map(|record| record.node_id),
            time_to_leader: leader.map(|record| record.time_to_leader),
            elections_held: self.nodes.iter().map(|node| node.election_count()).sum(),
            leaders: self
                .nodes
                .iter()
                .filter(|node| node.role() == NodeRole::Leader)
                .count(),
            votes_granted: self.scoreboard.votes_granted(),
            heartbeats_sent: self.scoreboard.heartbeats_sent(),
        }
    }
}

pub async fn run_once(size: usize, config: &SimulationConfig) -> Result<RunOutcome> {
    let timeout = config.simulation_timeout()?;
    let grace = config.shutdown_grace()?;
    let cluster = Cluster::launch(size, config.election()?)?;

    if !cluster.wait_for_leader(timeout).await {
        warn!("No leader elected in a cluster of {size} within {timeout:?}");
    }
    cluster.shutdown(grace).await;

    let outcome = cluster.outcome();
    info!(
        "Cluster of {}: leader={:?} time_to_leader={:?} elections={} stable={}",
        outcome.cluster_size,
        outcome.leader,
        outcome.time_to_leader,
        outcome.elections_held,
        outcome.is_stable()
    );
    Ok(outcome)
}

/// Runs one simulation per configured cluster size, one after another.
pub async fn sweep(config: &SimulationConfig) -> Result<Vec<RunOutcome>> {
    config.validate()?;

    let mut outcomes = Vec::new();
    for size in config.cluster_sizes.sizes() {
        outcomes.push(run_once(size, config).await?);
    }
    Ok(outcomes)
}
