use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::NodeId;

/// The first node that won an election during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderRecord {
    pub node_id: NodeId,
    pub term: u64,
    pub time_to_leader: Duration,
}

/// Run-wide state observed and mutated by every node of one cluster.
pub struct Scoreboard {
    start_time: Instant,
    stop: CancellationToken,
    tasks: TaskTracker,
    first_leader: watch::Sender<Option<LeaderRecord>>,
    votes_granted: AtomicU64,
    heartbeats_sent: AtomicU64,
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Scoreboard {
    pub fn new() -> Self {
        let (first_leader, _) = watch::channel(None);
        Self {
            start_time: Instant::now(),
            stop: CancellationToken::new(),
            tasks: TaskTracker::new(),
            first_leader,
            votes_granted: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
        }
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Signals every timer and heartbeat task of the run to exit at its next poll.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Stops the run and waits up to `grace` for all tracked tasks to exit.
    /// Returns `false` if some task was still running when the grace period ran out.
    pub async fn stop_and_wait(&self, grace: Duration) -> bool {
        self.stop();
        self.tasks.close();
        tokio::time::timeout(grace, self.tasks.wait()).await.is_ok()
    }

    /// First-writer-wins record of the run's leader. The check and the write happen under
    /// the watch channel's lock, so exactly one caller ever gets `true`.
    pub fn record_leader(&self, node_id: NodeId, term: u64) -> bool {
        let time_to_leader = self.start_time.elapsed();
        self.first_leader.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(LeaderRecord {
                node_id,
                term,
                time_to_leader,
            });
            true
        })
    }

    pub fn leader_elected(&self) -> bool {
        self.first_leader.borrow().is_some()
    }

    pub fn first_leader(&self) -> Option<LeaderRecord> {
        *self.first_leader.borrow()
    }

    pub fn time_to_leader(&self) -> Option<Duration> {
        self.first_leader().map(|record| record.time_to_leader)
    }

    pub fn subscribe_leader(&self) -> watch::Receiver<Option<LeaderRecord>> {
        self.first_leader.subscribe()
    }

    pub fn record_vote_granted(&self) {
        self.votes_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn votes_granted(&self) -> u64 {
        self.votes_granted.load(Ordering::Relaxed)
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent.load(Ordering::Relaxed)
    }
}
