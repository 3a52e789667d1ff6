use std::sync::Arc;

use log::info;
use tokio::time::{sleep, Instant};

use super::Node;

/// Level-triggered election timer: every poll interval, a non-leader whose deadline has
/// passed starts an election. `start_election` pushes the deadline forward, which keeps a
/// late poll from firing twice in a row.
pub(crate) async fn run_election_timer(node: Arc<Node>) {
    let stop = node.scoreboard().stop_token().clone();
    let poll = node.config().poll_interval;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = sleep(poll) => {}
        }

        if node.election_due(Instant::now()) {
            info!("Election timeout elapsed on node {}, starting election", node.id());
            node.start_election();
        }
    }
}
