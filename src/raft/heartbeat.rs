use std::sync::Arc;

use log::{debug, trace};
use tokio::time::sleep;

use super::Node;

pub(crate) async fn run_heartbeat(leader: Arc<Node>) {
    let board = Arc::clone(leader.scoreboard());
    let stop = board.stop_token().clone();
    let interval = leader.config().heartbeat_interval;

    loop {
        while leader.is_leader() && !board.is_stopped() {
            for follower in leader.peers().others(leader.id()) {
                follower.reset_deadline();
                board.record_heartbeat();
            }
            trace!("Node {} sent heartbeats", leader.id());

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }

        leader.release_heartbeat();
        // A re-election that landed before the release found the slot taken and spawned
        // nothing, so this task picks the duty back up.
        if board.is_stopped() || !leader.is_leader() || !leader.claim_heartbeat() {
            break;
        }
    }

    debug!("Heartbeat task for node {} stopped", leader.id());
}
