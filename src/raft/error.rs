use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaftError {
    #[error("Election timeout minimum must be greater than zero")]
    ZeroTimeout,

    #[error("Invalid election timeout range: min {min:?} is greater than max {max:?}")]
    InvalidTimeoutRange { min: Duration, max: Duration },

    #[error("Heartbeat interval {heartbeat:?} must be shorter than the minimum election timeout {min:?}")]
    HeartbeatTooSlow { heartbeat: Duration, min: Duration },

    #[error("Heartbeat interval must be greater than zero")]
    ZeroHeartbeat,

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Peer list has already been populated")]
    PeersAlreadyPopulated,
}
