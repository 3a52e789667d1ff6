// Election core
pub mod raft;

// Run driver, reports and configuration
pub mod config;
pub mod error;
pub mod simulation;

// Public exports
pub use config::SimulationConfig;
pub use error::SimError;
pub use raft::{ElectionConfig, Node, NodeRole, Scoreboard};
pub use simulation::{run_once, sweep, Cluster, RunOutcome};
