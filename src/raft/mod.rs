mod clock;
mod config;
mod error;
mod heartbeat;
mod node;
mod peers;
mod scoreboard;
mod state;
mod timer;

pub use self::clock::ElectionClock;
pub use self::config::ElectionConfig;
pub use self::error::RaftError;
pub use self::node::Node;
pub use self::peers::PeerList;
pub use self::scoreboard::{LeaderRecord, Scoreboard};
pub use self::state::{NodeId, NodeRole, NodeState};
