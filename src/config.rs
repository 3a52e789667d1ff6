use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::raft::ElectionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub timeout_range: TimeoutRange,
    pub heartbeat_interval_secs: f64,
    pub poll_interval_secs: f64,
    /// Wall-clock budget for a single run to elect a leader.
    pub simulation_timeout_secs: f64,
    /// Upper bound on waiting for background tasks after the stop signal.
    pub shutdown_grace_secs: f64,
    pub cluster_sizes: ClusterSizes,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeoutRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

/// Either an explicit list of sizes or a `start..end` range walked by `step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterSizes {
    List(Vec<usize>),
    Range {
        start: usize,
        end: usize,
        step: usize,
    },
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timeout_range: TimeoutRange {
                min_secs: 0.15,
                max_secs: 0.30,
            },
            heartbeat_interval_secs: 0.1,
            poll_interval_secs: 0.05,
            simulation_timeout_secs: 45.0,
            shutdown_grace_secs: 1.0,
            cluster_sizes: ClusterSizes::Range {
                start: 3,
                end: 201,
                step: 10,
            },
            output: PathBuf::from("raft_simulation_results.csv"),
        }
    }
}

impl ClusterSizes {
    pub fn sizes(&self) -> Vec<usize> {
        match self {
            ClusterSizes::List(sizes) => sizes.clone(),
            ClusterSizes::Range { start, end, step } => {
                (*start..*end).step_by((*step).max(1)).collect()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let ClusterSizes::Range { step: 0, .. } = self {
            return Err(SimError::InvalidConfig(
                "cluster size step must be greater than zero".to_string(),
            ));
        }
        let sizes = self.sizes();
        if sizes.is_empty() {
            return Err(SimError::InvalidConfig(
                "no cluster sizes to simulate".to_string(),
            ));
        }
        if sizes.contains(&0) {
            return Err(SimError::InvalidConfig(
                "cluster size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl SimulationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn election(&self) -> Result<ElectionConfig> {
        let config = ElectionConfig::new(
            secs("timeout_range.min_secs", self.timeout_range.min_secs)?,
            secs("timeout_range.max_secs", self.timeout_range.max_secs)?,
            secs("heartbeat_interval_secs", self.heartbeat_interval_secs)?,
        )
        .with_poll_interval(secs("poll_interval_secs", self.poll_interval_secs)?);
        config.validate()?;
        Ok(config)
    }

    pub fn simulation_timeout(&self) -> Result<Duration> {
        secs("simulation_timeout_secs", self.simulation_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Result<Duration> {
        secs("shutdown_grace_secs", self.shutdown_grace_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.election()?;
        if self.simulation_timeout()?.is_zero() {
            return Err(SimError::InvalidConfig(
                "simulation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.shutdown_grace()?;
        self.cluster_sizes.validate()
    }
}

fn secs(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| SimError::InvalidConfig(format!("{field} = {value}: {e}")))
}

/// Command line knobs layered over the defaults or a JSON config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Lower bound of the randomized election timeout, in seconds
    #[arg(long)]
    pub timeout_min: Option<f64>,

    /// Upper bound of the randomized election timeout, in seconds
    #[arg(long)]
    pub timeout_max: Option<f64>,

    /// Interval between leader heartbeats, in seconds
    #[arg(long)]
    pub heartbeat: Option<f64>,

    /// Maximum time to wait for a leader in each run, in seconds
    #[arg(long)]
    pub simulation_timeout: Option<f64>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(min) = self.timeout_min {
            config.timeout_range.min_secs = min;
        }
        if let Some(max) = self.timeout_max {
            config.timeout_range.max_secs = max;
        }
        if let Some(heartbeat) = self.heartbeat {
            config.heartbeat_interval_secs = heartbeat;
        }
        if let Some(timeout) = self.simulation_timeout {
            config.simulation_timeout_secs = timeout;
        }

        Ok(config)
    }
}
