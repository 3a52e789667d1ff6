use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use raft_election_sim::config::{ClusterSizes, ConfigArgs};
use raft_election_sim::simulation::{run_once, sweep, write_report};

/// Opens the log file for appending. Logging is not up yet, so a failure goes to stderr
/// and the caller keeps the default target.
fn open_log_file(path: &str) -> Option<File> {
    match File::options().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("warning: cannot open log file {path}: {err}; logging to stderr");
            None
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    match std::env::var("RAFT_SIM_LOG_FILE") {
        Ok(path) => {
            // `log` records go to the file as plain text; only tracing events reach stderr.
            let mut builder = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("info"),
            );
            if let Some(file) = open_log_file(&path) {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            let _ = builder.try_init();
        }
        Err(_) => {
            let _ = LogTracer::init();
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

#[derive(Parser)]
#[command(name = "raft-election-sim")]
#[command(about = "Simulates Raft leader election across cluster sizes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one simulation per cluster size and write a CSV report
    Sweep {
        #[command(flatten)]
        config: ConfigArgs,

        /// Report path (defaults to the configured output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated cluster sizes, replacing the configured range
        #[arg(short, long, value_delimiter = ',')]
        sizes: Option<Vec<usize>>,
    },

    /// Run a single simulation and print its outcome
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of nodes in the cluster
        #[arg(short = 'n', long, default_value_t = 3)]
        size: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Sweep {
            config,
            output,
            sizes,
        } => {
            let mut config = config.resolve()?;
            if let Some(sizes) = sizes {
                config.cluster_sizes = ClusterSizes::List(sizes);
            }
            if let Some(output) = output {
                config.output = output;
            }

            info!(
                "Sweeping cluster sizes {:?}",
                config.cluster_sizes.sizes()
            );
            let outcomes = sweep(&config).await?;
            write_report(&config.output, &outcomes)?;

            println!(
                "\nSimulation complete. Results saved to {}",
                config.output.display()
            );
        }
        Command::Run { config, size } => {
            let config = config.resolve()?;
            config.validate()?;

            let outcome = run_once(size, &config).await?;
            match outcome.time_to_leader {
                Some(t) => println!(
                    "Cluster of {}: node {} elected after {:.2}s, {} election(s), stable: {}",
                    outcome.cluster_size,
                    outcome.leader.map_or_else(|| "?".to_string(), |id| id.to_string()),
                    t.as_secs_f64(),
                    outcome.elections_held,
                    if outcome.is_stable() { "Yes" } else { "No" }
                ),
                None => println!(
                    "Cluster of {}: no leader elected, {} election(s)",
                    outcome.cluster_size, outcome.elections_held
                ),
            }
        }
    }

    Ok(())
}
