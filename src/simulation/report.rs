use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::RunOutcome;
use crate::error::Result;

pub const REPORT_HEADERS: [&str; 4] = [
    "Cluster Size",
    "Time to Leader (s)",
    "Elections Held",
    "Stable Leader?",
];

#[derive(Debug, Serialize)]
struct ReportRow {
    cluster_size: usize,
    time_to_leader_secs: Option<f64>,
    elections_held: u64,
    stable: &'static str,
}

impl From<&RunOutcome> for ReportRow {
    fn from(outcome: &RunOutcome) -> Self {
        Self {
            cluster_size: outcome.cluster_size,
            time_to_leader_secs: outcome
                .time_to_leader
                .map(|t| (t.as_secs_f64() * 100.0).round() / 100.0),
            elections_held: outcome.elections_held,
            stable: if outcome.is_stable() { "Yes" } else { "No" },
        }
    }
}

pub fn write_report<P: AsRef<Path>>(path: P, outcomes: &[RunOutcome]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_report_to(file, outcomes)
}

/// Writes the header even when there are no outcomes.
pub fn write_report_to<W: Write>(writer: W, outcomes: &[RunOutcome]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(REPORT_HEADERS)?;
    for outcome in outcomes {
        wtr.serialize(ReportRow::from(outcome))?;
    }
    wtr.flush()?;
    Ok(())
}
