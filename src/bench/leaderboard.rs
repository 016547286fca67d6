//! Ranked merge of the reference entries and this run's mean latency.

use serde::{Deserialize, Serialize};

use super::aggregator::RunSummary;
use super::reference::ReferenceRegistry;

/// Display name of the synthetic row for the measured endpoint
pub const LOCAL_ENTRY_NAME: &str = "Local endpoint (this run)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub name: String,
    pub avg_seconds: f64,
    pub is_local: bool,
    /// 1-based position after sorting
    pub rank: usize,
}

/// Merge references with the local mean, fastest first.
///
/// The sort is stable: ties keep reference-file order and the local row,
/// appended last, stays behind references it ties with. Without a successful
/// measurement no local row is produced.
pub fn build(summary: &RunSummary, registry: &ReferenceRegistry) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = registry
        .entries()
        .iter()
        .map(|entry| LeaderboardRow {
            name: entry.name.clone(),
            avg_seconds: entry.avg_seconds,
            is_local: false,
            rank: 0,
        })
        .collect();

    if summary.success_count > 0 {
        if let Some(mean) = summary.mean_latency_seconds {
            rows.push(LeaderboardRow {
                name: LOCAL_ENTRY_NAME.to_string(),
                avg_seconds: mean,
                is_local: true,
                rank: 0,
            });
        }
    }

    rows.sort_by(|a, b| a.avg_seconds.total_cmp(&b.avg_seconds));
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index + 1;
    }
    rows
}

/// The local row, if the run produced one
pub fn local_row(rows: &[LeaderboardRow]) -> Option<&LeaderboardRow> {
    rows.iter().find(|row| row.is_local)
}
