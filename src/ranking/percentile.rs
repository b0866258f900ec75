//! Percentile math shared by submission and leaderboard queries

use crate::ranking::worse_than::WorseThanMap;
use crate::types::Percentile;
use crate::utils::round2;

/// Share of a partition's scores that are worse than a score, in `[0, 100]`.
///
/// `total` includes the score being ranked. Returns `0` for an empty
/// partition.
pub fn percentile(worse_count: u64, total: u64) -> Percentile {
    if total == 0 {
        return 0.0;
    }
    let ratio = (worse_count.min(total) as f64) / (total as f64);
    round2(100.0 * ratio)
}

/// Percentile of an exact recorded value, `None` if the map never saw it
pub fn percentile_of(map: &WorseThanMap, value: u64, total: u64) -> Option<Percentile> {
    map.worse_count(value)
        .map(|worse_count| percentile(worse_count, total))
}
