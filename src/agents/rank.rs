//! Inline `dedupeRank` step.

use std::collections::HashSet;

/// Upper bound on the ranked ZPID list.
pub const MAX_RANKED: usize = 100;

/// Drop repeated ZPIDs keeping first-seen order, capped at [`MAX_RANKED`].
///
/// Idempotent: ranking an already ranked list returns it unchanged.
pub fn dedupe_rank(zpids: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(zpids.len());
    zpids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .take(MAX_RANKED)
        .collect()
}
