//! Uniform sampling without replacement over a sparse index space.
//!
//! The registry samples validators by drawing distinct *weight-unit*
//! indices from `[0, total_weight)`. Total weight can span the full u64
//! range, so the index array is never materialized: a partial Fisher–Yates
//! shuffle runs over a virtual identity array, tracking only the positions
//! it has displaced in a map. Memory is O(count) regardless of the bound.

use {rand::Rng, std::collections::HashMap};

/// Draw `count` distinct indices uniformly at random from `[0, bound)`.
///
/// Callers must guarantee `count <= bound`; the registry enforces this
/// with its total-weight check before sampling.
pub(crate) fn sample_distinct<R: Rng>(rng: &mut R, bound: u64, count: u64) -> Vec<u64> {
    let mut swaps: HashMap<u64, u64> = HashMap::with_capacity(count as usize);
    let mut drawn = Vec::with_capacity(count as usize);

    for i in 0..count {
        // Virtual array position j holds j unless a prior step displaced it.
        let j = rng.random_range(i..bound);
        let value = *swaps.get(&j).unwrap_or(&j);
        let displaced = *swaps.get(&i).unwrap_or(&i);
        swaps.insert(j, displaced);
        drawn.push(value);
    }

    drawn
}
