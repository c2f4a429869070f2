//! Glacier Weighted Validator Registry
//!
//! This crate holds the membership side of Glacier's reliability core: the
//! set of consensus participants, their stake weights, and the
//! stake-proportional sampling queries the consensus engine issues at the
//! start of every round.
//!
//! # Sampling model
//!
//! The total stake forms a contiguous space of *weight units*, partitioned
//! into one range per validator. `sample(k)` draws k distinct units from
//! that space — without replacement over units, with replacement over
//! validators — so:
//!
//! - the probability a validator appears is proportional to its share of
//!   the total weight,
//! - a high-weight validator legitimately appears multiple times in one
//!   sample,
//! - `k` is bounded by the total weight (the node's trust budget), not by
//!   the member count.
//!
//! # Consistency
//!
//! The set guards its state with a single internal lock. Bulk replacement
//! via [`ValidatorSet::set`] is atomic: concurrent sampling sees either the
//! old membership or the new one, never a mix.

pub mod error;
mod sampler;
pub mod set;

// Re-exports for convenience
pub use error::{Result, SetError};
pub use set::{Validator, ValidatorSet};
