//! Error types for the weighted validator registry.

use thiserror::Error;

/// Errors that can occur while mutating or sampling a validator set.
///
/// Mutation errors are all-or-nothing: a failed operation leaves the set
/// exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetError {
    /// The validator is already a member of the set.
    #[error("duplicate validator: {0}")]
    DuplicateValidator(solana_pubkey::Pubkey),

    /// The validator is not a member of the set.
    #[error("unknown validator: {0}")]
    UnknownValidator(solana_pubkey::Pubkey),

    /// More weight units were requested than the set holds.
    #[error("insufficient weight: requested {requested}, available {available}")]
    InsufficientWeight {
        /// Number of weight units requested.
        requested: u64,
        /// Total weight currently in the set.
        available: u64,
    },

    /// The sum of member weights would exceed the representable range.
    #[error("validator weight sum overflows u64")]
    WeightOverflow,
}

/// Convenience result type for validator set operations.
pub type Result<T> = std::result::Result<T, SetError>;
