//! Glacier Adaptive Timeout Scheduler
//!
//! This crate bounds how long a Glacier node waits for each outstanding
//! consensus request before treating the queried peer as non-responsive,
//! and adapts that bound to observed network conditions.
//!
//! # Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               Consensus engine (per round)           │
//! │   sample peers → send requests → await replies       │
//! └───────┬──────────────────────────────────┬───────────┘
//!         │ register(peer, conv, seq, cb)    │ cancel(peer, conv, seq)
//! ┌───────▼──────────────────────────────────▼───────────┐
//! │                  TimeoutScheduler                    │
//! │  deadline queue (BTreeMap by deadline, key)          │
//! │  adaptive estimate in [min_timeout, max_timeout]     │
//! │  dispatch loop: fire expired callbacks off-lock      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Adaptivity
//!
//! One estimate is shared by all registrations. Every fired timeout grows
//! it by `backoff_factor` (capped at the configured ceiling); every
//! cancellation — a request that completed — decays it back toward the
//! floor. A single slow or malicious peer therefore cannot stall the
//! protocol: it costs one bounded timeout, and healthy traffic pulls the
//! estimate back down.
//!
//! # Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`]      | `TimeoutConfig` bounds, defaults, validation |
//! | [`request_key`] | Composite (validator, conversation, sequence) keys |
//! | [`scheduler`]   | Registration, cancellation, the dispatch loop |

pub mod config;
pub mod request_key;
pub mod scheduler;

// Re-exports for convenience
pub use config::{ConfigError, TimeoutConfig};
pub use request_key::RequestKey;
pub use scheduler::TimeoutScheduler;
