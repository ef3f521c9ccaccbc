//! Canonical odds model and the transforms that produce it.
//!
//! This module handles:
//! - The [`MatchOdds`] record and [`EventSnapshot`] grouping
//! - Normalization of raw provider payloads ([`normalize`])
//! - Live/pre-match deduplication and merge ([`merge`])

pub mod merge;
pub mod normalize;
pub mod types;

pub use merge::{build_snapshots, merge};
pub use normalize::{normalize, NormalizedBatch};
pub use types::{EventSnapshot, MarketLine, MarketType, MatchOdds, OddsKey, OutcomeLabel};
