//! Upstream odds feed: API client, quota tracking, and response cache.
//!
//! This module handles:
//! - Raw provider payload types and quota headers
//! - The daily call budget ([`QuotaTracker`])
//! - Tiered-freshness response caching ([`OddsCache`])
//! - The throttled HTTP client ([`OddsClient`])

pub mod cache;
pub mod client;
pub mod quota;
pub mod types;

pub use cache::{CacheKey, CachedOdds, OddsCache};
pub use client::{FetchedOdds, OddsClient};
pub use quota::{QuotaState, QuotaTracker};
pub use types::{FeedBookmaker, FeedEvent, FeedMarket, FeedOutcome, QuotaUsage, TeamName};
