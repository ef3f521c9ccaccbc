//! Sports-betting odds aggregation and arbitrage detection engine.
//!
//! This library polls a third-party odds API, normalizes heterogeneous
//! bookmaker payloads into canonical records, merges live and pre-match
//! data, and detects arbitrage opportunities: combinations of odds across
//! bookmakers whose implied probabilities sum to less than 1, guaranteeing
//! profit regardless of outcome.
//!
//! # Detection
//!
//! For each match and market, the best price per outcome is taken across
//! all bookmakers, then:
//!
//! ```text
//! Home best: 2.10 (bookie A)   implied 0.4762
//! Away best: 2.30 (bookie B)   implied 0.4348
//! ─────────────────────────────────────────────
//! Overround: 0.9110 < 1.00 ✅
//! Profit:    (1/0.9110 - 1) × 100 ≈ 9.77% guaranteed
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`store`]: Key-value persistence behind the [`store::Store`] trait
//! - [`feed`]: Odds API client, quota tracking, and response cache
//! - [`odds`]: Canonical odds model, normalization, and live/pre-match merge
//! - [`arbitrage`]: Overround math, stake allocation, opportunity detection
//! - [`engine`]: Refresh cycle orchestration and the output artifact
//! - [`metrics`]: Prometheus counters and latency histograms

pub mod arbitrage;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod odds;
pub mod store;

pub use config::Config;
pub use error::{EngineError, Result};
