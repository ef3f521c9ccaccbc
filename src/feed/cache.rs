//! Tiered-freshness cache for raw odds payloads.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{error, warn};

use crate::error::PersistenceError;
use crate::store::Store;

/// Cache key: one entry per (sport, regions, markets, live) combination.
///
/// Regions and markets are sorted on construction so the same logical
/// request always hits the same entry regardless of argument order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sport_key: String,
    regions: Vec<String>,
    markets: Vec<String>,
    live: bool,
}

impl CacheKey {
    /// Build a key, normalizing region/market order.
    pub fn new(sport_key: &str, regions: &[String], markets: &[String], live: bool) -> Self {
        let mut regions: Vec<String> = regions.iter().map(|r| r.to_lowercase()).collect();
        let mut markets: Vec<String> = markets.iter().map(|m| m.to_lowercase()).collect();
        regions.sort();
        markets.sort();
        Self {
            sport_key: sport_key.to_string(),
            regions,
            markets,
            live,
        }
    }

    /// Whether this key is for live data.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// The store key this entry persists under.
    pub fn storage_key(&self) -> String {
        format!(
            "odds_{}_{}_{}_{}",
            self.sport_key,
            self.regions.join("-"),
            self.markets.join("-"),
            if self.live { "live" } else { "prematch" }
        )
    }
}

/// Persisted cache entry: `{timestamp: epochMillis, data: payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: i64,
    data: Value,
}

/// A cache hit: the raw payload and how old it is.
#[derive(Debug, Clone)]
pub struct CachedOdds {
    /// The raw provider payload.
    pub payload: Value,
    /// Age at lookup time.
    pub age: Duration,
}

/// Keyed, timestamped storage of raw API responses.
///
/// Two freshness tiers: live data goes stale fast because a stale live
/// quote risks signaling a false arbitrage; pre-match data keeps for hours.
/// Stale entries are never evicted -- a stale payload beats no payload when
/// the upstream is down, as long as callers can see the age.
pub struct OddsCache {
    store: Arc<dyn Store>,
    hot: DashMap<String, CacheEntry>,
    live_max_age: Duration,
    prematch_max_age: Duration,
}

impl OddsCache {
    /// Create a cache over the given store with per-tier max ages.
    pub fn new(store: Arc<dyn Store>, live_max_age: Duration, prematch_max_age: Duration) -> Self {
        Self {
            store,
            hot: DashMap::new(),
            live_max_age,
            prematch_max_age,
        }
    }

    /// Look up a payload. Returns the payload with its age, or `None` on a
    /// true miss. Store read errors and corrupt entries degrade to a miss.
    pub fn get(&self, key: &CacheKey, now: OffsetDateTime) -> Option<CachedOdds> {
        let storage_key = key.storage_key();

        let entry = match self.hot.get(&storage_key) {
            Some(entry) => entry.clone(),
            None => {
                let raw = match self.store.get(&storage_key) {
                    Ok(Some(raw)) => raw,
                    Ok(None) => return None,
                    Err(e) => {
                        warn!(key = %storage_key, error = %e, "cache read failed, treating as miss");
                        return None;
                    }
                };
                match serde_json::from_str::<CacheEntry>(&raw) {
                    Ok(entry) => {
                        self.hot.insert(storage_key.clone(), entry.clone());
                        entry
                    }
                    Err(e) => {
                        warn!(key = %storage_key, error = %e, "cache entry corrupt, treating as miss");
                        return None;
                    }
                }
            }
        };

        let age_ms = (now.unix_timestamp_nanos() / 1_000_000) as i64 - entry.timestamp;
        let age = Duration::from_millis(age_ms.max(0) as u64);

        Some(CachedOdds {
            payload: entry.data,
            age,
        })
    }

    /// Store a payload under the key, stamped with `now`.
    pub fn put(
        &self,
        key: &CacheKey,
        payload: Value,
        now: OffsetDateTime,
    ) -> Result<(), PersistenceError> {
        let storage_key = key.storage_key();
        let entry = CacheEntry {
            timestamp: (now.unix_timestamp_nanos() / 1_000_000) as i64,
            data: payload,
        };

        self.hot.insert(storage_key.clone(), entry.clone());

        let raw = serde_json::to_string(&entry).map_err(|e| PersistenceError::WriteFailed {
            key: storage_key.clone(),
            reason: e.to_string(),
        })?;

        if let Err(e) = self.store.put(&storage_key, &raw) {
            error!(key = %storage_key, error = %e, "failed to persist cache entry");
            return Err(e);
        }
        Ok(())
    }

    /// Whether a payload of the given age is still fresh for its tier.
    pub fn is_fresh(&self, key: &CacheKey, age: Duration) -> bool {
        age <= self.max_age(key)
    }

    /// The max age for this key's tier.
    pub fn max_age(&self, key: &CacheKey) -> Duration {
        if key.live {
            self.live_max_age
        } else {
            self.prematch_max_age
        }
    }
}
