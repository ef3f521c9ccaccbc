//! Throttled, quota-aware client for the upstream odds API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::FeedError;
use crate::metrics;
use crate::store::Store;

use super::cache::{CacheKey, OddsCache};
use super::quota::QuotaTracker;
use super::types::{FeedEvent, QuotaUsage};

/// Result of a fetch: decoded events plus provenance.
#[derive(Debug, Clone)]
pub struct FetchedOdds {
    /// Decoded events. Undecodable elements are skipped, never fatal.
    pub events: Vec<FeedEvent>,
    /// True when this payload is older than its freshness tier allows.
    pub stale: bool,
    /// Payload age: zero for a fresh network response.
    pub age: Duration,
    /// Events dropped because they failed to decode.
    pub skipped: usize,
}

/// HTTP client wrapping the external odds API.
///
/// Consults the cache and the quota tracker before every network call. The
/// throttle gate is one mutex held across the quota check, the inter-request
/// sleep, the call itself, and the cost recording, so concurrent fetches
/// queue instead of double-spending quota or bursting past the provider's
/// own rate limiter.
pub struct OddsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: OddsCache,
    quota: QuotaTracker,
    gate: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl OddsClient {
    /// Create a client from config, with cache and quota state in `store`.
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("failed to create HTTP client");

        let cache = OddsCache::new(
            store.clone(),
            Duration::from_secs(config.live_cache_max_age_secs),
            Duration::from_secs(config.prematch_cache_max_age_secs),
        );
        let quota = QuotaTracker::new(
            store,
            config.daily_call_limit,
            OffsetDateTime::now_utc().date(),
        );

        Self {
            http,
            base_url: config.odds_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.odds_api_key.clone(),
            cache,
            quota,
            gate: Mutex::new(None),
            min_interval: Duration::from_secs(config.min_request_interval_secs),
        }
    }

    /// The quota tracker, for diagnostics.
    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Fetch odds for one (sport, regions, markets, live) combination.
    ///
    /// Resolution order: fresh cache, then stale cache when quota is
    /// exhausted, then a throttled network call, then stale cache again if
    /// the upstream fails. `RateLimited` only surfaces when the budget is
    /// spent and nothing at all is cached.
    #[instrument(skip(self, regions, markets), fields(sport_key = %sport_key))]
    pub async fn fetch_odds(
        &self,
        sport_key: &str,
        regions: &[String],
        markets: &[String],
        live: bool,
        force_refresh: bool,
    ) -> Result<FetchedOdds, FeedError> {
        let key = CacheKey::new(sport_key, regions, markets, live);
        let now = OffsetDateTime::now_utc();

        if !force_refresh {
            if let Some(hit) = self.cache.get(&key, now) {
                if self.cache.is_fresh(&key, hit.age) {
                    debug!(age_secs = hit.age.as_secs(), "serving fresh cache");
                    metrics::inc_cache_hits();
                    return Ok(Self::decode(hit.payload, false, hit.age));
                }
            }
        }

        let mut gate = self.gate.lock().await;

        let today = OffsetDateTime::now_utc().date();
        if !self.quota.can_call(today) {
            drop(gate);
            metrics::inc_quota_exhausted();
            if let Some(hit) = self.cache.get(&key, now) {
                warn!(
                    age_secs = hit.age.as_secs(),
                    "quota exhausted, serving stale cache"
                );
                metrics::inc_stale_served();
                return Ok(Self::decode(hit.payload, true, hit.age));
            }
            return Err(FeedError::RateLimited {
                used: self.quota.calls_used(today),
                limit: self.quota.daily_limit(),
            });
        }

        if let Some(last) = *gate {
            let since = last.elapsed();
            if since < self.min_interval {
                let wait = self.min_interval - since;
                debug!(wait_ms = wait.as_millis() as u64, "throttling");
                tokio::time::sleep(wait).await;
            }
        }

        let result = self.request(sport_key, regions, markets, live).await;
        *gate = Some(Instant::now());
        drop(gate);

        match result {
            Ok(payload) => {
                // A cache write failure loses durability, not correctness.
                if let Err(e) = self.cache.put(&key, payload.clone(), OffsetDateTime::now_utc()) {
                    warn!(error = %e, "cache update failed after fetch");
                }
                Ok(Self::decode(payload, false, Duration::ZERO))
            }
            Err(e) => {
                warn!(error = %e, "fetch failed");
                if let Some(hit) = self.cache.get(&key, now) {
                    warn!(
                        age_secs = hit.age.as_secs(),
                        reason = e.reason_code(),
                        "upstream failed, serving stale cache"
                    );
                    metrics::inc_stale_served();
                    return Ok(Self::decode(hit.payload, true, hit.age));
                }
                Err(e)
            }
        }
    }

    /// Issue the network call and record its quota cost.
    async fn request(
        &self,
        sport_key: &str,
        regions: &[String],
        markets: &[String],
        live: bool,
    ) -> Result<Value, FeedError> {
        let url = format!("{}/v4/sports/{}/odds", self.base_url, sport_key);
        let regions = regions.join(",");
        let markets = markets.join(",");

        let mut query: Vec<(&str, &str)> = vec![
            ("apiKey", self.api_key.as_str()),
            ("regions", regions.as_str()),
            ("markets", markets.as_str()),
            ("oddsFormat", "decimal"),
            ("dateFormat", "iso"),
        ];
        if live {
            query.push(("live", "true"));
        }

        let timer = metrics::timer_fetch();
        let response = self.http.get(&url).query(&query).send().await?;
        drop(timer);

        // The provider bills per call; x-requests-last is the authoritative
        // cost of the call just made.
        let usage = QuotaUsage::from_headers(response.headers());
        let cost = usage.last_cost.unwrap_or_else(|| {
            warn!("x-requests-last header missing, assuming cost 1");
            1
        });
        self.quota.record_call(cost, OffsetDateTime::now_utc().date());
        metrics::inc_api_calls(cost);
        debug!(
            cost = cost,
            remaining = ?usage.remaining,
            used = ?usage.used,
            "quota headers"
        );

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(220).collect(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| FeedError::Malformed(format!("invalid odds json: {e}")))?;

        if !payload.is_array() {
            return Err(FeedError::Malformed(
                "expected a JSON array of events".to_string(),
            ));
        }

        Ok(payload)
    }

    /// Decode events element by element so one malformed entry cannot abort
    /// the whole batch.
    fn decode(payload: Value, stale: bool, age: Duration) -> FetchedOdds {
        let elements = match payload {
            Value::Array(elements) => elements,
            other => {
                warn!(kind = %json_kind(&other), "cached payload is not an array");
                vec![]
            }
        };

        let total = elements.len();
        let events: Vec<FeedEvent> = elements
            .into_iter()
            .filter_map(|element| match serde_json::from_value::<FeedEvent>(element) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable event");
                    None
                }
            })
            .collect();
        let skipped = total - events.len();
        if skipped > 0 {
            metrics::inc_records_skipped(skipped as u64);
        }

        FetchedOdds {
            events,
            stale,
            age,
            skipped,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
