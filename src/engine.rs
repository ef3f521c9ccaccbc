//! Refresh cycle orchestration and the output artifact.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::arbitrage::{detect, ArbitrageOpportunity};
use crate::config::Config;
use crate::error::Result;
use crate::feed::OddsClient;
use crate::metrics;
use crate::odds::{build_snapshots, merge, normalize, EventSnapshot};
use crate::store::Store;

/// A per-sport fetch failure surfaced in the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct SportError {
    /// Provider sport key.
    pub sport_key: String,
    /// Whether the live or pre-match fetch failed.
    pub live: bool,
    /// Stable reason code (`rate_limited`, `upstream_error`, ...).
    pub reason: String,
}

/// Result of one full refresh cycle.
///
/// This is the only contract the downstream presentation layer depends on.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    /// When the cycle finished.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Detected opportunities, profit descending.
    pub opportunities: Vec<ArbitrageOpportunity>,
    /// The full merged event stream.
    pub events: Vec<EventSnapshot>,
    /// Sports whose fetches failed this cycle.
    pub errors: Vec<SportError>,
    /// Whether any served payload was older than its freshness tier.
    pub used_stale_data: bool,
}

/// One sport's contribution to a cycle.
struct SportOutcome {
    snapshots: Vec<EventSnapshot>,
    errors: Vec<SportError>,
    used_stale_data: bool,
}

/// Drives fetch -> normalize -> merge -> detect and writes the artifact.
pub struct Engine {
    config: Config,
    client: OddsClient,
}

impl Engine {
    /// Build an engine over the given store.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let client = OddsClient::new(&config, store);
        Self { config, client }
    }

    /// The underlying odds client, for diagnostics.
    pub fn client(&self) -> &OddsClient {
        &self.client
    }

    /// Run one full refresh cycle across all configured sports.
    ///
    /// A sport that fails mid-way reports a reason code and the cycle moves
    /// on; previously cached data is untouched. `refresh_live` forces the
    /// live tier past its cache.
    pub async fn scan(&self, refresh_live: bool) -> ScanReport {
        let _timer = metrics::timer_cycle();
        let now = OffsetDateTime::now_utc();

        // Sports are independent, so their fetches run concurrently; the
        // client's throttle gate still serializes the actual network calls
        // and the quota spend.
        let per_sport = futures::future::join_all(
            self.config
                .sport_keys
                .iter()
                .map(|sport_key| self.scan_sport(sport_key, refresh_live, now)),
        )
        .await;

        let mut snapshots: Vec<EventSnapshot> = Vec::new();
        let mut errors: Vec<SportError> = Vec::new();
        let mut used_stale_data = false;
        for outcome in per_sport {
            snapshots.extend(outcome.snapshots);
            errors.extend(outcome.errors);
            used_stale_data |= outcome.used_stale_data;
        }

        let opportunities = detect(&snapshots, self.config.total_stake, now);
        info!(
            sports = self.config.sport_keys.len(),
            events = snapshots.len(),
            opportunities = opportunities.len(),
            errors = errors.len(),
            "cycle complete"
        );

        ScanReport {
            generated_at: OffsetDateTime::now_utc(),
            opportunities,
            events: snapshots,
            errors,
            used_stale_data,
        }
    }

    /// Fetch, normalize, and merge one sport's live and pre-match tiers.
    async fn scan_sport(
        &self,
        sport_key: &str,
        refresh_live: bool,
        now: OffsetDateTime,
    ) -> SportOutcome {
        let filter = self.config.bookmaker_keys.as_deref();

        let mut live_records = Vec::new();
        let mut pre_records = Vec::new();
        let mut errors = Vec::new();
        let mut used_stale_data = false;

        for live in [false, true] {
            let fetched = self
                .client
                .fetch_odds(
                    sport_key,
                    &self.config.regions,
                    &self.config.markets,
                    live,
                    live && refresh_live,
                )
                .await;

            match fetched {
                Ok(fetched) => {
                    used_stale_data |= fetched.stale;
                    let batch = normalize(&fetched.events, filter, now);
                    info!(
                        sport = %sport_key,
                        live = live,
                        stale = fetched.stale,
                        age_secs = fetched.age.as_secs(),
                        records = batch.records.len(),
                        skipped = batch.skipped + fetched.skipped,
                        "normalized"
                    );
                    if live {
                        live_records = batch.records;
                    } else {
                        pre_records = batch.records;
                    }
                }
                Err(e) => {
                    warn!(sport = %sport_key, live = live, error = %e, "sport fetch failed");
                    errors.push(SportError {
                        sport_key: sport_key.to_string(),
                        live,
                        reason: e.reason_code().to_string(),
                    });
                }
            }
        }

        SportOutcome {
            snapshots: build_snapshots(merge(live_records, pre_records)),
            errors,
            used_stale_data,
        }
    }

    /// Write the artifact JSON to the configured path.
    ///
    /// Goes through a temp file and rename so a crash mid-write never leaves
    /// a torn artifact for the presentation layer.
    pub fn write_artifact(&self, report: &ScanReport) -> Result<()> {
        let path = Path::new(&self.config.output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(report)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, path)?;

        info!(path = %path.display(), bytes = json.len(), "artifact written");
        Ok(())
    }

    /// Run the scheduled refresh loop until ctrl-c.
    ///
    /// Live ticks re-fetch the live tier; pre-match data rides its longer
    /// cache max-age and refreshes on its own interval. Each tick is
    /// independent: a failed tick logs and the loop keeps going.
    pub async fn run(&self) -> Result<()> {
        let mut live_tick = interval(Duration::from_secs(self.config.live_refresh_interval_secs));
        live_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut prematch_tick = interval(Duration::from_secs(
            self.config.prematch_refresh_interval_secs,
        ));
        prematch_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            live_interval_secs = self.config.live_refresh_interval_secs,
            prematch_interval_secs = self.config.prematch_refresh_interval_secs,
            "refresh loop started"
        );

        loop {
            tokio::select! {
                _ = live_tick.tick() => {
                    self.tick(true).await;
                }
                _ = prematch_tick.tick() => {
                    self.tick(false).await;
                }
                _ = shutdown_signal() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }

    async fn tick(&self, refresh_live: bool) {
        let report = self.scan(refresh_live).await;
        if let Err(e) = self.write_artifact(&report) {
            error!(error = %e, "failed to write artifact");
        }
    }
}

/// Resolve when the process receives ctrl-c.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        // Without a signal handler, park forever rather than spin.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::types::test_support::h2h;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn report_with_one_event() -> ScanReport {
        let records = vec![
            h2h("m1", "a", dec!(2.10), None, dec!(2.05)),
            h2h("m1", "b", dec!(1.95), None, dec!(2.30)),
        ];
        let events = build_snapshots(records);
        let opportunities = detect(&events, dec!(10000), datetime!(2026-08-06 12:00:00 UTC));
        ScanReport {
            generated_at: datetime!(2026-08-06 12:00:00 UTC),
            opportunities,
            events,
            errors: vec![SportError {
                sport_key: "soccer_epl".to_string(),
                live: true,
                reason: "rate_limited".to_string(),
            }],
            used_stale_data: true,
        }
    }

    #[test]
    fn report_serializes_the_downstream_contract() {
        let report = report_with_one_event();
        let json = serde_json::to_value(&report).unwrap();

        assert!(json["generated_at"].is_string());
        assert_eq!(json["opportunities"].as_array().unwrap().len(), 1);
        assert_eq!(json["events"].as_array().unwrap().len(), 1);
        assert_eq!(json["errors"][0]["reason"], "rate_limited");
        assert_eq!(json["used_stale_data"], true);

        let opportunity = &json["opportunities"][0];
        assert_eq!(opportunity["match_id"], "m1");
        assert_eq!(opportunity["market"], "h2h");
        assert_eq!(opportunity["legs"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn artifact_write_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("out/opportunities.json");

        let mut config = crate::config::test_config();
        config.output_path = output_path.to_string_lossy().to_string();
        config.data_dir = dir.path().to_string_lossy().to_string();
        let engine = Engine::new(config, Arc::new(crate::store::MemoryStore::new()));

        let report = report_with_one_event();
        engine.write_artifact(&report).unwrap();

        let raw = fs::read_to_string(&output_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["opportunities"][0]["match_id"], "m1");

        // No temp file left behind.
        assert!(!output_path.with_extension("json.tmp").exists());
    }
}
