//! Normalization of raw provider payloads into canonical records.
//!
//! This is a pure transform: one [`FeedEvent`] fans out into zero or more
//! [`MatchOdds`] records, one per (bookmaker, market). A malformed record is
//! counted and skipped, never synthesized and never fatal to the batch.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::feed::types::{FeedEvent, FeedMarket, FeedOutcome};
use crate::metrics;

use super::types::{MarketLine, MarketType, MatchOdds};

/// Provider market keys mapped to canonical market types.
///
/// Adding a provider alias is a table entry, not a new branch.
static MARKET_KEYS: Lazy<HashMap<&'static str, MarketType>> = Lazy::new(|| {
    HashMap::from([
        ("h2h", MarketType::H2h),
        ("totals", MarketType::Totals),
    ])
});

/// Result of normalizing one payload.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Canonical records.
    pub records: Vec<MatchOdds>,
    /// Records dropped for missing/invalid prices or fields.
    pub skipped: usize,
}

/// Normalize a decoded payload into canonical records.
///
/// `bookmaker_filter`, when set, is an allowlist of bookmaker keys.
/// `now` decides liveness (`commence_time <= now`) and substitutes for
/// missing per-bookmaker update timestamps.
pub fn normalize(
    events: &[FeedEvent],
    bookmaker_filter: Option<&[String]>,
    now: OffsetDateTime,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for event in events {
        let (Some(home_team), Some(away_team)) = (
            event.home_team.as_ref().map(|t| t.as_str().trim()),
            event.away_team.as_ref().map(|t| t.as_str().trim()),
        ) else {
            debug!(event = %event.id, "skipping event without both team names");
            batch.skipped += 1;
            continue;
        };

        let Some(commence_time) = event
            .commence_time
            .as_deref()
            .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
        else {
            debug!(event = %event.id, "skipping event without parseable commence_time");
            batch.skipped += 1;
            continue;
        };

        let league = event
            .sport_title
            .clone()
            .or_else(|| event.sport_key.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let is_live = commence_time <= now;

        for bookmaker in &event.bookmakers {
            if let Some(allowed) = bookmaker_filter {
                if !allowed.iter().any(|k| k.eq_ignore_ascii_case(&bookmaker.key)) {
                    continue;
                }
            }

            let last_update = bookmaker
                .last_update
                .as_deref()
                .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
                .unwrap_or(now);

            for market in &bookmaker.markets {
                let Some(market_type) = MARKET_KEYS.get(market.key.to_lowercase().as_str())
                else {
                    // Unrecognized market keys are ignored, not errors.
                    continue;
                };

                let line = match market_type {
                    MarketType::H2h => extract_h2h(market, home_team, away_team),
                    MarketType::Totals => extract_totals(market),
                };

                match line {
                    Some(line) => batch.records.push(MatchOdds {
                        match_id: event.id.clone(),
                        bookmaker: bookmaker.key.clone(),
                        home_team: home_team.to_string(),
                        away_team: away_team.to_string(),
                        league: league.clone(),
                        commence_time,
                        line,
                        last_update,
                        is_live,
                    }),
                    None => {
                        warn!(
                            event = %event.id,
                            bookmaker = %bookmaker.key,
                            market = %market.key,
                            "skipping incomplete market record"
                        );
                        batch.skipped += 1;
                    }
                }
            }
        }
    }

    metrics::inc_records_normalized(batch.records.len() as u64);
    if batch.skipped > 0 {
        metrics::inc_records_skipped(batch.skipped as u64);
    }

    batch
}

/// A price is usable only above 1.0: decimal odds of 1.0 or below cannot
/// pay out and would corrupt the overround math.
fn usable_price(outcome: &FeedOutcome) -> Option<Decimal> {
    outcome.price.filter(|p| *p > Decimal::ONE)
}

fn is_draw_name(name: &str) -> bool {
    let name = name.trim();
    name.eq_ignore_ascii_case("draw") || name.eq_ignore_ascii_case("x")
}

fn extract_h2h(market: &FeedMarket, home_team: &str, away_team: &str) -> Option<MarketLine> {
    let mut home = None;
    let mut draw = None;
    let mut away = None;
    let mut saw_draw_outcome = false;

    for outcome in &market.outcomes {
        let name = outcome.name.trim();
        if is_draw_name(name) {
            saw_draw_outcome = true;
            draw = usable_price(outcome);
        } else if name.eq_ignore_ascii_case(home_team) {
            home = usable_price(outcome);
        } else if name.eq_ignore_ascii_case(away_team) {
            away = usable_price(outcome);
        }
    }

    // A quoted draw with an unusable price makes the whole record suspect.
    if saw_draw_outcome && draw.is_none() {
        return None;
    }

    match (home, away) {
        (Some(home), Some(away)) => Some(MarketLine::H2h { home, draw, away }),
        _ => None,
    }
}

fn extract_totals(market: &FeedMarket) -> Option<MarketLine> {
    let over = market.outcomes.iter().find(|o| {
        o.name.trim().eq_ignore_ascii_case("over") && o.point.is_some()
    })?;
    let line = over.point?;

    let under = market.outcomes.iter().find(|o| {
        o.name.trim().eq_ignore_ascii_case("under") && o.point == Some(line)
    })?;

    Some(MarketLine::Totals {
        line,
        over: usable_price(over)?,
        under: usable_price(under)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::{FeedBookmaker, TeamName};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2026-08-06 12:00:00 UTC)
    }

    fn events_from(json: serde_json::Value) -> Vec<FeedEvent> {
        serde_json::from_value(json).unwrap()
    }

    fn epl_event() -> serde_json::Value {
        json!([{
            "id": "evt-1",
            "sport_key": "soccer_epl",
            "sport_title": "EPL",
            "commence_time": "2026-08-08T15:00:00Z",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "bookmakers": [{
                "key": "pinnacle",
                "last_update": "2026-08-06T11:58:00Z",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "Arsenal", "price": 2.10},
                        {"name": "Draw", "price": 3.40},
                        {"name": "Chelsea", "price": 3.60}
                    ]
                }]
            }]
        }])
    }

    #[test]
    fn normalizes_three_way_h2h() {
        let batch = normalize(&events_from(epl_event()), None, now());

        assert_eq!(batch.skipped, 0);
        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.match_id, "evt-1");
        assert_eq!(record.bookmaker, "pinnacle");
        assert_eq!(record.league, "EPL");
        assert!(!record.is_live);
        assert_eq!(
            record.line,
            MarketLine::H2h {
                home: dec!(2.10),
                draw: Some(dec!(3.40)),
                away: dec!(3.60),
            }
        );
    }

    #[test]
    fn tolerates_object_wrapped_team_names_and_x_draw() {
        let events = events_from(json!([{
            "id": "evt-2",
            "commence_time": "2026-08-08T15:00:00Z",
            "home_team": {"name": "Lyon"},
            "away_team": {"name": "Nice"},
            "bookmakers": [{
                "key": "bet365",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "Lyon", "price": 2.00},
                        {"name": "x", "price": 3.30},
                        {"name": "Nice", "price": 3.90}
                    ]
                }]
            }]
        }]));

        let batch = normalize(&events, None, now());
        assert_eq!(batch.records.len(), 1);
        assert!(matches!(
            batch.records[0].line,
            MarketLine::H2h { draw: Some(d), .. } if d == dec!(3.30)
        ));
    }

    #[test]
    fn skips_h2h_missing_home_or_away() {
        let events = events_from(json!([{
            "id": "evt-3",
            "commence_time": "2026-08-08T15:00:00Z",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "bookmakers": [{
                "key": "betfair",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "Arsenal", "price": 2.10},
                        {"name": "Draw", "price": 3.40}
                    ]
                }]
            }]
        }]));

        let batch = normalize(&events, None, now());
        assert!(batch.records.is_empty());
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn never_synthesizes_a_missing_price() {
        // Price absent and price <= 1.0 are both skips, never defaults.
        let events = events_from(json!([{
            "id": "evt-4",
            "commence_time": "2026-08-08T15:00:00Z",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "bookmakers": [{
                "key": "betway",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "Arsenal"},
                        {"name": "Chelsea", "price": 0.0}
                    ]
                }]
            }]
        }]));

        let batch = normalize(&events, None, now());
        assert!(batch.records.is_empty());
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn unrecognized_market_keys_are_ignored_silently() {
        let events = events_from(json!([{
            "id": "evt-5",
            "commence_time": "2026-08-08T15:00:00Z",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "bookmakers": [{
                "key": "pinnacle",
                "markets": [
                    {"key": "spreads", "outcomes": [{"name": "Arsenal", "price": 1.90, "point": -0.5}]},
                    {"key": "h2h", "outcomes": [
                        {"name": "Arsenal", "price": 2.10},
                        {"name": "Chelsea", "price": 3.60}
                    ]}
                ]
            }]
        }]));

        let batch = normalize(&events, None, now());
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn normalizes_totals_and_skips_missing_point() {
        let events = events_from(json!([{
            "id": "evt-6",
            "commence_time": "2026-08-08T15:00:00Z",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "bookmakers": [
                {
                    "key": "pinnacle",
                    "markets": [{"key": "totals", "outcomes": [
                        {"name": "Over", "price": 1.91, "point": 2.5},
                        {"name": "Under", "price": 1.95, "point": 2.5}
                    ]}]
                },
                {
                    "key": "betfair",
                    "markets": [{"key": "totals", "outcomes": [
                        {"name": "Over", "price": 1.88},
                        {"name": "Under", "price": 1.98}
                    ]}]
                }
            ]
        }]));

        let batch = normalize(&events, None, now());
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped, 1);
        assert_eq!(
            batch.records[0].line,
            MarketLine::Totals {
                line: dec!(2.5),
                over: dec!(1.91),
                under: dec!(1.95),
            }
        );
    }

    #[test]
    fn bookmaker_filter_is_an_allowlist() {
        let events = events_from(epl_event());
        let filter = vec!["bet365".to_string()];
        let batch = normalize(&events, Some(&filter), now());
        assert!(batch.records.is_empty());
        assert_eq!(batch.skipped, 0);

        let filter = vec!["PINNACLE".to_string()];
        let batch = normalize(&events, Some(&filter), now());
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn liveness_derives_from_commence_time() {
        let mut kicked_off = events_from(epl_event());
        kicked_off[0].commence_time = Some("2026-08-06T11:30:00Z".to_string());

        let batch = normalize(&kicked_off, None, now());
        assert!(batch.records[0].is_live);
    }

    #[test]
    fn one_bad_bookmaker_does_not_abort_the_batch() {
        let mut events = events_from(epl_event());
        events[0].bookmakers.insert(
            0,
            FeedBookmaker {
                key: "broken".to_string(),
                title: None,
                last_update: Some("not a timestamp".to_string()),
                markets: vec![FeedMarket {
                    key: "h2h".to_string(),
                    outcomes: vec![],
                }],
            },
        );

        let batch = normalize(&events, None, now());
        // The broken bookmaker is a skip, the good one still lands.
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.records[0].bookmaker, "pinnacle");
    }

    #[test]
    fn event_without_teams_is_one_skip() {
        let events = events_from(json!([{"id": "evt-7", "commence_time": "2026-08-08T15:00:00Z"}]));
        let batch = normalize(&events, None, now());
        assert!(batch.records.is_empty());
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn team_name_variants_decode() {
        // TeamName is exercised through the event path above; spot-check
        // equality semantics used by the extractors here.
        assert_eq!(TeamName::Plain("A".into()).as_str(), "A");
        assert_eq!(TeamName::Tagged { name: "A".into() }.as_str(), "A");
    }
}
