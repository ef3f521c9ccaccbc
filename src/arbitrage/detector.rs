//! Detection sweep over merged event snapshots.

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::metrics;
use crate::odds::{EventSnapshot, MarketType};

use super::calculator::{calculate_opportunity, ArbitrageOpportunity};

/// Markets the detector evaluates, in output order.
const MARKETS: [MarketType; 2] = [MarketType::H2h, MarketType::Totals];

/// Scan snapshots for arbitrage opportunities.
///
/// Pure per snapshot: no state survives between passes, and the same inputs
/// always produce the same output. Results are ordered by profit descending.
#[instrument(skip(snapshots), fields(snapshots = snapshots.len()))]
pub fn detect(
    snapshots: &[EventSnapshot],
    total_stake: Decimal,
    now: OffsetDateTime,
) -> Vec<ArbitrageOpportunity> {
    let _timer = metrics::timer_detection();
    let mut opportunities = Vec::new();

    for snapshot in snapshots {
        for market in MARKETS {
            match calculate_opportunity(snapshot, market, total_stake, now) {
                Some(opportunity) => {
                    info!(
                        event = %opportunity.event,
                        market = %market,
                        overround = %opportunity.overround,
                        profit_pct = %opportunity.profit_pct,
                        bookmakers = opportunity.bookmaker_count,
                        risk = %opportunity.risk,
                        "arbitrage opportunity detected"
                    );
                    metrics::inc_opportunities_detected();
                    opportunities.push(opportunity);
                }
                None => {
                    debug!(
                        match_id = %snapshot.match_id,
                        market = %market,
                        "no opportunity"
                    );
                }
            }
        }
    }

    opportunities.sort_by(|a, b| {
        b.profit_pct
            .cmp(&a.profit_pct)
            .then_with(|| a.match_id.cmp(&b.match_id))
    });
    opportunities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::types::test_support::{h2h, totals};
    use crate::odds::MatchOdds;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2026-08-06 12:00:00 UTC)
    }

    fn snapshot(match_id: &str, h2h: Vec<MatchOdds>, totals: Vec<MatchOdds>) -> EventSnapshot {
        EventSnapshot {
            match_id: match_id.to_string(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            league: "EPL".to_string(),
            commence_time: datetime!(2026-08-08 15:00:00 UTC),
            is_live: false,
            h2h,
            totals,
        }
    }

    #[test]
    fn detects_across_markets_and_sorts_by_profit() {
        let snapshots = vec![
            snapshot(
                "m1",
                vec![
                    h2h("m1", "a", dec!(2.10), None, dec!(2.05)),
                    h2h("m1", "b", dec!(1.95), None, dec!(2.30)),
                ],
                vec![
                    totals("m1", "a", dec!(2.5), dec!(2.10), dec!(1.80)),
                    totals("m1", "b", dec!(2.5), dec!(1.85), dec!(2.15)),
                ],
            ),
            snapshot(
                "m2",
                vec![
                    h2h("m2", "a", dec!(1.90), None, dec!(1.90)),
                    h2h("m2", "b", dec!(1.85), None, dec!(1.95)),
                ],
                vec![],
            ),
        ];

        let opportunities = detect(&snapshots, dec!(10000), now());

        // m1 yields one h2h and one totals opportunity; m2 yields nothing.
        assert_eq!(opportunities.len(), 2);
        assert!(opportunities.iter().all(|o| o.match_id == "m1"));
        // Sorted by profit descending: the h2h overround (0.9110) beats
        // the totals overround (0.9413).
        assert_eq!(opportunities[0].market, MarketType::H2h);
        assert!(opportunities[0].profit_pct >= opportunities[1].profit_pct);
    }

    #[test]
    fn detection_is_deterministic() {
        let snapshots = vec![snapshot(
            "m1",
            vec![
                h2h("m1", "a", dec!(2.10), None, dec!(2.05)),
                h2h("m1", "b", dec!(1.95), None, dec!(2.30)),
            ],
            vec![],
        )];

        let first = detect(&snapshots, dec!(10000), now());
        let second = detect(&snapshots, dec!(10000), now());
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].overround, second[0].overround);
        assert_eq!(first[0].legs, second[0].legs);
    }

    #[test]
    fn empty_snapshot_list_yields_empty_output() {
        assert!(detect(&[], dec!(10000), now()).is_empty());
    }
}
