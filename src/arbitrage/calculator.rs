//! Overround, stake, and risk calculations for arbitrage opportunities.

use rust_decimal::Decimal;
use serde::Serialize;
use smallvec::SmallVec;
use strum::Display;
use time::OffsetDateTime;

use crate::odds::{EventSnapshot, MarketLine, MarketType, OutcomeLabel};

/// Widest accepted margin above a pure 1.0 overround cutoff (2%).
fn max_threshold_margin() -> Decimal {
    Decimal::new(2, 2)
}

/// Risk classification for a detected opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Comfortable margin and at least three independent bookmakers.
    #[strum(serialize = "low_risk")]
    LowRisk,
    /// Everything else.
    #[strum(serialize = "medium_risk")]
    MediumRisk,
    /// Two-bookmaker combinations or live matches: odds can move before
    /// both legs are placed.
    #[strum(serialize = "high_risk")]
    HighRisk,
}

/// One leg of an opportunity: the best price for one outcome and the stake
/// allocated to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityLeg {
    /// The outcome this leg covers.
    pub outcome: OutcomeLabel,
    /// Bookmaker offering the best price.
    pub bookmaker: String,
    /// Best decimal odds across contributing bookmakers.
    pub odds: Decimal,
    /// Stake allocated to this leg.
    pub stake: Decimal,
    /// Payout if this leg wins (stake × odds).
    pub payout: Decimal,
}

/// One detected profitable combination for a single match/market.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    /// Fixture identifier.
    pub match_id: String,
    /// Display name, "Home vs Away".
    pub event: String,
    /// League / competition title.
    pub league: String,
    /// Market the combination spans.
    pub market: MarketType,
    /// Goals line for totals opportunities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goals_line: Option<Decimal>,
    /// The legs: best price per outcome with allocated stake.
    pub legs: SmallVec<[OpportunityLeg; 3]>,
    /// Sum of implied probabilities across the best prices.
    pub overround: Decimal,
    /// Acceptance threshold this match was held against.
    pub threshold: Decimal,
    /// Guaranteed profit as a percentage of the total stake.
    pub profit_pct: Decimal,
    /// Total stake split across the legs.
    pub total_stake: Decimal,
    /// Payout of every leg (equal across outcomes by construction).
    pub guaranteed_return: Decimal,
    /// Distinct bookmakers contributing quotes to this market.
    pub bookmaker_count: usize,
    /// Risk classification.
    pub risk: RiskLevel,
    /// Confidence score, 0-10.
    pub confidence: Decimal,
    /// Whether the match was live at detection time.
    pub is_live: bool,
    /// When this opportunity was computed.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

/// Best quote for one outcome.
#[derive(Debug, Clone)]
struct BestQuote {
    outcome: OutcomeLabel,
    bookmaker: String,
    odds: Decimal,
}

/// Dynamic acceptance threshold in [1.00, 1.02].
///
/// Tightened toward 1.00 as kickoff approaches and as bookmaker coverage
/// deepens: prices from liquid, well-covered markets are reliable enough
/// that only a genuine sub-1.0 overround should clear. Thin coverage far
/// from kickoff widens the band to its 2% maximum.
pub fn acceptance_threshold(minutes_to_kickoff: i64, bookmakers: usize) -> Decimal {
    let time_factor =
        Decimal::from(minutes_to_kickoff.clamp(0, 2880)) / Decimal::from(2880);
    let coverage_factor =
        Decimal::from((8i64 - bookmakers as i64).clamp(0, 6)) / Decimal::from(6);

    Decimal::ONE + max_threshold_margin() * (time_factor + coverage_factor) / Decimal::TWO
}

/// Confidence score 0-10, monotone in profit and bookmaker count.
pub fn confidence_score(profit_pct: Decimal, bookmakers: usize) -> Decimal {
    let raw = profit_pct * Decimal::new(15, 1) + Decimal::from(bookmakers);
    raw.clamp(Decimal::ZERO, Decimal::TEN).round_dp(1)
}

fn assess_risk(profit_pct: Decimal, bookmakers: usize, is_live: bool) -> RiskLevel {
    if bookmakers <= 2 || is_live {
        RiskLevel::HighRisk
    } else if profit_pct > Decimal::TWO {
        RiskLevel::LowRisk
    } else {
        RiskLevel::MediumRisk
    }
}

/// Compute the arbitrage opportunity for one market of one snapshot, if the
/// best prices clear the dynamic threshold.
///
/// Returns `None` when fewer than two distinct bookmakers contribute, when
/// any outcome of the market lacks a real quote (a bookmaker missing the
/// draw never counts as offering draw odds), or when the overround fails
/// the threshold.
pub fn calculate_opportunity(
    snapshot: &EventSnapshot,
    market: MarketType,
    total_stake: Decimal,
    now: OffsetDateTime,
) -> Option<ArbitrageOpportunity> {
    let records = snapshot.records(market);
    if records.is_empty() {
        return None;
    }

    // Coverage counts only bookmakers actually contributing to the compared
    // line: for totals, books on a different goals line do not count.
    let (quotes, goals_line, bookmaker_count) = match market {
        MarketType::H2h => (
            best_h2h_quotes(records)?,
            None,
            distinct_bookmakers(records.iter()),
        ),
        MarketType::Totals => {
            let (quotes, line, count) = best_totals_quotes(records)?;
            (quotes, Some(line), count)
        }
    };
    if bookmaker_count < 2 {
        return None;
    }

    let overround: Decimal = quotes
        .iter()
        .map(|q| Decimal::ONE / q.odds)
        .sum::<Decimal>()
        .round_dp(6);

    let minutes_to_kickoff = (snapshot.commence_time - now).whole_minutes();
    let threshold = acceptance_threshold(minutes_to_kickoff, bookmaker_count);
    if overround >= threshold {
        return None;
    }

    let legs: SmallVec<[OpportunityLeg; 3]> = quotes
        .into_iter()
        .map(|quote| {
            let stake = (total_stake * (Decimal::ONE / quote.odds) / overround).round_dp(2);
            OpportunityLeg {
                outcome: quote.outcome,
                bookmaker: quote.bookmaker,
                odds: quote.odds,
                stake,
                payout: (stake * quote.odds).round_dp(2),
            }
        })
        .collect();

    let profit_pct =
        ((Decimal::ONE / overround - Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2);

    Some(ArbitrageOpportunity {
        match_id: snapshot.match_id.clone(),
        event: format!("{} vs {}", snapshot.home_team, snapshot.away_team),
        league: snapshot.league.clone(),
        market,
        goals_line,
        legs,
        overround,
        threshold,
        profit_pct,
        total_stake,
        guaranteed_return: (total_stake / overround).round_dp(2),
        bookmaker_count,
        risk: assess_risk(profit_pct, bookmaker_count, snapshot.is_live),
        confidence: confidence_score(profit_pct, bookmaker_count),
        is_live: snapshot.is_live,
        detected_at: now,
    })
}

/// Best h2h price per outcome across all bookmakers that quote it.
///
/// The market is three-way iff any record quotes a draw; the draw leg then
/// only draws from records that actually price it.
fn best_h2h_quotes(records: &[crate::odds::MatchOdds]) -> Option<SmallVec<[BestQuote; 3]>> {
    let mut home: Option<BestQuote> = None;
    let mut draw: Option<BestQuote> = None;
    let mut away: Option<BestQuote> = None;
    let mut three_way = false;

    for record in records {
        let MarketLine::H2h {
            home: home_odds,
            draw: draw_odds,
            away: away_odds,
        } = &record.line
        else {
            continue;
        };

        upsert_best(&mut home, OutcomeLabel::Home, &record.bookmaker, *home_odds);
        upsert_best(&mut away, OutcomeLabel::Away, &record.bookmaker, *away_odds);
        if let Some(draw_odds) = draw_odds {
            three_way = true;
            upsert_best(&mut draw, OutcomeLabel::Draw, &record.bookmaker, *draw_odds);
        }
    }

    let mut quotes = SmallVec::new();
    quotes.push(home?);
    if three_way {
        quotes.push(draw?);
    }
    quotes.push(away?);
    Some(quotes)
}

/// Best over/under prices on the goals line with the deepest coverage.
///
/// Different lines are different bets; only quotes sharing a line are
/// comparable. Ties on coverage break toward the lower line.
fn best_totals_quotes(
    records: &[crate::odds::MatchOdds],
) -> Option<(SmallVec<[BestQuote; 3]>, Decimal, usize)> {
    use std::collections::HashMap;

    let mut by_line: HashMap<Decimal, Vec<&crate::odds::MatchOdds>> = HashMap::new();
    for record in records {
        if let MarketLine::Totals { line, .. } = &record.line {
            by_line.entry(*line).or_default().push(record);
        }
    }

    let (line, group) = by_line
        .into_iter()
        .max_by(|(line_a, group_a), (line_b, group_b)| {
            group_a
                .len()
                .cmp(&group_b.len())
                .then_with(|| line_b.cmp(line_a))
        })?;

    let bookmaker_count = distinct_bookmakers(group.iter().copied());

    let mut over: Option<BestQuote> = None;
    let mut under: Option<BestQuote> = None;
    for record in group {
        let MarketLine::Totals {
            over: over_odds,
            under: under_odds,
            ..
        } = &record.line
        else {
            continue;
        };
        upsert_best(&mut over, OutcomeLabel::Over, &record.bookmaker, *over_odds);
        upsert_best(&mut under, OutcomeLabel::Under, &record.bookmaker, *under_odds);
    }

    let mut quotes = SmallVec::new();
    quotes.push(over?);
    quotes.push(under?);
    Some((quotes, line, bookmaker_count))
}

fn distinct_bookmakers<'a>(records: impl Iterator<Item = &'a crate::odds::MatchOdds>) -> usize {
    let mut keys: Vec<&str> = records.map(|r| r.bookmaker.as_str()).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

fn upsert_best(
    slot: &mut Option<BestQuote>,
    outcome: OutcomeLabel,
    bookmaker: &str,
    odds: Decimal,
) {
    match slot {
        Some(best) if best.odds >= odds => {}
        _ => {
            *slot = Some(BestQuote {
                outcome,
                bookmaker: bookmaker.to_string(),
                odds,
            })
        }
    }
}
