//! Canonical odds types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// Market type for a quoted line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    /// Head-to-head outcome market (two- or three-way).
    #[strum(to_string = "h2h", serialize = "H2H")]
    H2h,
    /// Over/under market on a numeric line.
    #[strum(to_string = "totals", serialize = "TOTALS")]
    Totals,
}

/// A single outcome within a market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeLabel {
    /// Home win.
    #[strum(to_string = "home", serialize = "1")]
    Home,
    /// Draw (three-way markets only).
    #[strum(to_string = "draw", serialize = "x", serialize = "X")]
    Draw,
    /// Away win.
    #[strum(to_string = "away", serialize = "2")]
    Away,
    /// Over the line.
    #[strum(to_string = "over")]
    Over,
    /// Under the line.
    #[strum(to_string = "under")]
    Under,
}

/// The quoted prices of one market line.
///
/// Tagged by market type so each variant only carries the fields that exist
/// for it; a totals record can never half-populate h2h fields or vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "market_type", rename_all = "lowercase")]
pub enum MarketLine {
    /// Head-to-head prices. `draw` is present only for three-way sports.
    H2h {
        /// Decimal odds on the home side.
        home: Decimal,
        /// Decimal odds on the draw, when the sport has one.
        #[serde(skip_serializing_if = "Option::is_none")]
        draw: Option<Decimal>,
        /// Decimal odds on the away side.
        away: Decimal,
    },
    /// Over/under prices on a goals line.
    Totals {
        /// The line (e.g., 2.5 goals).
        line: Decimal,
        /// Decimal odds on over.
        over: Decimal,
        /// Decimal odds on under.
        under: Decimal,
    },
}

impl MarketLine {
    /// The market type of this line.
    pub fn market(&self) -> MarketType {
        match self {
            MarketLine::H2h { .. } => MarketType::H2h,
            MarketLine::Totals { .. } => MarketType::Totals,
        }
    }

    /// The quoted (outcome, odds) pairs.
    pub fn quotes(&self) -> Vec<(OutcomeLabel, Decimal)> {
        match self {
            MarketLine::H2h { home, draw, away } => {
                let mut quotes = vec![(OutcomeLabel::Home, *home)];
                if let Some(draw) = draw {
                    quotes.push((OutcomeLabel::Draw, *draw));
                }
                quotes.push((OutcomeLabel::Away, *away));
                quotes
            }
            MarketLine::Totals { over, under, .. } => vec![
                (OutcomeLabel::Over, *over),
                (OutcomeLabel::Under, *under),
            ],
        }
    }
}

/// One quoted market line from one bookmaker for one match.
///
/// Immutable once created; a newer quote for the same key supersedes it in
/// the merge, it is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOdds {
    /// Stable fixture identifier from the provider.
    pub match_id: String,
    /// Bookmaker key.
    pub bookmaker: String,
    /// Home team name.
    pub home_team: String,
    /// Away team name.
    pub away_team: String,
    /// League / competition title.
    pub league: String,
    /// Kickoff time.
    #[serde(with = "time::serde::rfc3339")]
    pub commence_time: OffsetDateTime,
    /// The quoted line.
    #[serde(flatten)]
    pub line: MarketLine,
    /// When the bookmaker last updated this quote.
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
    /// Whether the match had already kicked off when normalized.
    pub is_live: bool,
}

impl MatchOdds {
    /// The market type of this record.
    pub fn market(&self) -> MarketType {
        self.line.market()
    }

    /// The dedup/merge key.
    pub fn key(&self) -> OddsKey {
        OddsKey {
            match_id: self.match_id.clone(),
            bookmaker: self.bookmaker.clone(),
            market: self.market(),
        }
    }

    /// Content-derived record identity: stable across runs, no wall-clock
    /// component.
    pub fn record_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.match_id,
            self.bookmaker.to_lowercase(),
            self.market()
        )
    }
}

/// Identity of a quote: one bookmaker's line for one market of one match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OddsKey {
    /// Fixture identifier.
    pub match_id: String,
    /// Bookmaker key.
    pub bookmaker: String,
    /// Market type.
    pub market: MarketType,
}

/// All odds for a single match across bookmakers, partitioned by market.
///
/// Rebuilt from scratch on every refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct EventSnapshot {
    /// Fixture identifier.
    pub match_id: String,
    /// Home team name.
    pub home_team: String,
    /// Away team name.
    pub away_team: String,
    /// League / competition title.
    pub league: String,
    /// Kickoff time.
    #[serde(with = "time::serde::rfc3339")]
    pub commence_time: OffsetDateTime,
    /// True when any contributing record is live.
    pub is_live: bool,
    /// Head-to-head records.
    pub h2h: Vec<MatchOdds>,
    /// Totals records.
    pub totals: Vec<MatchOdds>,
}

impl EventSnapshot {
    /// Records for the given market.
    pub fn records(&self, market: MarketType) -> &[MatchOdds] {
        match market {
            MarketType::H2h => &self.h2h,
            MarketType::Totals => &self.totals,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn market_type_from_string_works() {
        assert_eq!(MarketType::from_str("h2h").unwrap(), MarketType::H2h);
        assert_eq!(MarketType::from_str("totals").unwrap(), MarketType::Totals);
        assert!(MarketType::from_str("spreads").is_err());
    }

    #[test]
    fn h2h_quotes_include_draw_only_when_present(){
        let three_way = MarketLine::H2h {
            home: dec!(2.10),
            draw: Some(dec!(3.40)),
            away: dec!(3.60),
        };
        assert_eq!(three_way.quotes().len(), 3);

        let two_way = MarketLine::H2h {
            home: dec!(1.80),
            draw: None,
            away: dec!(2.05),
        };
        assert_eq!(two_way.quotes().len(), 2);
    }

    #[test]
    fn record_id_is_content_derived() {
        let record = test_support::h2h("match-1", "Pinnacle", dec!(2.0), None, dec!(2.0));
        assert_eq!(record.record_id(), "match-1:pinnacle:h2h");
        // Same content, same id: no wall clock involved.
        let again = test_support::h2h("match-1", "Pinnacle", dec!(2.0), None, dec!(2.0));
        assert_eq!(record.record_id(), again.record_id());
    }

    #[test]
    fn keys_differ_by_market() {
        let h2h = test_support::h2h("m1", "bk", dec!(2.0), None, dec!(2.0));
        let totals = test_support::totals("m1", "bk", dec!(2.5), dec!(1.9), dec!(1.9));
        assert_ne!(h2h.key(), totals.key());
    }

    #[test]
    fn match_odds_serialize_flattens_market_tag() {
        let record = test_support::totals("m1", "bk", dec!(2.5), dec!(1.91), dec!(1.95));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["market_type"], "totals");
        assert_eq!(json["line"], "2.5");
    }
}
