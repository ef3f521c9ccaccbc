//! Raw payload types for the upstream odds API.
//!
//! Decoding is deliberately lenient: every field that a misbehaving
//! bookmaker entry can omit or reshape is optional here, and the semantic
//! checks live in the normalizer where a bad record can be skipped without
//! aborting the batch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Team name, quoted either as a bare string or wrapped in a `{name}` object
/// depending on the provider's payload version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TeamName {
    /// Bare string form: `"home_team": "Arsenal"`.
    Plain(String),
    /// Object form: `"home_team": {"name": "Arsenal"}`.
    Tagged {
        /// The wrapped name.
        name: String,
    },
}

impl TeamName {
    /// The team name regardless of wire shape.
    pub fn as_str(&self) -> &str {
        match self {
            TeamName::Plain(name) => name,
            TeamName::Tagged { name } => name,
        }
    }
}

/// One event (fixture) from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    /// Stable fixture identifier.
    pub id: String,
    /// Provider sport key (e.g., "soccer_epl").
    #[serde(default)]
    pub sport_key: Option<String>,
    /// Human-readable league title.
    #[serde(default)]
    pub sport_title: Option<String>,
    /// Kickoff time, RFC3339.
    #[serde(default)]
    pub commence_time: Option<String>,
    /// Home team.
    #[serde(default)]
    pub home_team: Option<TeamName>,
    /// Away team.
    #[serde(default)]
    pub away_team: Option<TeamName>,
    /// Bookmaker entries.
    #[serde(default)]
    pub bookmakers: Vec<FeedBookmaker>,
}

/// One bookmaker's quotes for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedBookmaker {
    /// Bookmaker key (e.g., "pinnacle").
    pub key: String,
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// When this bookmaker last updated its quotes, RFC3339.
    #[serde(default)]
    pub last_update: Option<String>,
    /// Markets quoted by this bookmaker.
    #[serde(default)]
    pub markets: Vec<FeedMarket>,
}

/// One market within a bookmaker entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMarket {
    /// Market key ("h2h", "totals", or something we ignore).
    pub key: String,
    /// Quoted outcomes.
    #[serde(default)]
    pub outcomes: Vec<FeedOutcome>,
}

/// One quoted outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedOutcome {
    /// Outcome name: a team name, "Draw"/"X", "Over", or "Under".
    pub name: String,
    /// Decimal odds. Absent or non-positive prices are normalization skips.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Line for totals markets (e.g., 2.5 goals).
    #[serde(default)]
    pub point: Option<Decimal>,
}

/// Quota accounting reported by the provider's response headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaUsage {
    /// `x-requests-remaining`.
    pub remaining: Option<u32>,
    /// `x-requests-used`.
    pub used: Option<u32>,
    /// `x-requests-last`: the authoritative cost of the call just made.
    pub last_cost: Option<u32>,
}

impl QuotaUsage {
    /// Parse the quota headers from a response.
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                // The provider reports fractional costs for some plans;
                // truncate toward zero after parsing as f64.
                .and_then(|v| v.parse::<f64>().ok())
                .map(|v| v.max(0.0) as u32)
        };
        Self {
            remaining: parse("x-requests-remaining"),
            used: parse("x-requests-used"),
            last_cost: parse("x-requests-last"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn team_name_decodes_both_shapes() {
        let plain: TeamName = serde_json::from_str(r#""Arsenal""#).unwrap();
        assert_eq!(plain.as_str(), "Arsenal");

        let tagged: TeamName = serde_json::from_str(r#"{"name":"Arsenal"}"#).unwrap();
        assert_eq!(tagged.as_str(), "Arsenal");
    }

    #[test]
    fn event_decodes_minimal_payload() {
        let event: FeedEvent = serde_json::from_str(r#"{"id":"abc123"}"#).unwrap();
        assert_eq!(event.id, "abc123");
        assert!(event.bookmakers.is_empty());
        assert!(event.home_team.is_none());
    }

    #[test]
    fn outcome_decodes_price_and_point() {
        let outcome: FeedOutcome =
            serde_json::from_str(r#"{"name":"Over","price":1.91,"point":2.5}"#).unwrap();
        assert_eq!(outcome.price, Some(dec!(1.91)));
        assert_eq!(outcome.point, Some(dec!(2.5)));
    }

    #[test]
    fn quota_usage_parses_headers() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-requests-remaining", "472".parse().unwrap());
        headers.insert("x-requests-used", "28".parse().unwrap());
        headers.insert("x-requests-last", "2".parse().unwrap());

        let usage = QuotaUsage::from_headers(&headers);
        assert_eq!(usage.remaining, Some(472));
        assert_eq!(usage.used, Some(28));
        assert_eq!(usage.last_cost, Some(2));
    }

    #[test]
    fn quota_usage_tolerates_missing_headers() {
        let headers = reqwest::header::HeaderMap::new();
        let usage = QuotaUsage::from_headers(&headers);
        assert_eq!(usage.last_cost, None);
    }
}
