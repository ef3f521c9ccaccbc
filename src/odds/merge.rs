//! Live/pre-match deduplication and merge.

use std::collections::HashMap;

use super::types::{EventSnapshot, MarketType, MatchOdds, OddsKey};

/// Merge live and pre-match records into one canonical stream.
///
/// Keyed by `(match_id, bookmaker, market)`. A live record always wins over
/// a pre-match record for the same key, even when the pre-match record is
/// nominally newer by timestamp: liveness is the deciding signal, not
/// recency. Within the same input, the newest `last_update` wins. Matches
/// present only in pre-match data pass through unchanged.
pub fn merge(live: Vec<MatchOdds>, pre_match: Vec<MatchOdds>) -> Vec<MatchOdds> {
    let mut merged: HashMap<OddsKey, MatchOdds> = HashMap::new();

    for record in pre_match {
        upsert_newest(&mut merged, record);
    }

    // Live replaces unconditionally.
    let mut live_keys: HashMap<OddsKey, MatchOdds> = HashMap::new();
    for record in live {
        upsert_newest(&mut live_keys, record);
    }
    for (key, record) in live_keys {
        merged.insert(key, record);
    }

    let mut records: Vec<MatchOdds> = merged.into_values().collect();
    records.sort_by(|a, b| {
        (a.match_id.as_str(), a.bookmaker.as_str(), a.market() as u8).cmp(&(
            b.match_id.as_str(),
            b.bookmaker.as_str(),
            b.market() as u8,
        ))
    });
    records
}

fn upsert_newest(map: &mut HashMap<OddsKey, MatchOdds>, record: MatchOdds) {
    match map.entry(record.key()) {
        std::collections::hash_map::Entry::Occupied(mut slot) => {
            if record.last_update >= slot.get().last_update {
                slot.insert(record);
            }
        }
        std::collections::hash_map::Entry::Vacant(slot) => {
            slot.insert(record);
        }
    }
}

/// Group merged records into per-match snapshots, partitioned by market.
///
/// Snapshots are ordered by kickoff time, then match id, so output is
/// stable across runs.
pub fn build_snapshots(records: Vec<MatchOdds>) -> Vec<EventSnapshot> {
    let mut by_match: HashMap<String, EventSnapshot> = HashMap::new();

    for record in records {
        let snapshot = by_match
            .entry(record.match_id.clone())
            .or_insert_with(|| EventSnapshot {
                match_id: record.match_id.clone(),
                home_team: record.home_team.clone(),
                away_team: record.away_team.clone(),
                league: record.league.clone(),
                commence_time: record.commence_time,
                is_live: false,
                h2h: Vec::new(),
                totals: Vec::new(),
            });

        snapshot.is_live |= record.is_live;
        match record.market() {
            MarketType::H2h => snapshot.h2h.push(record),
            MarketType::Totals => snapshot.totals.push(record),
        }
    }

    let mut snapshots: Vec<EventSnapshot> = by_match.into_values().collect();
    snapshots.sort_by(|a, b| {
        a.commence_time
            .cmp(&b.commence_time)
            .then_with(|| a.match_id.cmp(&b.match_id))
    });
    snapshots
}
