use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::config::EngineConfig;

use super::models::{GameSnapshot, GameStatus, Quote};
use super::odds::is_valid_american;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Stale,
    Suspended,
    Implausible,
    Malformed,
    Superseded,
}

/// Per-reason tally of discarded quotes, for debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub stale: usize,
    pub suspended: usize,
    pub implausible: usize,
    pub malformed: usize,
    pub superseded: usize,
}

impl DropCounts {
    fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::Stale => self.stale += 1,
            DropReason::Suspended => self.suspended += 1,
            DropReason::Implausible => self.implausible += 1,
            DropReason::Malformed => self.malformed += 1,
            DropReason::Superseded => self.superseded += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.stale + self.suspended + self.implausible + self.malformed + self.superseded
    }
}

#[derive(Debug, Clone)]
pub struct CleanedQuotes {
    /// One quote per bookmaker, ordered by bookmaker name
    pub quotes: Vec<Quote>,
    pub dropped: DropCounts,
}

impl CleanedQuotes {
    /// Quotes that can actually be bet into (reference-only feeds excluded).
    pub fn bettable_count(&self, cfg: &EngineConfig) -> usize {
        self.quotes
            .iter()
            .filter(|q| !cfg.is_reference_only(&q.bookmaker))
            .count()
    }
}

fn is_sentinel(price: f64, sentinels: &[f64]) -> bool {
    sentinels.iter().any(|s| (price - s).abs() < 0.5)
}

pub fn drop_reason(quote: &Quote, cfg: &EngineConfig, now: DateTime<Utc>) -> Option<DropReason> {
    if now - quote.captured_at > Duration::minutes(cfg.freshness_window_mins) {
        return Some(DropReason::Stale);
    }
    let mut any_price = false;
    for (_, price) in quote.prices() {
        any_price = true;
        if is_sentinel(price, &cfg.suspended_sentinels) {
            return Some(DropReason::Suspended);
        }
        if price.is_finite() && price.abs() > cfg.max_american_odds {
            return Some(DropReason::Implausible);
        }
        if !is_valid_american(price) {
            return Some(DropReason::Malformed);
        }
    }
    if !any_price {
        return Some(DropReason::Malformed);
    }
    None
}

fn cmp_price(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Recency order between two quotes from the same bookmaker. Equal capture
/// times fall back to a total order over the quoted figures, so the winner
/// never depends on arrival order.
fn recency(a: &Quote, b: &Quote) -> Ordering {
    a.captured_at
        .cmp(&b.captured_at)
        .then_with(|| cmp_price(a.home_price, b.home_price))
        .then_with(|| cmp_price(a.away_price, b.away_price))
        .then_with(|| cmp_price(a.draw_price, b.draw_price))
        .then_with(|| cmp_price(a.home_implied_pct, b.home_implied_pct))
        .then_with(|| cmp_price(a.away_implied_pct, b.away_implied_pct))
        .then_with(|| cmp_price(a.draw_implied_pct, b.draw_implied_pct))
        .then_with(|| a.is_live.cmp(&b.is_live))
}

/// Keep the newest quote per bookmaker, then discard it if it is stale,
/// suspended or implausible. A book whose newest quote is discarded has no
/// price at all; older quotes never stand in for it. Survivors are tagged
/// live when the game is in play.
pub fn clean_quotes(game: &GameSnapshot, cfg: &EngineConfig, now: DateTime<Utc>) -> CleanedQuotes {
    let mut dropped = DropCounts::default();
    let mut latest: BTreeMap<&str, &Quote> = BTreeMap::new();

    for quote in &game.quotes {
        match latest.entry(quote.bookmaker.as_str()) {
            Entry::Occupied(mut existing) => {
                dropped.record(DropReason::Superseded);
                if recency(quote, existing.get()) == Ordering::Greater {
                    existing.insert(quote);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(quote);
            }
        }
    }

    latest.retain(|_, quote| match drop_reason(*quote, cfg, now) {
        Some(reason) => {
            dropped.record(reason);
            false
        }
        None => true,
    });

    let in_play = game.status == GameStatus::Live;
    let quotes = latest
        .into_values()
        .map(|q| Quote {
            is_live: q.is_live || in_play,
            ..q.clone()
        })
        .collect();

    CleanedQuotes { quotes, dropped }
}
