//! One full evaluation cycle over a snapshot of games.
//!
//! Games are processed in sequence against an immutable [`EngineConfig`];
//! the only side channel is the flagged collection returned with the report.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;

use super::anomaly::Flagger;
use super::arbitrage::evaluate_arbitrage;
use super::book::MarketBook;
use super::cleaner::clean_quotes;
use super::error::EngineError;
use super::ev::evaluate_ev;
use super::fairline::{cascade, estimate_fairline, FairlineStrategy};
use super::models::{
    ArbitrageOpportunity, CycleReport, EvOpportunity, FairLineSet, FlaggedRecord, GameSnapshot,
    GameStatus, MarketShape, SnapshotBatch,
};

/// Group a provider batch into games. Quotes listed alongside the games are
/// attached by `game_id`; quotes for unknown games are dropped.
pub fn assemble_snapshots(batch: SnapshotBatch) -> Result<Vec<GameSnapshot>, EngineError> {
    let SnapshotBatch { mut games, quotes } = batch;

    let mut index: HashMap<String, usize> = HashMap::with_capacity(games.len());
    for (i, game) in games.iter().enumerate() {
        if game.game_id.is_empty() {
            return Err(EngineError::Contract("game with empty id".into()));
        }
        if index.insert(game.game_id.clone(), i).is_some() {
            return Err(EngineError::Contract(format!(
                "duplicate game id {}",
                game.game_id
            )));
        }
    }

    let mut orphans = 0usize;
    for quote in quotes {
        match index.get(&quote.game_id) {
            Some(&i) => games[i].quotes.push(quote),
            None => {
                orphans += 1;
                debug!("Quote from {} references unknown game {}", quote.bookmaker, quote.game_id);
            }
        }
    }
    if orphans > 0 {
        warn!("Dropped {} quotes for unknown games", orphans);
    }

    Ok(games)
}

/// Results for a single game.
#[derive(Debug, Clone, Default)]
pub struct GameEvaluation {
    pub fair_line: Option<FairLineSet>,
    pub ev: Vec<EvOpportunity>,
    pub arbitrage: Option<ArbitrageOpportunity>,
    pub flagged: Vec<FlaggedRecord>,
}

pub fn evaluate_game(
    game: &GameSnapshot,
    cfg: &EngineConfig,
    strategies: &[FairlineStrategy],
    now: DateTime<Utc>,
) -> Result<GameEvaluation, EngineError> {
    if let Some(stray) = game.quotes.iter().find(|q| q.game_id != game.game_id) {
        return Err(EngineError::Contract(format!(
            "quote from {} for game {} attached to game {}",
            stray.bookmaker, stray.game_id, game.game_id
        )));
    }
    if game.status == GameStatus::Final {
        debug!("Skipping finished game {}", game.game_id);
        return Ok(GameEvaluation::default());
    }

    let cleaned = clean_quotes(game, cfg, now);
    if cleaned.dropped.total() > 0 {
        debug!("Game {}: dropped quotes {:?}", game.game_id, cleaned.dropped);
    }
    let bettable = cleaned.bettable_count(cfg);
    let book = MarketBook::build(&cleaned.quotes, cfg);
    let mut flagger = Flagger::new(now);

    let fair_line = estimate_fairline(&game.game_id, &book, strategies);
    match &fair_line {
        Some(fair) => debug!(
            "Game {}: {} fairline from {} ({} bettable books)",
            game.game_id,
            fair.method.as_str(),
            fair.source,
            bettable
        ),
        None => debug!("Game {}: no fairline ({} bettable books)", game.game_id, bettable),
    }
    let ev = match &fair_line {
        Some(fair) if bettable >= cfg.min_books_ev => {
            evaluate_ev(game, &cleaned.quotes, &book, fair, cfg, &mut flagger)
        }
        _ => Vec::new(),
    };

    let min_arb = match book.shape {
        MarketShape::TwoWay => cfg.min_books_arb,
        MarketShape::ThreeWay => cfg.min_books_arb_three_way,
    };
    let arbitrage = if bettable >= min_arb {
        evaluate_arbitrage(game, &cleaned.quotes, &book, cfg, &mut flagger)
    } else {
        None
    };

    Ok(GameEvaluation {
        fair_line,
        ev,
        arbitrage,
        flagged: flagger.into_records(),
    })
}

fn by_ev(a: &EvOpportunity, b: &EvOpportunity) -> Ordering {
    b.ev_pct
        .total_cmp(&a.ev_pct)
        .then_with(|| a.game.game_id.cmp(&b.game.game_id))
        .then_with(|| a.side.cmp(&b.side))
        .then_with(|| a.bookmaker.cmp(&b.bookmaker))
}

fn by_profit(a: &ArbitrageOpportunity, b: &ArbitrageOpportunity) -> Ordering {
    b.profit_pct
        .total_cmp(&a.profit_pct)
        .then_with(|| a.game.game_id.cmp(&b.game.game_id))
}

/// Evaluate every game and aggregate the sorted results.
///
/// `deadline` is checked between games. Crossing it aborts the cycle with
/// [`EngineError::Timeout`]; partial results are never returned.
pub fn evaluate(
    games: &[GameSnapshot],
    cfg: &EngineConfig,
    now: DateTime<Utc>,
    deadline: Option<Instant>,
) -> Result<CycleReport, EngineError> {
    let started = Instant::now();

    let mut seen = BTreeSet::new();
    for game in games {
        if !seen.insert(game.game_id.as_str()) {
            return Err(EngineError::Contract(format!(
                "duplicate game id {}",
                game.game_id
            )));
        }
    }

    let strategies = cascade(cfg);
    let mut fair_lines = Vec::new();
    let mut ev_opportunities = Vec::new();
    let mut arbitrage_opportunities = Vec::new();
    let mut flagged = Vec::new();

    for (processed, game) in games.iter().enumerate() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(EngineError::Timeout {
                processed,
                total: games.len(),
                elapsed_ms: started.elapsed().as_millis(),
            });
        }
        let result = evaluate_game(game, cfg, &strategies, now)?;
        fair_lines.extend(result.fair_line);
        ev_opportunities.extend(result.ev);
        arbitrage_opportunities.extend(result.arbitrage);
        flagged.extend(result.flagged);
    }

    fair_lines.sort_by(|a: &FairLineSet, b| a.game_id.cmp(&b.game_id));
    ev_opportunities.sort_by(by_ev);
    arbitrage_opportunities.sort_by(by_profit);
    flagged.sort_by(|a: &FlaggedRecord, b| a.game.game_id.cmp(&b.game.game_id));

    info!(
        "Cycle evaluated {} games in {}ms: {} fair lines, {} +EV, {} arbitrage, {} flagged",
        games.len(),
        started.elapsed().as_millis(),
        fair_lines.len(),
        ev_opportunities.len(),
        arbitrage_opportunities.len(),
        flagged.len()
    );

    Ok(CycleReport {
        generated_at: now,
        games_seen: games.len(),
        games_with_fairline: fair_lines.len(),
        fair_lines,
        ev_opportunities,
        arbitrage_opportunities,
        flagged,
    })
}
