use crate::config::EngineConfig;

use super::anomaly::{Flagger, ThresholdTable};
use super::book::MarketBook;
use super::kelly::{expected_value, kelly_stake};
use super::models::{AuditSnapshot, EvOpportunity, FairLineSet, GameSnapshot, Quote};

/// Compare every surviving price against the fair line.
///
/// Values past the reject ceiling go to the flagger only; suspicious values
/// are returned and flagged.
pub fn evaluate_ev(
    game: &GameSnapshot,
    quotes: &[Quote],
    book: &MarketBook,
    fair: &FairLineSet,
    cfg: &EngineConfig,
    flagger: &mut Flagger,
) -> Vec<EvOpportunity> {
    let table = ThresholdTable::ev(cfg);
    let game_ref = game.reference();
    let mut opportunities = Vec::new();

    for line in &fair.lines {
        let fair_probability = line.fair_probability;
        for point in book.side(line.side) {
            let ev_pct = expected_value(fair_probability, point.decimal) * 100.0;
            let assessment = table.assess(ev_pct);
            let bet = game.bet_label(line.side);

            flagger.observe(
                &table,
                &assessment,
                ev_pct,
                &game_ref,
                &format!("{} {} {:+}", point.bookmaker, bet, point.price),
                || AuditSnapshot {
                    quotes: quotes.to_vec(),
                    fair_line: Some(fair.clone()),
                    bookmaker: Some(point.bookmaker.clone()),
                    side: Some(line.side),
                    legs: Vec::new(),
                },
            );
            if !assessment.retain {
                continue;
            }

            let (implied_probability, probability_source) =
                point.implied_probability(cfg.prefer_vendor_probabilities);
            opportunities.push(EvOpportunity {
                game: game_ref.clone(),
                side: line.side,
                bet,
                bookmaker: point.bookmaker.clone(),
                price: point.price,
                decimal_odds: point.decimal,
                implied_probability,
                probability_source,
                fair_probability,
                fairline_method: fair.method,
                ev_pct,
                kelly_pct: kelly_stake(fair_probability, point.decimal) * 100.0,
                is_live: point.is_live,
            });
        }
    }

    opportunities
}
