use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::config::EngineConfig;

use super::anomaly::{Flagger, ThresholdTable};
use super::book::{MarketBook, PricePoint};
use super::models::{
    ArbLeg, ArbitrageOpportunity, AuditSnapshot, GameSnapshot, MarketShape, ProbabilitySource,
    Quote, Side,
};

fn distinct_bookmakers(legs: &[(Side, &PricePoint)]) -> usize {
    legs.iter()
        .map(|(_, p)| p.bookmaker.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Pick the best price per side. When several books tie on a side's best
/// price, the combination using the most distinct bookmakers wins, then the
/// alphabetically first.
fn select_legs(book: &MarketBook) -> Option<Vec<(Side, &PricePoint)>> {
    let mut tied: Vec<(Side, Vec<&PricePoint>)> = Vec::new();
    for &side in book.shape.sides() {
        let points = book.side(side);
        let best = points.iter().map(|p| p.decimal).max_by(|a, b| a.total_cmp(b))?;
        let mut candidates: Vec<&PricePoint> = points.iter().filter(|p| p.decimal == best).collect();
        candidates.sort_by(|a, b| a.bookmaker.cmp(&b.bookmaker));
        tied.push((side, candidates));
    }

    let mut best: Option<(usize, Vec<(Side, &PricePoint)>)> = None;
    let mut cursor = vec![0usize; tied.len()];
    loop {
        let combo: Vec<(Side, &PricePoint)> = tied
            .iter()
            .zip(&cursor)
            .map(|((side, candidates), &i)| (*side, candidates[i]))
            .collect();
        let distinct = distinct_bookmakers(&combo);
        if best.as_ref().map_or(true, |(d, _)| distinct > *d) {
            best = Some((distinct, combo));
        }

        // Advance the odometer; the last side turns fastest.
        let mut pos = tied.len();
        loop {
            if pos == 0 {
                return best.map(|(_, legs)| legs);
            }
            pos -= 1;
            cursor[pos] += 1;
            if cursor[pos] < tied[pos].1.len() {
                break;
            }
            cursor[pos] = 0;
        }
    }
}

/// Look for a guaranteed-profit combination across books for one game.
///
/// 2-way markets need both legs from different books; 3-way markets need at
/// least two distinct books among the three legs.
pub fn evaluate_arbitrage(
    game: &GameSnapshot,
    quotes: &[Quote],
    book: &MarketBook,
    cfg: &EngineConfig,
    flagger: &mut Flagger,
) -> Option<ArbitrageOpportunity> {
    let shape = book.shape;
    let legs = select_legs(book)?;

    let distinct = distinct_bookmakers(&legs);
    let required = match shape {
        MarketShape::TwoWay => 2,
        MarketShape::ThreeWay => 2,
    };
    if distinct < required || (shape == MarketShape::TwoWay && distinct != legs.len()) {
        debug!(
            "No arbitrage for {}: best prices share a bookmaker",
            game.game_id
        );
        return None;
    }

    // Stakes and profit come from the prices alone: payouts are what the
    // books actually pay. Vendor percentages only annotate the legs.
    let price_implied: f64 = legs.iter().map(|(_, p)| 1.0 / p.decimal).sum();
    if !(price_implied > 0.0 && price_implied < 1.0) {
        return None;
    }

    let total_stake = cfg.notional_stake;
    let arb_legs: Vec<ArbLeg> = legs
        .iter()
        .map(|(side, point)| {
            let (p, source) = point.implied_probability(cfg.prefer_vendor_probabilities);
            let stake = total_stake / point.decimal / price_implied;
            ArbLeg {
                side: *side,
                bet: game.bet_label(*side),
                bookmaker: point.bookmaker.clone(),
                price: point.price,
                decimal_odds: point.decimal,
                implied_probability: p,
                probability_source: source,
                stake,
                payout: stake * point.decimal,
            }
        })
        .collect();
    let total_implied: f64 = arb_legs.iter().map(|l| l.implied_probability).sum();
    let probability_source = ProbabilitySource::combine(arb_legs.iter().map(|l| l.probability_source));

    let worst_payout = arb_legs
        .iter()
        .map(|l| l.payout)
        .fold(f64::INFINITY, f64::min);
    let guaranteed_profit = worst_payout - total_stake;
    let profit_pct = guaranteed_profit / total_stake * 100.0;

    let table = ThresholdTable::arbitrage(cfg, shape);
    let assessment = table.assess(profit_pct);
    let game_ref = game.reference();
    let shape_label = match shape {
        MarketShape::TwoWay => "2-way",
        MarketShape::ThreeWay => "3-way",
    };
    flagger.observe(
        &table,
        &assessment,
        profit_pct,
        &game_ref,
        &format!("{} arbitrage", shape_label),
        || AuditSnapshot {
            quotes: quotes.to_vec(),
            fair_line: None,
            bookmaker: None,
            side: None,
            legs: arb_legs.clone(),
        },
    );
    if !assessment.retain {
        return None;
    }

    if probability_source == ProbabilitySource::Mixed {
        warn!(
            "Arbitrage for {} mixes vendor and derived probabilities (profit {:.2}%)",
            game_ref.label, profit_pct
        );
    }

    Some(ArbitrageOpportunity {
        is_live: legs.iter().any(|(_, p)| p.is_live),
        game: game_ref,
        shape,
        legs: arb_legs,
        total_implied_probability: total_implied,
        profit_pct,
        total_stake,
        guaranteed_profit,
        probability_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{FlaggedRecord, Severity};
    use crate::engine::testutil::{game, now, quote};
    use approx::assert_relative_eq;

    fn run(quotes: Vec<Quote>) -> (Option<ArbitrageOpportunity>, Vec<FlaggedRecord>) {
        let cfg = EngineConfig::default();
        let g = game(quotes.clone());
        let book = MarketBook::build(&quotes, &cfg);
        let mut flagger = Flagger::new(now());
        let arb = evaluate_arbitrage(&g, &quotes, &book, &cfg, &mut flagger);
        (arb, flagger.into_records())
    }

    fn assert_balanced(arb: &ArbitrageOpportunity) {
        let staked: f64 = arb.legs.iter().map(|l| l.stake).sum();
        assert!((staked - arb.total_stake).abs() <= 0.01);
        let first = arb.legs[0].payout;
        for leg in &arb.legs {
            assert_relative_eq!(leg.payout, first, epsilon = 1e-6);
        }
    }

    #[test]
    fn two_way_arbitrage_across_books() {
        let (arb, flags) = run(vec![
            quote("BookA", Some(110.0), Some(-130.0), None),
            quote("BookB", Some(-130.0), Some(105.0), None),
        ]);
        let arb = arb.expect("arbitrage expected");
        assert!(flags.is_empty());
        assert_eq!(arb.shape, MarketShape::TwoWay);
        assert_eq!(arb.legs[0].bookmaker, "BookA");
        assert_eq!(arb.legs[1].bookmaker, "BookB");
        let total = 1.0 / 2.1 + 1.0 / 2.05;
        assert_relative_eq!(arb.total_implied_probability, total, epsilon = 1e-12);
        assert_relative_eq!(arb.profit_pct, (1.0 / total - 1.0) * 100.0, epsilon = 1e-9);
        assert_relative_eq!(arb.guaranteed_profit, 1000.0 * arb.profit_pct / 100.0, epsilon = 1e-9);
        assert_eq!(arb.probability_source, ProbabilitySource::Derived);
        assert_balanced(&arb);
    }

    #[test]
    fn implausible_profit_is_excluded_and_flagged_extreme() {
        let (arb, flags) = run(vec![
            quote("BookA", Some(150.0), None, None),
            quote("BookB", None, Some(150.0), None),
        ]);
        assert!(arb.is_none());
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity, Severity::Extreme);
        assert!(flags[0].excluded);
        assert_relative_eq!(flags[0].value, 25.0, epsilon = 1e-9);
        assert_eq!(flags[0].inputs.legs.len(), 2);
    }

    #[test]
    fn no_arbitrage_when_book_is_overround() {
        let (arb, flags) = run(vec![
            quote("BookA", Some(-110.0), Some(-110.0), None),
            quote("BookB", Some(-105.0), Some(-115.0), None),
        ]);
        assert!(arb.is_none());
        assert!(flags.is_empty());
    }

    #[test]
    fn same_book_on_both_sides_is_not_arbitrage() {
        let (arb, _) = run(vec![
            quote("BookA", Some(120.0), Some(120.0), None),
            quote("BookB", Some(-150.0), Some(-150.0), None),
        ]);
        assert!(arb.is_none());
    }

    #[test]
    fn tied_prices_prefer_distinct_books() {
        let (arb, _) = run(vec![
            quote("BookA", Some(110.0), Some(110.0), None),
            quote("BookB", Some(110.0), Some(-150.0), None),
        ]);
        let arb = arb.expect("tie should resolve to distinct books");
        assert_eq!(arb.legs[0].bookmaker, "BookB");
        assert_eq!(arb.legs[1].bookmaker, "BookA");
    }

    #[test]
    fn three_way_arbitrage_with_suspicious_profit() {
        let (arb, flags) = run(vec![
            quote("BookA", Some(180.0), Some(180.0), Some(220.0)),
            quote("BookB", Some(150.0), Some(190.0), Some(260.0)),
            quote("BookC", Some(140.0), Some(230.0), Some(230.0)),
        ]);
        let arb = arb.expect("3-way arbitrage expected");
        assert_eq!(arb.shape, MarketShape::ThreeWay);
        assert_eq!(arb.legs.len(), 3);
        assert_eq!(distinct_count(&arb), 3);
        assert!(arb.profit_pct > 5.0 && arb.profit_pct < 10.0);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity, Severity::Suspicious);
        assert!(!flags[0].excluded);
        assert_balanced(&arb);
    }

    #[test]
    fn three_way_accepts_two_distinct_books() {
        let (arb, _) = run(vec![
            quote("BookA", Some(180.0), Some(150.0), Some(260.0)),
            quote("BookB", Some(140.0), Some(230.0), Some(220.0)),
            quote("BookC", Some(130.0), Some(150.0), Some(200.0)),
        ]);
        let arb = arb.expect("two distinct books suffice for 3-way");
        assert_eq!(distinct_count(&arb), 2);
    }

    #[test]
    fn draw_no_bet_prices_are_not_three_way_legs() {
        let (arb, _) = run(vec![
            quote("BookA", Some(180.0), Some(180.0), Some(220.0)),
            quote("BookB", Some(150.0), Some(190.0), Some(260.0)),
            quote("BookC", Some(400.0), Some(400.0), None),
        ]);
        let arb = arb.expect("3-way arbitrage expected");
        assert!(arb.legs.iter().all(|l| l.bookmaker != "BookC"));
        assert!(arb.profit_pct < 5.0);
        assert_balanced(&arb);
    }

    #[test]
    fn vendor_percentages_mark_mixed_source() {
        let mut a = quote("BookA", Some(110.0), Some(-130.0), None);
        a.home_implied_pct = Some(47.0);
        let b = quote("BookB", Some(-130.0), Some(105.0), None);
        let (arb, _) = run(vec![a, b]);
        let arb = arb.expect("arbitrage expected");
        assert_eq!(arb.probability_source, ProbabilitySource::Mixed);
        assert_relative_eq!(arb.legs[0].implied_probability, 0.47, epsilon = 1e-12);
        assert_balanced(&arb);
    }

    #[test]
    fn disagreeing_vendor_figure_does_not_skew_stakes() {
        let mut a = quote("BookA", Some(110.0), Some(-130.0), None);
        a.home_implied_pct = Some(40.0);
        let b = quote("BookB", Some(-130.0), Some(105.0), None);
        let (arb, _) = run(vec![a, b]);
        let arb = arb.expect("arbitrage expected");
        assert_balanced(&arb);

        let worst = arb.legs.iter().map(|l| l.payout).fold(f64::INFINITY, f64::min);
        assert!(worst > arb.total_stake);
        assert_relative_eq!(arb.guaranteed_profit, worst - arb.total_stake, epsilon = 1e-9);
        let price_total = 1.0 / 2.1 + 1.0 / 2.05;
        assert_relative_eq!(arb.profit_pct, (1.0 / price_total - 1.0) * 100.0, epsilon = 1e-9);
        assert_relative_eq!(arb.legs[0].stake, 1000.0 / 2.1 / price_total, epsilon = 1e-9);
    }

    fn distinct_count(arb: &ArbitrageOpportunity) -> usize {
        arb.legs
            .iter()
            .map(|l| l.bookmaker.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
