//! Fairline estimation as an explicitly ordered list of strategies.
//!
//! The cascade is built once from the immutable [`EngineConfig`] and walked
//! top to bottom. A strategy only wins if it resolves *every* side the market
//! needs; sides are never mixed across tiers.

use crate::config::EngineConfig;

use super::book::{MarketBook, PricePoint};
use super::models::{FairLine, FairLineSet, FairlineMethod, Side};
use super::normalize::{extreme_sides, remove_vig};
use super::odds::decimal_to_american;
use super::outlier::median;

#[derive(Debug, Clone, PartialEq)]
pub enum FairlineStrategy {
    /// Operator-configured algorithmic feed
    AlgorithmicReference { source: String },
    /// A designated sharp bookmaker
    ReferenceBook { bookmaker: String },
    /// Cross-book median in decimal space
    Median { min_quotes: usize },
    /// Most favourable price per side
    BestPrice { min_quotes: usize },
}

/// One side resolved by a strategy.
#[derive(Debug, Clone, PartialEq)]
struct SideFair {
    price: f64,
    decimal: f64,
    source: String,
}

impl SideFair {
    fn from_point(point: &PricePoint) -> SideFair {
        SideFair {
            price: point.price,
            decimal: point.decimal,
            source: point.bookmaker.clone(),
        }
    }
}

/// Highest decimal price; ties go to the alphabetically first bookmaker.
pub fn best_price(points: &[PricePoint]) -> Option<&PricePoint> {
    points.iter().max_by(|a, b| {
        a.decimal
            .total_cmp(&b.decimal)
            .then_with(|| b.bookmaker.cmp(&a.bookmaker))
    })
}

impl FairlineStrategy {
    pub fn method(&self) -> FairlineMethod {
        match self {
            FairlineStrategy::AlgorithmicReference { .. } => FairlineMethod::AlgorithmicReference,
            FairlineStrategy::ReferenceBook { .. } => FairlineMethod::ReferenceBook,
            FairlineStrategy::Median { .. } => FairlineMethod::Median,
            FairlineStrategy::BestPrice { .. } => FairlineMethod::BestPrice,
        }
    }

    pub fn source_label(&self) -> String {
        match self {
            FairlineStrategy::AlgorithmicReference { source } => source.clone(),
            FairlineStrategy::ReferenceBook { bookmaker } => bookmaker.clone(),
            FairlineStrategy::Median { .. } => "consensus median".to_string(),
            FairlineStrategy::BestPrice { .. } => "best available".to_string(),
        }
    }

    fn resolve_side(&self, book: &MarketBook, side: Side) -> Option<SideFair> {
        match self {
            FairlineStrategy::AlgorithmicReference { .. } => {
                book.algo(side).map(SideFair::from_point)
            }
            FairlineStrategy::ReferenceBook { bookmaker } => {
                book.from_bookmaker(side, bookmaker).map(SideFair::from_point)
            }
            FairlineStrategy::Median { min_quotes } => {
                let points = book.side(side);
                if points.len() < *min_quotes {
                    return None;
                }
                let decimals: Vec<f64> = points.iter().map(|p| p.decimal).collect();
                let decimal = median(&decimals)?;
                Some(SideFair {
                    price: decimal_to_american(decimal),
                    decimal,
                    source: format!("median of {} books", points.len()),
                })
            }
            FairlineStrategy::BestPrice { min_quotes } => {
                let points = book.side(side);
                if points.len() < *min_quotes {
                    return None;
                }
                best_price(points).map(SideFair::from_point)
            }
        }
    }
}

/// The cascade in priority order for the given settings.
pub fn cascade(cfg: &EngineConfig) -> Vec<FairlineStrategy> {
    let mut strategies = Vec::new();
    if let Some(source) = &cfg.algo_fairline_source {
        strategies.push(FairlineStrategy::AlgorithmicReference {
            source: source.clone(),
        });
    }
    for bookmaker in &cfg.reference_books {
        strategies.push(FairlineStrategy::ReferenceBook {
            bookmaker: bookmaker.clone(),
        });
    }
    strategies.push(FairlineStrategy::Median {
        min_quotes: cfg.median_min_quotes,
    });
    strategies.push(FairlineStrategy::BestPrice {
        min_quotes: cfg.best_price_min_quotes,
    });
    strategies
}

/// Walk the cascade and return the first fully-resolved, vig-free line.
/// `None` means no fair line can be produced for this game.
pub fn estimate_fairline(
    game_id: &str,
    book: &MarketBook,
    strategies: &[FairlineStrategy],
) -> Option<FairLineSet> {
    let sides = book.shape.sides();
    strategies.iter().find_map(|strategy| {
        let resolved: Vec<(Side, SideFair)> = sides
            .iter()
            .map(|&side| strategy.resolve_side(book, side).map(|f| (side, f)))
            .collect::<Option<_>>()?;

        let decimals: Vec<(Side, f64)> = resolved.iter().map(|(s, f)| (*s, f.decimal)).collect();
        let normalized = remove_vig(&decimals)?;
        extreme_sides(game_id, book.shape, &normalized);

        let lines = resolved
            .into_iter()
            .zip(normalized.probabilities.iter())
            .map(|((side, fair), (_, probability))| FairLine {
                side,
                fair_price: fair.price,
                fair_decimal: fair.decimal,
                fair_probability: *probability,
                method: strategy.method(),
                source: fair.source,
            })
            .collect();

        Some(FairLineSet {
            game_id: game_id.to_string(),
            shape: book.shape,
            method: strategy.method(),
            source: strategy.source_label(),
            overround: normalized.overround,
            lines,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{MarketShape, Quote};
    use crate::engine::testutil::quote;
    use approx::assert_relative_eq;

    fn fair(quotes: &[Quote], cfg: &EngineConfig) -> Option<FairLineSet> {
        let book = MarketBook::build(quotes, cfg);
        estimate_fairline("g1", &book, &cascade(cfg))
    }

    fn others(n: usize, home: f64, away: f64) -> Vec<Quote> {
        (0..n)
            .map(|i| quote(&format!("Book{:02}", i), Some(home), Some(away), None))
            .collect()
    }

    #[test]
    fn cascade_order_follows_config() {
        let cfg = EngineConfig {
            algo_fairline_source: Some("Algo".into()),
            ..EngineConfig::default()
        };
        let methods: Vec<FairlineMethod> = cascade(&cfg).iter().map(|s| s.method()).collect();
        assert_eq!(
            methods,
            vec![
                FairlineMethod::AlgorithmicReference,
                FairlineMethod::ReferenceBook,
                FairlineMethod::ReferenceBook,
                FairlineMethod::Median,
                FairlineMethod::BestPrice,
            ]
        );
    }

    #[test]
    fn reference_book_beats_median_of_ten() {
        let cfg = EngineConfig::default();
        let mut quotes = others(10, -110.0, -110.0);
        quotes.push(quote("Pinnacle", Some(-150.0), Some(130.0), None));

        let line = fair(&quotes, &cfg).unwrap();
        assert_eq!(line.method, FairlineMethod::ReferenceBook);
        assert_eq!(line.source, "Pinnacle");
        // Median would say 50/50; Pinnacle says the home side is favoured.
        assert!(line.probability(Side::Home).unwrap() > 0.55);
    }

    #[test]
    fn second_reference_used_when_first_is_incomplete() {
        let cfg = EngineConfig::default();
        let mut quotes = others(3, -110.0, -110.0);
        quotes.push(quote("Pinnacle", Some(-150.0), None, None));
        quotes.push(quote("Circa Sports", Some(-140.0), Some(120.0), None));

        let line = fair(&quotes, &cfg).unwrap();
        assert_eq!(line.method, FairlineMethod::ReferenceBook);
        assert_eq!(line.source, "Circa Sports");
    }

    #[test]
    fn median_needs_seven_books() {
        let cfg = EngineConfig::default();
        let mut quotes = others(6, -110.0, -110.0);
        quotes.push(quote("Book99", Some(-130.0), Some(110.0), None));
        let line = fair(&quotes, &cfg).unwrap();
        assert_eq!(line.method, FairlineMethod::Median);
        assert_relative_eq!(line.probability(Side::Home).unwrap(), 0.5, epsilon = 1e-9);

        let line = fair(&quotes[1..], &cfg).unwrap();
        assert_eq!(line.method, FairlineMethod::BestPrice);
    }

    #[test]
    fn best_price_needs_three_books() {
        let cfg = EngineConfig::default();
        let quotes = vec![
            quote("BookA", Some(-110.0), Some(-110.0), None),
            quote("BookB", Some(105.0), Some(-125.0), None),
        ];
        assert!(fair(&quotes, &cfg).is_none());
    }

    #[test]
    fn best_price_picks_most_favourable() {
        let cfg = EngineConfig::default();
        let quotes = vec![
            quote("BookA", Some(-110.0), Some(-110.0), None),
            quote("BookB", Some(105.0), Some(-125.0), None),
            quote("BookC", Some(-105.0), Some(-105.0), None),
        ];
        let line = fair(&quotes, &cfg).unwrap();
        assert_eq!(line.method, FairlineMethod::BestPrice);
        let home = line.lines.iter().find(|l| l.side == Side::Home).unwrap();
        assert_eq!(home.source, "BookB");
        assert_relative_eq!(home.fair_price, 105.0);
    }

    #[test]
    fn algorithmic_source_comes_first() {
        let cfg = EngineConfig {
            algo_fairline_source: Some("Algo".into()),
            ..EngineConfig::default()
        };
        let mut quotes = others(8, -110.0, -110.0);
        quotes.push(quote("Pinnacle", Some(-150.0), Some(130.0), None));
        quotes.push(quote("Algo", Some(-200.0), Some(170.0), None));
        let line = fair(&quotes, &cfg).unwrap();
        assert_eq!(line.method, FairlineMethod::AlgorithmicReference);
        assert_eq!(line.source, "Algo");
    }

    #[test]
    fn three_way_tiers_are_not_mixed() {
        let cfg = EngineConfig::default();
        // Pinnacle prices home/away but not the draw, so its quote is left
        // out and the market drops to a tier that covers every side.
        let mut quotes: Vec<Quote> = (0..3)
            .map(|i| quote(&format!("Book{}", i), Some(150.0), Some(180.0), Some(230.0)))
            .collect();
        quotes.push(quote("Pinnacle", Some(140.0), Some(190.0), None));

        let line = fair(&quotes, &cfg).unwrap();
        assert_eq!(line.shape, MarketShape::ThreeWay);
        assert_eq!(line.method, FairlineMethod::BestPrice);
        assert_eq!(line.lines.len(), 3);
        assert!(line.lines.iter().all(|l| l.method == FairlineMethod::BestPrice));
        let sum: f64 = line.lines.iter().map(|l| l.fair_probability).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn estimation_is_deterministic() {
        let cfg = EngineConfig::default();
        let mut quotes = others(9, -110.0, -110.0);
        quotes.push(quote("BookX", Some(-125.0), Some(105.0), None));
        assert_eq!(fair(&quotes, &cfg), fair(&quotes, &cfg));
    }
}
