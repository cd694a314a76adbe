use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::EngineConfig;

use super::models::{MarketShape, ProbabilitySource, Quote, Side};
use super::odds::american_to_decimal;
use super::outlier::filter_side;

/// One bookmaker's price for one side.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub bookmaker: String,
    /// American odds
    pub price: f64,
    pub decimal: f64,
    pub vendor_probability: Option<f64>,
    pub is_live: bool,
    pub captured_at: DateTime<Utc>,
}

impl PricePoint {
    fn from_quote(quote: &Quote, side: Side) -> Option<PricePoint> {
        let price = quote.price(side)?;
        Some(PricePoint {
            bookmaker: quote.bookmaker.clone(),
            price,
            decimal: american_to_decimal(price),
            vendor_probability: quote.vendor_probability(side),
            is_live: quote.is_live,
            captured_at: quote.captured_at,
        })
    }

    /// Implied probability, preferring the vendor's figure when allowed.
    pub fn implied_probability(&self, prefer_vendor: bool) -> (f64, ProbabilitySource) {
        match self.vendor_probability {
            Some(p) if prefer_vendor => (p, ProbabilitySource::Vendor),
            _ => (1.0 / self.decimal, ProbabilitySource::Derived),
        }
    }
}

/// Outlier-filtered prices per side for one game, split into bettable books
/// and the reference-only algorithmic feed.
#[derive(Debug, Clone)]
pub struct MarketBook {
    pub shape: MarketShape,
    sides: BTreeMap<Side, Vec<PricePoint>>,
    algo: BTreeMap<Side, PricePoint>,
}

impl MarketBook {
    pub fn build(quotes: &[Quote], cfg: &EngineConfig) -> MarketBook {
        let shape = if quotes.iter().any(|q| q.draw_price.is_some()) {
            MarketShape::ThreeWay
        } else {
            MarketShape::TwoWay
        };

        // Home/away-only quotes in a 3-way market are draw-no-bet style
        // prices and do not belong to the same outcome set.
        let quotes: Vec<&Quote> = quotes
            .iter()
            .filter(|q| shape == MarketShape::TwoWay || q.draw_price.is_some())
            .collect();

        let mut sides = BTreeMap::new();
        let mut algo = BTreeMap::new();
        for &side in shape.sides() {
            let mut bettable = Vec::new();
            for &quote in &quotes {
                let Some(point) = PricePoint::from_quote(quote, side) else {
                    continue;
                };
                if cfg.is_reference_only(&quote.bookmaker) {
                    algo.insert(side, point);
                } else {
                    bettable.push(point);
                }
            }
            let outcome = filter_side(bettable, cfg);
            for removed in &outcome.removed {
                debug!(
                    "Outlier removed: {} {} at {} (decimal {:.3})",
                    removed.bookmaker,
                    side.as_str(),
                    removed.price,
                    removed.decimal
                );
            }
            sides.insert(side, outcome.kept);
        }

        MarketBook { shape, sides, algo }
    }

    pub fn side(&self, side: Side) -> &[PricePoint] {
        self.sides.get(&side).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn algo(&self, side: Side) -> Option<&PricePoint> {
        self.algo.get(&side)
    }

    /// Price from a named bookmaker (case-insensitive).
    pub fn from_bookmaker(&self, side: Side, bookmaker: &str) -> Option<&PricePoint> {
        self.side(side)
            .iter()
            .find(|p| p.bookmaker.eq_ignore_ascii_case(bookmaker))
    }
}
