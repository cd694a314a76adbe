use tracing::warn;

use super::models::{MarketShape, Side};

/// Vig-free probabilities for one market.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub probabilities: Vec<(Side, f64)>,
    /// Raw summed implied probability minus one
    pub overround: f64,
}

/// Convert fair decimal prices to implied probabilities and rescale them to
/// sum to one. Returns `None` only for degenerate input (no prices, or a
/// non-positive sum).
pub fn remove_vig(decimals: &[(Side, f64)]) -> Option<Normalized> {
    let raw: Vec<(Side, f64)> = decimals
        .iter()
        .filter(|(_, d)| d.is_finite() && *d > 1.0)
        .map(|(side, d)| (*side, 1.0 / d))
        .collect();
    if raw.is_empty() || raw.len() != decimals.len() {
        return None;
    }
    let total: f64 = raw.iter().map(|(_, p)| p).sum();
    if total <= 0.0 {
        return None;
    }
    Some(Normalized {
        probabilities: raw.into_iter().map(|(side, p)| (side, p / total)).collect(),
        overround: total - 1.0,
    })
}

/// Sides whose normalized probability falls outside the plausible range for
/// the market shape. The line is still used; this is logged, not fatal.
pub fn extreme_sides(game_id: &str, shape: MarketShape, normalized: &Normalized) -> Vec<Side> {
    let (min, max) = shape.plausible_probability_range();
    let extreme: Vec<Side> = normalized
        .probabilities
        .iter()
        .filter(|(_, p)| *p < min || *p > max)
        .map(|(side, _)| *side)
        .collect();
    for (side, p) in normalized
        .probabilities
        .iter()
        .filter(|(side, _)| extreme.contains(side))
    {
        warn!(
            "Extreme fair probability for game {} {}: {:.4} (plausible {:.2} to {:.2})",
            game_id,
            side.as_str(),
            p,
            min,
            max
        );
    }
    extreme
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::odds::american_to_decimal;
    use approx::assert_relative_eq;

    #[test]
    fn two_way_vig_is_removed() {
        let d = american_to_decimal(-110.0);
        let n = remove_vig(&[(Side::Home, d), (Side::Away, d)]).unwrap();
        assert_relative_eq!(n.probabilities[0].1, 0.5, epsilon = 1e-12);
        assert_relative_eq!(n.probabilities[1].1, 0.5, epsilon = 1e-12);
        assert_relative_eq!(n.overround, 2.0 * 110.0 / 210.0 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn three_way_sums_to_one() {
        let n = remove_vig(&[
            (Side::Home, american_to_decimal(140.0)),
            (Side::Draw, american_to_decimal(230.0)),
            (Side::Away, american_to_decimal(190.0)),
        ])
        .unwrap();
        let sum: f64 = n.probabilities.iter().map(|(_, p)| p).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_prices_yield_nothing() {
        assert!(remove_vig(&[]).is_none());
        assert!(remove_vig(&[(Side::Home, 1.0), (Side::Away, 2.0)]).is_none());
    }

    #[test]
    fn extreme_favourite_is_reported_not_dropped() {
        let n = remove_vig(&[
            (Side::Home, american_to_decimal(-20000.0)),
            (Side::Away, american_to_decimal(5000.0)),
        ])
        .unwrap();
        let extreme = extreme_sides("g1", MarketShape::TwoWay, &n);
        assert_eq!(extreme, vec![Side::Home, Side::Away]);
        assert_eq!(n.probabilities.len(), 2);
    }
}
