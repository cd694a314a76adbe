//! Kelly Criterion stake sizing and expected value against a fair line.
//!
//! For decimal odds `d` and fair win probability `p`:
//!   EV per unit staked = p·d − 1
//!   f* = (p·d − 1) / (d − 1)
//! `f*` is the bankroll fraction that maximises long-run log growth. It never
//! exceeds 1 because `p <= 1`.

/// Expected value per unit staked (0.05 = +5%).
pub fn expected_value(fair_prob: f64, decimal_odds: f64) -> f64 {
    fair_prob * decimal_odds - 1.0
}

/// Full-Kelly stake fraction, floored at zero when there is no edge.
pub fn kelly_stake(fair_prob: f64, decimal_odds: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&fair_prob), "fair_prob out of range");

    if decimal_odds <= 1.0 {
        return 0.0;
    }

    // Net odds per unit staked (e.g. decimal 2.5 → b = 1.5)
    let b = decimal_odds - 1.0;
    let f = expected_value(fair_prob, decimal_odds) / b;

    f.clamp(0.0, 1.0)
}
