//! American / decimal odds conversions.
//!
//! American odds: `+150` pays 150 profit per 100 staked, `-150` needs 150
//! staked per 100 profit. Decimal odds are total payout per unit staked.
//! Valid American prices have magnitude >= 100.

pub fn is_valid_american(american: f64) -> bool {
    american.is_finite() && american.abs() >= 100.0
}

pub fn american_to_decimal(american: f64) -> f64 {
    if american > 0.0 {
        american / 100.0 + 1.0
    } else {
        100.0 / american.abs() + 1.0
    }
}

/// Inverse of [`american_to_decimal`]. `decimal` must be > 1.
pub fn decimal_to_american(decimal: f64) -> f64 {
    if decimal >= 2.0 {
        (decimal - 1.0) * 100.0
    } else {
        -100.0 / (decimal - 1.0)
    }
}

/// Implied probability of an American price, vig included.
pub fn implied_probability(american: f64) -> f64 {
    if american > 0.0 {
        100.0 / (american + 100.0)
    } else {
        american.abs() / (american.abs() + 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_underdog_conversion() {
        assert_relative_eq!(american_to_decimal(150.0), 2.5, epsilon = 1e-12);
        assert_relative_eq!(implied_probability(150.0), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_favourite_conversion() {
        assert_relative_eq!(american_to_decimal(-200.0), 1.5, epsilon = 1e-12);
        assert_relative_eq!(implied_probability(-110.0), 110.0 / 210.0, epsilon = 1e-12);
    }

    #[test]
    fn test_implied_probability_is_inverse_decimal() {
        for price in [-500.0, -110.0, 100.0, 105.0, 320.0] {
            assert_relative_eq!(
                implied_probability(price),
                1.0 / american_to_decimal(price),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_decimal_back_to_american() {
        assert_relative_eq!(decimal_to_american(2.5), 150.0, epsilon = 1e-9);
        assert_relative_eq!(decimal_to_american(1.5), -200.0, epsilon = 1e-9);
        assert_relative_eq!(decimal_to_american(2.0), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_price_validity() {
        assert!(is_valid_american(-100.0));
        assert!(is_valid_american(250.0));
        assert!(!is_valid_american(0.0));
        assert!(!is_valid_american(-50.0));
        assert!(!is_valid_american(f64::NAN));
    }
}
