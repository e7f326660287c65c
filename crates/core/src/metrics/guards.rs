//! Named guards for the degenerate cases of the metric formulas.

use rust_decimal::{Decimal, RoundingStrategy};

/// Replaces an exact zero with `floor`; any other value passes through.
pub fn floor_nonzero(value: Decimal, floor: Decimal) -> Decimal {
    if value.is_zero() {
        floor
    } else {
        value
    }
}

/// `numerator / denominator`, or `None` when the denominator is zero or the
/// quotient overflows.
pub fn safe_ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator.checked_div(denominator)
}

/// Half-to-even rounding to `places` decimal places.
pub fn round_to(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{floor_nonzero, round_to, safe_ratio};

    #[test]
    fn floor_only_replaces_exact_zero() {
        let floor = Decimal::new(1, 2);

        assert_eq!(floor_nonzero(Decimal::ZERO, floor), floor);
        assert_eq!(floor_nonzero(Decimal::new(3, 3), floor), Decimal::new(3, 3));
    }

    #[test]
    fn safe_ratio_rejects_zero_denominators() {
        assert_eq!(safe_ratio(Decimal::ONE, Decimal::ZERO), None);
        assert_eq!(safe_ratio(Decimal::from(9), Decimal::from(3)), Some(Decimal::from(3)));
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_to(Decimal::new(125, 2), 1), Decimal::new(12, 1));
        assert_eq!(round_to(Decimal::new(135, 2), 1), Decimal::new(14, 1));
        assert_eq!(round_to(Decimal::new(33333, 4), 2), Decimal::new(333, 2));
    }
}
