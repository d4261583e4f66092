//! Shared numeric helpers for currency calculations.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a value to whole satang (two decimal places), half-up.
///
/// Midpoints round away from zero, so for the non-negative amounts the
/// engine produces this is ordinary round-half-up at the cent.
///
/// ```
/// use rust_decimal_macros::dec;
/// use fin_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(7499.995)), dec!(7500.00));
/// assert_eq!(round_half_up(dec!(0.0833)), dec!(0.08));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the larger of two values.
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// Clips `value` to `cap` when a cap is present.
///
/// ```
/// use rust_decimal_macros::dec;
/// use fin_core::calculations::common::min_cap;
///
/// assert_eq!(min_cap(dec!(500), Some(dec!(100))), dec!(100));
/// assert_eq!(min_cap(dec!(500), None), dec!(500));
/// ```
pub fn min_cap(
    value: Decimal,
    cap: Option<Decimal>,
) -> Decimal {
    match cap {
        Some(cap) if cap < value => cap,
        _ => value,
    }
}
