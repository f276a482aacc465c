//! Fixed-Point Amount Scaling
//!
//! Converts human decimal strings ("12.5") to integer base units using a
//! `10^decimals` factor, and back. Scaling is exact: extra fractional digits
//! and values beyond `u64` are errors, never rounded or truncated.

use crate::error::AmountError;

/// Largest exponent for which `10^decimals` fits in a `u64`
pub const MAX_DECIMALS: u8 = 19;

/// Lamports per native coin
pub const NATIVE_DECIMALS: u8 = 9;

/// Scale a decimal string into base units
///
/// # Examples
/// ```
/// use solscribe::amount::to_base_units;
/// assert_eq!(to_base_units("1.5", 8).unwrap(), 150_000_000);
/// ```
pub fn to_base_units(amount: &str, decimals: u8) -> Result<u64, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::Decimals(decimals));
    }
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::Invalid(amount.to_string()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Invalid(amount.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(AmountError::TooPrecise {
            amount: amount.to_string(),
            decimals,
        });
    }

    let overflow = || AmountError::Overflow(amount.to_string());
    let factor = 10u64.pow(decimals as u32);

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| overflow())?
    };
    let mut fraction_units = 0u64;
    if !fraction.is_empty() {
        let padding = decimals as u32 - fraction.len() as u32;
        fraction_units = fraction.parse::<u64>().map_err(|_| overflow())? * 10u64.pow(padding);
    }

    whole_units
        .checked_mul(factor)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(overflow)
}

/// Render base units as a decimal string without trailing zeros
pub fn from_base_units(units: u64, decimals: u8) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let factor = 10u128.pow(decimals as u32);
    let units = units as u128;
    let whole = units / factor;
    let fraction = units % factor;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Sum already-scaled amounts, failing on overflow
pub fn checked_total<I>(units: I) -> Option<u64>
where
    I: IntoIterator<Item = u64>,
{
    units.into_iter().try_fold(0u64, |acc, v| acc.checked_add(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales_whole_and_fractional_amounts() {
        assert_eq!(to_base_units("100", 8).unwrap(), 10_000_000_000);
        assert_eq!(to_base_units("0.1", 9).unwrap(), 100_000_000);
        assert_eq!(to_base_units("1.23456789", 8).unwrap(), 123_456_789);
        assert_eq!(to_base_units(".5", 2).unwrap(), 50);
        assert_eq!(to_base_units("7.", 2).unwrap(), 700);
        assert_eq!(to_base_units("42", 0).unwrap(), 42);
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_precision() {
        assert_eq!(to_base_units("1.5000000000", 2).unwrap(), 150);
    }

    #[test]
    fn test_rejects_excess_precision() {
        assert_eq!(
            to_base_units("0.001", 2),
            Err(AmountError::TooPrecise {
                amount: "0.001".to_string(),
                decimals: 2
            })
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(to_base_units("", 8), Err(AmountError::Empty)));
        assert!(matches!(to_base_units(".", 8), Err(AmountError::Invalid(_))));
        assert!(matches!(to_base_units("-1", 8), Err(AmountError::Invalid(_))));
        assert!(matches!(to_base_units("1e9", 8), Err(AmountError::Invalid(_))));
        assert!(matches!(to_base_units("1.2.3", 8), Err(AmountError::Invalid(_))));
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(matches!(
            to_base_units("18446744073709551616", 0),
            Err(AmountError::Overflow(_))
        ));
        assert!(matches!(
            to_base_units("184467440738", 8),
            Err(AmountError::Overflow(_))
        ));
        assert!(matches!(to_base_units("1", 20), Err(AmountError::Decimals(20))));
    }

    #[test]
    fn test_round_trip_preserves_value() {
        for (amount, decimals) in [("0.1", 8), ("123.45", 2), ("1", 9), ("0.000000001", 9), ("99999", 0)] {
            let units = to_base_units(amount, decimals).unwrap();
            assert_eq!(from_base_units(units, decimals), amount);
        }
    }

    #[test]
    fn test_checked_total() {
        assert_eq!(checked_total([100, 200]), Some(300));
        assert_eq!(checked_total(Vec::<u64>::new()), Some(0));
        assert_eq!(checked_total([u64::MAX, 1]), None);
    }
}
