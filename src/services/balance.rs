//! Converts provider amount encodings into human-scaled balances.
//!
//! Nothing here returns an error: a malformed amount becomes `0.0` so one bad
//! token entry cannot abort an otherwise usable provider response.

use ethers::types::U256;

// Internal helper that parses or transforms values for `finite_or_zero`.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// Internal helper that parses or transforms values for `pow10`.
fn pow10(decimals: u32) -> f64 {
    10_f64.powi(decimals.min(i32::MAX as u32) as i32)
}

/// Scales a raw provider amount.
///
/// Plain integer strings are atomic units and get divided by `10^decimals`.
/// Plain decimal strings (`14.625485`) are already scaled and are returned as
/// parsed. Exponent forms (`2.5e19`, how large JSON integers print once they
/// fall back to `f64`) are atomic when integral and pre-scaled otherwise.
/// `0x`-prefixed strings go through [`normalize_hex`].
pub fn normalize_balance(raw: &str, decimals: u32) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return normalize_hex(trimmed, decimals);
    }
    let Ok(parsed) = trimmed.parse::<f64>() else {
        return 0.0;
    };
    if !parsed.is_finite() {
        return 0.0;
    }
    if is_plain_decimal(trimmed) {
        return parsed;
    }
    if has_exponent(trimmed) && parsed.fract() != 0.0 {
        return parsed;
    }
    finite_or_zero(parsed / pow10(decimals))
}

// Internal helper that checks conditions for `is_plain_decimal`.
fn is_plain_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    unsigned.contains('.') && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
}

// Internal helper that checks conditions for `has_exponent`.
fn has_exponent(value: &str) -> bool {
    value.contains(['e', 'E'])
}

/// Scales a hex-encoded unsigned integer by `10^decimals`.
///
/// The whole and fractional parts are split with integer arithmetic before
/// converting, so 256-bit wei amounts keep their leading precision.
pub fn normalize_hex(raw: &str, decimals: u32) -> f64 {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return 0.0;
    }
    let Ok(value) = U256::from_str_radix(digits, 16) else {
        return 0.0;
    };
    let Some(divisor) = u256_pow10(decimals) else {
        return 0.0;
    };

    let whole = value / divisor;
    let fraction = value % divisor;
    let whole_f = whole.to_string().parse::<f64>().unwrap_or(0.0);
    let fraction_f = fraction.to_string().parse::<f64>().unwrap_or(0.0);
    finite_or_zero(whole_f + fraction_f / pow10(decimals))
}

// Internal helper that parses or transforms values for `u256_pow10`.
fn u256_pow10(decimals: u32) -> Option<U256> {
    let ten = U256::from(10u8);
    let mut acc = U256::one();
    for _ in 0..decimals {
        acc = acc.checked_mul(ten)?;
    }
    Some(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_integers_are_scaled_by_decimals() {
        for (n, decimals) in [(0_u64, 0_u32), (1, 0), (1_000_000, 6), (123_456_789, 9), (5, 18)] {
            let expected = n as f64 / 10_f64.powi(decimals as i32);
            assert_eq!(normalize_balance(&n.to_string(), decimals), expected);
        }
    }

    #[test]
    fn decimal_strings_are_already_scaled() {
        assert_eq!(normalize_balance("14.625485", 6), 14.625485);
        assert_eq!(normalize_balance("0.5", 18), 0.5);
        assert_eq!(normalize_balance(" 3.0 ", 0), 3.0);
    }

    #[test]
    fn malformed_amounts_degrade_to_zero() {
        assert_eq!(normalize_balance("", 18), 0.0);
        assert_eq!(normalize_balance("abc", 18), 0.0);
        assert_eq!(normalize_balance("inf", 0), 0.0);
        assert_eq!(normalize_balance("1e400", 0), 0.0);
    }

    #[test]
    fn exponent_forms_of_large_integers_are_scaled() {
        assert_eq!(normalize_balance("2.5e19", 18), 25.0);
        assert_eq!(normalize_balance("1E21", 18), 1000.0);
        assert_eq!(normalize_balance("1e-3", 6), 0.001);
    }

    #[test]
    fn hex_strings_route_to_hex_normalizer() {
        assert_eq!(normalize_balance("0xde0b6b3a7640000", 18), 1.0);
    }

    #[test]
    fn normalize_hex_handles_wei_amounts() {
        assert_eq!(normalize_hex("0x0", 18), 0.0);
        assert_eq!(normalize_hex("0xde0b6b3a7640000", 18), 1.0);
        assert_eq!(normalize_hex("0x1bc16d674ec80000", 18), 2.0);
        assert!((normalize_hex("0x6f05b59d3b20000", 18) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn normalize_hex_degrades_on_garbage() {
        assert_eq!(normalize_hex("0x", 18), 0.0);
        assert_eq!(normalize_hex("0xzz", 18), 0.0);
        assert_eq!(normalize_hex("0x1", 200), 0.0);
    }
}
