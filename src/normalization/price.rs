use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use std::str::FromStr;

/// Parse a human price (`"19,99"`, `"19.99"`, `"19.99 EUR"`) into integer cents.
///
/// Both `,` and `.` are accepted as decimal separator, and an exponent
/// (`"1e3"`) is honoured. Only the leading numeric prefix is read. Missing, malformed or negative input yields `0`.
/// Cents are rounded half away from zero using exact decimal arithmetic.
pub fn parse_price_cents(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    let normalized = raw.trim().replace(',', ".");
    let Some(prefix) = numeric_prefix(&normalized) else {
        return 0;
    };
    let Ok(amount) = BigDecimal::from_str(&prefix) else {
        return 0;
    };
    let cents = (amount * BigDecimal::from(100)).with_scale_round(0, RoundingMode::HalfUp);
    match cents.to_i64() {
        Some(v) if v > 0 => v,
        _ => 0,
    }
}

// `[+-]?digits[.digits][e[+-]digits]` or `[+-]?.digits[...]`; None when the
// mantissa has no digits at all or the exponent is out of range.
fn numeric_prefix(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut end = 0usize;
    let negative = match bytes.first() {
        Some(b'-') => {
            end = 1;
            true
        }
        Some(b'+') => {
            end = 1;
            false
        }
        _ => false,
    };
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_part = &s[int_start..end];
    let mut frac_part = "";
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        frac_part = &s[frac_start..frac_end];
        end = frac_end;
    }
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let exponent = exponent_suffix(&s[end..]);
    if exponent.is_some_and(|e| e > MAX_EXPONENT) {
        return None;
    }

    let mut out = String::with_capacity(int_part.len() + frac_part.len() + 8);
    if negative {
        out.push('-');
    }
    out.push_str(if int_part.is_empty() { "0" } else { int_part });
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    match exponent {
        Some(e) if e < -MAX_EXPONENT => return Some("0".to_string()),
        Some(e) => out.push_str(&format!("e{e}")),
        None => {}
    }
    Some(out)
}

// Beyond this an amount either overflows i64 cents or rounds to zero.
const MAX_EXPONENT: i64 = 40;

// `[eE][+-]?digits`; a bare `e` is not an exponent.
fn exponent_suffix(s: &str) -> Option<i64> {
    let rest = s.strip_prefix(['e', 'E'])?;
    let digits_from = usize::from(rest.starts_with(['+', '-']));
    let digits = rest[digits_from..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    let magnitude: i64 = rest[digits_from..digits_from + digits]
        .parse()
        .unwrap_or(i64::MAX);
    Some(if rest.starts_with('-') {
        -magnitude
    } else {
        magnitude
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_comma_and_dot_separators() {
        assert_eq!(parse_price_cents(Some("19,99")), 1999);
        assert_eq!(parse_price_cents(Some("19.99")), 1999);
        assert_eq!(parse_price_cents(Some(" 4 ")), 400);
        assert_eq!(parse_price_cents(Some("0.1")), 10);
    }

    #[test]
    fn malformed_or_missing_is_zero() {
        assert_eq!(parse_price_cents(None), 0);
        assert_eq!(parse_price_cents(Some("")), 0);
        assert_eq!(parse_price_cents(Some("abc")), 0);
        assert_eq!(parse_price_cents(Some("-5.00")), 0);
    }

    #[test]
    fn reads_leading_numeric_prefix() {
        assert_eq!(parse_price_cents(Some("19.99 EUR")), 1999);
        assert_eq!(parse_price_cents(Some("12.")), 1200);
        assert_eq!(parse_price_cents(Some(",5")), 50);
    }

    #[test]
    fn honours_exponent_notation() {
        assert_eq!(parse_price_cents(Some("1e3")), 100_000);
        assert_eq!(parse_price_cents(Some("2.5E-1")), 25);
        assert_eq!(parse_price_cents(Some("1,5e+2 Ft")), 15_000);
        // no exponent digits: plain prefix
        assert_eq!(parse_price_cents(Some("7e")), 700);
        assert_eq!(parse_price_cents(Some("3e-99")), 0);
        assert_eq!(parse_price_cents(Some("1e999999")), 0);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(parse_price_cents(Some("0.005")), 1);
        assert_eq!(parse_price_cents(Some("0.015")), 2);
        assert_eq!(parse_price_cents(Some("10.004")), 1000);
        assert_eq!(parse_price_cents(Some("1,2345")), 123);
    }
}
