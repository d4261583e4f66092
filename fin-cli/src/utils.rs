use std::sync::LazyLock;

use fin_core::DeductionInput;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Error returned when a string cannot be parsed as a [`Decimal`].
#[derive(Debug, Error)]
#[error("invalid decimal '{input}': {source}")]
pub struct ParseDecimalError {
    input: String,
    #[source]
    source: rust_decimal::Error,
}

#[derive(Debug, Error)]
pub enum DeductionArgError {
    #[error("expected 'Name=amount[;cap=X][;pct=Y]', got '{0}'")]
    Malformed(String),

    #[error("unknown deduction option '{0}' (expected cap or pct)")]
    UnknownOption(String),

    #[error(transparent)]
    Amount(#[from] ParseDecimalError),

    #[error("deduction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Trims whitespace and drops `,` thousands separators.
fn normalize_decimal_input(s: &str) -> String {
    s.trim().replace(',', "")
}

/// Parses an amount such as `"1,234.56"`.
///
/// Empty input is treated as 0.
pub fn parse_decimal(s: &str) -> Result<Decimal, ParseDecimalError> {
    let normalized = normalize_decimal_input(s);
    if normalized.is_empty() {
        return Ok(Decimal::ZERO);
    }
    normalized.parse().map_err(|e| {
        tracing::debug!(input = %s, "invalid decimal: {}", e);
        ParseDecimalError {
            input: s.to_string(),
            source: e,
        }
    })
}

/// Whole-number percentage to fraction: `"30"` is `0.30`.
pub fn parse_percent(s: &str) -> Result<Decimal, ParseDecimalError> {
    parse_decimal(s).map(|pct| pct / Decimal::ONE_HUNDRED)
}

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static NAME_AMOUNT: Pattern =
    LazyLock::new(|| Regex::new(r"^\s*(?P<name>[^=;]*[^=;\s])\s*=\s*(?P<amount>[^;]+?)\s*$"));

static OPTION: Pattern =
    LazyLock::new(|| Regex::new(r"^\s*(?P<key>[A-Za-z_]+)\s*=\s*(?P<value>.+?)\s*$"));

fn compiled(pattern: &'static Pattern) -> Result<&'static Regex, DeductionArgError> {
    pattern.as_ref().map_err(|e| DeductionArgError::Pattern(e.clone()))
}

/// Parses an ad hoc deduction written as `Name=amount[;cap=X][;pct=Y]`.
///
/// `pct` is a whole-number percentage of gross income.
///
/// ```
/// # use fin_cli::utils::parse_deduction_arg;
/// # use rust_decimal::Decimal;
/// let d = parse_deduction_arg("RMF=250,000;pct=30").unwrap();
/// assert_eq!(d.name, "RMF");
/// assert_eq!(d.amount, Decimal::from(250_000));
/// assert_eq!(d.cap_percent, Some(Decimal::new(30, 2)));
/// ```
pub fn parse_deduction_arg(s: &str) -> Result<DeductionInput, DeductionArgError> {
    let mut parts = s.split(';');
    let head = parts.next().unwrap_or_default();
    let caps = compiled(&NAME_AMOUNT)?
        .captures(head)
        .ok_or_else(|| DeductionArgError::Malformed(s.to_string()))?;

    let mut deduction = DeductionInput::new(&caps["name"], parse_decimal(&caps["amount"])?);

    let option_pattern = compiled(&OPTION)?;
    for part in parts.filter(|part| !part.trim().is_empty()) {
        let option = option_pattern
            .captures(part)
            .ok_or_else(|| DeductionArgError::Malformed(s.to_string()))?;
        match option["key"].to_ascii_lowercase().as_str() {
            "cap" => deduction = deduction.with_cap_amount(parse_decimal(&option["value"])?),
            "pct" => deduction = deduction.with_cap_percent(parse_percent(&option["value"])?),
            other => return Err(DeductionArgError::UnknownOption(other.to_string())),
        }
    }

    Ok(deduction)
}

/// Two decimal places with `,` thousands separators: `1,234,567.80`.
pub fn format_amount(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

/// A fraction shown as a percentage: `0.3` is `30%`.
pub fn format_percent(fraction: Decimal) -> String {
    format!("{}%", (fraction * Decimal::ONE_HUNDRED).normalize())
}

/// Formats an optional amount, `-` when absent.
pub fn opt_amount_display(d: Option<Decimal>) -> String {
    d.map(format_amount).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_decimal_accepts_comma_thousands_separator() {
        assert_eq!(parse_decimal("1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_decimal("1,234,567.89").unwrap(), dec!(1234567.89));
    }

    #[test]
    fn parse_decimal_trims_and_treats_empty_as_zero() {
        assert_eq!(parse_decimal("  123.45  ").unwrap(), dec!(123.45));
        assert_eq!(parse_decimal("   ").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn parse_decimal_invalid_returns_error() {
        let err = parse_decimal("abc").unwrap_err();
        assert!(err.to_string().starts_with("invalid decimal 'abc'"));
    }

    #[test]
    fn percent_becomes_fraction() {
        assert_eq!(parse_percent("30").unwrap(), dec!(0.30));
        assert_eq!(parse_percent("12.5").unwrap(), dec!(0.125));
    }

    #[test]
    fn bare_deduction_arg() {
        let d = parse_deduction_arg("Life insurance = 80,000").unwrap();

        assert_eq!(d, DeductionInput::new("Life insurance", dec!(80000)));
    }

    #[test]
    fn deduction_arg_with_both_caps() {
        let d = parse_deduction_arg("RMF=250000;cap=500000;pct=30").unwrap();

        assert_eq!(
            d,
            DeductionInput::new("RMF", dec!(250000))
                .with_cap_amount(dec!(500000))
                .with_cap_percent(dec!(0.30))
        );
    }

    #[test]
    fn deduction_arg_options_are_case_insensitive_and_trailing_semicolon_ok() {
        let d = parse_deduction_arg("Donation=5000; PCT=10;").unwrap();

        assert_eq!(d.cap_percent, Some(dec!(0.10)));
        assert_eq!(d.cap_amount, None);
    }

    #[test]
    fn deduction_arg_errors() {
        assert!(matches!(
            parse_deduction_arg("no amount"),
            Err(DeductionArgError::Malformed(_))
        ));
        assert!(matches!(
            parse_deduction_arg("=5000"),
            Err(DeductionArgError::Malformed(_))
        ));
        assert!(matches!(
            parse_deduction_arg("X=5000;limit=10"),
            Err(DeductionArgError::UnknownOption(key)) if key == "limit"
        ));
        assert!(matches!(
            parse_deduction_arg("X=lots"),
            Err(DeductionArgError::Amount(_))
        ));
    }

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(999.5)), "999.50");
        assert_eq!(format_amount(dec!(1000)), "1,000.00");
        assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(format_amount(dec!(-125000)), "-125,000.00");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
    }

    #[test]
    fn percent_display() {
        assert_eq!(format_percent(dec!(0.10)), "10%");
        assert_eq!(format_percent(dec!(0.125)), "12.5%");
        assert_eq!(opt_amount_display(None), "-");
    }
}
