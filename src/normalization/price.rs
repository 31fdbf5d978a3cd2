use std::sync::OnceLock;

use regex::Regex;

fn currency_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\$,]").expect("static regex"))
}

/// Parse a vendor price cell into a value rounded to two decimals.
///
/// `$` and thousands separators are stripped. Empty cells and the textual
/// `nan` / `None` markers a spreadsheet export leaves behind parse as zero, and
/// so does anything else that is not a finite decimal number. Negative values
/// are kept as-is.
pub fn parse_price(raw: &str) -> f64 {
    let cleaned = currency_noise().replace_all(raw, "");
    let cleaned = cleaned.trim();
    if matches!(cleaned, "" | "nan" | "None") {
        return 0.0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => round_cents(v),
        _ => 0.0,
    }
}

/// Parse an optional cell; a missing cell is an empty one.
pub fn parse_price_opt(raw: Option<&str>) -> f64 {
    parse_price(raw.unwrap_or(""))
}

fn round_cents(v: f64) -> f64 {
    // past 2^52 an f64 has no fractional digits left, and scaling could overflow
    if v.abs() >= 4_503_599_627_370_496.0 {
        return v;
    }
    let rounded = (v * 100.0).round() / 100.0;
    // keep "-0.00" out of the output table
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Render a parsed price the way the canonical table stores it.
pub fn format_price(v: f64) -> String {
    format!("{:.2}", v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_numbers_pass_through() {
        assert_eq!(parse_price("12.50"), 12.50);
        assert_eq!(parse_price("7"), 7.0);
        assert_eq!(parse_price(" 3.1 "), 3.1);
    }

    #[test]
    fn strips_currency_and_thousands() {
        assert_eq!(parse_price("$1,234.5"), 1234.50);
        assert_eq!(parse_price("$ 1,135.00"), 1135.0);
    }

    #[test]
    fn blanks_and_markers_are_zero() {
        for raw in ["", "   ", "nan", "None", "$", "N/A", "precio", "inf", "NaN"] {
            assert_eq!(parse_price(raw), 0.0, "raw = {raw:?}");
        }
        assert_eq!(parse_price_opt(None), 0.0);
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(parse_price("19.999"), 20.0);
        assert_eq!(parse_price("2.344"), 2.34);
        assert_eq!(parse_price("0.004"), 0.0);
    }

    #[test]
    fn huge_values_stay_finite() {
        let v = parse_price("1e307");
        assert!(v.is_finite());
        assert_eq!(v, 1e307);
        assert_eq!(parse_price("-1.7e308"), -1.7e308);
        assert!(!format_price(v).contains("inf"));
    }

    #[test]
    fn negative_values_are_preserved() {
        assert_eq!(parse_price("-5.25"), -5.25);
        assert_eq!(parse_price("-0.001"), 0.0);
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_price(1234.5), "1234.50");
        assert_eq!(format_price(0.0), "0.00");
    }
}
