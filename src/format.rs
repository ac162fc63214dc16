//! Shared value-formatting helpers for rendered alert/digest text (spec
//! §6.3 "Value formatting"). Kept as one small module rather than
//! duplicated in `alerting` and `reporting`, since both render the same
//! `$X.XXM` / `$Xk` convention.

/// `>= 1_000_000 => "$X.XXM"`, otherwise `"$Xk"` (spec §6.3).
pub fn format_usd(value: f64) -> String {
    if value.abs() >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else {
        format!("${}k", (value / 1000.0).round() as i64)
    }
}

/// Bare numeric millions, for templates that already carry the `$...M`
/// wrapper around a computed value (cascade OI line, OI-surge new-OI line).
pub fn millions(value: f64) -> String {
    format!("{:.2}", value / 1_000_000.0)
}

/// A plain price, not the k/M-scaled notional convention above. Low-price
/// alts (sub-$1) keep more decimals so they don't all render as `$0.00`.
pub fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{price:.2}")
    } else {
        format!("{price:.6}")
    }
}

/// Percent with a fixed sign and two decimals, e.g. `+2.50` / `-3.10`.
pub fn format_signed_pct(pct: f64) -> String {
    format!("{}{:.2}", if pct >= 0.0 { "+" } else { "" }, pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_usd_switches_at_one_million() {
        assert_eq!(format_usd(140_000.0), "$140k");
        assert_eq!(format_usd(1_700_000.0), "$1.70M");
        assert_eq!(format_usd(999_999.0), "$1000k");
        assert_eq!(format_usd(1_000_000.0), "$1.00M");
    }

    #[test]
    fn millions_formats_two_decimals() {
        assert_eq!(millions(103_000_000.0), "103.00");
    }

    #[test]
    fn format_price_keeps_extra_precision_below_one_dollar() {
        assert_eq!(format_price(50_000.0), "50000.00");
        assert_eq!(format_price(0.0234), "0.023400");
    }
}
