//! Money helpers over exact decimals

use bigdecimal::{BigDecimal, RoundingMode};
use std::str::FromStr;

/// Default tolerance for comparing monetary amounts: one cent
pub fn cent() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// Round an amount to two decimal places, half away from zero
pub fn round_money(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Whether two amounts differ by no more than `tolerance`
pub fn amounts_match(a: &BigDecimal, b: &BigDecimal, tolerance: &BigDecimal) -> bool {
    (a - b).abs() <= *tolerance
}

/// Parse a monetary amount from text
pub fn parse_money(text: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(text.trim()).ok()
}

/// Format an amount for display, e.g. `$1,234.50`
pub fn format_money(amount: &BigDecimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded < BigDecimal::from(0);
    let text = rounded.abs().to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{:0<2}", if negative { "-" } else { "" }, grouped, fraction)
}
