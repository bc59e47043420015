//! Currency formatting for rendered amounts.

/// Currency symbol prefixed to every rendered amount.
pub const CURRENCY_SYMBOL: &str = "£";

/// Format an amount as `£1,234.50`. Negative values get a leading `-`.
pub fn format_money(amount: f64) -> String {
    let pence = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && pence > 0 { "-" } else { "" };
    format!(
        "{}{}{}.{:02}",
        sign,
        CURRENCY_SYMBOL,
        group_thousands(pence / 100),
        pence % 100
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
