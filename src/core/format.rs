pub const DEFAULT_DISPLAY_CURRENCY: &str = "BRL";

pub fn currency_symbol(code: &str) -> &str {
    match code {
        "BRL" => "R$",
        "USD" => "US$",
        "EUR" => "€",
        "GBP" => "£",
        other => other,
    }
}

/// Formats an amount Brazilian style, e.g. `R$ 1.234,56` or `-US$ 10,00`.
pub fn format_currency(amount: f64, currency: Option<&str>) -> String {
    let code = currency.unwrap_or(DEFAULT_DISPLAY_CURRENCY);
    let total_cents = (amount.abs() * 100.0).round() as u64;
    let units = total_cents / 100;
    let cents = total_cents % 100;

    // Add thousands separators
    let digits = units.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let units_formatted: String = grouped.chars().rev().collect();

    let sign = if amount < 0.0 && total_cents > 0 { "-" } else { "" };
    format!("{sign}{} {units_formatted},{cents:02}", currency_symbol(code))
}

/// Format a rate as a percentage with two decimals
pub fn format_percentage(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

pub fn format_time_horizon(months: u32) -> String {
    let years = months / 12;
    let remaining = months % 12;

    let year_part = format!("{years} {}", if years == 1 { "year" } else { "years" });
    let month_part = format!("{remaining} {}", if remaining == 1 { "month" } else { "months" });

    if years == 0 {
        month_part
    } else if remaining == 0 {
        year_part
    } else {
        format!("{year_part} and {month_part}")
    }
}
