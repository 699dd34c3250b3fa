// src/report/format.rs - Number formatting and markdown tables

const LAKH: f64 = 100_000.0;
const CRORE: f64 = 10_000_000.0;

/// Rupee amount in Indian units: whole crores from 1000 Cr up, two-decimal
/// crores from 1 Cr, two-decimal lakhs from 1 L, whole rupees below.
pub fn format_currency(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return "₹0".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let amount = value.abs();
    let crores = amount / CRORE;
    if crores >= 1000.0 {
        format!("{}₹{} Cr", sign, group_thousands(crores))
    } else if crores >= 1.0 {
        format!("{}₹{:.2} Cr", sign, crores)
    } else if amount >= LAKH {
        format!("{}₹{:.2} L", sign, amount / LAKH)
    } else {
        format!("{}₹{}", sign, group_thousands(amount))
    }
}

/// Rounds to a whole number and separates thousands with commas.
pub fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, digit) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0.0 && rounded != "0" {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub fn count(n: usize) -> String {
    group_thousands(n as f64)
}

/// Percentage with one decimal.
pub fn pct(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Renders a markdown table. Every row should have as many cells as there
/// are headers.
pub fn table<R>(headers: &[&str], rows: R) -> String
where
    R: IntoIterator<Item = Vec<String>>,
{
    let mut out = format!("| {} |\n", headers.join(" | "));
    let rule: Vec<String> = headers.iter().map(|h| "-".repeat(h.chars().count().max(3))).collect();
    out.push_str(&format!("|{}|\n", rule.join("|")));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

/// Markdown bold.
pub fn bold(text: &str) -> String {
    format!("**{}**", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_units() {
        assert_eq!(format_currency(0.0), "₹0");
        assert_eq!(format_currency(1234.4), "₹1,234");
        assert_eq!(format_currency(99_999.0), "₹99,999");
        assert_eq!(format_currency(250_000.0), "₹2.50 L");
        assert_eq!(format_currency(12_000_000.0), "₹1.20 Cr");
        assert_eq!(format_currency(25_000_000_000.0), "₹2,500 Cr");
        assert_eq!(format_currency(-600_000.0), "-₹6.00 L");
        assert_eq!(format_currency(-450.0), "-₹450");
        assert_eq!(format_currency(f64::NAN), "₹0");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(1_234_567.4), "1,234,567");
        assert_eq!(group_thousands(-98_765.0), "-98,765");
        assert_eq!(count(50_721), "50,721");
    }

    #[test]
    fn test_pct() {
        assert_eq!(pct(12.345), "12.3%");
        assert_eq!(pct(0.0), "0.0%");
        assert_eq!(pct(100.0), "100.0%");
    }

    #[test]
    fn test_table_layout() {
        let rendered = table(
            &["City", "Clients"],
            vec![vec!["Pune".to_string(), "12".to_string()]],
        );
        assert_eq!(rendered, "| City | Clients |\n|----|-------|\n| Pune | 12 |\n");
    }
}
