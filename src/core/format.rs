/// Renders a monetary amount for display.
pub trait Formatter: Send + Sync {
    fn format_amount(&self, amount: f64) -> String;
}

/// Whole rupees with Indian digit grouping, e.g. `₹12,34,567`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RupeeFormatter;

impl Formatter for RupeeFormatter {
    fn format_amount(&self, amount: f64) -> String {
        if !amount.is_finite() {
            return "-".to_string();
        }
        let rounded = amount.round();
        let sign = if rounded < 0.0 { "-" } else { "" };
        let digits = format!("{:.0}", rounded.abs());
        format!("{sign}₹{}", group_indian(&digits))
    }
}

// Last three digits form one group, every group before it has two.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}
