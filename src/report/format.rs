//! Number and label formatting shared by the PDF and the email body

use crate::summary::Delta;

/// `1234567` -> `"1,234,567"`
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Ratio in `[0, 1]` as a percentage with two decimals
pub fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

pub fn format_delta(delta: Delta) -> String {
    match delta {
        Delta::Percent(p) if p.abs() < 0.05 => "0.0%".to_string(),
        Delta::Percent(p) => format!("{:+.1}%", p),
        Delta::Unavailable => "N/A".to_string(),
    }
}

/// Shorten `label` to at most `max_chars`, marking the cut with `...`
pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_string();
    }
    let kept: String = label.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
