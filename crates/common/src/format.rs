//! Number formatting shared by every printed rendition

/// Group digits by thousands with '.': `1250000` → `1.250.000`
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if n < 0 {
        grouped.insert(0, '-');
    }
    grouped
}
