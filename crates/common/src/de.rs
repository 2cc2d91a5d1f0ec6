//! Lenient field decoders for payloads produced by older versions of the web app.
//!
//! Amounts show up as integers, floats, or formatted strings ("Rp 100.000"),
//! and item attributes like purity arrive as either numbers or text.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

pub(crate) fn amount<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_amount(&value).ok_or_else(|| de::Error::custom(format!("invalid amount: {}", value)))
}

pub(crate) fn opt_amount<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    parse_amount(&value)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid amount: {}", value)))
}

pub(crate) fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => return Err(de::Error::custom(format!("expected text, got {}", other))),
    })
}

pub(crate) fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid decimal: {}", s))),
        other => Err(de::Error::custom(format!("invalid decimal: {}", other))),
    }
}

pub(crate) fn quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(1),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|q| u32::try_from(q).ok())
            .ok_or_else(|| de::Error::custom(format!("invalid quantity: {}", value))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| de::Error::custom(format!("invalid quantity: {}", s))),
        _ => Err(de::Error::custom(format!("invalid quantity: {}", value))),
    }
}

/// Accepts `100000`, `100000.0`, `"100000"`, `"100.000"` and `"Rp 100.000"`.
fn parse_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => parse_amount_text(s),
        _ => None,
    }
}

fn is_separator(c: char) -> bool {
    c == '.' || c == ','
}

/// Formatted amount in either convention, `1.250.000,50` or `1,250,000.50`.
///
/// A final separator followed by one or two digits starts the fraction, which
/// is rounded to whole rupiah. Any other separator must group thousands, and
/// all grouping separators must be the same character. Anything else is
/// rejected rather than guessed.
fn parse_amount_text(text: &str) -> Option<i64> {
    let compact: String = text
        .trim()
        .trim_start_matches("Rp")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        return Some(0);
    }

    let (negative, unsigned) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };

    let (whole, fraction, decimal_separator) = match unsigned.rfind(is_separator) {
        Some(pos) if (2..=3).contains(&(unsigned.len() - pos)) => (
            &unsigned[..pos],
            &unsigned[pos + 1..],
            unsigned[pos..].chars().next(),
        ),
        _ => (unsigned, "", None),
    };
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut separators = whole.chars().filter(|c| is_separator(*c));
    if let Some(grouping) = separators.next() {
        if Some(grouping) == decimal_separator || separators.any(|c| c != grouping) {
            return None;
        }
        let mut groups = whole.split(is_separator);
        let leading = groups.next().unwrap_or_default();
        if leading.is_empty() || leading.len() > 3 || groups.any(|g| g.len() != 3) {
            return None;
        }
    }

    let digits: String = whole.chars().filter(|c| !is_separator(*c)).collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut amount: i64 = digits.parse().ok()?;
    if fraction.starts_with(|c: char| c >= '5') {
        amount = amount.checked_add(1)?;
    }
    Some(if negative { -amount } else { amount })
}
