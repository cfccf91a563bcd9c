//! crates/personnel_core/src/format.rs
//!
//! Display helpers shared by every list renderer.

use chrono::{DateTime, NaiveDate};

/// Parses the date part of a `YYYY-MM-DD` value or an RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Renders a stored date as `10 Jan 2024`; blank or unparseable input renders empty.
pub fn format_date(raw: &str) -> String {
    parse_date(raw)
        .map(|date| date.format("%d %b %Y").to_string())
        .unwrap_or_default()
}

/// Lowercases the input and uppercases the first letter of every word.
pub fn capitalize_words(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut at_word_start = true;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        let is_word = ch.is_alphanumeric() || ch == '_';
        if is_word && at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = !is_word;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_plain_and_timestamp_dates() {
        assert_eq!(format_date("2024-01-10"), "10 Jan 2024");
        assert_eq!(format_date("2024-01-10T00:00:00.000Z"), "10 Jan 2024");
        assert_eq!(format_date(""), "");
        assert_eq!(format_date("not a date"), "");
    }

    #[test]
    fn capitalizes_each_word() {
        assert_eq!(capitalize_words("PENDING approval"), "Pending Approval");
        assert_eq!(capitalize_words("in-service"), "In-Service");
        assert_eq!(capitalize_words(""), "");
    }
}
