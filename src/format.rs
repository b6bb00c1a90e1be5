//! Presentation Formatting - Ordinals, Dates, Times, Interpolation
//!
//! Every formatter is pure and total: empty input yields empty output and
//! unparseable input is passed through trimmed instead of failing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::FormRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateLocale {
    #[default]
    #[serde(rename = "en-IN")]
    EnIn,
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "en-US")]
    EnUs,
}

impl DateLocale {
    fn pattern(self) -> &'static str {
        match self {
            DateLocale::EnIn => "%A, %-d %B, %Y",
            DateLocale::EnGb => "%A %-d %B %Y",
            DateLocale::EnUs => "%A, %B %-d, %Y",
        }
    }
}

/// English ordinal: 1st, 2nd, 3rd, 4th, 11th, 12th, 13th, 21st, ...
pub fn ordinal(n: u64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Ordinal of a free-text number. Non-numeric text is returned as typed.
pub fn ordinal_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match trimmed.parse::<u64>() {
        Ok(n) => ordinal(n),
        Err(_) => trimmed.to_string(),
    }
}

/// Long-form date from an ISO `YYYY-MM-DD` string.
pub fn format_date(iso: &str, locale: DateLocale) -> String {
    let trimmed = iso.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => date.format(locale.pattern()).to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// 24h `HH:MM[:SS]` to 12h `h:MM AM|PM`.
pub fn format_time(hhmm: &str) -> String {
    let trimmed = hhmm.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut parts = trimmed.split(':');
    let hour = parts.next().and_then(|h| h.parse::<u32>().ok());
    let minute = parts
        .next()
        .filter(|m| m.len() == 2 && m.parse::<u32>().map_or(false, |v| v < 60));

    match (hour, minute) {
        (Some(hr), Some(m)) if hr < 24 => {
            let ampm = if hr >= 12 { "PM" } else { "AM" };
            let h12 = if hr % 12 == 0 { 12 } else { hr % 12 };
            format!("{}:{} {}", h12, m, ampm)
        }
        _ => trimmed.to_string(),
    }
}

/// Collapse every whitespace run into a single underscore.
pub fn underscore_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

// --- Interpolation ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unbalanced brace in \"{0}\"")]
    UnbalancedBrace(String),

    #[error("Empty placeholder in \"{0}\"")]
    EmptyPlaceholder(String),

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Date,
    Time,
    Ordinal,
    Underscore,
    Default(String),
    Prefix(String),
    Suffix(String),
}

impl Filter {
    fn parse(spec: &str) -> Result<Self, FormatError> {
        let (name, arg) = match spec.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (spec.trim(), None),
        };
        match (name, arg) {
            ("date", None) => Ok(Filter::Date),
            ("time", None) => Ok(Filter::Time),
            ("ordinal", None) => Ok(Filter::Ordinal),
            ("underscore", None) => Ok(Filter::Underscore),
            ("default", Some(arg)) => Ok(Filter::Default(arg.to_string())),
            ("prefix", Some(arg)) => Ok(Filter::Prefix(arg.to_string())),
            ("suffix", Some(arg)) => Ok(Filter::Suffix(arg.to_string())),
            _ => Err(FormatError::UnknownFilter(spec.to_string())),
        }
    }

    fn apply(&self, value: String, locale: DateLocale) -> String {
        match self {
            Filter::Date => format_date(&value, locale),
            Filter::Time => format_time(&value),
            Filter::Ordinal => ordinal_text(&value),
            Filter::Underscore => underscore_whitespace(&value),
            Filter::Default(text) if value.trim().is_empty() => text.clone(),
            Filter::Default(_) => value,
            Filter::Prefix(_) | Filter::Suffix(_) if value.trim().is_empty() => String::new(),
            Filter::Prefix(text) => format!("{}{}", text, value),
            Filter::Suffix(text) => format!("{}{}", value, text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Field { name: String, filters: Vec<Filter> },
}

/// Parse `Dear {guestName}` / `{years|ordinal}` style text into segments.
pub fn parse_template(text: &str) -> Result<Vec<Segment>, FormatError> {
    let mut segments = vec![];
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(FormatError::UnbalancedBrace(text.to_string())),
            '{' => {
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(FormatError::UnbalancedBrace(text.to_string()))
                        }
                        Some(ch) => body.push(ch),
                    }
                }

                let mut parts = body.split('|');
                let name = parts.next().unwrap_or_default().trim();
                if name.is_empty() {
                    return Err(FormatError::EmptyPlaceholder(text.to_string()));
                }
                let filters = parts.map(Filter::parse).collect::<Result<Vec<_>, _>>()?;

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field { name: name.to_string(), filters });
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Field names referenced by a template string.
pub fn referenced_fields(text: &str) -> Result<Vec<String>, FormatError> {
    Ok(parse_template(text)?
        .into_iter()
        .filter_map(|s| match s {
            Segment::Field { name, .. } => Some(name),
            Segment::Literal(_) => None,
        })
        .collect())
}

pub fn render_segments(segments: &[Segment], form: &FormRecord, locale: DateLocale) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Field { name, filters } => {
                let value = filters
                    .iter()
                    .fold(form.get(name).to_string(), |v, f| f.apply(v, locale));
                out.push_str(&value);
            }
        }
    }
    out
}

pub fn interpolate(text: &str, form: &FormRecord, locale: DateLocale) -> Result<String, FormatError> {
    let segments = parse_template(text)?;
    Ok(render_segments(&segments, form, locale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_suffixes() {
        let cases = [
            (1, "1st"), (2, "2nd"), (3, "3rd"), (4, "4th"),
            (11, "11th"), (12, "12th"), (13, "13th"),
            (21, "21st"), (22, "22nd"), (23, "23rd"),
            (100, "100th"), (101, "101st"), (111, "111th"), (112, "112th"),
        ];
        for (n, expected) in cases {
            assert_eq!(ordinal(n), expected, "ordinal({})", n);
        }
    }

    #[test]
    fn test_ordinal_text_fallbacks() {
        assert_eq!(ordinal_text(""), "");
        assert_eq!(ordinal_text("  25 "), "25th");
        assert_eq!(ordinal_text("silver"), "silver");
    }

    #[test]
    fn test_format_date_locales() {
        assert_eq!(format_date("", DateLocale::EnIn), "");
        assert_eq!(format_date("2025-03-14", DateLocale::EnIn), "Friday, 14 March, 2025");
        assert_eq!(format_date("2025-03-14", DateLocale::EnGb), "Friday 14 March 2025");
        assert_eq!(format_date("2025-03-14", DateLocale::EnUs), "Friday, March 14, 2025");
        assert_eq!(format_date("next friday", DateLocale::EnIn), "next friday");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(""), "");
        assert_eq!(format_time("00:15"), "12:15 AM");
        assert_eq!(format_time("09:05"), "9:05 AM");
        assert_eq!(format_time("12:00"), "12:00 PM");
        assert_eq!(format_time("18:30"), "6:30 PM");
        assert_eq!(format_time("18:30:00"), "6:30 PM");
        assert_eq!(format_time("25:00"), "25:00");
        assert_eq!(format_time("evening"), "evening");
    }

    #[test]
    fn test_underscore_whitespace() {
        assert_eq!(underscore_whitespace("Rahul  Sharma"), "Rahul_Sharma");
        assert_eq!(underscore_whitespace("Annual Shyam\tBhajan Ratri"), "Annual_Shyam_Bhajan_Ratri");
        assert_eq!(underscore_whitespace("Priya"), "Priya");
    }

    #[test]
    fn test_interpolate_filters() {
        let mut form = FormRecord::with_fields(["years", "venue", "venueAddress", "time"]);
        form.set("years", "25");
        form.set("venue", "Hotel Grand");

        let text = "{years|ordinal} Anniversary at {venue}{venueAddress|prefix:, }";
        assert_eq!(
            interpolate(text, &form, DateLocale::EnIn).unwrap(),
            "25th Anniversary at Hotel Grand"
        );

        form.set("venueAddress", "Connaught Place");
        assert_eq!(
            interpolate("{venue}{venueAddress|prefix:, }", &form, DateLocale::EnIn).unwrap(),
            "Hotel Grand, Connaught Place"
        );

        assert_eq!(
            interpolate("{time|time|default:Ratri 9:00 Baje}", &form, DateLocale::EnIn).unwrap(),
            "Ratri 9:00 Baje"
        );
    }

    #[test]
    fn test_interpolate_escapes_and_errors() {
        let form = FormRecord::default();
        assert_eq!(interpolate("{{literal}}", &form, DateLocale::EnIn).unwrap(), "{literal}");
        assert!(matches!(parse_template("{open"), Err(FormatError::UnbalancedBrace(_))));
        assert!(matches!(parse_template("close}"), Err(FormatError::UnbalancedBrace(_))));
        assert!(matches!(parse_template("{ |date}"), Err(FormatError::EmptyPlaceholder(_))));
        assert_eq!(
            parse_template("{name|shout}"),
            Err(FormatError::UnknownFilter("shout".to_string()))
        );
    }

    #[test]
    fn test_referenced_fields() {
        let fields = referenced_fields("💑 {partner1} & {partner2} 💑").unwrap();
        assert_eq!(fields, vec!["partner1", "partner2"]);
    }
}
