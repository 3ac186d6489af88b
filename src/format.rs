//! Locale sensitive formatting and the render settings that select it.
//!
//! The engine never formats numbers, dates or booleans itself. It consults a
//! [`Formats`] service with the format string from the active [`Settings`].
//! [`DefaultFormats`] covers the computer-readable formats and simple
//! patterns; hosts that need real locale data plug in their own.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::value::{Date, DateKind, Number};
use crate::{Error, Result};

/// Render settings.
///
/// The engine's settings are the baseline. A template may be compiled with
/// its own, a render may override some through the
/// [`Renderer`][crate::Renderer] and `#setting` changes them for the rest of
/// the render.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct Settings {
    /// For example `en_US`.
    pub locale: String,
    /// `number`, `c` (or `computer`) or a pattern such as `#,##0.00`.
    pub number_format: String,
    /// `c` or the two words to print, for example `yes,no`.
    pub boolean_format: String,
    pub date_format: String,
    pub time_format: String,
    pub datetime_format: String,
    /// The maximum nesting of macro calls, function calls and includes.
    pub max_call_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: String::from("en_US"),
            number_format: String::from("number"),
            boolean_format: String::from("true,false"),
            date_format: String::from("iso"),
            time_format: String::from("iso"),
            datetime_format: String::from("iso"),
            max_call_depth: 256,
        }
    }
}

impl Settings {
    pub(crate) const NAMES: &'static [&'static str] = &[
        "locale",
        "number_format",
        "boolean_format",
        "date_format",
        "time_format",
        "datetime_format",
        "max_call_depth",
    ];

    pub(crate) fn is_known(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    /// Changes one setting by name, as `#setting` does.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "locale" => self.locale = value.to_owned(),
            "number_format" => self.number_format = value.to_owned(),
            "boolean_format" => {
                if value != "c" && value.split(',').count() != 2 {
                    return Err(Error::invalid(format!(
                        "boolean_format must be `c` or two comma separated words, found `{value}`"
                    )));
                }
                self.boolean_format = value.to_owned()
            }
            "date_format" => self.date_format = value.to_owned(),
            "time_format" => self.time_format = value.to_owned(),
            "datetime_format" => self.datetime_format = value.to_owned(),
            "max_call_depth" => {
                self.max_call_depth = value.parse().map_err(|_| {
                    Error::invalid(format!("max_call_depth must be a number, found `{value}`"))
                })?
            }
            _ => return Err(Error::invalid(format!("unknown setting `{name}`"))),
        }
        Ok(())
    }

    /// The language part of the locale, `en` for `en_US`.
    pub fn lang(&self) -> &str {
        self.locale
            .split(['_', '-'])
            .next()
            .unwrap_or(&self.locale)
    }

    pub(crate) fn date_format_for(&self, kind: DateKind) -> Result<&str> {
        match kind {
            DateKind::Date => Ok(&self.date_format),
            DateKind::Time => Ok(&self.time_format),
            DateKind::DateTime => Ok(&self.datetime_format),
            DateKind::Unknown => Err(unknown_kind()),
        }
    }

    /// The words for `true` and `false`.
    pub(crate) fn boolean_words(&self) -> (&str, &str) {
        match self.boolean_format.split_once(',') {
            Some((t, f)) if self.boolean_format != "c" => (t, f),
            _ => ("true", "false"),
        }
    }
}

/// The formatting and collation service.
///
/// Every method has a default, so an implementation only overrides what it
/// supports.
pub trait Formats: Send + Sync {
    fn format_number(&self, n: Number, format: &str, _locale: &str) -> Result<String> {
        format_number(n, format)
    }

    fn format_date(&self, date: Date, format: &str, _locale: &str) -> Result<String> {
        format_date(date, format)
    }

    /// Orders two strings for comparison and sorting.
    fn collate(&self, a: &str, b: &str, _locale: &str) -> Ordering {
        a.cmp(b)
    }
}

/// Locale independent formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormats;

impl Formats for DefaultFormats {}

////////////////////////////////////////////////////////////////////////////////
// Numbers
////////////////////////////////////////////////////////////////////////////////

fn format_number(n: Number, format: &str) -> Result<String> {
    match format {
        "c" | "computer" => Ok(n.to_string()),
        "number" | "" => Ok(format_pattern(n, &Pattern::NUMBER)),
        "0" | "integer" => Ok(format_pattern(n, &Pattern::INTEGER)),
        pattern => Pattern::parse(pattern)
            .map(|p| format_pattern(n, &p))
            .ok_or_else(|| Error::invalid(format!("unsupported number format `{pattern}`"))),
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Pattern {
    grouping: bool,
    min_int: usize,
    min_frac: usize,
    max_frac: usize,
}

impl Pattern {
    const NUMBER: Pattern = Pattern {
        grouping: false,
        min_int: 1,
        min_frac: 0,
        max_frac: 3,
    };

    const INTEGER: Pattern = Pattern {
        grouping: false,
        min_int: 1,
        min_frac: 0,
        max_frac: 0,
    };

    /// Parses a decimal pattern made of `#`, `0`, `,` and at most one `.`.
    fn parse(pattern: &str) -> Option<Self> {
        if pattern.is_empty() || !pattern.chars().all(|c| matches!(c, '#' | '0' | ',' | '.')) {
            return None;
        }
        let (int, frac) = match pattern.split_once('.') {
            Some((int, frac)) if !frac.contains(['.', ',']) => (int, frac),
            Some(_) => return None,
            None => (pattern, ""),
        };
        Some(Self {
            grouping: int.contains(','),
            min_int: int.chars().filter(|&c| c == '0').count(),
            min_frac: frac.chars().filter(|&c| c == '0').count(),
            max_frac: frac.len(),
        })
    }
}

fn format_pattern(n: Number, p: &Pattern) -> String {
    let f = match n {
        Number::Int(i) if p.min_frac == 0 && !p.grouping && p.min_int <= 1 => {
            return i.to_string();
        }
        Number::Int(i) => i as f64,
        Number::Float(f) => f,
    };
    if !f.is_finite() {
        return Number::Float(f).to_string();
    }

    let rounded = format!("{:.*}", p.max_frac, f.abs());
    let (int, frac) = match rounded.split_once('.') {
        Some((int, frac)) => (int.to_owned(), frac.to_owned()),
        None => (rounded, String::new()),
    };
    let mut frac = frac;
    while frac.len() > p.min_frac && frac.ends_with('0') {
        frac.pop();
    }
    let mut int = int;
    if int == "0" && p.min_int == 0 && !frac.is_empty() {
        int.clear();
    }
    while int.len() < p.min_int {
        int.insert(0, '0');
    }

    let mut out = String::new();
    let negative = f < 0.0 && (int.chars().chain(frac.chars()).any(|c| c != '0'));
    if negative {
        out.push('-');
    }
    if p.grouping {
        let len = int.len();
        for (i, c) in int.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
    } else {
        out.push_str(&int);
    }
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

////////////////////////////////////////////////////////////////////////////////
// Dates
////////////////////////////////////////////////////////////////////////////////

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn unknown_kind() -> Error {
    Error::type_mismatch(
        "cannot format a date of unknown kind; use ?date, ?time or ?datetime first",
    )
}

fn format_date(date: Date, format: &str) -> Result<String> {
    let pattern = match (format, date.kind) {
        (_, DateKind::Unknown) => return Err(unknown_kind()),
        ("iso" | "", DateKind::Date) => "yyyy-MM-dd",
        ("iso" | "", DateKind::Time) => "HH:mm:ss",
        ("iso" | "", DateKind::DateTime) => "yyyy-MM-dd'T'HH:mm:ss'Z'",
        ("short", DateKind::Date) => "M/d/yy",
        ("short", DateKind::Time) => "h:mm a",
        ("short", DateKind::DateTime) => "M/d/yy h:mm a",
        ("medium", DateKind::Date) => "MMM d, yyyy",
        ("medium", DateKind::Time) => "h:mm:ss a",
        ("medium", DateKind::DateTime) => "MMM d, yyyy h:mm:ss a",
        ("long", DateKind::Date) => "MMMM d, yyyy",
        ("long", DateKind::Time) => "h:mm:ss a 'UTC'",
        ("long", DateKind::DateTime) => "MMMM d, yyyy h:mm:ss a 'UTC'",
        (pattern, _) => pattern,
    };
    format_date_pattern(date, pattern)
}

/// Formats with a pattern in the style of `yyyy-MM-dd HH:mm`. Text in single
/// quotes is copied verbatim.
fn format_date_pattern(date: Date, pattern: &str) -> Result<String> {
    let c = date.civil();
    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '\'' {
            let end = chars[i + 1..]
                .iter()
                .position(|&c| c == '\'')
                .map(|p| i + 1 + p)
                .ok_or_else(|| {
                    Error::invalid(format!("unterminated quote in date format `{pattern}`"))
                })?;
            out.extend(&chars[i + 1..end]);
            i = end + 1;
            continue;
        }
        if !ch.is_ascii_alphabetic() {
            out.push(ch);
            i += 1;
            continue;
        }
        let run = chars[i..].iter().take_while(|&&c| c == ch).count();
        let hour12 = match c.hour % 12 {
            0 => 12,
            h => h,
        };
        // Writing to a String cannot fail.
        let _ = match (ch, run) {
            ('y', 2) => write!(out, "{:02}", c.year.rem_euclid(100)),
            ('y', _) => write!(out, "{:04}", c.year),
            ('M', 1) => write!(out, "{}", c.month),
            ('M', 2) => write!(out, "{:02}", c.month),
            ('M', 3) => write!(out, "{}", &MONTHS[c.month as usize - 1][..3]),
            ('M', _) => write!(out, "{}", MONTHS[c.month as usize - 1]),
            ('d', 1) => write!(out, "{}", c.day),
            ('d', _) => write!(out, "{:02}", c.day),
            ('H', 1) => write!(out, "{}", c.hour),
            ('H', _) => write!(out, "{:02}", c.hour),
            ('h', 1) => write!(out, "{hour12}"),
            ('h', _) => write!(out, "{hour12:02}"),
            ('m', _) => write!(out, "{:02}", c.minute),
            ('s', _) => write!(out, "{:02}", c.second),
            ('S', _) => write!(out, "{:03}", c.millis),
            ('a', _) => out.write_str(if c.hour < 12 { "AM" } else { "PM" }),
            _ => {
                return Err(Error::invalid(format!(
                    "unsupported letter `{ch}` in date format `{pattern}`"
                )))
            }
        };
        i += run;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: impl Into<Number>, format: &str) -> String {
        format_number(n.into(), format).unwrap()
    }

    #[test]
    fn number_formats() {
        assert_eq!(num(3, "number"), "3");
        assert_eq!(num(1.0 / 3.0, "number"), "0.333");
        assert_eq!(num(2.5, "c"), "2.5");
        assert_eq!(num(1234567, "#,##0"), "1,234,567");
        assert_eq!(num(1234.5, "#,##0.00"), "1,234.50");
        assert_eq!(num(0.5, "0.##"), "0.5");
        assert_eq!(num(-0.0001, "0.##"), "0");
        assert_eq!(num(7, "000"), "007");
        assert_eq!(num(2.7, "integer"), "3");
    }

    #[test]
    fn unsupported_number_format() {
        let err = format_number(Number::Int(1), "currency").unwrap_err();
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn date_formats() {
        let dt = Date::from_ymd_hms(2024, 2, 9, 13, 5, 7);
        assert_eq!(format_date(dt, "iso").unwrap(), "2024-02-09T13:05:07Z");
        assert_eq!(
            format_date(dt.with_kind(DateKind::Date), "iso").unwrap(),
            "2024-02-09"
        );
        assert_eq!(
            format_date(dt.with_kind(DateKind::Time), "short").unwrap(),
            "1:05 PM"
        );
        assert_eq!(
            format_date(dt, "dd MMM yyyy 'at' HH:mm").unwrap(),
            "09 Feb 2024 at 13:05"
        );
    }

    #[test]
    fn unknown_date_kind_cannot_be_formatted() {
        let d = Date::new(0, DateKind::Unknown);
        assert!(format_date(d, "iso").unwrap_err().is_type_mismatch());
    }

    #[test]
    fn settings_by_name() {
        let mut s = Settings::default();
        s.set("boolean_format", "yes,no").unwrap();
        assert_eq!(s.boolean_words(), ("yes", "no"));
        assert!(s.set("boolean_format", "maybe").is_err());
        assert!(s.set("colour", "red").is_err());
        s.set("locale", "de_DE").unwrap();
        assert_eq!(s.lang(), "de");
    }
}
