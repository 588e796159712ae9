//! Natural-language date phrase resolution.
//! 
//! MIT License
//! 
//! Copyright (c) 2026 66f94eae
//! 
//! Permission is hereby granted, free of charge, to any person obtaining a copy
//! of this software and associated documentation files (the "Software"), to deal
//! in the Software without restriction, including without limitation the rights
//! to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//! copies of the Software, and to permit persons to whom the Software is
//! furnished to do so, subject to the following conditions:
//! 
//! The above copyright notice and this permission notice shall be included in all
//! copies or substantial portions of the Software.
//! 
//! THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//! IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//! FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//! AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//! LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//! OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//! SOFTWARE.

use chrono::{Datelike, Days, Month, NaiveDate, Weekday};
use thiserror::Error;

/// Words that carry no date information ("5th of november", "on the 5th")
const FILLER: [&str; 3] = ["of", "the", "on"];

/// Ordinal suffixes accepted after a day number
const ORDINALS: [&str; 4] = ["st", "nd", "rd", "th"];

/// How a phrase that does not pin down a single date is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Only phrases naming day, month and year are accepted
    Strict,
    /// Year-less dates and weekdays resolve to their next occurrence
    PreferFuture,
    /// Year-less dates stay in the reference year, weekdays resolve to the previous occurrence
    NoPreference,
}

/// Reasons a phrase cannot be turned into a date
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("empty phrase")]
    Empty,
    #[error("unrecognized phrase '{0}'")]
    Unrecognized(String),
    #[error("phrase '{0}' does not name a full date")]
    Incomplete(String),
    #[error("phrase '{0}' names a date that does not exist")]
    InvalidDate(String),
}

/// Turns a text fragment into a concrete date relative to a reference day.
///
/// Contract relied on by the rule interpreter:
/// * month values above 12 carry into the year ("13/5" is January 5th of the next year)
/// * a bare weekday never resolves to the reference day itself, in any mode
pub trait PhraseResolver {
    fn resolve(&self, text: &str, reference: NaiveDate, mode: ResolveMode) -> Result<NaiveDate, ResolveError>;
}

/// Default resolver for the small phrase vocabulary used by day-off rules.
///
/// Understands full dates ("5th of november 2018", "2018-11-05", "11/5/2018"),
/// year-less dates ("Jan 31st", "5/25", "5/ 5th"), weekday names and
/// `today`/`tomorrow`/`yesterday`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhraseParser;

/// Parsed shape of a phrase before it is anchored to a reference day
#[derive(Debug, PartialEq, Eq)]
enum Phrase {
    Date { year: Option<i32>, month: u32, day: u32 },
    Weekday(Weekday),
    Relative(i64),
}

impl PhraseResolver for PhraseParser {
    fn resolve(&self, text: &str, reference: NaiveDate, mode: ResolveMode) -> Result<NaiveDate, ResolveError> {
        let phrase = parse(text)?;

        if let Phrase::Date { year: Some(year), month, day } = phrase {
            return build(year, month, day, text);
        }
        if mode == ResolveMode::Strict {
            return Err(ResolveError::Incomplete(text.trim().to_string()));
        }

        match phrase {
            Phrase::Date { month, day, .. } => {
                let current = build(reference.year(), month, day, text)?;
                if mode == ResolveMode::PreferFuture && current < reference {
                    build(reference.year() + 1, month, day, text)
                } else {
                    Ok(current)
                }
            },
            Phrase::Weekday(weekday) => {
                let ahead = mode == ResolveMode::PreferFuture;
                step_to_weekday(reference, weekday, ahead)
                    .ok_or_else(|| ResolveError::InvalidDate(text.trim().to_string()))
            },
            Phrase::Relative(days) => {
                let moved = if days >= 0 {
                    reference.checked_add_days(Days::new(days.unsigned_abs()))
                } else {
                    reference.checked_sub_days(Days::new(days.unsigned_abs()))
                };
                moved.ok_or_else(|| ResolveError::InvalidDate(text.trim().to_string()))
            },
        }
    }
}

/// Lowercases, drops punctuation and glues "5/ 5th" back into "5/5th"
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace([',', '.'], " ");
    lowered
        .split('/')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("/")
        .trim()
        .to_string()
}

fn parse(text: &str) -> Result<Phrase, ResolveError> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized
        .split_whitespace()
        .filter(|word| !FILLER.contains(word))
        .collect();
    let unrecognized = || ResolveError::Unrecognized(text.trim().to_string());

    match words.as_slice() {
        [] => Err(ResolveError::Empty),
        [word] => {
            if let Ok(weekday) = word.parse::<Weekday>() {
                return Ok(Phrase::Weekday(weekday));
            }
            match *word {
                "today" => Ok(Phrase::Relative(0)),
                "tomorrow" => Ok(Phrase::Relative(1)),
                "yesterday" => Ok(Phrase::Relative(-1)),
                w if w.contains('/') => parse_slashed(w).ok_or_else(unrecognized),
                w if w.contains('-') => parse_iso(w).ok_or_else(unrecognized),
                _ => Err(unrecognized()),
            }
        },
        _ => parse_words(&words).ok_or_else(unrecognized),
    }
}

/// "m/d" or "m/d/y"; the month is left uncapped so callers can roll past December
fn parse_slashed(word: &str) -> Option<Phrase> {
    let parts: Vec<&str> = word.split('/').collect();
    let (month, day, year) = match parts.as_slice() {
        [m, d] => (m, d, None),
        [m, d, y] => (m, d, Some(parse_year(y)?)),
        _ => return None,
    };
    let month = month.parse::<u32>().ok().filter(|m| *m > 0)?;
    Some(Phrase::Date { year, month, day: parse_day(day)? })
}

/// "yyyy-mm-dd"
fn parse_iso(word: &str) -> Option<Phrase> {
    let date = NaiveDate::parse_from_str(word, "%Y-%m-%d").ok()?;
    Some(Phrase::Date { year: Some(date.year()), month: date.month(), day: date.day() })
}

/// Any order of month name, day and optional four digit year
fn parse_words(words: &[&str]) -> Option<Phrase> {
    let (mut year, mut month, mut day) = (None, None, None);

    for word in words {
        if let Ok(m) = word.parse::<Month>() {
            if month.replace(m.number_from_month()).is_some() {
                return None;
            }
        } else if word.len() == 4 && word.bytes().all(|b| b.is_ascii_digit()) {
            if year.replace(word.parse::<i32>().ok()?).is_some() {
                return None;
            }
        } else if day.replace(parse_day(word)?).is_some() {
            return None;
        }
    }

    Some(Phrase::Date { year, month: month?, day: day? })
}

/// Day of month with an optional ordinal suffix: "5", "5th", "31st"
fn parse_day(word: &str) -> Option<u32> {
    let digits = word.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let suffix = &word[digits.len()..];
    if !suffix.is_empty() && !ORDINALS.contains(&suffix) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|d| (1..=31).contains(d))
}

fn parse_year(word: &str) -> Option<i32> {
    let year = word.parse::<i32>().ok()?;
    // two digit years are taken as 20yy
    Some(if year < 100 { 2000 + year } else { year })
}

/// Builds a date, carrying months above 12 into the following years
fn build(year: i32, month: u32, day: u32, text: &str) -> Result<NaiveDate, ResolveError> {
    let invalid = || ResolveError::InvalidDate(text.trim().to_string());
    let carried_year = i32::try_from((month - 1) / 12)
        .ok()
        .and_then(|carry| year.checked_add(carry))
        .ok_or_else(invalid)?;
    let carried_month = (month - 1) % 12 + 1;
    NaiveDate::from_ymd_opt(carried_year, carried_month, day).ok_or_else(invalid)
}

/// Nearest other day with the given weekday, 1..=7 days ahead or back
fn step_to_weekday(reference: NaiveDate, weekday: Weekday, ahead: bool) -> Option<NaiveDate> {
    let from = reference.weekday().num_days_from_monday();
    let to = weekday.num_days_from_monday();
    let distance = if ahead { (7 + to - from) % 7 } else { (7 + from - to) % 7 };
    let distance = Days::new(if distance == 0 { 7 } else { distance.into() });

    if ahead {
        reference.checked_add_days(distance)
    } else {
        reference.checked_sub_days(distance)
    }
}
