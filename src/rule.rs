//! Recurrence rules for custom days off.
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

use chrono::{Datelike, Days, NaiveDate};
use tracing::debug;

use crate::resolver::{PhraseResolver, ResolveMode};

/// Leading token of a recurring rule
const START_TOKEN: &str = "every";
/// Opens the start of a validity window
const FROM_TOKEN: &str = "from";
/// Opens the end of a validity window
const TO_TOKEN: &str = "to";
/// Marks the body as a day of the month
const MONTHLY_TOKEN: &str = "of the month";

/// A user-authored day-off rule.
///
/// Grammar:
/// ```text
/// <absolute date>
/// every <weekday> | <date> | <nth> of the month [ from <date> ] [ to <date> ]
/// ```
/// A rule yields at most one date per evaluation; the date is recomputed on
/// every call to [`Rule::evaluate`] against the current reference day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Raw rule text as entered by the user
    text: String,
    /// Holiday name given to the resolved date
    label: String,
    /// Day all relative phrases resolve against
    reference: NaiveDate,
    /// Date for the current cycle, if the rule applies
    date: Option<NaiveDate>,
}

/// Clause structure of a rule once its tokens are located
#[derive(Debug, PartialEq, Eq)]
enum Form<'a> {
    Absolute(&'a str),
    Recurring(Clauses<'a>),
}

#[derive(Debug, PartialEq, Eq)]
struct Clauses<'a> {
    body: &'a str,
    until: Option<&'a str>,
    since: Option<&'a str>,
    monthly: bool,
}

impl Rule {
    pub fn new(text: impl Into<String>, label: impl Into<String>, reference: NaiveDate) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            reference,
            date: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Moves the rule to another "now"; the previous date is dropped
    pub fn set_reference(&mut self, reference: NaiveDate) {
        self.reference = reference;
        self.date = None;
    }

    /// Date produced by the last evaluation
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Re-evaluates the rule against its reference day.
    ///
    /// # Returns
    /// * `Some(date)` - the rule applies to the current cycle
    /// * `None` - the window is closed, not open yet, or a fragment did not resolve
    pub fn evaluate(&mut self, resolver: &dyn PhraseResolver) -> Option<NaiveDate> {
        self.date = match split(&self.text) {
            Form::Absolute(phrase) => resolve(resolver, phrase, self.reference, ResolveMode::Strict),
            Form::Recurring(clauses) => recur(&clauses, self.reference, resolver),
        };
        self.date
    }
}

/// Locates the clause tokens.
///
/// `to` is cut first, then `from` in what remains, then `of the month` in what
/// remains after both, so window dates never reach the monthly check.
fn split(text: &str) -> Form<'_> {
    let trimmed = text.trim();
    let Some(rest) = strip_start(trimmed) else {
        return Form::Absolute(trimmed);
    };

    let (rest, until) = cut(rest, TO_TOKEN);
    let (rest, since) = cut(rest, FROM_TOKEN);
    let (body, monthly) = match find_token(rest, MONTHLY_TOKEN) {
        Some(pos) => (&rest[..pos], true),
        None => (rest, false),
    };

    Form::Recurring(Clauses { body: body.trim(), until, since, monthly })
}

/// Text after a leading `every`, if the rule is recurring
fn strip_start(text: &str) -> Option<&str> {
    let head = text.get(..START_TOKEN.len())?;
    let rest = &text[START_TOKEN.len()..];
    (head.eq_ignore_ascii_case(START_TOKEN) && (rest.is_empty() || rest.starts_with(char::is_whitespace)))
        .then_some(rest)
}

/// Splits `text` at the first `token`, returning the text before it and the clause after it
fn cut<'a>(text: &'a str, token: &str) -> (&'a str, Option<&'a str>) {
    match find_token(text, token) {
        Some(pos) => (&text[..pos], Some(text[pos + token.len()..].trim())),
        None => (text, None),
    }
}

/// Byte offset of `token` as a whole word, never at the very start of `text`
fn find_token(text: &str, token: &str) -> Option<usize> {
    let lowered = text.to_ascii_lowercase();
    lowered.match_indices(token).map(|(pos, _)| pos).find(|&pos| {
        let after = &lowered[pos + token.len()..];
        lowered[..pos].ends_with(char::is_whitespace)
            && (after.is_empty() || after.starts_with(char::is_whitespace))
    })
}

fn recur(clauses: &Clauses<'_>, reference: NaiveDate, resolver: &dyn PhraseResolver) -> Option<NaiveDate> {
    if let Some(until) = clauses.until {
        let end = resolve(resolver, until, reference, ResolveMode::PreferFuture)?;
        if reference > end {
            debug!(%reference, %end, "rule window has closed");
            return None;
        }
    }

    if let Some(since) = clauses.since {
        let start = resolve(resolver, since, reference, ResolveMode::NoPreference)?;
        if reference < start {
            debug!(%reference, %start, "rule window is not open yet");
            return None;
        }
    }

    if clauses.monthly {
        return day_of_month(clauses.body, reference, resolver);
    }

    let future = resolve(resolver, clauses.body, reference, ResolveMode::PreferFuture)?;
    let past = resolve(resolver, clauses.body, reference, ResolveMode::NoPreference)?;
    Some(pick_occurrence(future, past))
}

/// This month's occurrence of `day`, or next month's once it has passed.
///
/// December rolls to month 13, which the resolver carries into January.
fn day_of_month(day: &str, reference: NaiveDate, resolver: &dyn PhraseResolver) -> Option<NaiveDate> {
    let this_month = format!("{}/{}", reference.month(), day);
    let date = resolve(resolver, &this_month, reference, ResolveMode::NoPreference)?;
    if date >= reference {
        return Some(date);
    }

    let next_month = format!("{}/{}", reference.month() + 1, day);
    resolve(resolver, &next_month, reference, ResolveMode::NoPreference)
}

/// Weekday resolution algorithm.
///
/// `future` and `past` are the same phrase resolved with and without a future
/// preference. A bare weekday never resolves to the reference day, so:
/// * 7 days apart: the weekday differs from the reference day's, `future` is the upcoming one
/// * 14 days apart: the weekday is the reference day's own, one week before `future` is today
/// * anything else: a calendar date where both agree, `past` is used
pub fn pick_occurrence(future: NaiveDate, past: NaiveDate) -> NaiveDate {
    match (future - past).num_days() {
        7 => future,
        14 => future.checked_sub_days(Days::new(7)).unwrap_or(past),
        _ => past,
    }
}

fn resolve(resolver: &dyn PhraseResolver, phrase: &str, reference: NaiveDate, mode: ResolveMode) -> Option<NaiveDate> {
    resolver
        .resolve(phrase, reference, mode)
        .inspect_err(|e| debug!(phrase, ?mode, error = %e, "rule fragment did not resolve"))
        .ok()
}
