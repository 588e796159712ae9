//! Holiday calendars by country.
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

use std::{collections::BTreeMap, fmt, str::FromStr, sync::OnceLock};

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use thiserror::Error;
use tracing::{debug, warn};

use crate::conf::ConfError;

/// Country codes with a computed calendar
const SUPPORTED: [&str; 3] = ["US", "CA", "GB"];

/// Suffix of names given to weekday substitutes of weekend holidays
const OBSERVED: &str = " (Observed)";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HolidayError {
    #[error("no holiday calendar available for country '{0}'")]
    UnsupportedCountry(String),
}

/// ISO 3166-1 alpha-2 country code, stored uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Country(String);

impl Country {
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Country {
    fn default() -> Self {
        Country("US".to_string())
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Country {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ConfError::MalformedCountry(s.to_string()));
        }
        Ok(Country(code.to_ascii_uppercase()))
    }
}

/// Holiday names by date.
///
/// Injected entries overwrite whatever the calendar held for that date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayCalendar {
    entries: BTreeMap<NaiveDate, String>,
}

impl HolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&str> {
        self.entries.get(&date).map(String::as_str)
    }

    pub fn inject(&mut self, date: NaiveDate, name: impl Into<String>) {
        self.entries.insert(date, name.into());
    }

    /// Distinct names falling in `year`, in date order
    pub fn names_in(&self, year: i32) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (date, name) in self.iter() {
            if date.year() == year && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &str)> {
        self.entries.iter().map(|(date, name)| (*date, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn add(&mut self, date: Option<NaiveDate>, name: &str) {
        if let Some(date) = date {
            self.inject(date, name);
        }
    }
}

impl Extend<(NaiveDate, String)> for HolidayCalendar {
    fn extend<T: IntoIterator<Item = (NaiveDate, String)>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

/// Source of base holiday calendars
pub trait HolidayProvider {
    fn supports(&self, country: &Country) -> bool;

    /// Calendar covering at least `year` for `country`
    fn for_country(&self, country: &Country, year: i32) -> Result<HolidayCalendar, HolidayError>;
}

/// Holidays from the `holidays` registry, with computed calendars as a fallback.
///
/// A calendar built for `year` also holds `year + 1`, so date windows that
/// cross New Year still see the next holidays. Feed entries are merged last.
#[derive(Debug, Default, Clone)]
pub struct RegistryHolidays {
    /// Extra dated entries, typically read from iCalendar feeds
    feed: Vec<(NaiveDate, String)>,
}

impl RegistryHolidays {
    pub fn with_feed(feed: Vec<(NaiveDate, String)>) -> Self {
        Self { feed }
    }

    /// Registry entries of one year, `None` when the registry does not carry it
    fn registry_year(country: &Country, year: i32) -> Option<Vec<(NaiveDate, String)>> {
        if !registry_ready() {
            return None;
        }
        let code = country.code().parse::<::holidays::Country>().ok()?;
        let since = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let until = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        match ::holidays::iter(code, since, until) {
            Ok(entries) => Some(entries.map(|holiday| (holiday.date, holiday.name.to_string())).collect()),
            Err(e) => {
                debug!(%country, year, error = %e, "holiday registry has no data");
                None
            },
        }
    }
}

impl HolidayProvider for RegistryHolidays {
    fn supports(&self, country: &Country) -> bool {
        country.code().parse::<::holidays::Country>().is_ok() || RuleHolidays.supports(country)
    }

    fn for_country(&self, country: &Country, year: i32) -> Result<HolidayCalendar, HolidayError> {
        let mut calendar = HolidayCalendar::new();
        for y in year..=year + 1 {
            match Self::registry_year(country, y) {
                Some(entries) => calendar.extend(entries),
                None => calendar.extend(RuleHolidays::single_year(country, y)?.entries),
            }
        }
        calendar.extend(self.feed.iter().cloned());
        Ok(calendar)
    }
}

/// Loads the registry database once per process
fn registry_ready() -> bool {
    static READY: OnceLock<bool> = OnceLock::new();
    *READY.get_or_init(|| match ::holidays::Builder::new().init() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "holiday registry unavailable, using computed calendars");
            false
        },
    })
}

/// Computed national holidays for US, CA and GB
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleHolidays;

impl RuleHolidays {
    fn single_year(country: &Country, year: i32) -> Result<HolidayCalendar, HolidayError> {
        let rules: fn(&mut HolidayCalendar, i32) = match country.code() {
            "US" => united_states,
            "CA" => canada,
            "GB" => united_kingdom,
            other => return Err(HolidayError::UnsupportedCountry(other.to_string())),
        };

        let mut calendar = HolidayCalendar::new();
        rules(&mut calendar, year);
        Ok(calendar)
    }
}

impl HolidayProvider for RuleHolidays {
    fn supports(&self, country: &Country) -> bool {
        SUPPORTED.contains(&country.code())
    }

    fn for_country(&self, country: &Country, year: i32) -> Result<HolidayCalendar, HolidayError> {
        let mut calendar = Self::single_year(country, year)?;
        calendar.extend(Self::single_year(country, year + 1)?.entries);
        Ok(calendar)
    }
}

/// US federal holidays; weekend holidays are observed Friday before or Monday after
fn united_states(calendar: &mut HolidayCalendar, year: i32) {
    fixed_observed(calendar, ymd(year, 1, 1), "New Year's Day", nearest_weekday);
    if year >= 1986 {
        calendar.add(nth_weekday(year, 1, Weekday::Mon, 3), "Martin Luther King Jr. Day");
    }
    calendar.add(nth_weekday(year, 2, Weekday::Mon, 3), "Washington's Birthday");
    calendar.add(last_weekday(year, 5, Weekday::Mon), "Memorial Day");
    if year >= 2021 {
        fixed_observed(calendar, ymd(year, 6, 19), "Juneteenth National Independence Day", nearest_weekday);
    }
    fixed_observed(calendar, ymd(year, 7, 4), "Independence Day", nearest_weekday);
    calendar.add(nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day");
    calendar.add(nth_weekday(year, 10, Weekday::Mon, 2), "Columbus Day");
    fixed_observed(calendar, ymd(year, 11, 11), "Veterans Day", nearest_weekday);
    calendar.add(nth_weekday(year, 11, Weekday::Thu, 4), "Thanksgiving");
    fixed_observed(calendar, ymd(year, 12, 25), "Christmas Day", nearest_weekday);
}

/// Canadian national statutory holidays
fn canada(calendar: &mut HolidayCalendar, year: i32) {
    fixed_observed(calendar, ymd(year, 1, 1), "New Year's Day", next_monday);
    calendar.add(good_friday(year), "Good Friday");
    // Monday preceding May 25th
    calendar.add(on_or_before(ymd(year, 5, 24), Weekday::Mon), "Victoria Day");
    fixed_observed(calendar, ymd(year, 7, 1), "Canada Day", next_monday);
    calendar.add(nth_weekday(year, 9, Weekday::Mon, 1), "Labour Day");
    calendar.add(nth_weekday(year, 10, Weekday::Mon, 2), "Thanksgiving");
    christmas_and_boxing(calendar, year);
}

/// Bank holidays in England and Wales
fn united_kingdom(calendar: &mut HolidayCalendar, year: i32) {
    fixed_observed(calendar, ymd(year, 1, 1), "New Year's Day", next_monday);
    calendar.add(good_friday(year), "Good Friday");
    calendar.add(easter_sunday(year).and_then(|d| d.checked_add_days(Days::new(1))), "Easter Monday");
    calendar.add(nth_weekday(year, 5, Weekday::Mon, 1), "May Day");
    calendar.add(last_weekday(year, 5, Weekday::Mon), "Spring Bank Holiday");
    calendar.add(last_weekday(year, 8, Weekday::Mon), "Late Summer Bank Holiday");
    christmas_and_boxing(calendar, year);
}

/// Christmas and Boxing Day with substitute weekdays that never collide
fn christmas_and_boxing(calendar: &mut HolidayCalendar, year: i32) {
    let christmas = "Christmas Day";
    let boxing = "Boxing Day";
    calendar.add(ymd(year, 12, 25), christmas);
    calendar.add(ymd(year, 12, 26), boxing);

    let Some(date) = ymd(year, 12, 25) else {
        return;
    };
    match date.weekday() {
        Weekday::Fri => calendar.add(ymd(year, 12, 28), &observed(boxing)),
        Weekday::Sat => {
            calendar.add(ymd(year, 12, 27), &observed(christmas));
            calendar.add(ymd(year, 12, 28), &observed(boxing));
        },
        Weekday::Sun => calendar.add(ymd(year, 12, 27), &observed(christmas)),
        _ => {},
    }
}

/// Adds a fixed-date holiday and, when it falls on a weekend, its substitute day
fn fixed_observed(
    calendar: &mut HolidayCalendar,
    date: Option<NaiveDate>,
    name: &str,
    substitute: fn(NaiveDate) -> Option<NaiveDate>,
) {
    let Some(date) = date else {
        return;
    };
    calendar.inject(date, name);
    if let Some(moved) = substitute(date).filter(|moved| *moved != date) {
        calendar.inject(moved, observed(name));
    }
}

fn observed(name: &str) -> String {
    format!("{name}{OBSERVED}")
}

/// Saturday moves to Friday, Sunday to Monday
fn nearest_weekday(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.checked_sub_days(Days::new(1)),
        Weekday::Sun => date.checked_add_days(Days::new(1)),
        _ => Some(date),
    }
}

/// Weekend days move to the following Monday
fn next_monday(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.checked_add_days(Days::new(2)),
        Weekday::Sun => date.checked_add_days(Days::new(1)),
        _ => Some(date),
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let last = ymd(year, month, 1)?.checked_add_months(Months::new(1))?.pred_opt()?;
    on_or_before(Some(last), weekday)
}

/// Latest `weekday` not after `date`
fn on_or_before(date: Option<NaiveDate>, weekday: Weekday) -> Option<NaiveDate> {
    let date = date?;
    let back = (7 + date.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    date.checked_sub_days(Days::new(back.into()))
}

fn good_friday(year: i32) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_sub_days(Days::new(2))
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm)
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}
