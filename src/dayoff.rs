//! Day-off classification over the tracked date keys.
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

use std::{collections::{HashMap, HashSet}, fmt, str::FromStr, sync::Arc};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::{debug, info};

use crate::{
    conf::{parse_weekdays, Conf, ConfError},
    holidays::{Country, HolidayCalendar, HolidayError, HolidayProvider},
    resolver::PhraseResolver,
    rule::Rule,
};

/// Weekdays in the order the date keys list them
const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Named day tracked by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateKey {
    Today,
    Tomorrow,
    /// The day with this weekday within the seven days starting today
    Day(Weekday),
}

impl DateKey {
    /// All nine keys: today, tomorrow, Sunday through Saturday
    pub const ALL: [DateKey; 9] = [
        DateKey::Today,
        DateKey::Tomorrow,
        DateKey::Day(WEEK[0]),
        DateKey::Day(WEEK[1]),
        DateKey::Day(WEEK[2]),
        DateKey::Day(WEEK[3]),
        DateKey::Day(WEEK[4]),
        DateKey::Day(WEEK[5]),
        DateKey::Day(WEEK[6]),
    ];
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateKey::Today => f.write_str("today"),
            DateKey::Tomorrow => f.write_str("tomorrow"),
            DateKey::Day(weekday) => f.write_str(day_name(*weekday)),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a date key (today, tomorrow or a weekday name)")]
pub struct UnknownKey(String);

impl FromStr for DateKey {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if key.eq_ignore_ascii_case("today") {
            return Ok(DateKey::Today);
        }
        if key.eq_ignore_ascii_case("tomorrow") {
            return Ok(DateKey::Tomorrow);
        }
        key.parse::<Weekday>()
            .map(DateKey::Day)
            .map_err(|_| UnknownKey(s.to_string()))
    }
}

/// Full English name of a weekday
pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error(transparent)]
    Holidays(#[from] HolidayError),
    #[error("the week starting {0} runs past the last supported date")]
    OutOfRange(NaiveDate),
}

/// Everything a query reads, rebuilt as a whole by [`DateProvider::refresh`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    dates: HashMap<DateKey, NaiveDate>,
    calendar: HolidayCalendar,
    weekend: HashSet<Weekday>,
    include: HashSet<String>,
    exclude: HashSet<String>,
}

impl Snapshot {
    /// Date tracked under `key`.
    ///
    /// # Panics
    /// If the snapshot was never built by a refresh
    pub fn date(&self, key: DateKey) -> NaiveDate {
        match self.dates.get(&key) {
            Some(date) => *date,
            None => panic!("no date tracked for key '{key}', refresh() has not run"),
        }
    }

    /// Holiday name on the date of `key`, whether or not it passes the filters
    pub fn holiday_name(&self, key: DateKey) -> Option<&str> {
        self.calendar.get(self.date(key))
    }

    pub fn is_holiday(&self, key: DateKey) -> bool {
        let Some(name) = self.holiday_name(key) else {
            return false;
        };
        let included = self.include.is_empty() || self.include.contains(name);
        if included && !self.exclude.contains(name) {
            debug!(%key, date = %self.date(key), name, "holiday found");
            return true;
        }
        false
    }

    pub fn is_weekend(&self, key: DateKey) -> bool {
        let date = self.date(key);
        if self.weekend.contains(&date.weekday()) {
            debug!(%key, %date, "weekend found");
            return true;
        }
        false
    }

    pub fn is_day_off(&self, key: DateKey) -> bool {
        self.is_weekend(key) || self.is_holiday(key)
    }

    /// Distinct holiday names falling in the year of `today`
    pub fn holiday_names(&self) -> Vec<&str> {
        let Some(today) = self.dates.get(&DateKey::Today) else {
            return Vec::new();
        };
        self.calendar.names_in(today.year())
    }
}

/// Day-off classifier.
///
/// Setters only record configuration; nothing changes for queries until the
/// next [`refresh`](DateProvider::refresh), which swaps in a new [`Snapshot`].
pub struct DateProvider {
    /// Country of the holiday calendar
    country: Country,
    /// Non-working weekdays
    weekend: HashSet<Weekday>,
    /// Holiday names counted; empty counts all
    include: HashSet<String>,
    /// Holiday names never counted
    exclude: HashSet<String>,
    /// Custom day-off rules, re-evaluated on every refresh
    rules: Vec<Rule>,
    /// Source of base holiday calendars
    holidays: Box<dyn HolidayProvider>,
    /// Resolver the rules use for their date phrases
    resolver: Box<dyn PhraseResolver>,
    /// State read by queries
    snapshot: Arc<Snapshot>,
}

impl DateProvider {
    /// Creates a classifier for the US with a Saturday/Sunday weekend.
    ///
    /// Queries panic until [`refresh`](DateProvider::refresh) has run once.
    pub fn new(holidays: impl HolidayProvider + 'static, resolver: impl PhraseResolver + 'static) -> Self {
        Self {
            country: Country::default(),
            weekend: HashSet::from([Weekday::Sat, Weekday::Sun]),
            include: HashSet::new(),
            exclude: HashSet::new(),
            rules: Vec::new(),
            holidays: Box::new(holidays),
            resolver: Box::new(resolver),
            snapshot: Arc::new(Snapshot::default()),
        }
    }

    /// Applies every setting of a configuration file
    pub fn configure(&mut self, conf: &Conf) -> Result<(), ConfError> {
        self.set_country(conf.country().code())?;
        self.set_weekend(conf.weekend())?;
        self.set_include(conf.include());
        self.set_exclude(conf.exclude());
        self.set_rules(conf.rules());
        Ok(())
    }

    /// # Errors
    /// * `ConfError::MalformedCountry` - not a two-letter code
    /// * `ConfError::UnsupportedCountry` - the holiday provider has no calendar for it
    pub fn set_country(&mut self, code: &str) -> Result<(), ConfError> {
        let country: Country = code.parse()?;
        if !self.holidays.supports(&country) {
            return Err(ConfError::UnsupportedCountry(country.to_string()));
        }
        self.country = country;
        Ok(())
    }

    /// # Errors
    /// * `ConfError::UnknownWeekday` - a name is not a weekday; the weekend is left unchanged
    pub fn set_weekend<I, S>(&mut self, names: I) -> Result<(), ConfError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.weekend = parse_weekdays(names)?;
        Ok(())
    }

    /// Blank names are ignored
    pub fn set_include<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include = name_set(names);
    }

    /// Blank names are ignored
    pub fn set_exclude<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude = name_set(names);
    }

    /// Replaces all rules with (text, label) pairs
    pub fn set_rules<I, T, L>(&mut self, rules: I)
    where
        I: IntoIterator<Item = (T, L)>,
        T: Into<String>,
        L: Into<String>,
    {
        let reference = self.snapshot.dates.get(&DateKey::Today).copied().unwrap_or_default();
        self.rules = rules
            .into_iter()
            .map(|(text, label)| Rule::new(text, label, reference))
            .collect();
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rebuilds the date keys, holiday calendar and filters from `now`.
    ///
    /// # Errors
    /// The previous snapshot stays in place on any error.
    /// * `RefreshError::OutOfRange` - the week starting at `now` runs past the last representable date
    /// * `RefreshError::Holidays` - no calendar could be built
    pub fn refresh(&mut self, now: NaiveDate) -> Result<(), RefreshError> {
        let dates = date_keys(now).ok_or(RefreshError::OutOfRange(now))?;
        let mut calendar = self.holidays.for_country(&self.country, now.year())?;

        let mut injected = 0;
        for rule in &mut self.rules {
            rule.set_reference(now);
            if let Some(date) = rule.evaluate(self.resolver.as_ref()) {
                debug!(rule = rule.text(), %date, label = rule.label(), "rule matched");
                calendar.inject(date, rule.label());
                injected += 1;
            }
        }

        let entries = calendar.len();
        self.snapshot = Arc::new(Snapshot {
            dates,
            calendar,
            weekend: self.weekend.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        });
        info!(country = %self.country, %now, holidays = entries, rules = injected, "day-off snapshot refreshed");
        Ok(())
    }

    /// Current snapshot; stays consistent while later refreshes replace it
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn date(&self, key: DateKey) -> NaiveDate {
        self.snapshot.date(key)
    }

    pub fn is_holiday(&self, key: DateKey) -> bool {
        self.snapshot.is_holiday(key)
    }

    pub fn is_weekend(&self, key: DateKey) -> bool {
        self.snapshot.is_weekend(key)
    }

    pub fn is_day_off(&self, key: DateKey) -> bool {
        self.snapshot.is_day_off(key)
    }

    pub fn holiday_name(&self, key: DateKey) -> Option<&str> {
        self.snapshot.holiday_name(key)
    }

    /// Known holiday names for the current country and year
    pub fn holiday_names(&self) -> Vec<&str> {
        self.snapshot.holiday_names()
    }
}

/// today, tomorrow and one entry per weekday of the seven days starting today
/// Dates of all nine keys, `None` when the week from `now` is not representable
fn date_keys(now: NaiveDate) -> Option<HashMap<DateKey, NaiveDate>> {
    let mut dates = HashMap::with_capacity(DateKey::ALL.len());
    dates.insert(DateKey::Today, now);
    dates.insert(DateKey::Tomorrow, now.succ_opt()?);
    for offset in 0..7 {
        let date = now.checked_add_days(Days::new(offset))?;
        dates.insert(DateKey::Day(date.weekday()), date);
    }
    Some(dates)
}

fn name_set<I, S>(names: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        holidays::RuleHolidays,
        resolver::{PhraseParser, ResolveError, ResolveMode},
    };

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(name: &str) -> DateKey {
        name.parse().unwrap()
    }

    fn provider() -> DateProvider {
        DateProvider::new(RuleHolidays, PhraseParser)
    }

    /// Refreshed on 2018-07-01, a Sunday
    fn refreshed() -> DateProvider {
        let mut provider = provider();
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        provider
    }

    /// Resolves every phrase to one date
    struct Fixed(NaiveDate);

    impl PhraseResolver for Fixed {
        fn resolve(&self, _: &str, _: NaiveDate, _: ResolveMode) -> Result<NaiveDate, ResolveError> {
            Ok(self.0)
        }
    }

    /// Fails whenever the shared flag is set
    struct Flaky(Rc<Cell<bool>>);

    impl HolidayProvider for Flaky {
        fn supports(&self, _: &Country) -> bool {
            true
        }

        fn for_country(&self, country: &Country, year: i32) -> Result<HolidayCalendar, HolidayError> {
            if self.0.get() {
                return Err(HolidayError::UnsupportedCountry(country.to_string()));
            }
            RuleHolidays.for_country(country, year)
        }
    }

    #[test]
    fn keys_parse_and_display() {
        for k in DateKey::ALL {
            assert_eq!(k.to_string().parse::<DateKey>(), Ok(k));
        }
        assert_eq!(key("TODAY"), DateKey::Today);
        assert_eq!(key("wed"), DateKey::Day(Weekday::Wed));
        assert_eq!(DateKey::Day(Weekday::Sun).to_string(), "Sunday");
        assert!("yesterday".parse::<DateKey>().is_err());
    }

    #[test]
    fn simple() {
        let provider = refreshed();
        assert!(provider.is_holiday(key("Wednesday")));
        assert_eq!(provider.holiday_name(key("Wednesday")), Some("Independence Day"));
        assert_eq!(provider.date(key("today")), provider.date(key("Sunday")));
        assert_eq!(provider.date(key("Wednesday")), ymd(2018, 7, 4));
    }

    #[test]
    fn nine_keys_always() {
        let mut provider = provider();
        let mut day = ymd(2018, 12, 26);
        for _ in 0..14 {
            provider.refresh(day).unwrap();
            let snapshot = provider.snapshot();
            assert_eq!(snapshot.dates.len(), 9);
            assert_eq!(provider.date(DateKey::Today), provider.date(DateKey::Day(day.weekday())));
            assert_eq!(provider.date(DateKey::Tomorrow), day.succ_opt().unwrap());
            for k in DateKey::ALL {
                let offset = (provider.date(k) - day).num_days();
                assert!((0..7).contains(&offset), "{k} is {offset} days away");
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn rule() {
        let mut provider = DateProvider::new(RuleHolidays, Fixed(ymd(2018, 7, 2)));
        provider.set_rules([("2018-07-02", "WFH")]);
        provider.refresh(ymd(2018, 7, 1)).unwrap();

        assert!(provider.is_holiday(key("Monday")));
        assert_eq!(provider.holiday_name(key("Monday")), Some("WFH"));
        assert_eq!(provider.rules()[0].date(), Some(ymd(2018, 7, 2)));
    }

    #[test]
    fn rule_text_through_resolver() {
        let mut provider = provider();
        provider.set_rules([("every friday", "Casual Friday"), ("every blue moon", "Never")]);
        provider.refresh(ymd(2018, 7, 1)).unwrap();

        assert!(provider.is_holiday(key("Friday")));
        assert!(!provider.is_holiday(key("today")));
        assert_eq!(provider.rules()[1].date(), None);
        assert!(provider.holiday_names().contains(&"Casual Friday"));
    }

    #[test]
    fn rule_overrides_native_name() {
        let mut provider = provider();
        provider.set_rules([("every 4th of the month", "Company Day")]);
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        assert_eq!(provider.holiday_name(key("Wednesday")), Some("Company Day"));
    }

    #[test]
    fn weekend() {
        assert!(refreshed().is_weekend(key("today")));
        assert!(refreshed().is_weekend(key("Saturday")));
        assert!(!refreshed().is_weekend(key("Monday")));
    }

    #[test]
    fn set_weekend() {
        let mut provider = provider();
        provider.set_weekend(["Monday", "Tuesday"]).unwrap();
        provider.refresh(ymd(2018, 7, 2)).unwrap();

        assert!(provider.is_weekend(key("today")));
        assert!(!provider.is_weekend(key("Sunday")));
    }

    #[test]
    fn set_weekend_rejects_unknown_names() {
        let mut provider = provider();
        assert_eq!(
            provider.set_weekend(["Saturday", "Funday"]),
            Err(ConfError::UnknownWeekday("Funday".to_string()))
        );
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        assert!(provider.is_weekend(key("Saturday")));
    }

    fn holiday_with(include: &[&str], exclude: &[&str]) -> bool {
        let mut provider = provider();
        provider.set_include(include);
        provider.set_exclude(exclude);
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        provider.is_holiday(key("Wednesday"))
    }

    #[test]
    fn include() {
        assert!(holiday_with(&["Independence Day"], &[]));
    }

    #[test]
    fn include_fail() {
        assert!(!holiday_with(&["New Year's Day"], &[]));
    }

    #[test]
    fn include_multi() {
        assert!(holiday_with(&["New Year's Day", "Independence Day"], &[]));
    }

    #[test]
    fn exclude() {
        assert!(!holiday_with(&[], &["Independence Day"]));
    }

    #[test]
    fn include_exclude() {
        assert!(!holiday_with(&["Independence Day"], &["New Year's Day", "Independence Day"]));
    }

    #[test]
    fn blank_filter_names_are_ignored() {
        assert!(holiday_with(&["", "  "], &[""]));
    }

    #[test]
    fn day_off_combines_weekend_and_holiday() {
        let provider = refreshed();
        assert!(provider.is_day_off(key("today")));
        assert!(provider.is_day_off(key("Wednesday")));
        assert!(!provider.is_day_off(key("Tuesday")));
    }

    #[test]
    fn setters_wait_for_refresh() {
        let mut provider = refreshed();
        provider.set_exclude(["Independence Day"]);
        assert!(provider.is_holiday(key("Wednesday")));

        provider.refresh(ymd(2018, 7, 1)).unwrap();
        assert!(!provider.is_holiday(key("Wednesday")));
    }

    #[test]
    fn refresh_is_idempotent() {
        let mut provider = provider();
        provider.set_rules([("every friday", "WFH"), ("every 5th of the month", "Payday")]);
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        let first = provider.snapshot();
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        assert_eq!(*first, *provider.snapshot());
    }

    #[test]
    fn failed_refresh_keeps_snapshot() {
        let failing = Rc::new(Cell::new(false));
        let mut provider = DateProvider::new(Flaky(Rc::clone(&failing)), PhraseParser);
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        let before = provider.snapshot();

        failing.set(true);
        assert!(provider.refresh(ymd(2018, 7, 2)).is_err());
        assert_eq!(*before, *provider.snapshot());
        assert_eq!(provider.date(DateKey::Today), ymd(2018, 7, 1));
    }

    #[test]
    fn refresh_rejects_week_past_last_date() {
        let mut provider = refreshed();
        let before = provider.snapshot();

        assert_eq!(provider.refresh(NaiveDate::MAX), Err(RefreshError::OutOfRange(NaiveDate::MAX)));
        assert_eq!(*before, *provider.snapshot());
        assert!(date_keys(NaiveDate::MAX - Days::new(3)).is_none());
        assert_eq!(date_keys(ymd(2018, 7, 1)).map(|dates| dates.len()), Some(9));
    }

    #[test]
    fn country_is_validated() {
        let mut provider = provider();
        assert_eq!(provider.set_country("XX"), Err(ConfError::UnsupportedCountry("XX".to_string())));
        assert_eq!(provider.set_country("U.S."), Err(ConfError::MalformedCountry("U.S.".to_string())));
        provider.set_country("gb").unwrap();
        provider.refresh(ymd(2018, 7, 1)).unwrap();
        assert!(!provider.is_holiday(key("Wednesday")));
    }

    #[test]
    fn configure_from_file() {
        let conf: Conf = toml::from_str(r#"
            [base]
            weekend = ["Friday"]
            [holidays]
            exclude = ["Independence Day"]
            [[rules]]
            description = "Retreat"
            date = "every tuesday"
        "#).unwrap();

        let mut provider = provider();
        provider.configure(&conf).unwrap();
        provider.refresh(ymd(2018, 7, 1)).unwrap();

        assert!(!provider.is_weekend(key("Sunday")));
        assert!(provider.is_weekend(key("Friday")));
        assert!(!provider.is_holiday(key("Wednesday")));
        assert!(provider.is_holiday(key("Tuesday")));
    }

    #[test]
    fn configured_empty_weekend_has_no_weekend_days() {
        let conf: Conf = toml::from_str("[base]\nweekend = []").unwrap();
        let mut provider = provider();
        provider.configure(&conf).unwrap();
        provider.refresh(ymd(2018, 7, 1)).unwrap();

        assert!(!provider.is_weekend(DateKey::Today));
        assert!(DateKey::ALL.iter().all(|key| !provider.is_weekend(*key)));

        let mut defaulted = self::provider();
        defaulted.configure(&Conf::default()).unwrap();
        defaulted.refresh(ymd(2018, 7, 1)).unwrap();
        assert!(defaulted.is_weekend(DateKey::Today));
    }

    #[test]
    fn holiday_names_cover_current_year() {
        let provider = refreshed();
        let names = provider.holiday_names();
        assert!(names.contains(&"Independence Day"));
        assert!(names.contains(&"Thanksgiving"));
        assert_eq!(names.iter().filter(|n| **n == "Christmas Day").count(), 1);
    }

    #[test]
    #[should_panic(expected = "refresh() has not run")]
    fn query_before_refresh_panics() {
        provider().is_holiday(DateKey::Today);
    }
}
