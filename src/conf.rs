//! Configuration module for the day-off classifier.
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

use std::{collections::HashSet, path::{Path, PathBuf}};

use chrono::{Local, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{de::{Error, SeqAccess, Visitor}, Deserialize};

use crate::holidays::Country;

/// Weekend used when none is configured
const DEFAULT_WEEKEND: [&str; 2] = ["Saturday", "Sunday"];

/// Configuration problems reported when settings are applied, never at query time
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfError {
    #[error("'{0}' is not a weekday name")]
    UnknownWeekday(String),
    #[error("'{0}' is not a two-letter country code")]
    MalformedCountry(String),
    #[error("no holiday calendar available for country '{0}'")]
    UnsupportedCountry(String),
}

/// Main configuration structure for the application.
///
/// Every section is optional; an empty file yields a US calendar with a
/// Saturday/Sunday weekend and no rules.
#[derive(Deserialize, Clone, Default)]
pub struct Conf {
    /// Country, weekend and time zone
    #[serde(default)]
    base: Base,
    /// Holiday filters and extra calendar sources
    #[serde(default)]
    holidays: Holidays,
    /// User-authored day-off rules
    #[serde(default)]
    rules: Vec<RuleConf>,
    /// Persisted per-day overrides
    overrides: Option<Overrides>,
}

/// Basic configuration settings.
#[derive(Deserialize, Clone)]
struct Base {
    /// Two-letter country code of the holiday calendar
    #[serde(default, deserialize_with = "deserialize_country")]
    country: Country,
    /// Weekday names treated as non-working, e.g. ["Saturday", "Sunday"]
    #[serde(default = "default_weekend", deserialize_with = "deserialize_weekend")]
    weekend: Vec<String>,
    /// IANA zone deciding what "today" is; the local zone when absent
    #[serde(default, deserialize_with = "deserialize_timezone")]
    timezone: Option<Tz>,
}

/// Holiday name filters and iCalendar sources.
#[derive(Deserialize, Clone, Default)]
struct Holidays {
    /// Names counted as holidays; empty counts every name
    #[serde(default)]
    include: Vec<String>,
    /// Names never counted as holidays
    #[serde(default)]
    exclude: Vec<String>,
    /// iCalendar files or http(s) URLs with additional holidays
    source: Option<Vec<String>>,
}

/// A day-off rule entry.
#[derive(Deserialize, Clone)]
pub struct RuleConf {
    /// Name given to the matching day
    description: String,
    /// Rule text, e.g. "every friday from Jun 1st to Aug 31st"
    date: String,
}

/// Override store location.
#[derive(Deserialize, Clone)]
struct Overrides {
    path: PathBuf,
}

impl Default for Base {
    fn default() -> Self {
        Self {
            country: Country::default(),
            weekend: default_weekend(),
            timezone: None,
        }
    }
}

impl Conf {
    pub fn country(&self) -> &Country {
        &self.base.country
    }

    pub fn weekend(&self) -> &[String] {
        &self.base.weekend
    }

    pub fn include(&self) -> &[String] {
        &self.holidays.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.holidays.exclude
    }

    /// Returns the list of calendar sources if configured.
    pub fn sources(&self) -> &[String] {
        self.holidays.source.as_deref().unwrap_or_default()
    }

    /// Rules as (text, description) pairs
    pub fn rules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|r| (r.date.as_str(), r.description.as_str()))
    }

    pub fn overrides_path(&self) -> Option<&Path> {
        self.overrides.as_ref().map(|o| o.path.as_path())
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.base.timezone
    }

    /// Current day in the configured zone
    pub fn today(&self) -> NaiveDate {
        match self.base.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
            None => Local::now().date_naive(),
        }
    }
}

/// Parses weekday names (full or three-letter, any case) into a set.
///
/// # Errors
/// * `ConfError::UnknownWeekday` for the first name that is not a weekday
pub fn parse_weekdays<I, S>(names: I) -> Result<HashSet<Weekday>, ConfError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| {
            let name = name.as_ref().trim();
            name.parse::<Weekday>()
                .map_err(|_| ConfError::UnknownWeekday(name.to_string()))
        })
        .collect()
}

fn default_weekend() -> Vec<String> {
    DEFAULT_WEEKEND.iter().map(|d| d.to_string()).collect()
}

fn deserialize_country<'de, D>(deserializer: D) -> Result<Country, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let code = String::deserialize(deserializer)?;
    code.parse().map_err(Error::custom)
}

fn deserialize_timezone<'de, D>(deserializer: D) -> Result<Option<Tz>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let zone = String::deserialize(deserializer)?;
    zone.parse::<Tz>()
        .map(Some)
        .map_err(|_| Error::invalid_value(serde::de::Unexpected::Str(&zone), &"an IANA time zone name"))
}

/// Deserializes a list of weekday names, rejecting anything that is not a weekday.
fn deserialize_weekend<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_seq(WeekendVisitor)
}

/// Error message format for weekend deserialization errors.
const ERR_FMT: &str = "a list of weekday names like [\"Saturday\", \"Sunday\"]";

/// Visitor for weekend day lists.
struct WeekendVisitor;

impl<'a> Visitor<'a> for WeekendVisitor {
    type Value = Vec<String>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", &ERR_FMT)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'a>,
    {
        let mut names = Vec::new();
        while let Some(name) = seq.next_element::<String>()? {
            if name.trim().parse::<Weekday>().is_err() {
                return Err(Error::invalid_value(
                    serde::de::Unexpected::Str(&name),
                    &ERR_FMT
                ));
            }
            names.push(name);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let conf: Conf = toml::from_str("").unwrap();
        assert_eq!(conf.country().code(), "US");
        assert_eq!(conf.weekend(), ["Saturday", "Sunday"]);
        assert!(conf.include().is_empty());
        assert!(conf.sources().is_empty());
        assert_eq!(conf.rules().count(), 0);
        assert!(conf.overrides_path().is_none());
        assert!(conf.timezone().is_none());
    }

    #[test]
    fn full_file() {
        let conf: Conf = toml::from_str(r#"
            [base]
            country = "ca"
            weekend = ["Friday", "sat"]
            timezone = "America/Toronto"

            [holidays]
            include = ["Canada Day"]
            exclude = ["Boxing Day", ""]
            source = ["holidays.ics"]

            [[rules]]
            description = "WFH"
            date = "every friday"

            [[rules]]
            description = "Payday"
            date = "every 15th of the month"

            [overrides]
            path = "overrides.toml"
        "#).unwrap();

        assert_eq!(conf.country().code(), "CA");
        assert_eq!(conf.weekend(), ["Friday", "sat"]);
        assert_eq!(conf.timezone(), Some(chrono_tz::America::Toronto));
        assert_eq!(conf.include(), ["Canada Day"]);
        assert_eq!(conf.exclude(), ["Boxing Day", ""]);
        assert_eq!(conf.sources(), ["holidays.ics"]);
        assert_eq!(
            conf.rules().collect::<Vec<_>>(),
            vec![("every friday", "WFH"), ("every 15th of the month", "Payday")]
        );
        assert_eq!(conf.overrides_path(), Some(Path::new("overrides.toml")));
    }

    #[test]
    fn empty_weekend_list_is_kept() {
        let conf: Conf = toml::from_str("[base]\nweekend = []").unwrap();
        assert!(conf.weekend().is_empty());
    }

    #[test]
    fn rejects_bad_weekend() {
        let err = toml::from_str::<Conf>("[base]\nweekend = [\"Caturday\"]").err().unwrap();
        assert!(err.to_string().contains("Caturday"));
    }

    #[test]
    fn rejects_bad_country_and_zone() {
        assert!(toml::from_str::<Conf>("[base]\ncountry = \"USA\"").is_err());
        assert!(toml::from_str::<Conf>("[base]\ntimezone = \"Mars/Olympus\"").is_err());
    }

    #[test]
    fn weekday_names() {
        let days = parse_weekdays(["Saturday", "sun", " MONDAY "]).unwrap();
        assert_eq!(days, HashSet::from([Weekday::Sat, Weekday::Sun, Weekday::Mon]));
        assert_eq!(
            parse_weekdays(["Saturday", "Someday"]),
            Err(ConfError::UnknownWeekday("Someday".to_string()))
        );
    }
}
