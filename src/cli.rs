//! Command-line interface parser for the day-off classifier.
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

use std::{fs::File, io::Read};

use chrono::{DateTime, NaiveDate};
use clap::{builder::TypedValueParser, Parser};

use crate::{conf::Conf, dayoff::DateKey};

/// Help message for date format specification
const HELP_MSG: &str = "Date format must be one of: \"YYYYmmDD\", \"YYYY-mm-DD\" or UNIX timestamp(millisecond)\nLeave empty to use today";
/// Date format string (YYYYmmDD)
const DATE_FORMAT: &str = "%Y%m%d";
/// Date format string (YYYY-mm-DD)
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Command-line interface structure
#[derive(Parser)]
#[command(
    version(env!("CARGO_PKG_VERSION")),
    author(env!("CARGO_PKG_AUTHORS")),
    about(env!("CARGO_PKG_DESCRIPTION")),
    long_about = "Day-off classifier that merges a country holiday calendar, \
                 the weekend and custom recurrence rules for today, tomorrow \
                 and the next seven weekdays."
)]
pub struct Cli {
    /// Day treated as "today"
    ///
    /// Supports multiple formats:
    /// - "YYYYmmDD": Specific date (e.g., 20180701)
    /// - "YYYY-mm-DD": Specific date (e.g., 2018-07-01)
    /// - UNIX timestamp in millisecond
    #[arg(
        long,
        short,
        required = false,
        value_parser = DayParser,
        help = HELP_MSG
    )]
    date: Option<NaiveDate>,

    /// Configuration file path
    ///
    /// TOML configuration file containing country, weekend,
    /// holiday filters and day-off rules.
    #[arg(
        long,
        short,
        required = true,
        value_parser = ConfParser,
        help = "Path to TOML configuration file"
    )]
    conf: Conf,

    /// Date key deciding the exit code: today, tomorrow or a weekday name
    #[arg(long, short, default_value = "today")]
    key: DateKey,

    /// Force the day of KEY to be a day off
    #[arg(long, value_name = "KEY", conflicts_with_all = ["off", "force_off"])]
    on: Option<DateKey>,

    /// Clear any override of the day of KEY
    #[arg(long, value_name = "KEY", conflicts_with = "force_off")]
    off: Option<DateKey>,

    /// Force the day of KEY to be a working day
    #[arg(long, value_name = "KEY")]
    force_off: Option<DateKey>,

    /// Print the known holiday names and exit
    #[arg(long)]
    holidays: bool,

    /// Keep running, recomputing whenever the date changes (poll interval in seconds)
    #[arg(long, short, value_name = "SECS", conflicts_with = "date")]
    watch: Option<u64>,
}

/// Override command requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On(DateKey),
    Off(DateKey),
    ForceOff(DateKey),
}

impl Cli {
    /// Returns a reference to the parsed configuration
    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    /// Returns the requested reference day, if any
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn key(&self) -> DateKey {
        self.key
    }

    pub fn command(&self) -> Option<Command> {
        self.on
            .map(Command::On)
            .or(self.off.map(Command::Off))
            .or(self.force_off.map(Command::ForceOff))
    }

    pub fn list_holidays(&self) -> bool {
        self.holidays
    }

    pub fn watch(&self) -> Option<u64> {
        self.watch
    }
}

/// Custom parser for reference day values
#[derive(Clone)]
struct DayParser;

impl TypedValueParser for DayParser {
    type Value = NaiveDate;

    /// Parses day strings from command-line arguments
    ///
    /// # Supported Formats
    /// * "YYYYmmDD": e.g. 20180701
    /// * "YYYY-mm-DD": e.g. 2018-07-01
    /// * UNIX timestamp in millisecond
    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let Some(value_str) = value.to_str() else {
            return Err(clap::Error::new(clap::error::ErrorKind::DisplayHelp));
        };

        if let Ok(date) = NaiveDate::parse_from_str(value_str, DATE_FORMAT) {
            return Ok(date);
        }

        if let Ok(date) = NaiveDate::parse_from_str(value_str, ISO_DATE_FORMAT) {
            return Ok(date);
        }

        // Try parsing as unix timestamp
        if let Ok(time_stamp) = value_str.parse::<i64>() {
            if let Some(dt) = DateTime::from_timestamp_millis(time_stamp) {
                return Ok(dt.date_naive());
            }
        }

        Err(clap::Error::raw(
            clap::error::ErrorKind::InvalidValue,
            HELP_MSG
        ))
    }
}

/// Custom parser for configuration file loading
#[derive(Clone)]
struct ConfParser;

impl TypedValueParser for ConfParser {
    type Value = Conf;

    /// Parses configuration file path and loads the configuration
    ///
    /// # Errors
    /// * File not found or permission denied
    /// * Invalid TOML format
    /// * Unknown weekday names, malformed country codes or time zones
    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let Some(file_path) = value.to_str() else {
            return Err(clap::Error::new(clap::error::ErrorKind::DisplayHelp));
        };

        // Open configuration file
        let mut file = File::open(file_path).map_err(|e| {
            let error_msg = match e.kind() {
                std::io::ErrorKind::NotFound => format!("Configuration file '{}' not found", file_path),
                std::io::ErrorKind::PermissionDenied => format!("Permission denied for '{}'", file_path),
                _ => format!("Cannot access configuration file '{}': {}", file_path, e),
            };
            clap::Error::raw(clap::error::ErrorKind::InvalidValue, error_msg)
        })?;

        // Read file contents
        let mut config_content = String::new();
        file.read_to_string(&mut config_content).map_err(|e| {
            clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                format!("Failed to read configuration file '{}': {}", file_path, e)
            )
        })?;

        // Parse TOML configuration
        toml::from_str(&config_content).map_err(|e| {
            clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                format!("Invalid configuration in '{}': {}", file_path, e)
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::Weekday;

    use super::*;

    fn conf_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[base]\ncountry = \"US\"").unwrap();
        file
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let file = conf_file();
        let path = file.path().to_str().unwrap().to_string();
        let mut argv = vec!["dayoff", "--conf", path.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.date(), None);
        assert_eq!(cli.key(), DateKey::Today);
        assert_eq!(cli.command(), None);
        assert!(!cli.list_holidays());
        assert_eq!(cli.watch(), None);
        assert_eq!(cli.conf().country().code(), "US");
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2018, 7, 1);
        assert_eq!(parse(&["-d", "20180701"]).unwrap().date(), expected);
        assert_eq!(parse(&["-d", "2018-07-01"]).unwrap().date(), expected);
        assert_eq!(parse(&["-d", "1530446400000"]).unwrap().date(), expected);
        assert!(parse(&["-d", "July 1st"]).is_err());
    }

    #[test]
    fn override_commands() {
        let cli = parse(&["--on", "Wednesday", "--key", "tomorrow"]).unwrap();
        assert_eq!(cli.command(), Some(Command::On(DateKey::Day(Weekday::Wed))));
        assert_eq!(cli.key(), DateKey::Tomorrow);
        assert_eq!(parse(&["--force-off", "today"]).unwrap().command(), Some(Command::ForceOff(DateKey::Today)));
        assert!(parse(&["--on", "today", "--off", "today"]).is_err());
        assert!(parse(&["--on", "someday"]).is_err());
    }

    #[test]
    fn missing_conf_file() {
        assert!(Cli::try_parse_from(["dayoff", "--conf", "/nonexistent/dayoff.toml"]).is_err());
    }
}
