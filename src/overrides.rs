//! Persisted per-day overrides of the computed day-off state.
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

use std::{collections::BTreeMap, fs, io, path::{Path, PathBuf}};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// A user decision that replaces the computed day-off state of one date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override {
    /// Forced day off
    DayOff,
    /// Forced working day
    WorkDay,
}

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("cannot access override store '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid override store '{path}': {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("cannot encode override store: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// On-disk layout, dates as `YYYY-MM-DD` keys
#[derive(Debug, Default, Serialize, Deserialize)]
struct Stored {
    #[serde(default)]
    custom_dates: BTreeMap<String, bool>,
}

/// Per-date overrides, optionally persisted as a TOML file.
///
/// `true` forces a day off, `false` forces a working day and an absent date
/// keeps the computed state.
#[derive(Debug, Default)]
pub struct DayOverrides {
    path: Option<PathBuf>,
    days: BTreeMap<String, bool>,
}

impl DayOverrides {
    /// Loads the store at `path`; a missing file is an empty store.
    /// Without a path the store lives in memory only.
    pub fn load(path: Option<&Path>) -> Result<Self, OverrideError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let days = match fs::read_to_string(path) {
            Ok(content) => {
                let stored: Stored = toml::from_str(&content).map_err(|source| OverrideError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                stored.custom_dates
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(OverrideError::Io { path: path.to_path_buf(), source }),
        };

        Ok(Self { path: Some(path.to_path_buf()), days })
    }

    pub fn get(&self, date: NaiveDate) -> Option<Override> {
        self.days.get(&date.to_string()).map(|on| if *on { Override::DayOff } else { Override::WorkDay })
    }

    /// Forces `date` to be a day off
    pub fn set_on(&mut self, date: NaiveDate) -> Result<(), OverrideError> {
        info!(%date, "forcing day off");
        self.days.insert(date.to_string(), true);
        self.save()
    }

    /// Drops any override of `date`
    pub fn set_off(&mut self, date: NaiveDate) -> Result<(), OverrideError> {
        info!(%date, "clearing day override");
        self.days.remove(&date.to_string());
        self.save()
    }

    /// Forces `date` to be a working day
    pub fn set_force_off(&mut self, date: NaiveDate) -> Result<(), OverrideError> {
        info!(%date, "forcing working day");
        self.days.insert(date.to_string(), false);
        self.save()
    }

    /// Final state of `date` given its computed day-off value
    pub fn day_state(&self, date: NaiveDate, computed: bool) -> bool {
        day_state(self.get(date), computed)
    }

    fn save(&self) -> Result<(), OverrideError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let stored = Stored { custom_dates: self.days.clone() };
        let content = toml::to_string(&stored)?;
        fs::write(path, content).map_err(|source| OverrideError::Io { path: path.clone(), source })
    }
}

/// A forced working day beats a computed day off; a forced day off beats a computed working day
pub fn day_state(day: Option<Override>, computed: bool) -> bool {
    match day {
        Some(Override::WorkDay) => false,
        Some(Override::DayOff) => true,
        None => computed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn precedence() {
        assert!(!day_state(Some(Override::WorkDay), true));
        assert!(day_state(Some(Override::DayOff), false));
        assert!(day_state(None, true));
        assert!(!day_state(None, false));
    }

    #[test]
    fn commands_update_state() {
        let mut store = DayOverrides::load(None).unwrap();
        let day = date(2018, 7, 2);

        store.set_on(day).unwrap();
        assert_eq!(store.get(day), Some(Override::DayOff));
        assert!(store.day_state(day, false));

        store.set_force_off(day).unwrap();
        assert_eq!(store.get(day), Some(Override::WorkDay));
        assert!(!store.day_state(day, true));

        store.set_off(day).unwrap();
        assert_eq!(store.get(day), None);
        assert!(store.day_state(day, true));
    }

    #[test]
    fn persists_between_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.toml");

        let mut store = DayOverrides::load(Some(&path)).unwrap();
        store.set_on(date(2018, 7, 2)).unwrap();
        store.set_force_off(date(2018, 7, 4)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("2018-07-02"));

        let reloaded = DayOverrides::load(Some(&path)).unwrap();
        assert_eq!(reloaded.get(date(2018, 7, 2)), Some(Override::DayOff));
        assert_eq!(reloaded.get(date(2018, 7, 4)), Some(Override::WorkDay));
        assert_eq!(reloaded.get(date(2018, 7, 5)), None);
    }

    #[test]
    fn corrupt_store_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.toml");
        fs::write(&path, "custom_dates = 5").unwrap();

        assert!(matches!(DayOverrides::load(Some(&path)), Err(OverrideError::Parse { .. })));
    }
}
