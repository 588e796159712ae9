//! iCalendar holiday feeds.
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

use std::{fs::File, io::{BufRead, BufReader, Cursor}, sync::Arc};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical::property::Property;
use tracing::{debug, warn};

/// iCalendar property key for event summary
const KEY_SUMMARY: &str = "SUMMARY";
/// iCalendar property key for event start time
const KEY_DTSTART: &str = "DTSTART";
/// iCalendar property key for event end time
const KEY_DTEND: &str = "DTEND";

/// iCalendar date format: YYYYMMDD
const DATE_FMT: &str = "%Y%m%d";
/// iCalendar datetime format: YYYYMMDDTHHMMSS
const DT_FMT: &str = "%Y%m%dT%H%M%S";

/// Longest event span expanded into single days
const MAX_SPAN_DAYS: usize = 366;

/// Individual calendar event reduced to what a holiday needs
struct Event {
    /// Event title, used as the holiday name
    summary: String,
    /// First day of the event
    start: Option<NaiveDate>,
    /// Day the event ends on
    end: Option<NaiveDate>,
    /// Whether DTEND is an exclusive all-day boundary
    all_day: bool,
}

impl Event {
    fn new() -> Self {
        Event {
            summary: "NO_SUMMARY".to_string(),
            start: None,
            end: None,
            all_day: false,
        }
    }

    /// Expands the event into (date, summary) holiday entries
    ///
    /// All-day events cover [DTSTART, DTEND); timed events only their start date.
    fn into_days(self) -> Vec<(NaiveDate, String)> {
        let Some(start) = self.start else {
            return Vec::new();
        };
        let last = match self.end {
            Some(end) if self.all_day && end > start => end.pred_opt().unwrap_or(start),
            _ => start,
        };

        start
            .iter_days()
            .take_while(|day| *day <= last)
            .take(MAX_SPAN_DAYS)
            .map(|day| (day, self.summary.clone()))
            .collect()
    }
}

/// Reads holiday entries from every configured source
///
/// # Arguments
/// * `sources` - http(s) URLs or local file paths of iCalendar data
/// * `zone` - zone whose calendar dates timed events are mapped to; local zone when `None`
///
/// # Note
/// Sources that cannot be read are logged and skipped
pub async fn read_sources(sources: &[String], zone: Option<Tz>) -> Vec<(NaiveDate, String)> {
    let client = reqwest::Client::new();
    let client = Arc::new(client);

    let tasks = sources.iter().map(|uri| {
        let client = Arc::clone(&client);
        async move {
            if uri.starts_with("http") {
                // Fetch from remote URL
                let response = client.get(uri).send().await.and_then(|resp| resp.error_for_status());
                match response {
                    Ok(resp) => match resp.bytes().await {
                        Ok(bytes) => return parse_calendar(Cursor::new(bytes), zone),
                        Err(e) => warn!(%uri, error = %e, "cannot read holiday feed"),
                    },
                    Err(e) => warn!(%uri, error = %e, "cannot fetch holiday feed"),
                }
                Vec::new()
            } else {
                // Read from local file
                match File::open(uri) {
                    Ok(file) => parse_calendar(BufReader::new(file), zone),
                    Err(e) => {
                        warn!(%uri, error = %e, "cannot open holiday feed");
                        Vec::new()
                    },
                }
            }
        }
    });

    let mut all_days = Vec::new();
    for task in tasks {
        let days = task.await;
        all_days.extend(days);
    }
    debug!(entries = all_days.len(), "holiday feeds loaded");
    all_days
}

/// Parses iCalendar data from a reader
///
/// # Arguments
/// * `reader` - Buffered reader containing iCalendar data
/// * `zone` - zone used to date timed events
///
/// # Returns
/// * `Vec<(NaiveDate, String)>` - one entry per day covered by an event
fn parse_calendar<T: BufRead>(reader: T, zone: Option<Tz>) -> Vec<(NaiveDate, String)> {
    let mut days = Vec::new();
    let parser = ical::IcalParser::new(reader);

    for calendar in parser {
        let cal = match calendar {
            Ok(cal) => cal,
            Err(e) => {
                warn!(error = ?e, "skipping malformed calendar");
                continue;
            },
        };

        for event in cal.events {
            let mut my_event = Event::new();

            for prop in event.properties {
                match prop.name.as_str() {
                    KEY_SUMMARY => {
                        if let Some(summary) = prop.value {
                            my_event.summary = summary;
                        }
                    },
                    KEY_DTSTART => match parse_date(&prop, zone, true) {
                        Ok((date, all_day)) => {
                            my_event.start = Some(date);
                            my_event.all_day = all_day;
                        },
                        Err(e) => debug!(error = e, "ignoring DTSTART"),
                    },
                    KEY_DTEND => match parse_date(&prop, zone, false) {
                        Ok((date, _)) => my_event.end = Some(date),
                        Err(e) => debug!(error = e, "ignoring DTEND"),
                    },
                    _ => {}
                }
            }

            days.extend(my_event.into_days());
        }
    }
    days
}

/// Parses iCalendar date or datetime values into a calendar date
///
/// # Arguments
/// * `prop` - iCalendar property containing datetime
/// * `zone` - zone the instant is converted to
/// * `is_dt_start` - Whether this is a DTSTART (true) or DTEND (false)
///
/// # Returns
/// * `(date, all_day)` or an error message
///
/// # Supported Formats
/// * YYYYMMDD (all-day events)
/// * YYYYMMDDTHHMMSS (floating local time)
/// * YYYYMMDDTHHMMSSZ (UTC time)
/// * YYYYMMDDTHHMMSS with TZID parameter
fn parse_date(prop: &Property, zone: Option<Tz>, is_dt_start: bool) -> Result<(NaiveDate, bool), &'static str> {
    let Some(value) = &prop.value else {
        return Err("Missing datetime value");
    };

    let value = value.to_uppercase();

    if value.len() == 8 {
        // All-day event: YYYYMMDD
        return NaiveDate::parse_from_str(&value, DATE_FMT)
            .map(|date| (date, true))
            .map_err(|_| "Invalid date format");
    }

    if let Some(utc) = value.strip_suffix('Z') {
        // UTC timezone
        let dt = NaiveDateTime::parse_from_str(utc, DT_FMT).map_err(|_| "Invalid datetime format")?;
        return Ok((local_date(dt.and_utc(), zone), false));
    }

    let dt = NaiveDateTime::parse_from_str(&value, DT_FMT).map_err(|_| "Invalid datetime format")?;

    // Check for timezone parameter
    let tzid = prop.params.iter().flatten().find_map(|(name, field)| {
        name.eq_ignore_ascii_case("TZID").then(|| field.first()).flatten()
    });
    let Some(tzid) = tzid else {
        // Floating time is already a local date
        return Ok((dt.date(), false));
    };

    let tz = tzid.parse::<Tz>().map_err(|_| "Invalid timezone identifier")?;
    let instant = match tz.from_local_datetime(&dt) {
        chrono::offset::LocalResult::Single(tz_dt) => tz_dt,
        chrono::offset::LocalResult::Ambiguous(early, later) => {
            if is_dt_start { early } else { later }
        },
        chrono::offset::LocalResult::None => return Err("Invalid datetime for timezone"),
    };
    Ok((local_date(instant.with_timezone(&Utc), zone), false))
}

/// Calendar date of `instant` in `zone`, or in the local zone
fn local_date(instant: DateTime<Utc>, zone: Option<Tz>) -> NaiveDate {
    match zone {
        Some(tz) => instant.with_timezone(&tz).date_naive(),
        None => instant.with_timezone(&Local).date_naive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parse(events: &str, zone: Option<Tz>) -> Vec<(NaiveDate, String)> {
        let ics = format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\n{events}END:VCALENDAR\r\n"
        );
        parse_calendar(Cursor::new(ics.into_bytes()), zone)
    }

    #[test]
    fn all_day_event_end_is_exclusive() {
        let days = parse(
            "BEGIN:VEVENT\r\nSUMMARY:Plant Shutdown\r\nDTSTART;VALUE=DATE:20181224\r\nDTEND;VALUE=DATE:20181227\r\nEND:VEVENT\r\n",
            None,
        );
        assert_eq!(
            days,
            vec![
                (date(2018, 12, 24), "Plant Shutdown".to_string()),
                (date(2018, 12, 25), "Plant Shutdown".to_string()),
                (date(2018, 12, 26), "Plant Shutdown".to_string()),
            ]
        );
    }

    #[test]
    fn single_day_without_end() {
        let days = parse("BEGIN:VEVENT\r\nSUMMARY:Founders Day\r\nDTSTART:20180815\r\nEND:VEVENT\r\n", None);
        assert_eq!(days, vec![(date(2018, 8, 15), "Founders Day".to_string())]);
    }

    #[test]
    fn utc_event_dated_in_zone() {
        let days = parse(
            "BEGIN:VEVENT\r\nSUMMARY:Offsite\r\nDTSTART:20180704T030000Z\r\nDTEND:20180704T040000Z\r\nEND:VEVENT\r\n",
            Some(chrono_tz::America::New_York),
        );
        assert_eq!(days, vec![(date(2018, 7, 3), "Offsite".to_string())]);
    }

    #[test]
    fn tzid_event_dated_in_zone() {
        let days = parse(
            "BEGIN:VEVENT\r\nSUMMARY:Festival\r\nDTSTART;TZID=Asia/Tokyo:20180704T080000\r\nEND:VEVENT\r\n",
            Some(chrono_tz::UTC),
        );
        assert_eq!(days, vec![(date(2018, 7, 3), "Festival".to_string())]);
    }

    #[test]
    fn timed_event_past_midnight_keeps_start_date() {
        let days = parse(
            "BEGIN:VEVENT\r\nSUMMARY:Gala\r\nDTSTART:20181231T200000\r\nDTEND:20190101T020000\r\nEND:VEVENT\r\n",
            None,
        );
        assert_eq!(days, vec![(date(2018, 12, 31), "Gala".to_string())]);
    }

    #[test]
    fn event_without_start_is_skipped() {
        let days = parse("BEGIN:VEVENT\r\nSUMMARY:Someday\r\nEND:VEVENT\r\n", None);
        assert!(days.is_empty());
    }
}
