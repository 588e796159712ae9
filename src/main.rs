//! Day-off classification for home automation schedules.
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

use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};

use crate::{
    cli::{Cli, Command},
    conf::Conf,
    dayoff::{DateKey, DateProvider},
    holidays::RegistryHolidays,
    overrides::DayOverrides,
    resolver::PhraseParser,
};

mod cli;
mod conf;
mod dayoff;
mod holidays;
mod ical;
mod overrides;
mod resolver;
mod rule;

/// Main entry point for the day-off classifier
///
/// # Usage Examples
/// ```bash
/// # Is today a day off?
/// dayoff -c config.toml
///
/// # Classify the week starting on a specific date
/// dayoff -c config.toml -d 20180701
///
/// # Force next Wednesday to be a working day
/// dayoff -c config.toml --force-off Wednesday
///
/// # Keep recomputing once the date changes, polling every minute
/// dayoff -c config.toml -w 60
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command-line arguments
    let cli = Cli::parse();
    let conf = cli.conf();

    // Calendar feeds are fetched once; refreshes only recompute
    let feed = ical::read_sources(conf.sources(), conf.timezone()).await;
    let mut provider = DateProvider::new(RegistryHolidays::with_feed(feed), PhraseParser);
    provider.configure(conf)?;
    provider.refresh(cli.date().unwrap_or_else(|| conf.today()))?;

    let mut overrides = DayOverrides::load(conf.overrides_path())?;
    if let Some(command) = cli.command() {
        apply(command, &provider, &mut overrides)?;
    }

    if cli.list_holidays() {
        for name in provider.holiday_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    if let Some(secs) = cli.watch() {
        return watch(provider, conf, secs).await;
    }

    report(&provider, &overrides);

    // Exit with appropriate code for scripting use
    let key = cli.key();
    if overrides.day_state(provider.date(key), provider.is_day_off(key)) {
        std::process::exit(1); // Non-zero exit code for days off
    } else {
        std::process::exit(0); // Success exit code for work days
    }
}

/// Applies an override command to the date behind its key
fn apply(command: Command, provider: &DateProvider, overrides: &mut DayOverrides) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::On(key) => overrides.set_on(provider.date(key))?,
        Command::Off(key) => overrides.set_off(provider.date(key))?,
        Command::ForceOff(key) => overrides.set_force_off(provider.date(key))?,
    }
    Ok(())
}

/// Prints one line per date key followed by the rule results
fn report(provider: &DateProvider, overrides: &DayOverrides) {
    for key in DateKey::ALL {
        let date = provider.date(key);
        let computed = provider.is_day_off(key);
        let state = overrides.day_state(date, computed);
        println!(
            "{:<9} {} weekend={:<5} holiday={:<5} day_off={:<5}{}{}",
            key.to_string(),
            date,
            provider.is_weekend(key),
            provider.is_holiday(key),
            state,
            if state != computed { " (override)" } else { "" },
            provider.holiday_name(key).map(|name| format!(" [{}]", name)).unwrap_or_default(),
        );
    }

    for rule in provider.rules() {
        match rule.date() {
            Some(date) => println!("rule '{}' ({}): {}", rule.text(), rule.label(), date),
            None => println!("rule '{}' ({}): not active", rule.text(), rule.label()),
        }
    }
}

/// Polls the clock and recomputes whenever the date changes
async fn watch(mut provider: DateProvider, conf: &Conf, secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    let mut current = provider.date(DateKey::Today);
    report(&provider, &DayOverrides::load(conf.overrides_path())?);
    info!(interval = secs, "watching for date changes");

    loop {
        interval.tick().await;
        let today = conf.today();
        if today == current {
            continue;
        }

        debug!(%today, "new date detected, recalculating");
        match provider.refresh(today) {
            Ok(()) => {
                current = today;
                match DayOverrides::load(conf.overrides_path()) {
                    Ok(overrides) => report(&provider, &overrides),
                    Err(e) => warn!(error = %e, "cannot reload day overrides"),
                }
            },
            Err(e) => warn!(error = %e, "refresh failed, keeping previous snapshot"),
        }
    }
}
