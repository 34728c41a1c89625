use anyhow::{Context, Result};
use calfetch_core::config::CacheConfig;
use calfetch_core::{EventTime, Interval, RemoteEvent};
use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::future::try_join_all;
use owo_colors::OwoColorize;

use crate::window::Window;

pub async fn run(windows: Vec<Window>, calendar: Option<String>, refetch: bool) -> Result<()> {
    let mut config = CacheConfig::load()?;
    if let Some(calendar) = calendar {
        config.calendar_id = calendar;
    }
    if refetch {
        config.always_refetch = true;
    }

    let cache = config
        .builder()
        .build()
        .context("Invalid configuration, run `calfetch config` to see it")?;
    let subscription = cache.subscribe(|events: &[RemoteEvent]| {
        tracing::debug!(count = events.len(), "event collection updated");
    });

    let windows = if windows.is_empty() {
        vec![Window::upcoming()]
    } else {
        windows
    };

    try_join_all(
        windows
            .iter()
            .map(|window| cache.fetch_events(window.from, window.to)),
    )
    .await
    .context("Failed to fetch events")?;
    subscription.unsubscribe();

    let mut events: Vec<(EventTime, RemoteEvent)> = cache
        .events()
        .into_iter()
        .filter(|event| !event.is_cancelled())
        .filter_map(|event| {
            let (start, end) = event.span()?;
            let overlaps = windows
                .iter()
                .any(|w| start.to_utc() < w.to && end.to_utc() > w.from);
            overlaps.then_some((start, event))
        })
        .collect();

    events.sort_by_key(|(start, _)| start.to_utc());

    if events.is_empty() {
        println!("{}", "No events found".dimmed());
    } else {
        print_events(&events);
    }

    print_coverage(&cache.covered_ranges());

    Ok(())
}

/// Print events grouped under a label per day.
fn print_events(events: &[(EventTime, RemoteEvent)]) {
    let mut current_date: Option<String> = None;

    for (start, event) in events {
        let date_label = format_date_label(start);

        if current_date.as_ref() != Some(&date_label) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", date_label.bold());
            current_date = Some(date_label);
        }

        let time = format_time(start);
        match &event.location {
            Some(location) => println!("  {} {} {}", time, event.title(), location.dimmed()),
            None => println!("  {} {}", time, event.title()),
        }
    }
}

fn print_coverage(ranges: &[Interval]) {
    if ranges.is_empty() {
        return;
    }

    println!();
    for range in ranges {
        let label = match range.to_times() {
            Ok((from, to)) => format!("{} .. {}", format_instant(from), format_instant(to)),
            Err(_) => range.to_string(),
        };
        println!("{}", format!("fetched {label}").dimmed());
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
fn format_date_label(time: &EventTime) -> String {
    let today = Local::now().date_naive();
    let date = local_date(time);

    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

fn local_date(time: &EventTime) -> NaiveDate {
    match time {
        EventTime::Date(d) => *d,
        EventTime::DateTime(dt) => dt.with_timezone(&Local).date_naive(),
    }
}

/// Format the time portion of an event (e.g. "15:00" or "all-day")
fn format_time(time: &EventTime) -> String {
    match time {
        EventTime::Date(_) => "all-day".to_string(),
        EventTime::DateTime(dt) => format!("{:>7}", dt.with_timezone(&Local).format("%H:%M")),
    }
}

fn format_instant(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
