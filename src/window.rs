//! Time windows given on the command line.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Number of days shown when no window is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// A `FROM..TO` window. Each bound is either `YYYY-MM-DD` or RFC3339.
/// A bare date as `TO` includes that whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Window {
    /// Today (UTC midnight) through the next `DEFAULT_WINDOW_DAYS` days.
    pub fn upcoming() -> Self {
        let from = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        Window {
            from,
            to: from + Duration::days(DEFAULT_WINDOW_DAYS),
        }
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once("..")
            .ok_or_else(|| format!("Invalid window '{s}'. Expected FROM..TO"))?;

        let from = parse_bound(from, false)?;
        let to = parse_bound(to, true)?;

        if from >= to {
            return Err(format!("Invalid window '{s}': start must be before end"));
        }

        Ok(Window { from, to })
    }
}

fn parse_bound(s: &str, end: bool) -> Result<DateTime<Utc>, String> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{s}'. Expected YYYY-MM-DD or RFC3339"))?;

    // Windows are half-open, so the end of a day is the next midnight.
    let date = if end { date + Duration::days(1) } else { date };
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}
