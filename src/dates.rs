//! Date expressions accepted by the time-range filters.
//!
//! Relative forms (case-insensitive): `today`, `yesterday`, `last week`,
//! `this month`, `last month` (each also without the space), and
//! `<N> day|week|month|year[s] ago`. Absolute forms: RFC3339, `YYYY-MM-DD`,
//! `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DDTHH:MM:SS`; forms without an offset
//! are read in the reference time's zone. Anything else is rejected.

use chrono::{
    DateTime, Datelike, Days, Local, Months, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone,
    Utc,
};

/// Parse `input` relative to the current local time.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    parse_date_at(input, &Local::now())
}

/// Parse `input` relative to `now`.
pub fn parse_date_at<Tz: TimeZone>(input: &str, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }
    let lower = raw.to_lowercase();
    let tz = now.timezone();
    let today = now.date_naive();

    let day_start = match lower.as_str() {
        "today" => Some(today),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        "last week" | "lastweek" => {
            // Monday of the previous week
            let weekday = today.weekday().number_from_monday() as u64;
            today.checked_sub_days(Days::new(weekday + 6))
        }
        "this month" | "thismonth" => today.with_day(1),
        "last month" | "lastmonth" => today
            .with_day(1)
            .and_then(|d| d.checked_sub_months(Months::new(1))),
        _ => None,
    };
    if let Some(day) = day_start {
        return midnight(&tz, day);
    }

    if let Some(dt) = parse_ago(&lower, now) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return midnight(&tz, day);
    }
    None
}

/// Format a bound the way `docs.last_updated` is stored.
pub fn to_index_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_ago<Tz: TimeZone>(lower: &str, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = lower.split_whitespace().collect();
    let [n, unit, "ago"] = parts.as_slice() else {
        return None;
    };
    let n: u32 = n.parse().ok()?;
    let shifted = match *unit {
        "day" | "days" => now.clone().checked_sub_days(Days::new(n as u64)),
        "week" | "weeks" => now.clone().checked_sub_days(Days::new(7 * n as u64)),
        "month" | "months" => now.clone().checked_sub_months(Months::new(n)),
        "year" | "years" => now
            .clone()
            .checked_sub_months(Months::new(n.checked_mul(12)?)),
        _ => None,
    }?;
    Some(shifted.with_timezone(&Utc))
}
