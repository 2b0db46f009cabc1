use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};

/// Parses the timestamp shapes seen in snapshot files: RFC 3339, a naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` taken as UTC, or a bare `YYYY-MM-DD`.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Resolves a command-line date: anything [`parse_timestamp`] accepts, or a
/// relative form such as `3 days ago`. A bare date given as an upper bound
/// covers that whole day.
pub fn parse_date_bound(input: &str, end_of_day: bool, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if end_of_day {
        if let Ok(date) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
            let next = Utc.from_utc_datetime(&date.succ_opt()?.and_time(NaiveTime::MIN));
            return next.checked_sub_signed(Duration::milliseconds(1));
        }
    }
    parse_timestamp(input)
        .or_else(|| parse_natural_duration(input).and_then(|ago| now.checked_sub_signed(ago)))
}

fn parse_natural_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();

    for (suffix, days_per_unit) in [(" days ago", 1), (" weeks ago", 7), (" months ago", 30)] {
        if let Some(n) = input.strip_suffix(suffix) {
            let n = n.trim().parse::<i64>().ok()?;
            return n.checked_mul(days_per_unit).and_then(Duration::try_days);
        }
    }
    None
}

/// RFC 3339 with a `Z` suffix; sub-second digits only when present.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn week_key(timestamp: &DateTime<Utc>) -> String {
    let week = timestamp.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn noon_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)) + Duration::hours(12)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
