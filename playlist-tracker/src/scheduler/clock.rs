//! Calendar arithmetic in the tracker's time zone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::database::models::SNAPSHOT_DATE_FORMAT;

/// Calendar date of `now` in `tz`.
pub fn local_date<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    now.with_timezone(tz).date_naive()
}

/// Snapshot key (`YYYY-MM-DD`) for `now` in `tz`.
pub fn snapshot_key<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> String {
    local_date(now, tz).format(SNAPSHOT_DATE_FORMAT).to_string()
}

/// First instant of the day after `now` in `tz`.
///
/// When local midnight does not exist (a DST jump at 00:00) the first valid
/// local time after it is used; when it is ambiguous the earlier instant wins.
pub fn next_midnight<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let tomorrow = local_date(now, tz)
        .succ_opt()
        .unwrap_or(NaiveDate::MAX);
    let midnight: NaiveDateTime = tomorrow.and_time(chrono::NaiveTime::MIN);

    // Gaps are at most a few hours; step in 15 minute increments.
    (0..=16)
        .map(|step| midnight + Duration::minutes(15 * step))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|instant| instant.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::days(1))
}

/// Whole seconds from `now` until the next local midnight, rounded up so the
/// wake-up never lands before the date has changed.
pub fn seconds_until_next_midnight<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> u64 {
    let millis = (next_midnight(now, tz) - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}
