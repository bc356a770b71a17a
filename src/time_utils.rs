// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and day boundaries.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc,
};

/// Longest DST jump searched across, in minutes.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Midnight (00:00:00.000) of the calendar day containing `instant` in `tz`.
pub fn start_of_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let date = instant.with_timezone(tz).date_naive();
    let naive = date.and_hms_milli_opt(0, 0, 0, 0).unwrap_or_default();
    resolve_local(tz, naive, true)
}

/// 23:59:59.999 of the calendar day containing `instant` in `tz`.
pub fn end_of_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let date = instant.with_timezone(tz).date_naive();
    let naive = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_default();
    resolve_local(tz, naive, false)
}

/// Any instant on `date` in `tz` (noon, which exists on every day).
pub fn instant_on<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
    resolve_local(tz, noon, true)
}

/// Map a local wall-clock time to an instant. In a fold `earliest` picks
/// the first occurrence. A time skipped by a DST jump moves forward to the
/// first existing local time when `earliest`, else back to the last one
/// before the jump, so the result stays on the same local day.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, earliest: bool) -> DateTime<Utc> {
    if let Some(instant) = pick(tz.from_local_datetime(&naive), earliest) {
        return instant;
    }

    let step = if earliest {
        Duration::minutes(1)
    } else {
        Duration::minutes(-1)
    };
    let mut candidate = naive;
    for _ in 0..MAX_GAP_MINUTES {
        candidate += step;
        if let Some(instant) = pick(tz.from_local_datetime(&candidate), earliest) {
            return instant;
        }
    }
    tracing::warn!(local = %naive, "Local time does not resolve in time zone; treating as UTC");
    Utc.from_utc_datetime(&naive)
}

fn pick<Tz: TimeZone>(result: LocalResult<DateTime<Tz>>, earliest: bool) -> Option<DateTime<Utc>> {
    match result {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, _) if earliest => Some(first.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, second) => Some(second.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}
