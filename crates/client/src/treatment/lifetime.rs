//! Expiry schedules.
//!
//! Lifetimes are drawn from an exponential distribution with a given
//! half-life, so entries written together do not all expire together.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use rand::Rng;
use rand::distributions::{Distribution, Standard};
use std::f64::consts::LN_2;
use std::time::Duration;

/// Drawn lifetimes are capped at this many half-lives.
pub const JITTER_CAP: f64 = 4.0;

/// Draw a lifetime with the given half-life.
///
/// `λ = ln 2 / half_life`; the draw is `-ln(1 - u) / λ` for a uniform
/// `u ∈ [0, 1)`, capped at [`JITTER_CAP`] half-lives. Exactly one uniform value
/// is consumed from `rng`. Lifetimes too long for a `Duration` saturate.
pub fn jittered_lifetime<R: Rng + ?Sized>(half_life: Duration, rng: &mut R) -> Duration {
    let half = half_life.as_secs_f64();
    let u: f64 = Standard.sample(rng);
    if half <= 0.0 {
        return Duration::ZERO;
    }

    let lambda = LN_2 / half;
    let lifetime = -(1.0 - u).ln() / lambda;
    Duration::try_from_secs_f64(lifetime.min(half * JITTER_CAP)).unwrap_or(Duration::MAX)
}

/// `now` plus `lifetime`, truncated to whole milliseconds.
pub fn expiry_after(now: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    let millis = i64::try_from(lifetime.as_millis()).unwrap_or(i64::MAX);
    now.checked_add_signed(TimeDelta::milliseconds(millis))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The academic year `now` falls in, named by the calendar year it starts.
///
/// Academic years start in September.
pub fn academic_year(now: DateTime<Utc>) -> i32 {
    if now.month() >= 9 { now.year() } else { now.year() - 1 }
}

/// Midnight UTC on `month`/`day` of the year after the current academic year.
///
/// Returns None for dates that do not exist.
pub fn academic_rollover(now: DateTime<Utc>, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(academic_year(now) + 1, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc())
}
