// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Time arithmetic for reference and stream time.
//!
//! All times are signed nanoseconds. Reference time is whatever the
//! [`ClockSource`](crate::core::clocks::ClockSource) reports; stream time is
//! reference time minus the epoch recorded by `Run`.

use std::time::Duration;

pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Milliseconds to nanoseconds.
#[inline]
pub const fn ms(millis: i64) -> i64 {
    millis * NANOS_PER_MILLI
}

/// Nanoseconds to whole milliseconds (truncating toward zero).
#[inline]
pub const fn to_millis(nanos: i64) -> i64 {
    nanos / NANOS_PER_MILLI
}

/// Clamp a time difference to `±limit_ns`.
///
/// Lateness can be enormous after a long pause or a bogus timestamp; the
/// quality arithmetic only needs to know it is "very late" or "very early".
#[inline]
pub fn clamp_diff(diff_ns: i64, limit_ns: i64) -> i64 {
    diff_ns.clamp(-limit_ns, limit_ns)
}

/// Non-negative nanoseconds to a [`Duration`]; negative values become zero.
#[inline]
pub fn duration_from_nanos(nanos: i64) -> Duration {
    Duration::from_nanos(nanos.max(0) as u64)
}

/// A [`Duration`] as signed nanoseconds, saturating at `i64::MAX`.
#[inline]
pub fn nanos_from_duration(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}
