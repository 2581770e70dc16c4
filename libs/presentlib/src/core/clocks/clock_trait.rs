// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock trait - reference time plus one-shot wake-up subscriptions
//!
//! The renderer reads the clock to decide whether a sample is late, and asks
//! the clock to wake the presentation thread once a scheduled sample is due.

use std::sync::Arc;

use crate::core::error::Result;

/// Correlates a fired advise with the subscription that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdviseToken(u64);

impl AdviseToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Receiver of advise notifications.
///
/// Called from whatever thread the clock fires on. Implementations must not
/// block.
pub trait AdviseSink: Send + Sync {
    fn on_advise(&self, token: AdviseToken);
}

/// Reference clock shared between the producer and presentation threads.
///
/// ## Implementations
///
/// - `SoftwareClock`: monotonic system time, advises fired by a timer thread
/// - `ManualClock`: advanced by hand, advises fired by `advance_to`
pub trait ClockSource: Send + Sync {
    /// Current reference time in nanoseconds (monotonic).
    fn now_ns(&self) -> i64;

    /// Notify `sink` once reference time reaches `target_ns`.
    ///
    /// A target already in the past fires as soon as possible, but never from
    /// inside this call: callers may hold their own locks here. An `Err` means
    /// the clock refused the subscription.
    fn advise_once(&self, target_ns: i64, sink: Arc<dyn AdviseSink>) -> Result<AdviseToken>;

    /// Cancel an outstanding advise. Unknown or already fired tokens are
    /// ignored.
    fn cancel(&self, token: AdviseToken);

    /// Human-readable clock description
    fn description(&self) -> &str;
}
