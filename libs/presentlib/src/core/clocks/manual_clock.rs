// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Deterministic clock advanced by hand.
//!
//! Advises fire synchronously from [`ManualClock::advance_to`] on the calling
//! thread, after the clock's own lock is released. An advise for a time that
//! has already passed waits for the next advance, so `advise_once` never calls
//! back into the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AdviseSink, AdviseToken, ClockSource};
use crate::core::error::{PresentError, Result};

struct ManualClockInner {
    now_ns: i64,
    next_token: u64,
    refuse_advises: bool,
    advises: BTreeMap<(i64, AdviseToken), Arc<dyn AdviseSink>>,
}

pub struct ManualClock {
    inner: Mutex<ManualClockInner>,
    description: String,
}

impl ManualClock {
    pub fn new(start_ns: i64) -> Self {
        Self {
            inner: Mutex::new(ManualClockInner {
                now_ns: start_ns,
                next_token: 1,
                refuse_advises: false,
                advises: BTreeMap::new(),
            }),
            description: "Manual Clock".to_string(),
        }
    }

    /// Move time forward to `now_ns` and fire every advise now due.
    ///
    /// Moving backwards is ignored.
    pub fn advance_to(&self, now_ns: i64) {
        let due = {
            let mut inner = self.inner.lock();
            if now_ns > inner.now_ns {
                inner.now_ns = now_ns;
            }
            let now = inner.now_ns;
            let mut due = Vec::new();
            while let Some(entry) = inner.advises.first_entry() {
                if entry.key().0 > now {
                    break;
                }
                let ((_, token), sink) = entry.remove_entry();
                due.push((token, sink));
            }
            due
        };

        for (token, sink) in due {
            sink.on_advise(token);
        }
    }

    pub fn advance_by(&self, delta_ns: i64) {
        let target = self.now_ns() + delta_ns;
        self.advance_to(target);
    }

    /// Make subsequent `advise_once` calls fail.
    pub fn set_refuse_advises(&self, refuse: bool) {
        self.inner.lock().refuse_advises = refuse;
    }

    pub fn pending_advises(&self) -> usize {
        self.inner.lock().advises.len()
    }

    /// Earliest outstanding advise target.
    pub fn next_advise_ns(&self) -> Option<i64> {
        self.inner
            .lock()
            .advises
            .first_key_value()
            .map(|((target, _), _)| *target)
    }
}

impl ClockSource for ManualClock {
    fn now_ns(&self) -> i64 {
        self.inner.lock().now_ns
    }

    fn advise_once(&self, target_ns: i64, sink: Arc<dyn AdviseSink>) -> Result<AdviseToken> {
        let mut inner = self.inner.lock();
        if inner.refuse_advises {
            return Err(PresentError::Clock(format!(
                "advise for {}ns refused",
                target_ns
            )));
        }
        let token = AdviseToken::new(inner.next_token);
        inner.next_token += 1;
        inner.advises.insert((target_ns, token), sink);
        Ok(token)
    }

    fn cancel(&self, token: AdviseToken) {
        self.inner.lock().advises.retain(|(_, t), _| *t != token);
    }

    fn description(&self) -> &str {
        &self.description
    }
}
