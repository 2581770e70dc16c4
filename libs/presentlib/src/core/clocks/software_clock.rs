// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use super::{AdviseSink, AdviseToken, ClockSource};
use crate::core::error::{PresentError, Result};
use crate::core::time::duration_from_nanos;
use crate::core::timer::{DeadlineTimer, TimerId};

/// Monotonic system clock with timer-thread advises.
pub struct SoftwareClock {
    start_time: Instant,
    start_timestamp: i64, // nanoseconds since epoch
    description: String,
    timer: DeadlineTimer,
    next_token: AtomicU64,
    outstanding: Arc<Mutex<HashMap<AdviseToken, TimerId>>>,
}

impl SoftwareClock {
    pub fn new() -> Result<Self> {
        Self::with_description("Software Clock".to_string())
    }

    pub fn with_description(description: String) -> Result<Self> {
        let start_time = Instant::now();
        let start_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .map_err(|e| PresentError::Clock(format!("system time before epoch: {}", e)))?;

        Ok(Self {
            start_time,
            start_timestamp,
            timer: DeadlineTimer::new("software-clock")?,
            description,
            next_token: AtomicU64::new(1),
            outstanding: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Advises that have not yet fired.
    pub fn pending_advises(&self) -> usize {
        self.outstanding.lock().len()
    }
}

impl ClockSource for SoftwareClock {
    fn now_ns(&self) -> i64 {
        let elapsed = self.start_time.elapsed().as_nanos() as i64;
        self.start_timestamp + elapsed
    }

    fn advise_once(&self, target_ns: i64, sink: Arc<dyn AdviseSink>) -> Result<AdviseToken> {
        let token = AdviseToken::new(self.next_token.fetch_add(1, Ordering::Relaxed));
        let delay = duration_from_nanos(target_ns - self.now_ns());

        // Holding the table lock across scheduling keeps an immediate fire
        // from racing ahead of the insert below.
        let mut outstanding = self.outstanding.lock();
        let fired = Arc::clone(&self.outstanding);
        let timer_id = self.timer.schedule_after(delay, move || {
            fired.lock().remove(&token);
            sink.on_advise(token);
        })?;
        outstanding.insert(token, timer_id);
        Ok(token)
    }

    fn cancel(&self, token: AdviseToken) {
        if let Some(timer_id) = self.outstanding.lock().remove(&token) {
            self.timer.cancel(timer_id);
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}
