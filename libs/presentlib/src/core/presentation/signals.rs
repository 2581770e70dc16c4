// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Wake-up signalling for the presentation thread.
//!
//! Three things wake the presentation thread: a sample becoming due (either
//! drawn immediately or its clock advise firing), a state transition that
//! abandons the current wait, and shutdown. The render-due flag is consumed
//! by the waiter and cleared by every cancellation; advise wake-ups carry a
//! generation so a cancelled advise that fires late cannot set it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::clocks::{AdviseSink, AdviseToken};

/// Why a wait for the next due sample ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A sample is due for presentation.
    Due,
    /// A state change (or shutdown) interrupted the wait.
    Abandoned,
}

#[derive(Debug, Default)]
struct WakeFlags {
    render_due: bool,
    advise_generation: u64,
    interrupt_epoch: u64,
    shutdown: bool,
}

#[derive(Debug, Default)]
pub struct WakeSignals {
    flags: Mutex<WakeFlags>,
    cond: Condvar,
}

impl WakeSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the pending sample as due now.
    pub fn set_render_due(&self) {
        self.flags.lock().render_due = true;
        self.cond.notify_all();
    }

    /// Clear the due flag and invalidate any armed advise.
    pub fn reset(&self) {
        let mut flags = self.flags.lock();
        flags.render_due = false;
        flags.advise_generation += 1;
    }

    /// Start a new advise generation; the returned value goes into the wake.
    pub fn arm_advise(&self) -> u64 {
        let mut flags = self.flags.lock();
        flags.advise_generation += 1;
        flags.advise_generation
    }

    /// Returns `true` if the advise was still current.
    pub fn fire_advise(&self, generation: u64) -> bool {
        let mut flags = self.flags.lock();
        if flags.advise_generation != generation {
            return false;
        }
        flags.render_due = true;
        drop(flags);
        self.cond.notify_all();
        true
    }

    /// Abandon any wait in progress.
    pub fn interrupt(&self) {
        self.flags.lock().interrupt_epoch += 1;
        self.cond.notify_all();
    }

    pub fn request_shutdown(&self) {
        self.flags.lock().shutdown = true;
        self.cond.notify_all();
    }

    pub fn clear_shutdown(&self) {
        self.flags.lock().shutdown = false;
    }

    pub fn is_shutdown(&self) -> bool {
        self.flags.lock().shutdown
    }

    pub fn is_render_due(&self) -> bool {
        self.flags.lock().render_due
    }

    /// Block until due, interrupted, or `timeout` elapses (`None`).
    ///
    /// Only interrupts raised after the wait starts abandon it.
    pub fn wait(&self, timeout: Duration) -> Option<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        let mut flags = self.flags.lock();
        let epoch = flags.interrupt_epoch;

        loop {
            if flags.shutdown || flags.interrupt_epoch != epoch {
                return Some(WaitOutcome::Abandoned);
            }
            if flags.render_due {
                flags.render_due = false;
                return Some(WaitOutcome::Due);
            }
            if Instant::now() >= deadline {
                return None;
            }
            self.cond.wait_until(&mut flags, deadline);
        }
    }
}

/// Clock advise sink that marks the renderer due for one advise generation.
pub(crate) struct AdviseWake {
    signals: Arc<WakeSignals>,
    generation: u64,
}

impl AdviseWake {
    pub(crate) fn new(signals: Arc<WakeSignals>, generation: u64) -> Self {
        Self {
            signals,
            generation,
        }
    }
}

impl AdviseSink for AdviseWake {
    fn on_advise(&self, _token: AdviseToken) {
        if !self.signals.fire_advise(self.generation) {
            tracing::trace!("Ignoring stale advise (generation {})", self.generation);
        }
    }
}
