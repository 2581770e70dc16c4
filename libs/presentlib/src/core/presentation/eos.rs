// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! End-of-stream delivery state.
//!
//! The producer signals end-of-stream once; the renderer holds the
//! notification until the last sample's end time has passed on the clock.
//! Arming records a generation so a deferred delivery that fires after a
//! reset or re-arm is recognised as stale.

use crate::core::clocks::AdviseToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EosState {
    /// Not signalled.
    #[default]
    Idle,
    /// Signalled, delivery not yet scheduled.
    Pending,
    /// Delivery scheduled on the clock.
    Armed {
        deadline_ns: i64,
        generation: u64,
        token: AdviseToken,
    },
    /// Completion sent downstream.
    Delivered,
}

#[derive(Debug, Default)]
pub struct EndOfStream {
    state: EosState,
    /// Stream time the last accepted sample ends.
    signal_time_ns: i64,
    generation: u64,
}

impl EndOfStream {
    pub fn state(&self) -> EosState {
        self.state
    }

    /// The producer has signalled; no more samples this segment.
    pub fn is_signalled(&self) -> bool {
        !matches!(self.state, EosState::Idle)
    }

    pub fn needs_delivery(&self) -> bool {
        matches!(self.state, EosState::Pending)
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, EosState::Armed { .. })
    }

    pub fn signal_time_ns(&self) -> i64 {
        self.signal_time_ns
    }

    pub fn set_signal_time(&mut self, signal_time_ns: i64) {
        self.signal_time_ns = signal_time_ns;
    }

    pub fn signal(&mut self) {
        if self.state == EosState::Idle {
            self.state = EosState::Pending;
        }
    }

    /// Generation for the next arm.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn arm(&mut self, deadline_ns: i64, generation: u64, token: AdviseToken) {
        self.state = EosState::Armed {
            deadline_ns,
            generation,
            token,
        };
    }

    /// Drop a scheduled delivery back to `Pending`, returning its advise.
    pub fn disarm(&mut self) -> Option<AdviseToken> {
        match self.state {
            EosState::Armed { token, .. } => {
                self.state = EosState::Pending;
                Some(token)
            }
            _ => None,
        }
    }

    /// A scheduled delivery fired. Returns `false` for stale generations.
    pub fn fire(&mut self, generation: u64) -> bool {
        match self.state {
            EosState::Armed {
                generation: armed, ..
            } if armed == generation => {
                self.state = EosState::Pending;
                true
            }
            _ => false,
        }
    }

    pub fn mark_delivered(&mut self) {
        self.state = EosState::Delivered;
    }

    /// Streaming stopped: a delivered completion is sent again when streaming
    /// restarts.
    pub fn on_stop_streaming(&mut self) {
        if self.state == EosState::Delivered {
            self.state = EosState::Pending;
        }
    }

    /// Forget the signal entirely, returning an advise to cancel.
    pub fn reset(&mut self) -> Option<AdviseToken> {
        let token = self.disarm();
        self.state = EosState::Idle;
        self.signal_time_ns = 0;
        token
    }
}

impl std::fmt::Display for EosState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Pending => write!(f, "Pending"),
            Self::Armed { deadline_ns, .. } => write!(f, "Armed(@{}ns)", deadline_ns),
            Self::Delivered => write!(f, "Delivered"),
        }
    }
}
