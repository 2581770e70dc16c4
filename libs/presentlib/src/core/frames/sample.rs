// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Timestamped media sample handed to the renderer by the producer.
//!
//! The payload is opaque to the scheduler. It is moved in on `push`, lent to
//! the [`Renderer`](crate::core::presentation::Renderer) for the draw, and
//! released when the slot is cleared.

/// Presentation interval of a sample in stream time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTimes {
    pub start_ns: i64,
    /// End of the interval. `None` when the producer only stamped a start.
    pub end_ns: Option<i64>,
}

impl SampleTimes {
    /// `end < start` is malformed; a missing end is not.
    pub fn is_malformed(&self) -> bool {
        matches!(self.end_ns, Some(end) if end < self.start_ns)
    }

    /// Interval length, zero when the end is missing.
    pub fn duration_ns(&self) -> i64 {
        self.end_ns.map_or(0, |end| end - self.start_ns)
    }

    /// Effective end, falling back to the start.
    pub fn end_or_start_ns(&self) -> i64 {
        self.end_ns.unwrap_or(self.start_ns)
    }
}

#[derive(Debug, Clone)]
pub struct Sample<P> {
    payload: P,
    times: Option<SampleTimes>,
    discontinuity: bool,
}

impl<P> Sample<P> {
    /// Sample with a full `[start, end)` interval.
    pub fn new(payload: P, start_ns: i64, end_ns: i64) -> Self {
        Self {
            payload,
            times: Some(SampleTimes {
                start_ns,
                end_ns: Some(end_ns),
            }),
            discontinuity: false,
        }
    }

    /// Sample stamped with a start time only.
    pub fn with_start(payload: P, start_ns: i64) -> Self {
        Self {
            payload,
            times: Some(SampleTimes {
                start_ns,
                end_ns: None,
            }),
            discontinuity: false,
        }
    }

    /// Sample without timestamps. Always drawn immediately.
    pub fn untimed(payload: P) -> Self {
        Self {
            payload,
            times: None,
            discontinuity: false,
        }
    }

    /// Mark the first sample after a gap in the upstream stream.
    pub fn with_discontinuity(mut self, discontinuity: bool) -> Self {
        self.discontinuity = discontinuity;
        self
    }

    pub fn times(&self) -> Option<SampleTimes> {
        self.times
    }

    pub fn is_discontinuity(&self) -> bool {
        self.discontinuity
    }

    pub fn is_malformed(&self) -> bool {
        self.times.is_some_and(|t| t.is_malformed())
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Release the sample, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}
