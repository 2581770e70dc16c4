// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Rolling presentation statistics.
//!
//! Reset whenever streaming (re)starts. Mutated only by the thread holding the
//! render lock; read by diagnostics under the interface lock.

use std::time::{Duration, Instant};

use crate::core::time::{NANOS_PER_MILLI, NANOS_PER_SECOND};

/// Per-frame timeliness sums backing the diagnostics queries.
///
/// All values are whole milliseconds. Lateness is clamped to +/-1000 ms and
/// frame gaps to 0..=1000 ms so a single pause cannot swamp the sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceLedger {
    frames_drawn: u64,
    total_accuracy_ms: i64,
    sum_sq_accuracy_ms: i64,
    total_frame_ms: i64,
    sum_sq_frame_ms: i64,
    streaming_since: Option<Instant>,
    streamed_for: Duration,
}

impl PerformanceLedger {
    const CLAMP_MS: i64 = 1000;

    /// Fold one drawn frame into the sums.
    ///
    /// The first frame's stamp is often bogus, so accuracy skips it; the gap
    /// before the second frame depends on that stamp, so frame time skips
    /// both.
    pub fn record_frame(&mut self, late_ns: i64, frame_ns: i64) {
        let mut late_ms = late_ns / NANOS_PER_MILLI;
        if !(-Self::CLAMP_MS..=Self::CLAMP_MS).contains(&late_ms) {
            late_ms = if self.frames_drawn <= 1 {
                0
            } else {
                late_ms.clamp(-Self::CLAMP_MS, Self::CLAMP_MS)
            };
        }

        if self.frames_drawn > 1 {
            self.total_accuracy_ms += late_ms;
            self.sum_sq_accuracy_ms += late_ms * late_ms;
        }

        if self.frames_drawn > 2 {
            let mut frame_ms = frame_ns / NANOS_PER_MILLI;
            if !(0..=Self::CLAMP_MS).contains(&frame_ms) {
                frame_ms = Self::CLAMP_MS;
            }
            self.total_frame_ms += frame_ms;
            self.sum_sq_frame_ms += frame_ms * frame_ms;
        }

        self.frames_drawn += 1;
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn start_streaming(&mut self, now: Instant) {
        self.streaming_since = Some(now);
        self.streamed_for = Duration::ZERO;
    }

    pub fn stop_streaming(&mut self, now: Instant) {
        if let Some(since) = self.streaming_since.take() {
            self.streamed_for = now.saturating_duration_since(since);
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_since.is_some()
    }

    /// Streaming wall time: up to `now` while streaming, frozen at the last
    /// stop otherwise.
    pub fn streaming_elapsed(&self, now: Instant) -> Duration {
        match self.streaming_since {
            Some(since) => now.saturating_duration_since(since),
            None => self.streamed_for,
        }
    }

    /// Frames per hundred seconds of streaming wall time.
    pub fn avg_frame_rate(&self, now: Instant) -> i64 {
        let elapsed_ms = self.streaming_elapsed(now).as_millis() as i64;
        if elapsed_ms <= 0 {
            0
        } else {
            (self.frames_drawn as i64 * 100_000) / elapsed_ms
        }
    }

    /// Mean lateness of drawn frames in milliseconds.
    pub fn avg_sync_offset_ms(&self) -> i64 {
        if self.frames_drawn <= 1 {
            0
        } else {
            self.total_accuracy_ms / (self.frames_drawn as i64 - 1)
        }
    }

    /// Standard deviation of frame lateness in milliseconds.
    pub fn dev_sync_offset_ms(&self) -> i64 {
        std_dev(
            self.frames_drawn as i64 - 1,
            self.sum_sq_accuracy_ms,
            self.total_accuracy_ms,
        )
    }

    /// Standard deviation of the inter-frame time in milliseconds.
    pub fn jitter_ms(&self) -> i64 {
        std_dev(
            self.frames_drawn as i64 - 2,
            self.sum_sq_frame_ms,
            self.total_frame_ms,
        )
    }
}

/// Sample standard deviation from a sum and sum of squares.
fn std_dev(samples: i64, sum_sq: i64, total: i64) -> i64 {
    if samples <= 1 {
        return 0;
    }
    let variance = (sum_sq - (total * total) / samples) / (samples - 1);
    (variance.max(0) as f64).sqrt() as i64
}

/// Rolling averages driving the quality controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub(crate) render_avg_ns: i64,
    pub(crate) render_last_ns: i64,
    /// Negative until the first sample sets it.
    pub(crate) frame_avg_ns: i64,
    pub(crate) duration_ns: i64,
    pub(crate) wait_avg_ns: i64,
    /// Non-positive offset applied to the start of scheduled samples.
    pub(crate) earliness_ns: i64,
    /// Stream time of the last draw (or planned draw).
    pub(crate) last_draw_ns: i64,
    /// Consecutive normally scheduled frames; -1 right after a drop.
    pub(crate) n_normal: i32,
    pub(crate) frames_dropped: u64,
    pending_late_ns: i64,
    pending_frame_ns: i64,
    ledger: PerformanceLedger,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            render_avg_ns: 0,
            render_last_ns: 0,
            frame_avg_ns: -1,
            duration_ns: 0,
            wait_avg_ns: 0,
            earliness_ns: 0,
            last_draw_ns: -NANOS_PER_SECOND,
            n_normal: 0,
            frames_dropped: 0,
            pending_late_ns: 0,
            pending_frame_ns: 0,
            ledger: PerformanceLedger::default(),
        }
    }

    /// Reset every average and counter for a new streaming run.
    ///
    /// The last draw is placed one second in the past so the first sample
    /// always qualifies for the forced refresh.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new();
        self.ledger.start_streaming(now);
    }

    pub fn stop_streaming(&mut self, now: Instant) {
        self.ledger.stop_streaming(now);
    }

    /// Fold a measured render time into the average.
    ///
    /// A spike (at least `outlier_factor` times both the average and the
    /// previous measurement) is capped before mixing so one preemption
    /// cannot corrupt the average.
    pub fn record_render_time(&mut self, render_ns: i64, smoothing_period: i64, outlier_factor: i64) {
        let render_ns = render_ns.max(0);
        let cap = outlier_factor * self.render_avg_ns.max(self.render_last_ns);
        let mixed = render_ns.min(cap);
        self.render_avg_ns = (mixed + (smoothing_period - 1) * self.render_avg_ns) / smoothing_period;
        self.render_last_ns = render_ns;
    }

    /// Stash the lateness and frame gap of the sample about to be drawn.
    pub(crate) fn prepare_performance_data(&mut self, late_ns: i64, frame_ns: i64) {
        self.pending_late_ns = late_ns;
        self.pending_frame_ns = frame_ns;
    }

    /// Count a drawn frame using the stashed performance data.
    pub(crate) fn record_frame_drawn(&mut self) {
        self.ledger
            .record_frame(self.pending_late_ns, self.pending_frame_ns);
    }

    pub(crate) fn record_drop(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn render_avg_ns(&self) -> i64 {
        self.render_avg_ns
    }

    pub fn frame_avg_ns(&self) -> i64 {
        self.frame_avg_ns
    }

    pub fn wait_avg_ns(&self) -> i64 {
        self.wait_avg_ns
    }

    pub fn earliness_ns(&self) -> i64 {
        self.earliness_ns
    }

    pub fn last_draw_ns(&self) -> i64 {
        self.last_draw_ns
    }

    pub fn frames_drawn(&self) -> u64 {
        self.ledger.frames_drawn()
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn ledger(&self) -> &PerformanceLedger {
        &self.ledger
    }
}
