// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::time::Instant;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core::presentation::SchedulerState;
use crate::core::scheduling::Statistics;
use crate::core::time::to_millis;

/// Read-only presentation statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub state: SchedulerState,
    pub streaming: bool,
    pub frames_drawn: u64,
    pub frames_dropped: u64,
    /// Frames per hundred seconds of streaming time.
    pub avg_frame_rate: i64,
    /// Mean lateness of drawn frames in milliseconds.
    pub avg_sync_offset_ms: i64,
    /// Standard deviation of frame lateness in milliseconds.
    pub dev_sync_offset_ms: i64,
    /// Standard deviation of the inter-frame time in milliseconds.
    pub jitter_ms: i64,
    pub render_avg_ms: i64,
    pub frame_avg_ms: i64,
}

impl Diagnostics {
    /// Snapshot `stats`. Timing figures read zero without a clock.
    pub fn capture(
        stats: &Statistics,
        state: SchedulerState,
        has_clock: bool,
        now: Instant,
    ) -> Self {
        let ledger = stats.ledger();
        let (avg_sync_offset_ms, dev_sync_offset_ms, jitter_ms) = if has_clock {
            (
                ledger.avg_sync_offset_ms(),
                ledger.dev_sync_offset_ms(),
                ledger.jitter_ms(),
            )
        } else {
            (0, 0, 0)
        };

        Self {
            state,
            streaming: ledger.is_streaming(),
            frames_drawn: stats.frames_drawn(),
            frames_dropped: stats.frames_dropped(),
            avg_frame_rate: ledger.avg_frame_rate(now),
            avg_sync_offset_ms,
            dev_sync_offset_ms,
            jitter_ms,
            render_avg_ms: to_millis(stats.render_avg_ns()),
            frame_avg_ms: to_millis(stats.frame_avg_ns().max(0)),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "state": self.state.to_string(),
            "streaming": self.streaming,
            "frames_drawn": self.frames_drawn,
            "frames_dropped": self.frames_dropped,
            "avg_frame_rate": self.avg_frame_rate,
            "avg_sync_offset_ms": self.avg_sync_offset_ms,
            "dev_sync_offset_ms": self.dev_sync_offset_ms,
            "jitter_ms": self.jitter_ms,
            "render_avg_ms": self.render_avg_ms,
            "frame_avg_ms": self.frame_avg_ms
        })
    }
}
