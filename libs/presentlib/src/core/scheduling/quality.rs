// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Adaptive quality control.
//!
//! For each sample the controller first assesses its lateness against the
//! clock and builds the upstream feedback message, then (once the producer
//! has said whether it handles quality itself) decides to draw now, draw at
//! an adjusted time, or drop. Both steps operate on [`Statistics`] owned by
//! the caller; the controller holds nothing but its tuning constants.

use serde::Serialize;

use super::config::QualityConfig;
use super::statistics::Statistics;
use crate::core::frames::SampleTimes;
use crate::core::time::clamp_diff;

/// What is mostly limiting presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityKind {
    /// Starved of samples; the renderer spends most of its time elsewhere.
    Famine,
    /// Flooded; drawing dominates the frame interval.
    Flood,
}

/// Timeliness feedback sent to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality {
    pub kind: QualityKind,
    /// Requested rate in thousandths of nominal (1000 = keep going).
    pub proportion: i64,
    /// How late presentation is running, including half a render.
    pub late_ns: i64,
    /// Stream time the measurement was taken.
    pub timestamp_ns: i64,
}

/// Presentation decision for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    DrawNow,
    /// Draw once stream time reaches the given (earliness-adjusted) start.
    DrawAt(i64),
    Drop,
}

/// A sample's timing relative to the clock, before the draw decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Start after the display-latency bias.
    pub start_ns: i64,
    pub end_ns: i64,
    /// Stream time now.
    pub now_ns: i64,
    /// `now - start`, clamped; negative means early.
    pub late_ns: i64,
    pub quality: Quality,
}

#[derive(Debug, Clone, Default)]
pub struct QualityController {
    config: QualityConfig,
}

impl QualityController {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Measure lateness and build the feedback message.
    pub fn assess(&self, stats: &Statistics, times: SampleTimes, now_ns: i64) -> Assessment {
        let bias = self.config.display_latency_bias_ns();
        let mut start_ns = times.start_ns;
        let mut end_ns = times.end_or_start_ns();
        if start_ns >= bias {
            start_ns -= bias;
            end_ns -= bias;
        }

        let late_ns = clamp_diff(now_ns - start_ns, self.config.lateness_clamp_ns());
        let quality = self.feedback(stats, late_ns, now_ns);

        Assessment {
            start_ns,
            end_ns,
            now_ns,
            late_ns,
            quality,
        }
    }

    fn feedback(&self, stats: &Statistics, late_ns: i64, now_ns: i64) -> Quality {
        let cfg = &self.config;
        let frame_avg = stats.frame_avg_ns;
        let wait_avg = stats.wait_avg_ns;

        let kind = if frame_avg < 0 || frame_avg > 2 * stats.render_avg_ns {
            QualityKind::Famine
        } else {
            QualityKind::Flood
        };

        let mut proportion = cfg.proportion_nominal;
        let speedup = cfg.speedup_wait_threshold_ns();
        if frame_avg < 0 {
            // No frame rate yet; nothing to say.
        } else if late_ns > 0 {
            let late_ms = late_ns / 1_000_000;
            proportion = (cfg.proportion_nominal - late_ms).max(cfg.proportion_floor);
        } else if wait_avg > speedup && late_ns < -speedup {
            proportion = if wait_avg >= frame_avg {
                cfg.proportion_ceiling
            } else if frame_avg + speedup > wait_avg {
                cfg.proportion_nominal * (frame_avg / (frame_avg + speedup - wait_avg))
            } else {
                cfg.proportion_ceiling
            };
            proportion = proportion.min(cfg.proportion_ceiling);
        }

        Quality {
            kind,
            proportion,
            late_ns: late_ns + stats.render_avg_ns / 2,
            timestamp_ns: now_ns,
        }
    }

    /// Decide what to do with an assessed sample and update the averages.
    ///
    /// `supplier_handling` is the producer's answer to the feedback message:
    /// when it throttles itself the renderer tolerates more lateness, and a
    /// discontinuity means the producer just dropped a frame.
    pub fn decide(
        &self,
        stats: &mut Statistics,
        assessment: &Assessment,
        discontinuity: bool,
        supplier_handling: bool,
    ) -> Decision {
        let cfg = &self.config;
        let period = cfg.smoothing_period;
        let late = assessment.late_ns;
        let now = assessment.now_ns;
        let duration = assessment.end_ns - assessment.start_ns;

        // A frame rate change must not look like falling behind.
        let tolerance = stats.duration_ns / cfg.rate_change_divisor;
        if duration > stats.duration_ns + tolerance || duration < stats.duration_ns - tolerance {
            stats.frame_avg_ns = duration;
            stats.duration_ns = duration;
        }

        let just_dropped = (supplier_handling && discontinuity) || stats.n_normal == -1;

        if late > 0 {
            stats.earliness_ns = 0;
        } else if late >= stats.earliness_ns || just_dropped {
            stats.earliness_ns = late;
        } else {
            stats.earliness_ns -= stats.earliness_ns / cfg.earliness_decay_divisor;
        }

        let new_wait_avg = ((-late).max(0) + (period - 1) * stats.wait_avg_ns) / period;

        let since_last_draw = now - stats.last_draw_ns;
        let frame_gap = since_last_draw.min(cfg.forced_refresh_ns());

        let lateness_tolerated = if supplier_handling {
            late <= duration * cfg.supplier_late_intervals
        } else {
            late + late < duration
        };

        let draw = cfg.negligible_render_ratio * stats.render_avg_ns <= stats.frame_avg_ns
            || lateness_tolerated
            || stats.wait_avg_ns > cfg.glitch_wait_tolerance_ns()
            || since_last_draw > cfg.forced_refresh_ns()
            || late < -cfg.early_abort_ns();

        if !draw {
            stats.wait_avg_ns = new_wait_avg;
            stats.n_normal = -1;
            tracing::trace!(
                "Dropping sample at {}ns: {}ns late, render avg {}ns, frame avg {}ns",
                assessment.start_ns,
                late,
                stats.render_avg_ns,
                stats.frame_avg_ns
            );
            return Decision::Drop;
        }

        let mut catch_up = just_dropped
            || (stats.frame_avg_ns > duration + duration / cfg.slow_machine_divisor
                && late > -duration * cfg.max_early_intervals);
        if late < -cfg.early_abort_ns() {
            catch_up = false;
        }

        if catch_up {
            stats.n_normal = 0;
            stats.wait_avg_ns = (stats.wait_avg_ns * (period - 1)) / period;
            stats.frame_avg_ns = (frame_gap + stats.frame_avg_ns * (period - 1)) / period;
            stats.prepare_performance_data(late, frame_gap);
            stats.last_draw_ns = now;
            if stats.earliness_ns > late {
                stats.earliness_ns = late;
            }
            return Decision::DrawNow;
        }

        stats.n_normal = stats.n_normal.saturating_add(1);
        stats.frame_avg_ns = duration;
        stats.wait_avg_ns = new_wait_avg;

        let applied_earliness = stats.earliness_ns.max(-stats.frame_avg_ns);
        let target = assessment.start_ns + applied_earliness;

        if target <= now {
            stats.prepare_performance_data(late, frame_gap);
            stats.last_draw_ns = now;
            Decision::DrawNow
        } else {
            let planned_gap = clamp_diff(target - stats.last_draw_ns, cfg.lateness_clamp_ns());
            stats.prepare_performance_data(applied_earliness, planned_gap);
            stats.last_draw_ns = target;
            Decision::DrawAt(target)
        }
    }
}

/// Post-draw sleep requested by a downstream quality message.
///
/// Hyperbola through roughly 25 ms at proportion 500, zero from 1000 up.
pub fn throttle_delay_ns(proportion: i64) -> i64 {
    if proportion >= 1000 {
        return 0;
    }
    let units = -330_000 + 388_880_000 / (proportion.max(0) + 167);
    units * 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ms;

    fn times(start_ms: i64, end_ms: i64) -> SampleTimes {
        SampleTimes {
            start_ns: ms(start_ms),
            end_ns: Some(ms(end_ms)),
        }
    }

    fn controller() -> QualityController {
        QualityController::new(QualityConfig::default())
    }

    #[test]
    fn test_first_sample_on_time_draws_now() {
        let qc = controller();
        let mut stats = Statistics::new();

        let a = qc.assess(&stats, times(1000, 1033), ms(1000));
        assert_eq!(a.start_ns, ms(992), "display latency bias applied");
        assert_eq!(a.late_ns, ms(8));
        assert_eq!(a.quality.proportion, 1000, "no frame rate yet");
        assert_eq!(a.quality.kind, QualityKind::Famine);

        assert_eq!(qc.decide(&mut stats, &a, false, false), Decision::DrawNow);
        assert_eq!(stats.frame_avg_ns(), ms(33));
        assert_eq!(stats.last_draw_ns(), ms(1000));
    }

    #[test]
    fn test_bias_skipped_for_tiny_start_times() {
        let qc = controller();
        let a = qc.assess(&Statistics::new(), times(5, 38), 0);
        assert_eq!(a.start_ns, ms(5));
        assert_eq!(a.end_ns, ms(38));
    }

    #[test]
    fn test_early_sample_is_scheduled() {
        let qc = controller();
        let mut stats = Statistics::new();

        let a = qc.assess(&stats, times(1000, 1033), ms(900));
        match qc.decide(&mut stats, &a, false, false) {
            Decision::DrawAt(target) => {
                assert!(target <= ms(992));
                assert!(target >= ms(992) - ms(33), "earliness bounded by one frame");
            }
            other => panic!("expected DrawAt, got {:?}", other),
        }
    }

    #[test]
    fn test_cheap_rendering_never_drops() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.render_avg_ns = ms(5);
        stats.render_last_ns = ms(5);

        for i in 0..10 {
            let start = 1000 + i * 33;
            // Up to two intervals late.
            let now = ms(start + 8 + (i % 3) * 33);
            let a = qc.assess(&stats, times(start, start + 33), now);
            let decision = qc.decide(&mut stats, &a, false, false);
            assert_ne!(decision, Decision::Drop, "sample {} dropped", i);
        }
    }

    #[test]
    fn test_late_expensive_sample_dropped() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.render_avg_ns = ms(20);
        stats.render_last_ns = ms(20);
        stats.frame_avg_ns = ms(33);
        stats.duration_ns = ms(33);
        stats.last_draw_ns = ms(1900);

        let a = qc.assess(&stats, times(1908, 1941), ms(2000));
        assert_eq!(qc.decide(&mut stats, &a, false, false), Decision::Drop);
        assert_eq!(stats.n_normal, -1);

        // The next on-time sample is drawn immediately in catch-up mode.
        let a = qc.assess(&stats, times(2008, 2041), ms(2000));
        assert_eq!(qc.decide(&mut stats, &a, false, false), Decision::DrawNow);
        assert_eq!(stats.n_normal, 0);
    }

    #[test]
    fn test_supplier_handling_tolerates_four_intervals() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.render_avg_ns = ms(20);
        stats.render_last_ns = ms(20);
        stats.frame_avg_ns = ms(33);
        stats.duration_ns = ms(33);
        stats.last_draw_ns = ms(1900);

        let a = qc.assess(&stats, times(1908, 1941), ms(2000));
        assert_ne!(qc.decide(&mut stats, &a, false, true), Decision::Drop);
    }

    #[test]
    fn test_forced_refresh_after_one_second() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.render_avg_ns = ms(20);
        stats.render_last_ns = ms(20);
        stats.frame_avg_ns = ms(33);
        stats.duration_ns = ms(33);
        stats.last_draw_ns = ms(1000);

        let a = qc.assess(&stats, times(2508, 2541), ms(3000));
        assert_ne!(qc.decide(&mut stats, &a, false, false), Decision::Drop);
    }

    #[test]
    fn test_rate_change_resets_frame_average() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.frame_avg_ns = ms(33);
        stats.duration_ns = ms(33);

        // 34ms is within 1/32 of 33ms.
        let a = qc.assess(&stats, times(1000, 1034), ms(900));
        qc.decide(&mut stats, &a, false, false);
        assert_eq!(stats.duration_ns, ms(33));

        let a = qc.assess(&stats, times(1100, 1140), ms(1000));
        qc.decide(&mut stats, &a, false, false);
        assert_eq!(stats.duration_ns, ms(40));
    }

    #[test]
    fn test_late_feedback_lowers_proportion() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.frame_avg_ns = ms(33);
        stats.render_avg_ns = ms(10);

        let a = qc.assess(&stats, times(1008, 1041), ms(1100));
        assert_eq!(a.quality.proportion, 900);
        assert_eq!(a.quality.late_ns, ms(100) + ms(5));
        assert_eq!(a.quality.kind, QualityKind::Famine);

        let a = qc.assess(&stats, times(1008, 1041), ms(3000));
        assert_eq!(a.quality.proportion, 500, "floored");

        stats.render_avg_ns = ms(20);
        let a = qc.assess(&stats, times(1008, 1041), ms(1000));
        assert_eq!(a.quality.kind, QualityKind::Flood);
    }

    #[test]
    fn test_early_feedback_requests_speedup() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.frame_avg_ns = ms(33);
        stats.wait_avg_ns = ms(20);

        let a = qc.assess(&stats, times(1008, 1041), ms(980));
        // 33 / (33 + 2 - 20) = 2 in integer arithmetic.
        assert_eq!(a.quality.proportion, 2000);

        stats.wait_avg_ns = ms(5);
        let a = qc.assess(&stats, times(1008, 1041), ms(980));
        // 33 / 30 = 1.
        assert_eq!(a.quality.proportion, 1000);

        stats.wait_avg_ns = ms(40);
        let a = qc.assess(&stats, times(1008, 1041), ms(980));
        assert_eq!(a.quality.proportion, 2000);
    }

    #[test]
    fn test_earliness_slides_toward_zero() {
        let qc = controller();
        let mut stats = Statistics::new();
        stats.frame_avg_ns = ms(33);
        stats.duration_ns = ms(33);
        stats.earliness_ns = -ms(16);
        stats.n_normal = 5;

        // Earlier than the current earliness: decays by an eighth.
        let a = qc.assess(&stats, times(1008, 1041), ms(980));
        qc.decide(&mut stats, &a, false, false);
        assert_eq!(stats.earliness_ns(), -ms(14));

        // Late: earliness cleared.
        let a = qc.assess(&stats, times(1041, 1074), ms(1040));
        qc.decide(&mut stats, &a, false, false);
        assert_eq!(stats.earliness_ns(), 0);
    }

    #[test]
    fn test_throttle_hyperbola() {
        assert_eq!(throttle_delay_ns(1000), 0);
        assert_eq!(throttle_delay_ns(1500), 0);
        let half = throttle_delay_ns(500);
        assert!(half > ms(25) && half < ms(26), "got {}", half);
        assert!(throttle_delay_ns(100) > half);
        assert!(throttle_delay_ns(-50) > 0);
    }
}
