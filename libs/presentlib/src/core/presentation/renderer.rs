// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock-driven video renderer.
//!
//! The producer thread pushes one sample at a time; the presentation thread
//! waits for it to become due and draws it. Two locks guard the shared
//! state and are always taken in the same order: the interface lock
//! (lifecycle state, connection, flushing) and then the render lock (pending
//! sample, clock subscription, statistics, end-of-stream). The draw itself
//! runs with neither held.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::eos::{EndOfStream, EosState};
use super::signals::{AdviseWake, WaitOutcome, WakeSignals};
use super::slot::PendingSlot;
use super::state::{SchedulerState, StateReport};
use super::traits::{EventSink, QualitySink, Renderer, RendererEvent, SampleAllocator};
use crate::core::clocks::{AdviseSink, AdviseToken, ClockSource};
use crate::core::error::{PresentError, Result};
use crate::core::frames::Sample;
use crate::core::observability::Diagnostics;
use crate::core::scheduling::{
    Decision, Quality, QualityController, RendererConfig, Statistics, throttle_delay_ns,
};
use crate::core::time::{duration_from_nanos, ms, nanos_from_duration, to_millis};

/// Result of [`VideoRenderer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted(Disposition),
    /// Backpressure, not an error: the producer should back off and retry
    /// (or stop, for end-of-stream and inactive renderers).
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// What happened to an accepted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Waiting on a clock advise.
    Scheduled,
    /// Due immediately.
    DrawNow,
    /// Too late to be worth drawing, or the clock refused the advise.
    Dropped,
    /// Kept while paused; scheduled on `run`.
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A sample is already pending.
    Busy,
    /// End-of-stream was already signalled.
    EosAlready,
    /// The abort flag is set (display change or host request).
    Aborted,
    /// Stopped or disconnected.
    NotActive,
    /// Between `begin_flush` and `end_flush`.
    Flushing,
}

/// Result of [`VideoRenderer::present_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Drawn { render_time: Duration },
    /// Nothing to draw: stopped, not streaming, or the slot was cleared.
    Skipped,
}

struct InterfaceState {
    state: SchedulerState,
    /// The last transition has completed.
    ready: bool,
    connected: bool,
    flushing: bool,
    allocator: Option<Arc<dyn SampleAllocator>>,
}

struct RenderState<P> {
    clock: Option<Arc<dyn ClockSource>>,
    /// Reference time of stream time zero, set by `run`.
    start_time_ns: i64,
    streaming: bool,
    slot: PendingSlot<P>,
    /// Last drawn sample, kept for repaint.
    last_presented: Option<Sample<P>>,
    advise: Option<AdviseToken>,
    stats: Statistics,
    eos: EndOfStream,
    abort: bool,
    repaint: bool,
    throttle_ns: i64,
    quality_sink: Option<Arc<dyn QualitySink>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl<P> RenderState<P> {
    fn have_current_sample(&self) -> bool {
        self.slot.is_occupied() || self.last_presented.is_some()
    }
}

pub(crate) struct Shared<P> {
    config: RendererConfig,
    controller: QualityController,
    interface: Mutex<InterfaceState>,
    state_changed: Condvar,
    render: Mutex<RenderState<P>>,
    pub(crate) signals: Arc<WakeSignals>,
    pub(crate) presentation_active: Arc<AtomicBool>,
}

/// Presentation scheduler for one video stream.
///
/// Cheap to clone; clones share the same renderer.
pub struct VideoRenderer<P> {
    pub(crate) shared: Arc<Shared<P>>,
}

impl<P> Clone for VideoRenderer<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Send + 'static> VideoRenderer<P> {
    /// A stopped, connected renderer without a clock.
    ///
    /// Fails with [`PresentError::Configuration`] if `config` does not
    /// validate.
    pub fn new(config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let controller = QualityController::new(config.quality.clone());
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                controller,
                interface: Mutex::new(InterfaceState {
                    state: SchedulerState::Stopped,
                    ready: true,
                    connected: true,
                    flushing: false,
                    allocator: None,
                }),
                state_changed: Condvar::new(),
                render: Mutex::new(RenderState {
                    clock: None,
                    start_time_ns: 0,
                    streaming: false,
                    slot: PendingSlot::Empty,
                    last_presented: None,
                    advise: None,
                    stats: Statistics::new(),
                    eos: EndOfStream::default(),
                    abort: false,
                    repaint: true,
                    throttle_ns: 0,
                    quality_sink: None,
                    event_sink: None,
                }),
                signals: Arc::new(WakeSignals::new()),
                presentation_active: Arc::new(AtomicBool::new(false)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &RendererConfig {
        &self.shared.config
    }

    /// Replace the reference clock. `None` presents every sample as soon as
    /// it arrives.
    pub fn set_clock(&self, clock: Option<Arc<dyn ClockSource>>) -> Result<()> {
        let iface = self.shared.interface.lock();
        if iface.state != SchedulerState::Stopped {
            return Err(PresentError::NotStopped(format!(
                "cannot change the clock while {}",
                iface.state
            )));
        }
        let mut rs = self.shared.render.lock();
        self.shared.cancel_notification(&mut rs);
        self.shared.reset_end_of_stream_timer(&mut rs);
        if let Some(clock) = &clock {
            tracing::debug!("[{}] Using clock '{}'", self.name(), clock.description());
        }
        rs.clock = clock;
        Ok(())
    }

    pub fn set_quality_sink(&self, sink: Option<Arc<dyn QualitySink>>) {
        self.shared.render.lock().quality_sink = sink;
    }

    pub fn set_event_sink(&self, sink: Option<Arc<dyn EventSink>>) {
        self.shared.render.lock().event_sink = sink;
    }

    pub fn set_allocator(&self, allocator: Option<Arc<dyn SampleAllocator>>) {
        self.shared.interface.lock().allocator = allocator;
    }

    /// Stop streaming and release the pending sample. Idempotent.
    pub fn stop(&self) {
        let shared = &self.shared;
        let mut iface = shared.interface.lock();
        let old = iface.state;
        if old == SchedulerState::Stopped {
            return;
        }
        iface.state = SchedulerState::Stopped;
        if !iface.connected {
            return;
        }

        if let Some(allocator) = &iface.allocator {
            allocator.decommit();
        }

        {
            let mut rs = shared.render.lock();
            rs.repaint = true;
            shared.stop_streaming(&mut rs);
            shared.signals.interrupt();
            shared.reset_end_of_stream(&mut rs);
            shared.cancel_notification(&mut rs);
            shared.clear_pending_sample(&mut rs);
            rs.abort = false;
        }

        shared.set_ready(&mut iface, true);
        tracing::debug!("[{}] {} -> Stopped", self.name(), old);
    }

    /// Pause presentation. The returned report is intermediate until a
    /// sample is available to show.
    pub fn pause(&self) -> StateReport {
        let mut iface = self.shared.interface.lock();
        self.shared.pause_locked(&mut iface)
    }

    /// Start presenting against the clock. `start_time_ns` is the reference
    /// time corresponding to stream time zero.
    pub fn run(&self, start_time_ns: i64) {
        let shared = &self.shared;
        let mut iface = shared.interface.lock();
        let old = iface.state;
        if old == SchedulerState::Running {
            return;
        }

        if !iface.connected {
            iface.state = SchedulerState::Running;
            let rs = shared.render.lock();
            shared.emit(&rs, RendererEvent::Complete);
            tracing::debug!("[{}] Running while disconnected, completed", self.name());
            return;
        }

        if old == SchedulerState::Stopped {
            shared.pause_locked(&mut iface);
        }

        iface.state = SchedulerState::Running;
        shared.set_ready(&mut iface, true);

        let mut rs = shared.render.lock();
        rs.start_time_ns = start_time_ns;
        rs.repaint = false;
        shared.signals.interrupt();
        shared.start_streaming(&mut rs);
        tracing::debug!(
            "[{}] {} -> Running (start {}ns)",
            self.name(),
            old,
            start_time_ns
        );
    }

    /// Current state; intermediate while a transition is incomplete.
    pub fn state(&self) -> StateReport {
        self.wait_for_state(Duration::ZERO)
    }

    /// Wait up to `timeout` for the current transition to complete.
    pub fn wait_for_state(&self, timeout: Duration) -> StateReport {
        let deadline = Instant::now() + timeout;
        let mut iface = self.shared.interface.lock();
        while !iface.ready {
            if self
                .shared
                .state_changed
                .wait_until(&mut iface, deadline)
                .timed_out()
            {
                break;
            }
        }
        StateReport {
            state: iface.state,
            intermediate: !iface.ready,
        }
    }

    pub fn connect(&self) {
        let mut iface = self.shared.interface.lock();
        iface.connected = true;
        let mut rs = self.shared.render.lock();
        rs.abort = false;
        if iface.state == SchedulerState::Running {
            self.shared.start_streaming(&mut rs);
            rs.repaint = false;
        } else {
            rs.repaint = true;
        }
        tracing::debug!("[{}] Connected", self.name());
    }

    /// Detach from the producer. Only allowed while stopped.
    pub fn disconnect(&self) -> Result<()> {
        let mut iface = self.shared.interface.lock();
        if !iface.connected {
            return Ok(());
        }
        if iface.state != SchedulerState::Stopped {
            return Err(PresentError::NotStopped(format!(
                "cannot disconnect while {}",
                iface.state
            )));
        }

        let mut rs = self.shared.render.lock();
        rs.repaint = false;
        self.shared.reset_end_of_stream(&mut rs);
        self.shared.clear_pending_sample(&mut rs);
        rs.abort = false;
        iface.connected = false;
        tracing::debug!("[{}] Disconnected", self.name());
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.interface.lock().connected
    }

    /// Offer the next sample. Never blocks on presentation.
    pub fn push(&self, sample: Sample<P>) -> Admission {
        let shared = &self.shared;
        let mut iface = shared.interface.lock();
        if iface.state == SchedulerState::Stopped || !iface.connected {
            return Admission::Rejected(RejectReason::NotActive);
        }
        if iface.flushing {
            return Admission::Rejected(RejectReason::Flushing);
        }

        let mut rs = shared.render.lock();
        let rejected = if rs.slot.is_occupied() {
            Some(RejectReason::Busy)
        } else if rs.eos.is_signalled() {
            Some(RejectReason::EosAlready)
        } else if rs.abort {
            Some(RejectReason::Aborted)
        } else {
            None
        };
        if let Some(reason) = rejected {
            shared.set_ready(&mut iface, true);
            tracing::trace!("[{}] Sample rejected: {:?}", self.name(), reason);
            return Admission::Rejected(reason);
        }

        let disposition = if rs.streaming {
            shared.schedule_sample(&mut rs, &sample)
        } else {
            Disposition::Held
        };

        if disposition == Disposition::Dropped {
            rs.stats.record_drop();
            return Admission::Accepted(Disposition::Dropped);
        }

        if let Some(times) = sample.times() {
            rs.eos.set_signal_time(times.end_or_start_ns());
        }
        if rs.slot.put(sample).is_err() {
            return Admission::Rejected(RejectReason::Busy);
        }
        if !rs.streaming {
            rs.repaint = true;
        }
        drop(rs);

        if iface.state == SchedulerState::Paused {
            shared.set_ready(&mut iface, true);
        }
        Admission::Accepted(disposition)
    }

    /// No more samples this segment. Completion is delivered once the last
    /// sample's end time has passed.
    pub fn signal_end_of_stream(&self) {
        let shared = &self.shared;
        let mut iface = shared.interface.lock();
        if iface.state == SchedulerState::Stopped {
            return;
        }

        let mut rs = shared.render.lock();
        rs.eos.signal();
        tracing::debug!("[{}] End of stream signalled", self.name());

        if !rs.slot.is_occupied() {
            shared.set_ready(&mut iface, true);
        }
        if rs.streaming {
            shared.send_end_of_stream(&mut rs);
        }
    }

    /// Discard the pending sample and refuse pushes until `end_flush`.
    pub fn begin_flush(&self) {
        let shared = &self.shared;
        let mut iface = shared.interface.lock();
        iface.flushing = true;
        if iface.state == SchedulerState::Paused {
            shared.set_ready(&mut iface, false);
        }

        let mut rs = shared.render.lock();
        shared.signals.interrupt();
        shared.cancel_notification(&mut rs);
        shared.clear_pending_sample(&mut rs);
        shared.reset_end_of_stream(&mut rs);
        tracing::debug!("[{}] Flush started", self.name());
    }

    pub fn end_flush(&self) {
        self.shared.interface.lock().flushing = false;
        tracing::debug!("[{}] Flush finished", self.name());
    }

    /// Downstream quality message: throttle presentation when asked to slow
    /// down.
    pub fn notify_quality(&self, quality: &Quality) {
        let throttle_ns = throttle_delay_ns(quality.proportion);
        self.shared.render.lock().throttle_ns = throttle_ns;
        tracing::trace!(
            "[{}] Throttle set to {}ms (proportion {})",
            self.name(),
            to_millis(throttle_ns),
            quality.proportion
        );
    }

    pub fn set_abort(&self, abort: bool) {
        self.shared.render.lock().abort = abort;
    }

    /// The display mode changed under us. Returns `false` when disconnected.
    pub fn on_display_change(&self) -> bool {
        let shared = &self.shared;
        let iface = shared.interface.lock();
        if !iface.connected {
            return false;
        }

        let mut rs = shared.render.lock();
        shared.emit(&rs, RendererEvent::DisplayChanged);
        rs.abort = true;
        shared.signals.interrupt();
        shared.cancel_notification(&mut rs);
        shared.clear_pending_sample(&mut rs);
        tracing::debug!("[{}] Display changed, aborting", self.name());
        true
    }

    /// Ask the host for a fresh sample, at most once until re-armed.
    pub fn send_repaint(&self) -> bool {
        let shared = &self.shared;
        let iface = shared.interface.lock();
        let mut rs = shared.render.lock();
        if rs.abort || !iface.connected || iface.flushing || rs.eos.is_signalled() || !rs.repaint {
            return false;
        }
        shared.emit(&rs, RendererEvent::RepaintRequested);
        rs.repaint = false;
        tracing::trace!("[{}] Sending repaint", self.name());
        true
    }

    /// Lend the pending sample, or the last one drawn, to `f`.
    pub fn with_current_sample<R>(&self, f: impl FnOnce(&Sample<P>) -> R) -> Option<R> {
        let rs = self.shared.render.lock();
        rs.slot.queued().or(rs.last_presented.as_ref()).map(f)
    }

    pub fn has_current_sample(&self) -> bool {
        self.shared.render.lock().have_current_sample()
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.render.lock().streaming
    }

    pub fn eos_state(&self) -> EosState {
        self.shared.render.lock().eos.state()
    }

    /// Block until a sample is due or a state change abandons the wait.
    ///
    /// Logs the renderer state each time `render_timeout_ms` passes without
    /// either.
    pub fn wait_for_due(&self) -> WaitOutcome {
        let timeout = Duration::from_millis(self.shared.config.render_timeout_ms);
        loop {
            match self.shared.signals.wait(timeout) {
                Some(outcome) => return outcome,
                None => self.display_renderer_state(),
            }
        }
    }

    /// [`wait_for_due`](Self::wait_for_due) with a bound; `None` on timeout.
    pub fn wait_for_due_timeout(&self, timeout: Duration) -> Option<WaitOutcome> {
        self.shared.signals.wait(timeout)
    }

    /// Cancel the pending sample's clock advise and any draw-now flag.
    ///
    /// The sample itself stays queued until the next state transition.
    pub fn cancel(&self) {
        let mut rs = self.shared.render.lock();
        self.shared.cancel_notification(&mut rs);
    }

    /// Draw the pending sample if the renderer is streaming.
    ///
    /// The sample stays in the slot (marked presenting) during the draw and
    /// moves to the repaint slot afterwards.
    pub fn present_due(&self, renderer: &mut dyn Renderer<P>) -> PresentOutcome {
        let shared = &self.shared;
        let sample = {
            let iface = shared.interface.lock();
            if iface.state == SchedulerState::Stopped {
                return PresentOutcome::Skipped;
            }
            let mut rs = shared.render.lock();
            if !rs.streaming {
                return PresentOutcome::Skipped;
            }
            let Some(sample) = rs.slot.begin_presentation() else {
                return PresentOutcome::Skipped;
            };
            rs.stats.record_frame_drawn();
            sample
        };

        let render_time = renderer.draw(&sample);

        let throttle_ns = {
            let mut rs = shared.render.lock();
            // A transition during the draw cleared the slot; whatever is
            // there now belongs to the new stream and keeps its wake-up.
            if !rs.slot.end_presentation() {
                tracing::trace!("[{}] Slot cleared during draw", shared.name());
                return PresentOutcome::Drawn { render_time };
            }
            let quality = &shared.config.quality;
            rs.stats.record_render_time(
                nanos_from_duration(render_time),
                quality.smoothing_period,
                quality.render_outlier_factor,
            );
            rs.last_presented = Some(sample);
            shared.cancel_notification(&mut rs);
            shared.send_end_of_stream(&mut rs);
            rs.throttle_ns
        };

        if throttle_ns > 0 {
            std::thread::sleep(duration_from_nanos(throttle_ns));
        }
        PresentOutcome::Drawn { render_time }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let iface = self.shared.interface.lock();
        let rs = self.shared.render.lock();
        Diagnostics::capture(&rs.stats, iface.state, rs.clock.is_some(), Instant::now())
    }

    /// Snapshot of the rolling averages.
    pub fn statistics(&self) -> Statistics {
        let _iface = self.shared.interface.lock();
        self.shared.render.lock().stats.clone()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.diagnostics().frames_drawn
    }

    pub fn frames_dropped(&self) -> u64 {
        self.diagnostics().frames_dropped
    }

    pub fn average_frame_rate(&self) -> i64 {
        self.diagnostics().avg_frame_rate
    }

    pub fn average_sync_offset(&self) -> i64 {
        self.diagnostics().avg_sync_offset_ms
    }

    pub fn dev_sync_offset(&self) -> i64 {
        self.diagnostics().dev_sync_offset_ms
    }

    pub fn jitter_std_dev(&self) -> i64 {
        self.diagnostics().jitter_ms
    }

    fn display_renderer_state(&self) {
        let iface = self.shared.interface.lock();
        let rs = self.shared.render.lock();
        tracing::debug!(
            "[{}] Still waiting after {}ms: state={} ready={} connected={} flushing={} \
             streaming={} slot={:?} advise={:?} render_due={} eos={} abort={} repaint={} \
             drawn={} dropped={}",
            self.name(),
            self.shared.config.render_timeout_ms,
            iface.state,
            iface.ready,
            iface.connected,
            iface.flushing,
            rs.streaming,
            rs.slot,
            rs.advise,
            self.shared.signals.is_render_due(),
            rs.eos.state(),
            rs.abort,
            rs.repaint,
            rs.stats.frames_drawn(),
            rs.stats.frames_dropped()
        );
    }
}

impl<P: Send + 'static> Shared<P> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn set_ready(&self, iface: &mut InterfaceState, ready: bool) {
        iface.ready = ready;
        if ready {
            self.state_changed.notify_all();
        }
    }

    fn pause_locked(self: &Arc<Self>, iface: &mut InterfaceState) -> StateReport {
        let old = iface.state;
        if old == SchedulerState::Paused || !iface.connected {
            iface.state = SchedulerState::Paused;
            let rs = self.render.lock();
            return self.complete_state_change(iface, &rs, SchedulerState::Paused);
        }

        iface.state = SchedulerState::Paused;
        if let Some(allocator) = &iface.allocator {
            allocator.commit();
        }

        let mut rs = self.render.lock();
        rs.repaint = true;
        self.stop_streaming(&mut rs);
        self.signals.interrupt();
        self.cancel_notification(&mut rs);
        self.reset_end_of_stream_timer(&mut rs);

        if old == SchedulerState::Stopped {
            rs.abort = false;
            self.clear_pending_sample(&mut rs);
        }

        let report = self.complete_state_change(iface, &rs, old);
        tracing::debug!("[{}] {} -> {}", self.name(), old, report);
        report
    }

    fn complete_state_change(
        &self,
        iface: &mut InterfaceState,
        rs: &RenderState<P>,
        old: SchedulerState,
    ) -> StateReport {
        let ready = !iface.connected
            || rs.eos.is_signalled()
            || (rs.have_current_sample() && old != SchedulerState::Stopped);
        self.set_ready(iface, ready);
        StateReport {
            state: iface.state,
            intermediate: !ready,
        }
    }

    fn start_streaming(self: &Arc<Self>, rs: &mut RenderState<P>) {
        if rs.streaming {
            return;
        }
        rs.streaming = true;
        rs.stats.reset(Instant::now());
        tracing::debug!("[{}] Streaming started", self.name());

        if rs.slot.queued().is_some() {
            if let Some(sample) = rs.slot.clear() {
                // A held sample is shown even if it would otherwise be dropped.
                if self.schedule_sample(rs, &sample) == Disposition::Dropped {
                    self.signals.set_render_due();
                }
                if rs.slot.put(sample).is_err() {
                    tracing::warn!("[{}] Pending slot refilled during restart", self.name());
                }
            }
        } else if !rs.slot.is_occupied() {
            self.send_end_of_stream(rs);
        }
    }

    fn stop_streaming(&self, rs: &mut RenderState<P>) {
        rs.eos.on_stop_streaming();
        if rs.streaming {
            rs.streaming = false;
            rs.stats.stop_streaming(Instant::now());
            tracing::debug!("[{}] Streaming stopped", self.name());
        }
    }

    /// Decide how to present `sample` and arm the clock if it must wait.
    fn schedule_sample(&self, rs: &mut RenderState<P>, sample: &Sample<P>) -> Disposition {
        let Some(times) = sample.times() else {
            return self.draw_immediately(rs);
        };
        if times.is_malformed() {
            tracing::warn!(
                "[{}] Malformed sample (end {:?}ns before start {}ns), drawing immediately",
                self.name(),
                times.end_ns,
                times.start_ns
            );
            return self.draw_immediately(rs);
        }
        let Some(clock) = rs.clock.clone() else {
            return self.draw_immediately(rs);
        };

        let now_ns = clock.now_ns() - rs.start_time_ns;
        let assessment = self.controller.assess(&rs.stats, times, now_ns);
        let supplier_handling = rs
            .quality_sink
            .as_ref()
            .is_some_and(|sink| sink.notify(&assessment.quality));

        match self.controller.decide(
            &mut rs.stats,
            &assessment,
            sample.is_discontinuity(),
            supplier_handling,
        ) {
            Decision::DrawNow => {
                self.signals.set_render_due();
                Disposition::DrawNow
            }
            Decision::DrawAt(target_ns) => {
                let generation = self.signals.arm_advise();
                let wake = Arc::new(AdviseWake::new(Arc::clone(&self.signals), generation));
                match clock.advise_once(rs.start_time_ns + target_ns, wake) {
                    Ok(token) => {
                        rs.advise = Some(token);
                        Disposition::Scheduled
                    }
                    Err(e) => {
                        tracing::warn!(
                            "[{}] Clock refused advise for sample at {}ns, dropping: {}",
                            self.name(),
                            times.start_ns,
                            e
                        );
                        Disposition::Dropped
                    }
                }
            }
            Decision::Drop => Disposition::Dropped,
        }
    }

    fn draw_immediately(&self, rs: &mut RenderState<P>) -> Disposition {
        rs.stats.prepare_performance_data(0, 0);
        self.signals.set_render_due();
        Disposition::DrawNow
    }

    /// Cancel the outstanding advise and any stale draw-now flag.
    fn cancel_notification(&self, rs: &mut RenderState<P>) {
        if let Some(token) = rs.advise.take() {
            if let Some(clock) = &rs.clock {
                clock.cancel(token);
            }
        }
        self.signals.reset();
    }

    /// Release the pending and repaint samples. An undrawn sample counts as
    /// dropped.
    fn clear_pending_sample(&self, rs: &mut RenderState<P>) {
        if rs.slot.clear().is_some() {
            rs.stats.record_drop();
            tracing::trace!("[{}] Pending sample discarded", self.name());
        }
        rs.last_presented = None;
    }

    /// Deliver end-of-stream now if it is due, otherwise arm the clock for
    /// the last sample's end time.
    fn send_end_of_stream(self: &Arc<Self>, rs: &mut RenderState<P>) {
        if !rs.eos.needs_delivery() {
            return;
        }
        let Some(clock) = rs.clock.clone() else {
            if !rs.slot.is_occupied() {
                self.notify_end_of_stream(rs);
            }
            return;
        };

        let signal_ns = rs.start_time_ns + rs.eos.signal_time_ns();
        let delay_ns = signal_ns - clock.now_ns();
        if delay_ns < ms(self.config.eos_delivery_threshold_ms) {
            // With a sample still pending, delivery follows its draw.
            if !rs.slot.is_occupied() {
                self.notify_end_of_stream(rs);
            }
            return;
        }

        let generation = rs.eos.next_generation();
        let wake = Arc::new(EosWake {
            shared: Arc::downgrade(self),
            generation,
        });
        match clock.advise_once(signal_ns, wake) {
            Ok(token) => {
                rs.eos.arm(signal_ns, generation, token);
                tracing::debug!(
                    "[{}] End of stream armed, delivery in {}ms",
                    self.name(),
                    to_millis(delay_ns)
                );
            }
            Err(e) => {
                tracing::warn!(
                    "[{}] Clock refused end-of-stream advise, delivering now: {}",
                    self.name(),
                    e
                );
                if !rs.slot.is_occupied() {
                    self.notify_end_of_stream(rs);
                }
            }
        }
    }

    fn notify_end_of_stream(&self, rs: &mut RenderState<P>) {
        if !rs.streaming {
            return;
        }
        rs.eos.mark_delivered();
        tracing::debug!("[{}] End of stream delivered", self.name());
        self.emit(rs, RendererEvent::Complete);
    }

    fn reset_end_of_stream(&self, rs: &mut RenderState<P>) {
        if let Some(token) = rs.eos.reset() {
            if let Some(clock) = &rs.clock {
                clock.cancel(token);
            }
        }
    }

    fn reset_end_of_stream_timer(&self, rs: &mut RenderState<P>) {
        if let Some(token) = rs.eos.disarm() {
            if let Some(clock) = &rs.clock {
                clock.cancel(token);
            }
        }
    }

    fn emit(&self, rs: &RenderState<P>, event: RendererEvent) {
        if let Some(sink) = &rs.event_sink {
            sink.on_event(event);
        }
    }
}

/// Clock advise delivering a deferred end-of-stream.
struct EosWake<P> {
    shared: Weak<Shared<P>>,
    generation: u64,
}

impl<P: Send + 'static> AdviseSink for EosWake<P> {
    fn on_advise(&self, _token: AdviseToken) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut rs = shared.render.lock();
        if rs.eos.fire(self.generation) {
            shared.send_end_of_stream(&mut rs);
        }
    }
}
