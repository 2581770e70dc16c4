// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Recording fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use presentlib::core::time::ms;
use presentlib::{
    ClockSource, EventSink, ManualClock, PresentOutcome, Quality, QualitySink, Renderer,
    RendererConfig, RendererEvent, Sample, SampleAllocator, VideoRenderer, WaitOutcome,
};

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RendererEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<RendererEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: RendererEvent) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }
}

impl EventSink for RecordingEvents {
    fn on_event(&self, event: RendererEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Default)]
pub struct RecordingQuality {
    pub handles: bool,
    messages: Mutex<Vec<Quality>>,
}

impl RecordingQuality {
    pub fn handling() -> Self {
        Self {
            handles: true,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<Quality> {
        self.messages.lock().clone()
    }
}

impl QualitySink for RecordingQuality {
    fn notify(&self, quality: &Quality) -> bool {
        self.messages.lock().push(*quality);
        self.handles
    }
}

#[derive(Default)]
pub struct CountingAllocator {
    pub commits: AtomicUsize,
    pub decommits: AtomicUsize,
}

impl SampleAllocator for CountingAllocator {
    fn commit(&self) {
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    fn decommit(&self) {
        self.decommits.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reports a fixed render time and remembers what it drew.
pub struct FixedRenderer {
    pub render_time: Duration,
    pub drawn: Vec<u32>,
}

impl FixedRenderer {
    pub fn new(render_ms: u64) -> Self {
        Self {
            render_time: Duration::from_millis(render_ms),
            drawn: Vec::new(),
        }
    }
}

impl Renderer<u32> for FixedRenderer {
    fn draw(&mut self, sample: &Sample<u32>) -> Duration {
        self.drawn.push(*sample.payload());
        self.render_time
    }
}

pub struct Fixture {
    pub video: VideoRenderer<u32>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingEvents>,
}

impl Fixture {
    /// Stopped renderer on a manual clock reading `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        let video = VideoRenderer::new(RendererConfig::default()).unwrap();
        let clock = Arc::new(ManualClock::new(ms(now_ms)));
        let events = Arc::new(RecordingEvents::default());
        video
            .set_clock(Some(clock.clone() as Arc<dyn ClockSource>))
            .unwrap();
        video.set_event_sink(Some(events.clone() as Arc<dyn EventSink>));
        Self {
            video,
            clock,
            events,
        }
    }

    /// Running with stream time equal to clock time.
    pub fn running(now_ms: i64) -> Self {
        let fixture = Self::new(now_ms);
        fixture.video.run(0);
        fixture
    }

    pub fn advance_to_ms(&self, now_ms: i64) {
        self.clock.advance_to(ms(now_ms));
    }

    /// Draw the pending sample if it is due right now.
    pub fn present_if_due(&self, renderer: &mut FixedRenderer) -> bool {
        match self.video.wait_for_due_timeout(Duration::ZERO) {
            Some(WaitOutcome::Due) => matches!(
                self.video.present_due(renderer),
                PresentOutcome::Drawn { .. }
            ),
            _ => false,
        }
    }
}

pub fn sample(payload: u32, start_ms: i64, end_ms: i64) -> Sample<u32> {
    Sample::new(payload, ms(start_ms), ms(end_ms))
}
