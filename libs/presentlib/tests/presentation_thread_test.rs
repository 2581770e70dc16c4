// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Presentation thread against the real-time software clock.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::RecordingEvents;
use presentlib::core::time::ms;
use presentlib::{
    Admission, ClockSource, Disposition, EventSink, RejectReason, Renderer, RendererConfig,
    RendererEvent, Sample, SchedulerState, SoftwareClock, VideoRenderer,
};

struct ChannelRenderer {
    drawn: crossbeam_channel::Sender<(u32, Instant)>,
}

impl Renderer<u32> for ChannelRenderer {
    fn draw(&mut self, sample: &Sample<u32>) -> Duration {
        let _ = self.drawn.send((*sample.payload(), Instant::now()));
        Duration::from_millis(1)
    }
}

/// Push until accepted, backing off while the previous sample is pending.
fn push_with_backoff(video: &VideoRenderer<u32>, make: impl Fn() -> Sample<u32>) -> Admission {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match video.push(make()) {
            Admission::Rejected(RejectReason::Busy) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(2));
            }
            admission => return admission,
        }
    }
}

#[test]
fn test_frames_presented_in_order_on_time() {
    presentlib::init_tracing();

    let video: VideoRenderer<u32> = VideoRenderer::new(RendererConfig::default()).unwrap();
    let clock = Arc::new(SoftwareClock::new().unwrap());
    let events = Arc::new(RecordingEvents::default());
    video
        .set_clock(Some(clock.clone() as Arc<dyn ClockSource>))
        .unwrap();
    video.set_event_sink(Some(events.clone() as Arc<dyn EventSink>));

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = video
        .spawn_presentation(ChannelRenderer { drawn: tx })
        .unwrap();

    let started = Instant::now();
    video.run(clock.now_ns());

    let mut dropped = 0;
    for i in 0..5u32 {
        let start = ms(50 + 20 * i as i64);
        match push_with_backoff(&video, || Sample::new(i, start, start + ms(20))) {
            Admission::Accepted(Disposition::Dropped) => dropped += 1,
            Admission::Accepted(_) => {}
            other => panic!("unexpected admission {:?}", other),
        }
    }
    video.signal_end_of_stream();

    let mut drawn = Vec::new();
    while drawn.len() + dropped < 5 {
        let (payload, at) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        drawn.push(payload);
        if payload == 0 {
            // Start (50ms) less the 8ms display latency bias.
            assert!(at.duration_since(started) >= Duration::from_millis(40));
        }
    }
    let mut sorted = drawn.clone();
    sorted.sort_unstable();
    assert_eq!(drawn, sorted, "presented out of order");

    let deadline = Instant::now() + Duration::from_secs(5);
    while events.count(RendererEvent::Complete) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(events.count(RendererEvent::Complete), 1);

    video.stop();
    handle.shutdown();
    assert_eq!(video.state().state, SchedulerState::Stopped);
    assert_eq!(
        video.frames_drawn() + video.frames_dropped(),
        5,
        "every accepted sample is drawn or dropped"
    );
}

#[test]
fn test_stop_abandons_scheduled_sample() {
    let video: VideoRenderer<u32> = VideoRenderer::new(RendererConfig::default()).unwrap();
    let clock = Arc::new(SoftwareClock::new().unwrap());
    video
        .set_clock(Some(clock.clone() as Arc<dyn ClockSource>))
        .unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = video
        .spawn_presentation(ChannelRenderer { drawn: tx })
        .unwrap();

    video.run(clock.now_ns());
    assert_eq!(
        video.push(Sample::new(1, ms(300), ms(333))),
        Admission::Accepted(Disposition::Scheduled)
    );
    video.stop();
    assert_eq!(clock.pending_advises(), 0);

    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    assert!(handle.is_running());
    handle.shutdown();
}
