// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Presentation waits and draws racing state transitions.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{Fixture, FixedRenderer, sample};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use presentlib::core::time::ms;
use presentlib::{
    Admission, Disposition, PresentOutcome, Renderer, RendererConfig, Sample, VideoRenderer,
    WaitOutcome,
};

/// Announces each draw, then blocks until released.
struct GatedRenderer {
    started: Sender<u32>,
    release: Receiver<()>,
}

impl Renderer<u32> for GatedRenderer {
    fn draw(&mut self, sample: &Sample<u32>) -> Duration {
        let _ = self.started.send(*sample.payload());
        let _ = self.release.recv_timeout(Duration::from_secs(5));
        Duration::from_millis(2)
    }
}

/// Start drawing sample 1 on another thread and return once the draw is
/// in progress.
fn draw_in_background(fx: &Fixture) -> (thread::JoinHandle<PresentOutcome>, Sender<()>) {
    assert_eq!(
        fx.video.push(sample(1, 1000, 1033)),
        Admission::Accepted(Disposition::DrawNow)
    );
    assert_eq!(
        fx.video.wait_for_due_timeout(Duration::ZERO),
        Some(WaitOutcome::Due)
    );

    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let drawer = {
        let video = fx.video.clone();
        thread::spawn(move || {
            let mut renderer = GatedRenderer {
                started: started_tx,
                release: release_rx,
            };
            video.present_due(&mut renderer)
        })
    };
    assert_eq!(started_rx.recv_timeout(Duration::from_secs(2)).unwrap(), 1);
    (drawer, release_tx)
}

#[test]
fn test_restart_during_draw_keeps_new_sample_scheduled() {
    let fx = Fixture::running(1000);
    let (drawer, release) = draw_in_background(&fx);

    fx.video.stop();
    fx.video.run(0);
    assert_eq!(
        fx.video.push(sample(2, 1500, 1533)),
        Admission::Accepted(Disposition::Scheduled)
    );
    assert_eq!(fx.clock.pending_advises(), 1);

    release.send(()).unwrap();
    assert!(matches!(drawer.join().unwrap(), PresentOutcome::Drawn { .. }));

    // The finished draw belongs to the previous run.
    assert_eq!(fx.clock.pending_advises(), 1);
    assert!(fx.video.has_current_sample());

    fx.advance_to_ms(1600);
    let mut renderer = FixedRenderer::new(2);
    assert!(fx.present_if_due(&mut renderer));
    assert_eq!(renderer.drawn, vec![2]);
    assert!(fx.video.push(sample(3, 1533, 1566)).is_accepted());
}

#[test]
fn test_flush_during_draw_leaves_later_samples_schedulable() {
    let fx = Fixture::running(1000);
    let (drawer, release) = draw_in_background(&fx);

    fx.video.begin_flush();
    fx.video.end_flush();
    assert_eq!(
        fx.video.push(sample(2, 1200, 1233)),
        Admission::Accepted(Disposition::Scheduled)
    );

    release.send(()).unwrap();
    drawer.join().unwrap();
    assert_eq!(fx.video.with_current_sample(|s| *s.payload()), Some(2));

    fx.advance_to_ms(1200);
    let mut renderer = FixedRenderer::new(2);
    assert!(fx.present_if_due(&mut renderer));
    assert_eq!(renderer.drawn, vec![2]);
}

#[test]
fn test_pause_abandons_blocked_wait() {
    let fx = Fixture::running(0);
    assert_eq!(
        fx.video.push(sample(1, 500, 533)),
        Admission::Accepted(Disposition::Scheduled)
    );

    let waiter = {
        let video = fx.video.clone();
        thread::spawn(move || video.wait_for_due_timeout(Duration::from_secs(5)))
    };
    thread::sleep(Duration::from_millis(100));
    fx.video.pause();

    assert_eq!(waiter.join().unwrap(), Some(WaitOutcome::Abandoned));
    assert!(fx.video.has_current_sample());
}

#[test]
fn test_run_abandons_blocked_wait() {
    let fx = Fixture::new(0);
    fx.video.pause();
    assert_eq!(
        fx.video.push(sample(1, 500, 533)),
        Admission::Accepted(Disposition::Held)
    );

    let waiter = {
        let video = fx.video.clone();
        thread::spawn(move || video.wait_for_due_timeout(Duration::from_secs(5)))
    };
    thread::sleep(Duration::from_millis(100));
    fx.video.run(0);

    assert_eq!(waiter.join().unwrap(), Some(WaitOutcome::Abandoned));
    assert_eq!(fx.clock.next_advise_ns(), Some(ms(492)));
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_long_wait_dumps_state_and_keeps_waiting() {
    let config = RendererConfig {
        render_timeout_ms: 5,
        ..RendererConfig::default()
    };
    let video: VideoRenderer<u32> = VideoRenderer::new(config).unwrap();
    video.run(0);

    let log = CapturedLog::default();
    let waiter = {
        let video = video.clone();
        let log = log.clone();
        thread::spawn(move || {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::DEBUG)
                .with_writer(move || log.clone())
                .finish();
            tracing::subscriber::with_default(subscriber, || video.wait_for_due())
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());
    assert!(video.push(Sample::untimed(1)).is_accepted());

    assert_eq!(waiter.join().unwrap(), WaitOutcome::Due);
    let text = log.text();
    assert!(text.contains("Still waiting after 5ms"), "log: {}", text);
    assert!(text.contains("state=Running"), "log: {}", text);
}
