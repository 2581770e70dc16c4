// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dedicated presentation thread.
//!
//! Waits for the pending sample to become due and draws it, until shut down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use super::renderer::{PresentOutcome, VideoRenderer};
use super::signals::{WaitOutcome, WakeSignals};
use super::traits::Renderer;
use crate::core::error::{PresentError, Result};

/// Owns the presentation thread; shuts it down on drop.
pub struct PresentationHandle {
    name: String,
    signals: Arc<WakeSignals>,
    active: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PresentationHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.signals.request_shutdown();
        if thread.join().is_err() {
            tracing::error!("[{}] Presentation thread panicked", self.name);
        }
        self.signals.clear_shutdown();
        self.active.store(false, Ordering::Release);
    }
}

impl Drop for PresentationHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl std::fmt::Debug for PresentationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationHandle")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl<P: Send + 'static> VideoRenderer<P> {
    /// Spawn the presentation thread driving `renderer`.
    ///
    /// Only one presentation thread may run per renderer.
    pub fn spawn_presentation<R>(&self, renderer: R) -> Result<PresentationHandle>
    where
        R: Renderer<P> + 'static,
    {
        let active = Arc::clone(&self.shared.presentation_active);
        if active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PresentError::Presentation(format!(
                "{} already has a presentation thread",
                self.name()
            )));
        }

        let name = self.name().to_string();
        let video = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("{}-present", name))
            .spawn(move || run_presentation_loop(video, renderer));

        match spawned {
            Ok(thread) => Ok(PresentationHandle {
                name,
                signals: Arc::clone(&self.shared.signals),
                active,
                thread: Some(thread),
            }),
            Err(e) => {
                active.store(false, Ordering::Release);
                Err(PresentError::Presentation(format!(
                    "failed to spawn {} presentation thread: {}",
                    name, e
                )))
            }
        }
    }
}

fn run_presentation_loop<P, R>(video: VideoRenderer<P>, mut renderer: R)
where
    P: Send + 'static,
    R: Renderer<P>,
{
    let name = video.name().to_string();
    tracing::info!("[{}] Presentation thread started", name);

    loop {
        if video.shared.signals.is_shutdown() {
            break;
        }

        match video.wait_for_due() {
            WaitOutcome::Due => match video.present_due(&mut renderer) {
                PresentOutcome::Drawn { render_time } => {
                    tracing::trace!("[{}] Drew sample in {:?}", name, render_time);
                }
                PresentOutcome::Skipped => {
                    tracing::trace!("[{}] Due wake with nothing to draw", name);
                }
            },
            WaitOutcome::Abandoned => {
                tracing::trace!("[{}] Wait abandoned", name);
            }
        }
    }

    tracing::info!("[{}] Presentation thread stopped", name);
}
