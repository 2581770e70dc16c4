// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Collaborators the renderer borrows but never owns.

use std::time::Duration;

use serde::Serialize;

use crate::core::frames::Sample;
use crate::core::scheduling::Quality;

/// Performs the actual draw.
///
/// Called only from the presentation thread, never concurrently, and never
/// with a renderer lock held, so it may call back into the renderer (for
/// example to request a repaint).
pub trait Renderer<P>: Send {
    /// Draw `sample` and return how long it took.
    fn draw(&mut self, sample: &Sample<P>) -> Duration;
}

/// Upstream receiver of timeliness feedback.
pub trait QualitySink: Send + Sync {
    /// Returns `true` if the producer throttles itself in response.
    ///
    /// Called with the render lock held; must not call back into the
    /// renderer.
    fn notify(&self, quality: &Quality) -> bool;
}

/// Notifications raised by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RendererEvent {
    /// End of stream reached the display (or Run while disconnected).
    Complete,
    /// The host should push a fresh sample for a repaint.
    RepaintRequested,
    /// Display mode changed; the producer should renegotiate.
    DisplayChanged,
}

/// Downstream receiver of renderer events.
///
/// Called with the render lock held; must not call back into the renderer.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: RendererEvent);
}

/// Buffer pool committed while the renderer can accept samples.
pub trait SampleAllocator: Send + Sync {
    fn commit(&self);
    fn decommit(&self);
}
