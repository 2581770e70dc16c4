// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod eos;
mod presentation_thread;
mod renderer;
mod signals;
mod slot;
mod state;
mod traits;

pub use eos::{EndOfStream, EosState};
pub use presentation_thread::PresentationHandle;
pub use renderer::{Admission, Disposition, PresentOutcome, RejectReason, VideoRenderer};
pub use signals::{WaitOutcome, WakeSignals};
pub use slot::PendingSlot;
pub use state::{SchedulerState, StateReport};
pub use traits::{EventSink, QualitySink, Renderer, RendererEvent, SampleAllocator};
