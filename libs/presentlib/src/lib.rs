// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock-driven presentation scheduling for a single video stream.
//!
//! A producer pushes timestamped samples into a [`VideoRenderer`]; a
//! presentation thread draws each one when the reference clock reaches its
//! start time, dropping late samples under the control of an adaptive
//! quality controller.

pub mod core;

pub use crate::core::{
    Admission, AdviseSink, AdviseToken, ClockSource, Decision, Diagnostics, Disposition,
    EosState, EventSink, ManualClock, PresentError, PresentOutcome, PresentationHandle, Quality,
    QualityConfig, QualityKind, QualitySink, RejectReason, Renderer, RendererConfig,
    RendererEvent, Result, Sample, SampleAllocator, SampleTimes, SchedulerState, SoftwareClock,
    StateReport, Statistics, VideoRenderer, WaitOutcome, init_tracing,
};
