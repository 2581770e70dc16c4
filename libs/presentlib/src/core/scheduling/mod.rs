// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod config;
mod quality;
mod statistics;

pub use config::{QualityConfig, RendererConfig};
pub use quality::{Assessment, Decision, Quality, QualityController, QualityKind, throttle_delay_ns};
pub use statistics::{PerformanceLedger, Statistics};
