// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod clocks;
pub mod error;
pub mod frames;
pub mod logging;
pub mod observability;
pub mod presentation;
pub mod scheduling;
pub mod time;
pub mod timer;

pub use clocks::*;
pub use error::*;
pub use frames::*;
pub use logging::init_tracing;
pub use observability::*;
pub use presentation::*;
pub use scheduling::*;
pub use timer::{DeadlineTimer, TimerId};
