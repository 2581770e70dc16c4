// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Lifecycle state of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchedulerState {
    /// No streaming; pending sample and end-of-stream cleared
    #[default]
    Stopped,
    /// Accepting samples, nothing presented on the clock
    Paused,
    /// Presenting samples against the clock
    Running,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Paused => write!(f, "Paused"),
            Self::Running => write!(f, "Running"),
        }
    }
}

/// Answer to a state query.
///
/// `intermediate` is set while a transition has not completed, which in
/// practice means Paused without a sample to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateReport {
    pub state: SchedulerState,
    pub intermediate: bool,
}

impl StateReport {
    pub fn is_ready(&self) -> bool {
        !self.intermediate
    }
}

impl std::fmt::Display for StateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.intermediate {
            write!(f, "{} (intermediate)", self.state)
        } else {
            write!(f, "{}", self.state)
        }
    }
}
