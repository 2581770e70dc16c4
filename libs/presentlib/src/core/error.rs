// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresentError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Clock error: {0}")]
    Clock(String),

    #[error("Operation requires the renderer to be stopped: {0}")]
    NotStopped(String),

    #[error("Renderer is not connected: {0}")]
    NotConnected(String),

    #[error("Timer error: {0}")]
    Timer(String),

    #[error("Presentation thread error: {0}")]
    Presentation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PresentError>;
