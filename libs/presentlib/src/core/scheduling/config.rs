// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Renderer configuration via TOML.
//!
//! The quality constants are empirically tuned. Their relationships matter
//! more than their magnitudes, so they are exposed as overridable fields
//! rather than baked into the controller.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{PresentError, Result};
use crate::core::time::ms;

/// Tuning constants for the quality controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Exponential smoothing window for every rolling average.
    pub smoothing_period: i64,
    /// Subtracted from sample times to account for display latency.
    pub display_latency_bias_ms: i64,
    /// A wait average above this keeps drawing through a glitch.
    pub glitch_wait_tolerance_ms: i64,
    /// Samples earlier than this never enter catch-up mode.
    pub early_abort_ms: i64,
    /// Duration change larger than `duration / rate_change_divisor` resets
    /// the frame interval average (32 is about 3%).
    pub rate_change_divisor: i64,
    /// Frame interval average above `duration + duration / slow_machine_divisor`
    /// enters catch-up mode (16 is about 6%).
    pub slow_machine_divisor: i64,
    /// Catch-up mode is not entered for samples more than this many frame
    /// intervals early.
    pub max_early_intervals: i64,
    /// Lateness tolerated, in frame intervals, when the producer handles
    /// quality itself.
    pub supplier_late_intervals: i64,
    /// Draw regardless of lateness when nothing was drawn for this long.
    pub forced_refresh_ms: i64,
    /// Render time counts as negligible when `ratio * render_avg <= frame_avg`.
    pub negligible_render_ratio: i64,
    /// A single render time is capped at this multiple of the average.
    pub render_outlier_factor: i64,
    /// Earliness decays by `1 / earliness_decay_divisor` per sample.
    pub earliness_decay_divisor: i64,
    /// Lateness is clamped to +/- this many milliseconds.
    pub lateness_clamp_ms: i64,
    pub proportion_floor: i64,
    pub proportion_nominal: i64,
    pub proportion_ceiling: i64,
    /// Wait average and earliness needed before asking the producer to
    /// speed up.
    pub speedup_wait_threshold_ms: i64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            smoothing_period: 4,
            display_latency_bias_ms: 8,
            glitch_wait_tolerance_ms: 8,
            early_abort_ms: 900,
            rate_change_divisor: 32,
            slow_machine_divisor: 16,
            max_early_intervals: 10,
            supplier_late_intervals: 4,
            forced_refresh_ms: 1000,
            negligible_render_ratio: 3,
            render_outlier_factor: 2,
            earliness_decay_divisor: 8,
            lateness_clamp_ms: 50_000,
            proportion_floor: 500,
            proportion_nominal: 1000,
            proportion_ceiling: 2000,
            speedup_wait_threshold_ms: 2,
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<()> {
        let divisors = [
            ("smoothing_period", self.smoothing_period),
            ("rate_change_divisor", self.rate_change_divisor),
            ("slow_machine_divisor", self.slow_machine_divisor),
            ("earliness_decay_divisor", self.earliness_decay_divisor),
        ];
        for (name, value) in divisors {
            if value <= 0 {
                return Err(PresentError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if self.proportion_floor <= 0
            || self.proportion_floor > self.proportion_nominal
            || self.proportion_nominal > self.proportion_ceiling
        {
            return Err(PresentError::Configuration(format!(
                "proportions must satisfy 0 < floor <= nominal <= ceiling, got {}/{}/{}",
                self.proportion_floor, self.proportion_nominal, self.proportion_ceiling
            )));
        }

        if self.lateness_clamp_ms <= 0 || self.forced_refresh_ms <= 0 {
            return Err(PresentError::Configuration(
                "lateness_clamp_ms and forced_refresh_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn display_latency_bias_ns(&self) -> i64 {
        ms(self.display_latency_bias_ms)
    }

    pub fn glitch_wait_tolerance_ns(&self) -> i64 {
        ms(self.glitch_wait_tolerance_ms)
    }

    pub fn early_abort_ns(&self) -> i64 {
        ms(self.early_abort_ms)
    }

    pub fn forced_refresh_ns(&self) -> i64 {
        ms(self.forced_refresh_ms)
    }

    pub fn lateness_clamp_ns(&self) -> i64 {
        ms(self.lateness_clamp_ms)
    }

    pub fn speedup_wait_threshold_ns(&self) -> i64 {
        ms(self.speedup_wait_threshold_ms)
    }
}

/// Renderer configuration from `presentlib.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Used in log lines and thread names.
    pub name: String,
    /// End-of-stream due sooner than this is delivered immediately.
    pub eos_delivery_threshold_ms: i64,
    /// A presentation wait longer than this dumps the renderer state.
    pub render_timeout_ms: u64,
    pub quality: QualityConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            name: "video-renderer".to_string(),
            eos_delivery_threshold_ms: 50,
            render_timeout_ms: 10_000,
            quality: QualityConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "presentlib.toml";

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PresentError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.render_timeout_ms == 0 {
            return Err(PresentError::Configuration(
                "render_timeout_ms must be positive".to_string(),
            ));
        }
        if self.eos_delivery_threshold_ms < 0 {
            return Err(PresentError::Configuration(format!(
                "eos_delivery_threshold_ms must not be negative, got {}",
                self.eos_delivery_threshold_ms
            )));
        }
        self.quality.validate()
    }

    /// Load configuration from a directory. Returns error if the file is
    /// missing, cannot be parsed, or fails validation.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            PresentError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| {
            PresentError::Configuration(format!("{}: {}", config_path.display(), e))
        })?;

        tracing::info!("Loaded renderer config from {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a directory, returning defaults if the file is
    /// missing or invalid.
    pub fn load_or_default(config_dir: &Path) -> Self {
        let config_path = config_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                config_dir.display()
            );
            return Self::default();
        }

        match Self::load(config_dir) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }
}
