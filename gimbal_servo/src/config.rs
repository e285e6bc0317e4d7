// THEORY:
// Configuration for the servo engine.
//
// A `ServoConfig` is the raw, serde-friendly form: what a TOML file or CLI
// flags provide. `ServoConfig::validate` checks it exactly once and produces a
// `ValidatedConfig`, which is the only form the control core accepts.

use crate::core_modules::color_range::ColorRange;
use crate::core_modules::pid::{AntiWindup, AxisPid, PidGains};
use crate::error::ConfigError;
use crate::transport::ControlMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_HSV_LOWER: &str = "35,219,90";
pub const DEFAULT_HSV_UPPER: &str = "119,255,255";
pub const DEFAULT_MIN_RADIUS: f64 = 10.0;
pub const DEFAULT_CLEANUP_PASSES: u32 = 2;

/// Gains and output bounds for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub min: f64,
    pub max: f64,
    pub anti_windup: AntiWindup,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.7,
            ki: 0.0,
            kd: 0.0,
            min: -1.0,
            max: 1.0,
            anti_windup: AntiWindup::None,
        }
    }
}

impl PidConfig {
    fn validate(&self, axis: &'static str) -> Result<Self, ConfigError> {
        let gains_error = |reason: String| ConfigError::Gains { axis, reason };

        for (name, gain) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !gain.is_finite() {
                return Err(gains_error(format!("{name} must be finite, got {gain}")));
            }
        }
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(gains_error("output bounds must be finite".into()));
        }
        if self.min > self.max {
            return Err(gains_error(format!("min {} exceeds max {}", self.min, self.max)));
        }
        Ok(*self)
    }

    /// Builds a fresh controller with zeroed state.
    pub fn build(&self) -> AxisPid {
        AxisPid::new(
            PidGains {
                kp: self.kp,
                ki: self.ki,
                kd: self.kd,
            },
            self.min,
            self.max,
            self.anti_windup,
        )
    }
}

/// Raw configuration, as loaded from TOML or assembled from flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// Expected frame width in pixels.
    pub width: u32,
    /// Expected frame height in pixels.
    pub height: u32,
    /// Lower `h,s,v` bound.
    pub hsv_lower: String,
    /// Upper `h,s,v` bound.
    pub hsv_upper: String,
    /// Erode/dilate passes applied to the mask. 0 disables cleanup.
    pub cleanup_passes: u32,
    /// Detections smaller than this radius (pixels) count as not found.
    pub min_radius: f64,
    /// Errors with both components within this band skip actuation.
    pub deadband: f64,
    pub control_mode: ControlMode,
    pub yaw: PidConfig,
    pub pitch: PidConfig,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            hsv_lower: DEFAULT_HSV_LOWER.to_string(),
            hsv_upper: DEFAULT_HSV_UPPER.to_string(),
            cleanup_passes: DEFAULT_CLEANUP_PASSES,
            min_radius: DEFAULT_MIN_RADIUS,
            deadband: 0.0,
            control_mode: ControlMode::Sdk,
            yaw: PidConfig::default(),
            pitch: PidConfig::default(),
        }
    }
}

impl ServoConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks everything once. Any error here is fatal for startup.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Field {
                field: "resolution",
                reason: format!("{}x{} has no pixels", self.width, self.height),
            });
        }
        if !self.min_radius.is_finite() || self.min_radius < 0.0 {
            return Err(ConfigError::Field {
                field: "min_radius",
                reason: format!("must be a non-negative number, got {}", self.min_radius),
            });
        }
        if !self.deadband.is_finite() || !(0.0..=0.5).contains(&self.deadband) {
            return Err(ConfigError::Field {
                field: "deadband",
                reason: format!("must lie in [0, 0.5], got {}", self.deadband),
            });
        }

        Ok(ValidatedConfig {
            resolution: (self.width, self.height),
            color_range: ColorRange::parse(&self.hsv_lower, &self.hsv_upper)?,
            cleanup_passes: self.cleanup_passes,
            min_radius: self.min_radius,
            deadband: self.deadband,
            control_mode: self.control_mode,
            yaw: self.yaw.validate("yaw")?,
            pitch: self.pitch.validate("pitch")?,
        })
    }
}

/// Configuration that has passed validation. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub resolution: (u32, u32),
    pub color_range: ColorRange,
    pub cleanup_passes: u32,
    pub min_radius: f64,
    pub deadband: f64,
    pub control_mode: ControlMode,
    pub yaw: PidConfig,
    pub pitch: PidConfig,
}
