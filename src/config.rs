//! Viewer configuration.
//!
//! Settings are stored as JSON. Every field has a default, so a partial
//! file only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::brush::BrushSettings;
use crate::enums::{ScalePolicy, SortBy};
use crate::slice_stack::DEFAULT_SLICE_TOLERANCE;
use crate::view::ZoomLimits;
use crate::windowing::WindowLevel;

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Config version {file_version} is newer than supported version {supported_version}")]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },
}

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Factor applied per zoom in/out step.
    pub zoom_step: f64,
    pub scale_policy: ScalePolicy,
}

impl Default for ViewSettings {
    fn default() -> Self {
        let limits = ZoomLimits::default();
        Self {
            zoom_min: limits.min,
            zoom_max: limits.max,
            zoom_step: 1.2,
            scale_policy: ScalePolicy::default(),
        }
    }
}

impl ViewSettings {
    pub fn limits(&self) -> ZoomLimits {
        ZoomLimits {
            min: self.zoom_min,
            max: self.zoom_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchSettings {
    /// Decodes in flight at once, clamped to `1..=16`.
    pub concurrency: usize,
    /// Slices on each side of the focused slice to prefetch.
    pub radius: usize,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 6,
            radius: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub version: u32,
    pub view: ViewSettings,
    pub window: WindowLevel,
    /// Spatial key tolerance shared by slice ordering and contour matching.
    /// A stack narrows it to half its median slice gap.
    pub slice_tolerance: f64,
    pub sort_by: SortBy,
    pub brush: BrushSettings,
    pub prefetch: PrefetchSettings,
    pub log_level: LogLevel,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            view: ViewSettings::default(),
            window: WindowLevel::default(),
            slice_tolerance: DEFAULT_SLICE_TOLERANCE,
            sort_by: SortBy::default(),
            brush: BrushSettings::default(),
            prefetch: PrefetchSettings::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Invalid(reason.to_string()));
        let view = &self.view;
        if !(view.zoom_min > 0.0) || !(view.zoom_min <= view.zoom_max) {
            return invalid("zoom_min must be positive and not above zoom_max");
        }
        if !(view.zoom_step > 1.0) {
            return invalid("zoom_step must be greater than 1");
        }
        if !(self.slice_tolerance > 0.0) {
            return invalid("slice_tolerance must be positive");
        }
        let brush = &self.brush;
        if !(brush.min_radius > 0.0
            && brush.min_radius <= brush.radius
            && brush.radius <= brush.max_radius)
        {
            return invalid("brush radius must satisfy 0 < min_radius <= radius <= max_radius");
        }
        if !(brush.step_factor > 0.0) {
            return invalid("brush step_factor must be positive");
        }
        if brush.min_segments < 12 {
            return invalid("brush min_segments must be at least 12");
        }
        if !(brush.max_chord > 0.0) {
            return invalid("brush max_chord must be positive");
        }
        Ok(())
    }
}
