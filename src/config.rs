//! Engine configuration
//!
//! Every pixel constant the layout depends on lives here instead of in the
//! algorithms, so an embedding UI can tune them for its own row height and
//! glyph sizes. Configuration is plain data and can be loaded from TOML.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Row geometry and zoom limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Height of one lane row, gap included.
    pub row_height: f32,
    /// Vertical inset so bars don't touch row edges.
    pub bar_inset: f32,
    /// Minimum rendered width of a bar, so one-day bars stay grabbable.
    pub min_bar_width: f32,
    /// Half-size of a milestone marker.
    pub milestone_radius: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_step: f32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            row_height: 32.0,
            bar_inset: 3.0,
            min_bar_width: 6.0,
            milestone_radius: 9.0,
            zoom_min: 0.25,
            zoom_max: 8.0,
            zoom_step: 1.2,
        }
    }
}

/// Connector routing constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Longest same-row gap still drawn as one straight segment.
    pub direct_max_distance: f32,
    /// Distance above the row top used for same-row detours.
    pub margin_offset: f32,
    /// Distance past the row boundary used for cross-row gutters.
    pub gutter_offset: f32,
    /// Horizontal stub leaving and entering a bar before the first bend.
    pub extension: f32,
    pub corner_radius: f32,
    /// Length reserved at the end of the path for the arrowhead.
    pub arrow_length: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            direct_max_distance: 120.0,
            margin_offset: 6.0,
            gutter_offset: 0.0,
            extension: 12.0,
            corner_radius: 4.0,
            arrow_length: 6.0,
        }
    }
}

/// Magnetic snapping during drag and resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub enabled: bool,
    /// Pixel distance within which an edge is pulled onto another task's boundary.
    pub threshold_px: f32,
    /// How many lanes above and below the moving task are searched for targets.
    pub lane_reach: usize,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_px: 8.0,
            lane_reach: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeline: TimelineConfig,
    pub router: RouterConfig,
    pub snap: SnapConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timeline;
        if !(t.row_height.is_finite() && t.row_height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "timeline.row_height must be positive, got {}",
                t.row_height
            )));
        }
        if !(t.zoom_min > 0.0 && t.zoom_min <= t.zoom_max) {
            return Err(ConfigError::Invalid(format!(
                "timeline zoom range [{}, {}] is empty",
                t.zoom_min, t.zoom_max
            )));
        }
        if t.zoom_step <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "timeline.zoom_step must be greater than 1, got {}",
                t.zoom_step
            )));
        }
        if t.bar_inset * 2.0 >= t.row_height {
            return Err(ConfigError::Invalid(
                "timeline.bar_inset leaves no room for the bar".to_string(),
            ));
        }

        let r = &self.router;
        let lengths = [
            ("router.direct_max_distance", r.direct_max_distance),
            ("router.margin_offset", r.margin_offset),
            ("router.gutter_offset", r.gutter_offset),
            ("router.extension", r.extension),
            ("router.corner_radius", r.corner_radius),
            ("router.arrow_length", r.arrow_length),
            ("snap.threshold_px", self.snap.threshold_px),
            ("timeline.min_bar_width", t.min_bar_width),
            ("timeline.milestone_radius", t.milestone_radius),
        ];
        for (name, value) in lengths {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
