// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor configuration.
//!
//! Every tunable the engine reads lives here: camera limits, gesture thresholds,
//! history depth, wire styling, the port color palette and the default export
//! options. The whole tree round-trips through RON so hosts can keep it next to
//! their other settings files.

use crate::export::ExportOptions;
use crate::types::TypePalette;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "circuit_editor.ron";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    /// Values that parse but make no sense together
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Camera limits and grid spacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Smallest allowed zoom
    pub min_scale: f32,
    /// Largest allowed zoom
    pub max_scale: f32,
    /// Exponent per wheel delta unit (`factor = exp(-delta * speed)`)
    pub wheel_zoom_speed: f32,
    /// Major grid spacing in world units
    pub grid_major: f32,
    /// Minor grid spacing in world units
    pub grid_minor: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.15,
            max_scale: 6.0,
            wheel_zoom_speed: 0.0015,
            grid_major: 100.0,
            grid_minor: 25.0,
        }
    }
}

/// Mouse button used for canvas panning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanButton {
    /// Middle mouse button
    Middle,
    /// Secondary (right) mouse button
    Secondary,
}

impl PanButton {
    /// The egui button this setting maps to
    pub fn button(self) -> egui::PointerButton {
        match self {
            Self::Middle => egui::PointerButton::Middle,
            Self::Secondary => egui::PointerButton::Secondary,
        }
    }
}

/// Pointer gesture thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Movement (per axis, screen px) before a press becomes a drag
    pub drag_threshold: f32,
    /// How long a touch must be held to open the context menu
    pub long_press_delay_ms: u64,
    /// Movement (distance, screen px) that cancels a pending long-press
    pub long_press_tolerance: f32,
    /// Extra hit area around port rectangles (screen px)
    pub port_hit_slop: f32,
    /// Mouse button that pans the canvas
    pub pan_button: PanButton,
}

impl GestureConfig {
    /// Long-press delay as a duration
    pub fn long_press_delay(&self) -> Duration {
        Duration::from_millis(self.long_press_delay_ms)
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 3.0,
            long_press_delay_ms: 550,
            long_press_tolerance: 10.0,
            port_hit_slop: 4.0,
            pan_button: PanButton::Middle,
        }
    }
}

/// Wire styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Minimum horizontal control point offset (screen px)
    pub min_control_offset: f32,
    /// Stroke width per unit of camera scale
    pub stroke_per_scale: f32,
    /// Thinnest stroke
    pub min_stroke: f32,
    /// Thickest stroke
    pub max_stroke: f32,
    /// Wire color when neither port has one
    pub default_color: [u8; 3],
    /// Temporary wire color when the source port has none
    pub temp_color: [u8; 3],
    /// Opacity of the halo drawn under each wire
    pub shadow_alpha: f32,
}

impl WireConfig {
    /// Stroke width for a camera scale
    pub fn stroke_width(&self, scale: f32) -> f32 {
        (self.stroke_per_scale * scale).clamp(self.min_stroke, self.max_stroke)
    }
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            min_control_offset: 60.0,
            stroke_per_scale: 5.0,
            min_stroke: 1.0,
            max_stroke: 10.0,
            default_color: [0xb7, 0xc7, 0xff],
            temp_color: [0x7a, 0xa2, 0xff],
            shadow_alpha: 0.35,
        }
    }
}

/// Full editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Camera settings
    pub camera: CameraConfig,
    /// Gesture settings
    pub gestures: GestureConfig,
    /// Maximum number of undo steps
    pub history_depth: usize,
    /// Wire settings
    pub wires: WireConfig,
    /// World-space step between successive pastes or duplicates
    pub paste_offset: f32,
    /// Port colors by canonical type
    pub palette: TypePalette,
    /// Default image export options
    pub export: ExportOptions,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            gestures: GestureConfig::default(),
            history_depth: 50,
            wires: WireConfig::default(),
            paste_offset: 20.0,
            palette: TypePalette::default(),
            export: ExportOptions::default(),
        }
    }
}

impl GraphConfig {
    /// Parse from a RON string and validate
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Load from a file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if camera.min_scale.is_nan() || camera.min_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_scale must be positive, got {}",
                camera.min_scale
            )));
        }
        if camera.min_scale > camera.max_scale {
            return Err(ConfigError::Invalid(format!(
                "min_scale {} exceeds max_scale {}",
                camera.min_scale, camera.max_scale
            )));
        }
        if camera.grid_major <= 0.0 || camera.grid_minor <= 0.0 {
            return Err(ConfigError::Invalid("grid spacing must be positive".into()));
        }
        if self.history_depth == 0 {
            return Err(ConfigError::Invalid("history_depth must be at least 1".into()));
        }
        if self.wires.min_stroke > self.wires.max_stroke {
            return Err(ConfigError::Invalid("min_stroke exceeds max_stroke".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.history_depth, 50);
        assert_eq!(config.gestures.long_press_delay(), Duration::from_millis(550));
        assert!((config.camera.min_scale - 0.15).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ron_partial_file_uses_defaults() {
        let config = GraphConfig::from_ron("(history_depth: 10)").unwrap();
        assert_eq!(config.history_depth, 10);
        assert!((config.paste_offset - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_serialization() {
        let mut config = GraphConfig::default();
        config.camera.max_scale = 3.0;
        let ron_str = config.to_ron().unwrap();
        let loaded = GraphConfig::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_inverted_scale() {
        let mut config = GraphConfig::default();
        config.camera.min_scale = 8.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.camera.min_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stroke_width_clamped() {
        let wires = WireConfig::default();
        assert!((wires.stroke_width(0.1) - 1.0).abs() < f32::EPSILON);
        assert!((wires.stroke_width(1.0) - 5.0).abs() < f32::EPSILON);
        assert!((wires.stroke_width(6.0) - 10.0).abs() < f32::EPSILON);
    }
}
