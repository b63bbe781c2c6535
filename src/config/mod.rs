//! Configuration file support for inkpage.
//!
//! Settings are read from `~/.config/inkpage/config.toml` and cover palm rejection
//! tuning, stroke building, pen defaults, document limits and persistence.
//!
//! If no config file exists, sensible defaults are used automatically.

pub mod enums;
pub mod types;

pub use enums::{ColorSpec, ProximityShape, SessionCompression, SessionStorageMode};
pub use types::{
    ClassifierConfig, DocumentConfig, SessionConfig, StrokeConfig, ToolWidths, ToolsConfig,
};

use crate::draw::{PressureCurve, Tool};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest smoothing window accepted; keeps the smoothing lag within a frame or two.
pub const MAX_SMOOTHING_WINDOW: usize = 8;

/// Main configuration structure containing all user settings.
///
/// # Example TOML
/// ```toml
/// [classifier]
/// sensitivity = 7
/// palm_radius_threshold = 16.0
/// proximity_shape = "box"
///
/// [stroke]
/// smoothing_window_size = 4
/// pressure_curve = { kind = "gamma", exponent = 1.4, min = 0.4, max = 1.6 }
///
/// [tools]
/// default_tool = "ballpoint"
/// default_color = "#1e90ff"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Palm rejection tuning
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Smoothing and pressure mapping
    #[serde(default)]
    pub stroke: StrokeConfig,

    /// Pen defaults
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Undo history and per-page limits
    #[serde(default)]
    pub document: DocumentConfig,

    /// Annotation persistence
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Validates and clamps all configuration values to acceptable ranges.
    ///
    /// Invalid values are clamped to the nearest valid value and a warning is logged.
    ///
    /// Validated ranges:
    /// - `sensitivity`: 1 - 10
    /// - `stylus_radius_threshold` < `palm_radius_threshold`, both 0.5 - 200.0
    /// - `stylus_pressure_threshold`: 0.0 - 1.0
    /// - `ambiguous_decision_samples`: 1 - 32
    /// - `smoothing_window_size`: 1 - 8
    /// - tool widths: 0.1 - 64.0
    pub fn validate_and_clamp(&mut self) {
        let classifier = &mut self.classifier;

        if !(1..=10).contains(&classifier.sensitivity) {
            warn!(
                "Invalid sensitivity {}, clamping to 1-10 range",
                classifier.sensitivity
            );
            classifier.sensitivity = classifier.sensitivity.clamp(1, 10);
        }

        clamp_f64(
            "palm_radius_threshold",
            &mut classifier.palm_radius_threshold,
            0.5,
            200.0,
        );
        clamp_f64(
            "stylus_radius_threshold",
            &mut classifier.stylus_radius_threshold,
            0.5,
            200.0,
        );
        if classifier.stylus_radius_threshold >= classifier.palm_radius_threshold {
            warn!(
                "stylus_radius_threshold {:.1} must be below palm_radius_threshold {:.1}, using half of the palm threshold",
                classifier.stylus_radius_threshold, classifier.palm_radius_threshold
            );
            classifier.stylus_radius_threshold = classifier.palm_radius_threshold / 2.0;
        }

        clamp_f64(
            "stylus_pressure_threshold",
            &mut classifier.stylus_pressure_threshold,
            0.0,
            1.0,
        );
        clamp_f64(
            "proximity_window_radius",
            &mut classifier.proximity_window_radius,
            0.0,
            10_000.0,
        );

        if !(1..=32).contains(&classifier.ambiguous_decision_samples) {
            warn!(
                "Invalid ambiguous_decision_samples {}, clamping to 1-32 range",
                classifier.ambiguous_decision_samples
            );
            classifier.ambiguous_decision_samples = classifier.ambiguous_decision_samples.clamp(1, 32);
        }

        if classifier.contact_timeout_ms == 0 {
            warn!("contact_timeout_ms must be positive, using 2000");
            classifier.contact_timeout_ms = 2_000;
        }

        if !(1..=64).contains(&classifier.history_len) {
            warn!(
                "Invalid history_len {}, clamping to 1-64 range",
                classifier.history_len
            );
            classifier.history_len = classifier.history_len.clamp(1, 64);
        }

        let stroke = &mut self.stroke;
        if !(1..=MAX_SMOOTHING_WINDOW).contains(&stroke.smoothing_window_size) {
            warn!(
                "Invalid smoothing_window_size {}, clamping to 1-{} range",
                stroke.smoothing_window_size, MAX_SMOOTHING_WINDOW
            );
            stroke.smoothing_window_size = stroke.smoothing_window_size.clamp(1, MAX_SMOOTHING_WINDOW);
        }

        if !stroke.pressure_curve.is_monotonic() {
            warn!(
                "pressure_curve {:?} is not monotonic, rebuilding it",
                stroke.pressure_curve
            );
            stroke.pressure_curve = sanitize_curve(&stroke.pressure_curve);
        }

        clamp_f64("min_dot_width", &mut stroke.min_dot_width, 0.1, 64.0);

        if stroke.prediction_ms > 50 {
            warn!(
                "Invalid prediction_ms {}, clamping to 0-50 range",
                stroke.prediction_ms
            );
            stroke.prediction_ms = 50;
        }

        for tool in Tool::ALL {
            let width = self.tools.default_tool_widths.width_mut(tool);
            if !width.is_finite() || !(0.1..=64.0).contains(width) {
                warn!(
                    "Invalid {} width {:.2}, clamping to 0.1-64.0 range",
                    tool, *width
                );
                *width = if width.is_finite() {
                    width.clamp(0.1, 64.0)
                } else {
                    tool.fallback_width()
                };
            }
        }

        if self.document.max_history == 0 {
            warn!("max_history must be at least 1, using 1");
            self.document.max_history = 1;
        }
        if self.document.max_strokes_per_page == 0 {
            warn!("max_strokes_per_page must be at least 1, using 1");
            self.document.max_strokes_per_page = 1;
        }

        if self.session.backup_retention > 1 {
            warn!(
                "backup_retention {} is not supported, keeping a single backup",
                self.session.backup_retention
            );
            self.session.backup_retention = 1;
        }
        if self.session.max_file_size_mb == 0 {
            warn!("max_file_size_mb must be positive, using 1");
            self.session.max_file_size_mb = 1;
        }
    }

    /// Returns the path to the configuration file.
    ///
    /// The config file is located at `~/.config/inkpage/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("inkpage");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from the default location, or returns defaults if not found.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from `config_path`.
    ///
    /// A missing file yields the defaults. All loaded values are validated and
    /// clamped to acceptable ranges.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or contains invalid TOML.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config.validate_and_clamp();

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Saves the current configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    /// Serializes the config to TOML and writes it to `config_path`, creating the
    /// parent directory if needed.
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, config_str)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// Writes the documented example config to the user's config directory.
    ///
    /// # Errors
    /// Returns an error if a config file already exists at the target path or the
    /// file cannot be written.
    pub fn create_default_file() -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        Self::create_default_file_at(&config_path)?;
        Ok(config_path)
    }

    pub fn create_default_file_at(config_path: &Path) -> Result<()> {
        if config_path.exists() {
            return Err(anyhow::anyhow!(
                "Config file already exists at {}",
                config_path.display()
            ));
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let default_config = include_str!("../../config.example.toml");
        fs::write(config_path, default_config)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        info!("Created default config at {}", config_path.display());
        Ok(())
    }

    /// JSON schema describing the configuration file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }
}

fn clamp_f64(name: &str, value: &mut f64, min: f64, max: f64) {
    if value.is_finite() && (min..=max).contains(value) {
        return;
    }
    let clamped = if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    };
    warn!(
        "Invalid {} {:.3}, clamping to {}-{} range",
        name, *value, min, max
    );
    *value = clamped;
}

fn sanitize_curve(curve: &PressureCurve) -> PressureCurve {
    match curve {
        PressureCurve::Linear { min, max } if min.is_finite() && max.is_finite() => {
            PressureCurve::linear(*min, *max)
        }
        PressureCurve::Gamma { exponent, min, max }
            if exponent.is_finite() && min.is_finite() && max.is_finite() =>
        {
            PressureCurve::gamma(*exponent, *min, *max)
        }
        PressureCurve::Table { points } => PressureCurve::table(points.clone()),
        _ => PressureCurve::default(),
    }
}
