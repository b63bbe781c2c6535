//! Configuration type definitions.

use super::enums::{ColorSpec, ProximityShape, SessionCompression, SessionStorageMode};
use crate::draw::{PressureCurve, Tool};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Palm rejection settings.
///
/// Radii are contact radii in screen pixels as reported by the touch hardware.
/// Distances for the proximity window are in screen pixels as well.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierConfig {
    /// Master switch; when false every contact is accepted as ink
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Rejection eagerness 1-10 (5 = use the thresholds as written, 10 = reject most readily)
    #[serde(default = "default_sensitivity")]
    pub sensitivity: u8,

    /// Contacts at or above this radius are palms
    #[serde(default = "default_palm_radius")]
    pub palm_radius_threshold: f64,

    /// Contacts at or below this radius may be a pen tip
    #[serde(default = "default_stylus_radius")]
    pub stylus_radius_threshold: f64,

    /// Pressure that counts as pen evidence when the radius is unavailable (0.0-1.0)
    #[serde(default = "default_stylus_pressure")]
    pub stylus_pressure_threshold: f64,

    /// Radius of the neighbourhood used to correlate pen and hand contacts
    #[serde(default = "default_proximity_radius")]
    pub proximity_window_radius: f64,

    /// How long an ended contact still counts as evidence, in milliseconds
    #[serde(default = "default_proximity_duration")]
    pub proximity_window_duration_ms: u64,

    /// Window geometry (circle or box)
    #[serde(default = "default_proximity_shape")]
    pub proximity_shape: ProximityShape,

    /// Samples buffered before an ambiguous contact is forced to a decision
    #[serde(default = "default_ambiguous_samples")]
    pub ambiguous_decision_samples: u32,

    /// Time an ambiguous contact may stay undecided, in milliseconds
    #[serde(default = "default_ambiguous_timeout")]
    pub ambiguous_timeout_ms: u64,

    /// Contacts silent for this long are expired, in milliseconds
    #[serde(default = "default_contact_timeout")]
    pub contact_timeout_ms: u64,

    /// Length of the per-contact radius/pressure history ring
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sensitivity: default_sensitivity(),
            palm_radius_threshold: default_palm_radius(),
            stylus_radius_threshold: default_stylus_radius(),
            stylus_pressure_threshold: default_stylus_pressure(),
            proximity_window_radius: default_proximity_radius(),
            proximity_window_duration_ms: default_proximity_duration(),
            proximity_shape: default_proximity_shape(),
            ambiguous_decision_samples: default_ambiguous_samples(),
            ambiguous_timeout_ms: default_ambiguous_timeout(),
            contact_timeout_ms: default_contact_timeout(),
            history_len: default_history_len(),
        }
    }
}

/// Stroke building settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StrokeConfig {
    /// Trailing samples averaged for smoothing (1 = off, max 8)
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window_size: usize,

    /// Pressure-to-width multiplier curve for pressure-mapped tools
    #[serde(default)]
    pub pressure_curve: PressureCurve,

    /// When false every tool draws at its base width
    #[serde(default = "default_true")]
    pub pressure_sensitivity: bool,

    /// Minimum base width of a tap (single-sample) dot
    #[serde(default = "default_min_dot_width")]
    pub min_dot_width: f64,

    /// Extrapolate the live stroke tail by this many milliseconds (0 = off)
    #[serde(default)]
    pub prediction_ms: u64,

    /// Snap finished strokes to lines, circles, rectangles and triangles
    #[serde(default)]
    pub shape_recognition: bool,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            smoothing_window_size: default_smoothing_window(),
            pressure_curve: PressureCurve::default(),
            pressure_sensitivity: default_true(),
            min_dot_width: default_min_dot_width(),
            prediction_ms: 0,
            shape_recognition: false,
        }
    }
}

/// Base widths per pen tool, in document units.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolWidths {
    #[serde(default = "default_ballpoint_width")]
    pub ballpoint: f64,
    #[serde(default = "default_fountain_width")]
    pub fountain: f64,
    #[serde(default = "default_highlighter_width")]
    pub highlighter: f64,
    #[serde(default = "default_pencil_width")]
    pub pencil: f64,
    #[serde(default = "default_marker_width")]
    pub marker: f64,
}

impl ToolWidths {
    pub fn width_for(&self, tool: Tool) -> f64 {
        match tool {
            Tool::Ballpoint => self.ballpoint,
            Tool::Fountain => self.fountain,
            Tool::Highlighter => self.highlighter,
            Tool::Pencil => self.pencil,
            Tool::Marker => self.marker,
        }
    }

    pub(crate) fn width_mut(&mut self, tool: Tool) -> &mut f64 {
        match tool {
            Tool::Ballpoint => &mut self.ballpoint,
            Tool::Fountain => &mut self.fountain,
            Tool::Highlighter => &mut self.highlighter,
            Tool::Pencil => &mut self.pencil,
            Tool::Marker => &mut self.marker,
        }
    }
}

impl Default for ToolWidths {
    fn default() -> Self {
        Self {
            ballpoint: default_ballpoint_width(),
            fountain: default_fountain_width(),
            highlighter: default_highlighter_width(),
            pencil: default_pencil_width(),
            marker: default_marker_width(),
        }
    }
}

/// Pen defaults applied when a stroke starts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolsConfig {
    /// Tool selected at startup
    #[serde(default)]
    pub default_tool: Tool,

    /// Ink color - a named color, `#RRGGBB[AA]`, or `[r, g, b]`
    #[serde(default = "default_color")]
    pub default_color: ColorSpec,

    /// Base width per tool (valid range: 0.1 - 64.0)
    #[serde(default)]
    pub default_tool_widths: ToolWidths,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_tool: Tool::default(),
            default_color: default_color(),
            default_tool_widths: ToolWidths::default(),
        }
    }
}

/// Annotation document limits.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentConfig {
    /// Undo steps kept in memory (older steps are folded into the baseline)
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Strokes accepted per page before new ones are refused
    #[serde(default = "default_max_strokes_per_page")]
    pub max_strokes_per_page: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_strokes_per_page: default_max_strokes_per_page(),
        }
    }
}

/// Annotation persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionConfig {
    /// Where annotation files are written
    #[serde(default = "default_storage")]
    pub storage: SessionStorageMode,

    /// Directory used when `storage = "custom"` (supports `~/`)
    #[serde(default)]
    pub custom_directory: Option<String>,

    /// gzip the payload: auto, on, off
    #[serde(default = "default_compress")]
    pub compress: SessionCompression,

    /// Payload size at which `auto` compression kicks in, in KiB
    #[serde(default = "default_auto_compress_threshold_kb")]
    pub auto_compress_threshold_kb: u64,

    /// Refuse to write or read payloads larger than this, in MiB
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Number of previous files kept as `.bak` (0 or 1)
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,

    /// Minimum time between autosaves, in milliseconds (0 = only explicit saves)
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            custom_directory: None,
            compress: default_compress(),
            auto_compress_threshold_kb: default_auto_compress_threshold_kb(),
            max_file_size_mb: default_max_file_size_mb(),
            backup_retention: default_backup_retention(),
            autosave_interval_ms: default_autosave_interval(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_sensitivity() -> u8 {
    5
}

fn default_palm_radius() -> f64 {
    18.0
}

fn default_stylus_radius() -> f64 {
    6.0
}

fn default_stylus_pressure() -> f64 {
    0.3
}

fn default_proximity_radius() -> f64 {
    250.0
}

fn default_proximity_duration() -> u64 {
    500
}

fn default_proximity_shape() -> ProximityShape {
    ProximityShape::Circle
}

fn default_ambiguous_samples() -> u32 {
    4
}

fn default_ambiguous_timeout() -> u64 {
    40
}

fn default_contact_timeout() -> u64 {
    2_000
}

fn default_history_len() -> usize {
    8
}

fn default_smoothing_window() -> usize {
    3
}

fn default_min_dot_width() -> f64 {
    2.0
}

fn default_color() -> ColorSpec {
    ColorSpec::Name("black".to_string())
}

fn default_ballpoint_width() -> f64 {
    Tool::Ballpoint.fallback_width()
}

fn default_fountain_width() -> f64 {
    Tool::Fountain.fallback_width()
}

fn default_highlighter_width() -> f64 {
    Tool::Highlighter.fallback_width()
}

fn default_pencil_width() -> f64 {
    Tool::Pencil.fallback_width()
}

fn default_marker_width() -> f64 {
    Tool::Marker.fallback_width()
}

fn default_max_history() -> usize {
    500
}

fn default_max_strokes_per_page() -> usize {
    10_000
}

fn default_storage() -> SessionStorageMode {
    SessionStorageMode::Auto
}

fn default_compress() -> SessionCompression {
    SessionCompression::Auto
}

fn default_auto_compress_threshold_kb() -> u64 {
    100
}

fn default_max_file_size_mb() -> u64 {
    10
}

fn default_backup_retention() -> usize {
    1
}

fn default_autosave_interval() -> u64 {
    30_000
}
