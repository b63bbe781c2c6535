//! Configuration enum types.

use crate::draw::{Color, color::*};
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Geometry of the proximity window used to correlate contacts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ProximityShape {
    /// Euclidean distance within the window radius
    Circle,
    /// Per-axis distance within the window radius (square window)
    Box,
}

/// Where session files live.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStorageMode {
    /// `$XDG_DATA_HOME/inkpage` (falls back to the config directory)
    Auto,
    /// Next to `config.toml`
    Config,
    /// `session.custom_directory`
    Custom,
}

/// Compression preference for annotation files.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SessionCompression {
    Auto,
    On,
    Off,
}

/// Color specification - a named color, a hex string or RGB values.
///
/// # Examples
/// ```toml
/// # Named color
/// default_color = "red"
///
/// # Hex color with optional alpha
/// default_color = "#1e90ff"
///
/// # Custom RGB color (0-255 per component)
/// default_color = [255, 128, 0]  # Orange
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[serde(untagged)]
pub enum ColorSpec {
    /// Named color (red, green, blue, yellow, orange, pink, white, black) or `#RRGGBB[AA]`
    Name(String),
    /// RGB color as [red, green, blue] where each component is 0-255
    Rgb([u8; 3]),
}

impl ColorSpec {
    /// Converts the color specification to a [`Color`] struct.
    ///
    /// Unknown names default to black with a warning.
    pub fn to_color(&self) -> Color {
        match self {
            ColorSpec::Name(name) => crate::util::name_to_color(name)
                .or_else(|| crate::util::hex_to_color(name))
                .unwrap_or_else(|| {
                    warn!("Unknown color '{}', using black", name);
                    BLACK
                }),
            ColorSpec::Rgb([r, g, b]) => Color::from_rgba8(*r, *g, *b, 255),
        }
    }
}
