//! Pen tool selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pen tool used to lay down a stroke.
///
/// The tool decides whether pressure modulates the width and how opaque the ink is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Ballpoint pen - thin, pressure-sensitive
    Ballpoint,
    /// Fountain pen - pressure-sensitive with a wider range (default)
    Fountain,
    /// Highlighter - wide, translucent, fixed width
    Highlighter,
    /// Pencil - pressure-sensitive, slightly translucent
    Pencil,
    /// Marker - fixed width, opaque
    Marker,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::Ballpoint,
        Tool::Fountain,
        Tool::Highlighter,
        Tool::Pencil,
        Tool::Marker,
    ];

    /// Whether stylus pressure changes the rendered width for this tool.
    pub fn pressure_mapped(self) -> bool {
        !matches!(self, Tool::Highlighter | Tool::Marker)
    }

    /// Opacity applied on top of the stroke color when rendering.
    pub fn opacity(self) -> f64 {
        match self {
            Tool::Highlighter => 0.35,
            Tool::Pencil => 0.85,
            _ => 1.0,
        }
    }

    /// Built-in base width in document units, used when the config has none.
    pub fn fallback_width(self) -> f64 {
        match self {
            Tool::Ballpoint => 2.0,
            Tool::Fountain => 2.5,
            Tool::Highlighter => 14.0,
            Tool::Pencil => 1.5,
            Tool::Marker => 5.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Ballpoint => "ballpoint",
            Tool::Fountain => "fountain",
            Tool::Highlighter => "highlighter",
            Tool::Pencil => "pencil",
            Tool::Marker => "marker",
        }
    }
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Fountain
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tool '{s}'"))
    }
}
