//! Uniform touch event records.
//!
//! Device layers deliver platform-specific batches ([`PlatformBatch`]); the
//! [`Normalizer`](super::Normalizer) turns them into [`RawEvent`]s, the only shape
//! the classifier and stroke builder understand.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one touch contact for the duration of its down..up span.
pub type ContactId = u64;

/// Lifecycle phase of a touch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

impl TouchPhase {
    /// True for the phases that end a contact.
    pub fn is_terminal(self) -> bool {
        matches!(self, TouchPhase::Up | TouchPhase::Cancel)
    }
}

/// What the hardware claims produced the contact. Never guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolHint {
    Stylus,
    Finger,
    #[default]
    Unknown,
}

impl ToolHint {
    /// Maps a platform tool name (`"stylus"`, `"pen"`, `"finger"`, `"touch"`, ...).
    pub fn from_platform(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("stylus") | Some("pen") | Some("eraser") => ToolHint::Stylus,
            Some("finger") | Some("touch") => ToolHint::Finger,
            _ => ToolHint::Unknown,
        }
    }
}

/// One normalized touch sample in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    pub contact_id: ContactId,
    pub x: f64,
    pub y: f64,
    /// Pressure in `[0, 1]`, `None` when the hardware does not report it
    pub pressure: Option<f64>,
    /// Contact radius in pixels, `None` when the hardware does not report it
    pub radius: Option<f64>,
    pub tool_hint: ToolHint,
    /// Monotonic timestamp in milliseconds
    pub timestamp_ms: u64,
    pub phase: TouchPhase,
}

impl RawEvent {
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// True when neither radius nor pressure is available.
    pub fn lacks_signal(&self) -> bool {
        self.radius.is_none() && self.pressure.is_none()
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contact {} {:?} at ({:.1}, {:.1}) t={}ms",
            self.contact_id, self.phase, self.x, self.y, self.timestamp_ms
        )
    }
}

/// Action reported by the platform for one pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformAction {
    Down,
    Move,
    Up,
    Cancel,
    HoverEnter,
    HoverExit,
}

/// A coalesced sample delivered alongside a move event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSample {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub touch_major: Option<f64>,
    pub time_ms: u64,
}

/// A platform pointer event as recorded from the device layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub pointer_id: ContactId,
    pub action: PlatformAction,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub pressure: Option<f64>,
    /// Contact ellipse major axis (diameter) in pixels
    #[serde(default)]
    pub touch_major: Option<f64>,
    #[serde(default)]
    pub tool: Option<String>,
    pub time_ms: u64,
    /// Samples coalesced into this event, oldest first
    #[serde(default)]
    pub history: Vec<HistoricalSample>,
}

/// One delivery from the device layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformBatch {
    pub events: Vec<PlatformEvent>,
}

/// Normalizer output for one platform batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub events: Vec<RawEvent>,
    /// Last pen hover transition seen in the batch, if any
    pub hover: Option<bool>,
}
