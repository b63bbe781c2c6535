//! Platform batch to [`RawEvent`] translation.

use super::InputError;
use super::events::{
    ContactId, NormalizedBatch, PlatformAction, PlatformBatch, PlatformEvent, RawEvent, ToolHint,
    TouchPhase,
};
use log::debug;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
struct Track {
    last_ms: u64,
    last_position: (f64, f64),
    tool_hint: ToolHint,
}

/// Stateful translator from platform event batches to [`RawEvent`]s.
///
/// Per contact it keeps timestamps non-decreasing and emission order equal to
/// delivery order. Coalesced history samples are expanded into moves ahead of
/// the event carrying them. A contact whose `down` has no usable position is
/// dropped as a whole, so no half of a down/up pair ever reaches the classifier.
#[derive(Debug, Default)]
pub struct Normalizer {
    tracks: HashMap<ContactId, Track>,
    poisoned: HashSet<ContactId>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of contacts currently between down and up.
    pub fn active_contacts(&self) -> usize {
        self.tracks.len()
    }

    pub fn normalize(&mut self, batch: &PlatformBatch) -> NormalizedBatch {
        let mut out = NormalizedBatch::default();
        let mut staged: Vec<RawEvent> = Vec::with_capacity(batch.events.len());

        for event in &batch.events {
            match event.action {
                PlatformAction::HoverEnter => out.hover = Some(true),
                PlatformAction::HoverExit => out.hover = Some(false),
                _ => {
                    if let Err(err) = self.translate(event, &mut staged) {
                        debug!("Dropping platform event: {}", err);
                    }
                }
            }
        }

        // Per-contact timestamps are already monotonic, so a stable sort merges
        // contacts by time without reordering any single contact.
        staged.sort_by_key(|e| e.timestamp_ms);
        out.events = staged;
        out
    }

    fn translate(&mut self, event: &PlatformEvent, out: &mut Vec<RawEvent>) -> Result<(), InputError> {
        let id = event.pointer_id;
        let phase = match event.action {
            PlatformAction::Down => TouchPhase::Down,
            PlatformAction::Move => TouchPhase::Move,
            PlatformAction::Up => TouchPhase::Up,
            PlatformAction::Cancel => TouchPhase::Cancel,
            PlatformAction::HoverEnter | PlatformAction::HoverExit => return Ok(()),
        };

        if phase == TouchPhase::Down {
            self.poisoned.remove(&id);
            if !finite_position(event.x, event.y) {
                self.poisoned.insert(id);
                self.tracks.remove(&id);
                return Err(InputError::MalformedPosition(id));
            }
            let mut floor_ms = 0;
            if let Some(previous) = self.tracks.get(&id).copied() {
                // Platform reused an id without ending it; close the old contact first.
                // The new down is held at or after the cancel so sorting keeps them in order.
                floor_ms = previous.last_ms;
                out.push(RawEvent {
                    contact_id: id,
                    x: previous.last_position.0,
                    y: previous.last_position.1,
                    pressure: None,
                    radius: None,
                    tool_hint: previous.tool_hint,
                    timestamp_ms: previous.last_ms,
                    phase: TouchPhase::Cancel,
                });
            }
            let tool_hint = ToolHint::from_platform(event.tool.as_deref());
            self.tracks.insert(
                id,
                Track {
                    last_ms: event.time_ms.max(floor_ms),
                    last_position: (event.x, event.y),
                    tool_hint,
                },
            );
            out.push(self.sample(id, event.x, event.y, event.pressure, event.touch_major, event.time_ms, phase));
            return Ok(());
        }

        if self.poisoned.contains(&id) {
            if phase.is_terminal() {
                self.poisoned.remove(&id);
            }
            return Err(InputError::MalformedPosition(id));
        }

        if !self.tracks.contains_key(&id) {
            // Let the classifier see and report it; it owns contact bookkeeping.
            let tool_hint = ToolHint::from_platform(event.tool.as_deref());
            if !finite_position(event.x, event.y) {
                return Err(InputError::MalformedPosition(id));
            }
            out.push(RawEvent {
                contact_id: id,
                x: event.x,
                y: event.y,
                pressure: clamp_pressure(event.pressure),
                radius: radius_from_major(event.touch_major),
                tool_hint,
                timestamp_ms: event.time_ms,
                phase,
            });
            return Ok(());
        }

        if phase == TouchPhase::Move {
            for sample in &event.history {
                if finite_position(sample.x, sample.y) {
                    out.push(self.sample(
                        id,
                        sample.x,
                        sample.y,
                        sample.pressure,
                        sample.touch_major,
                        sample.time_ms,
                        TouchPhase::Move,
                    ));
                } else {
                    debug!("Skipping malformed historical sample for contact {}", id);
                }
            }
            if !finite_position(event.x, event.y) {
                return Err(InputError::MalformedPosition(id));
            }
        }

        // Terminal events always go through; a broken position falls back to the last good one.
        let (x, y) = if finite_position(event.x, event.y) {
            (event.x, event.y)
        } else {
            self.tracks
                .get(&id)
                .map(|t| t.last_position)
                .unwrap_or((0.0, 0.0))
        };
        out.push(self.sample(id, x, y, event.pressure, event.touch_major, event.time_ms, phase));

        if phase.is_terminal() {
            self.tracks.remove(&id);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn sample(
        &mut self,
        id: ContactId,
        x: f64,
        y: f64,
        pressure: Option<f64>,
        touch_major: Option<f64>,
        time_ms: u64,
        phase: TouchPhase,
    ) -> RawEvent {
        let (timestamp_ms, tool_hint) = match self.tracks.get_mut(&id) {
            Some(track) => {
                if time_ms < track.last_ms {
                    debug!(
                        "Contact {} timestamp {}ms went backwards, holding at {}ms",
                        id, time_ms, track.last_ms
                    );
                }
                track.last_ms = track.last_ms.max(time_ms);
                track.last_position = (x, y);
                (track.last_ms, track.tool_hint)
            }
            None => (time_ms, ToolHint::Unknown),
        };
        RawEvent {
            contact_id: id,
            x,
            y,
            pressure: clamp_pressure(pressure),
            radius: radius_from_major(touch_major),
            tool_hint,
            timestamp_ms,
            phase,
        }
    }
}

fn finite_position(x: f64, y: f64) -> bool {
    x.is_finite() && y.is_finite()
}

fn clamp_pressure(pressure: Option<f64>) -> Option<f64> {
    pressure.filter(|p| p.is_finite()).map(|p| p.clamp(0.0, 1.0))
}

fn radius_from_major(touch_major: Option<f64>) -> Option<f64> {
    touch_major
        .filter(|m| m.is_finite() && *m >= 0.0)
        .map(|m| m / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::events::HistoricalSample;

    fn event(id: ContactId, action: PlatformAction, x: f64, time_ms: u64) -> PlatformEvent {
        PlatformEvent {
            pointer_id: id,
            action,
            x,
            y: 10.0,
            pressure: Some(0.5),
            touch_major: Some(6.0),
            tool: Some("stylus".into()),
            time_ms,
            history: Vec::new(),
        }
    }

    #[test]
    fn converts_fields_and_halves_touch_major() {
        let mut normalizer = Normalizer::new();
        let mut down = event(1, PlatformAction::Down, 5.0, 100);
        down.pressure = Some(1.7);
        let out = normalizer.normalize(&PlatformBatch { events: vec![down] });
        let raw = out.events[0];
        assert_eq!(raw.phase, TouchPhase::Down);
        assert_eq!(raw.radius, Some(3.0));
        assert_eq!(raw.pressure, Some(1.0));
        assert_eq!(raw.tool_hint, ToolHint::Stylus);
        assert_eq!(normalizer.active_contacts(), 1);
    }

    #[test]
    fn nan_signals_become_unknown() {
        let mut normalizer = Normalizer::new();
        let mut down = event(1, PlatformAction::Down, 5.0, 0);
        down.pressure = Some(f64::NAN);
        down.touch_major = Some(-1.0);
        down.tool = None;
        let out = normalizer.normalize(&PlatformBatch { events: vec![down] });
        assert!(out.events[0].lacks_signal());
        assert_eq!(out.events[0].tool_hint, ToolHint::Unknown);
    }

    #[test]
    fn history_is_expanded_before_the_carrying_event() {
        let mut normalizer = Normalizer::new();
        let mut moved = event(1, PlatformAction::Move, 30.0, 30);
        moved.history = vec![
            HistoricalSample {
                x: 10.0,
                y: 10.0,
                pressure: None,
                touch_major: None,
                time_ms: 10,
            },
            HistoricalSample {
                x: 20.0,
                y: 10.0,
                pressure: None,
                touch_major: None,
                time_ms: 20,
            },
        ];
        let out = normalizer.normalize(&PlatformBatch {
            events: vec![event(1, PlatformAction::Down, 0.0, 0), moved],
        });
        let xs: Vec<f64> = out.events.iter().map(|e| e.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn per_contact_order_survives_backwards_timestamps() {
        let mut normalizer = Normalizer::new();
        let out = normalizer.normalize(&PlatformBatch {
            events: vec![
                event(1, PlatformAction::Down, 0.0, 50),
                event(2, PlatformAction::Down, 100.0, 40),
                event(1, PlatformAction::Move, 1.0, 45),
                event(1, PlatformAction::Up, 2.0, 60),
                event(2, PlatformAction::Up, 100.0, 55),
            ],
        });
        let contact_one: Vec<TouchPhase> = out
            .events
            .iter()
            .filter(|e| e.contact_id == 1)
            .map(|e| e.phase)
            .collect();
        assert_eq!(
            contact_one,
            vec![TouchPhase::Down, TouchPhase::Move, TouchPhase::Up]
        );
        let move_event = out.events.iter().find(|e| e.phase == TouchPhase::Move).unwrap();
        assert_eq!(move_event.timestamp_ms, 50);
        assert!(out.events.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }

    #[test]
    fn terminal_event_with_broken_position_is_kept() {
        let mut normalizer = Normalizer::new();
        let mut up = event(1, PlatformAction::Up, f64::NAN, 20);
        up.y = f64::INFINITY;
        let out = normalizer.normalize(&PlatformBatch {
            events: vec![event(1, PlatformAction::Down, 7.0, 0), up],
        });
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[1].phase, TouchPhase::Up);
        assert_eq!(out.events[1].position(), (7.0, 10.0));
        assert_eq!(normalizer.active_contacts(), 0);
    }

    #[test]
    fn malformed_down_drops_the_whole_contact() {
        let mut normalizer = Normalizer::new();
        let out = normalizer.normalize(&PlatformBatch {
            events: vec![
                event(4, PlatformAction::Down, f64::NAN, 0),
                event(4, PlatformAction::Move, 1.0, 5),
                event(4, PlatformAction::Up, 2.0, 10),
            ],
        });
        assert!(out.events.is_empty());
    }

    #[test]
    fn reused_id_cancels_the_previous_contact() {
        let mut normalizer = Normalizer::new();
        let out = normalizer.normalize(&PlatformBatch {
            events: vec![
                event(1, PlatformAction::Down, 0.0, 0),
                event(1, PlatformAction::Down, 50.0, 10),
            ],
        });
        let phases: Vec<TouchPhase> = out.events.iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            vec![TouchPhase::Down, TouchPhase::Cancel, TouchPhase::Down]
        );
    }

    #[test]
    fn reused_id_with_earlier_timestamp_keeps_cancel_first() {
        let mut normalizer = Normalizer::new();
        let out = normalizer.normalize(&PlatformBatch {
            events: vec![
                event(1, PlatformAction::Down, 0.0, 50),
                event(1, PlatformAction::Move, 5.0, 60),
                event(2, PlatformAction::Down, 200.0, 55),
                event(1, PlatformAction::Down, 80.0, 30),
                event(1, PlatformAction::Up, 90.0, 70),
            ],
        });
        let contact_one: Vec<(TouchPhase, f64)> = out
            .events
            .iter()
            .filter(|e| e.contact_id == 1)
            .map(|e| (e.phase, e.x))
            .collect();
        assert_eq!(
            contact_one,
            vec![
                (TouchPhase::Down, 0.0),
                (TouchPhase::Move, 5.0),
                (TouchPhase::Cancel, 5.0),
                (TouchPhase::Down, 80.0),
                (TouchPhase::Up, 90.0),
            ]
        );
        assert!(out.events.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
        assert_eq!(normalizer.active_contacts(), 1);
    }

    #[test]
    fn hover_transitions_are_reported() {
        let mut normalizer = Normalizer::new();
        let out = normalizer.normalize(&PlatformBatch {
            events: vec![
                event(9, PlatformAction::HoverEnter, 0.0, 0),
                event(9, PlatformAction::HoverExit, 0.0, 5),
            ],
        });
        assert_eq!(out.hover, Some(false));
        assert!(out.events.is_empty());
    }
}
