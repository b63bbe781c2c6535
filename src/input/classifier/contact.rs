//! Per-contact bookkeeping for the classifier.

use crate::input::events::{ContactId, RawEvent, ToolHint};

/// Classification of a contact.
///
/// `Pending` exists only while a `down` is evaluated. `Stylus` and `Palm` are
/// settled and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactState {
    Pending,
    Ambiguous,
    Stylus,
    Palm,
}

impl ContactState {
    pub fn is_settled(self) -> bool {
        matches!(self, ContactState::Stylus | ContactState::Palm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Sample {
    pub radius: Option<f64>,
    pub pressure: Option<f64>,
}

/// Fixed-capacity ring of the most recent radius/pressure samples.
#[derive(Debug, Clone)]
pub(crate) struct SampleRing {
    samples: Vec<Sample>,
    capacity: usize,
    next: usize,
}

impl SampleRing {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.next] = sample;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn mean_radius(&self) -> Option<f64> {
        mean(self.samples.iter().filter_map(|s| s.radius))
    }

    pub fn mean_pressure(&self) -> Option<f64> {
        mean(self.samples.iter().filter_map(|s| s.pressure))
    }

    pub fn max_radius(&self) -> Option<f64> {
        self.samples
            .iter()
            .filter_map(|s| s.radius)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))
    }

    pub fn has_signal(&self) -> bool {
        self.samples
            .iter()
            .any(|s| s.radius.is_some() || s.pressure.is_some())
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// One tracked contact.
#[derive(Debug, Clone)]
pub(crate) struct Contact {
    pub id: ContactId,
    pub state: ContactState,
    pub tool_hint: ToolHint,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    pub ended_at_ms: Option<u64>,
    pub last_position: (f64, f64),
    pub history: SampleRing,
    /// Events held back while the contact is ambiguous, in arrival order
    pub buffered: Vec<RawEvent>,
    /// Samples observed while ambiguous
    pub ambiguous_samples: u32,
}

impl Contact {
    pub fn new(event: &RawEvent, history_len: usize) -> Self {
        let mut history = SampleRing::with_capacity(history_len);
        history.push(Sample {
            radius: event.radius,
            pressure: event.pressure,
        });
        Self {
            id: event.contact_id,
            state: ContactState::Pending,
            tool_hint: event.tool_hint,
            first_seen_ms: event.timestamp_ms,
            last_seen_ms: event.timestamp_ms,
            ended_at_ms: None,
            last_position: event.position(),
            history,
            buffered: Vec::new(),
            ambiguous_samples: 0,
        }
    }

    pub fn observe(&mut self, event: &RawEvent) {
        self.last_seen_ms = self.last_seen_ms.max(event.timestamp_ms);
        self.last_position = event.position();
        self.history.push(Sample {
            radius: event.radius,
            pressure: event.pressure,
        });
    }

    pub fn is_live(&self) -> bool {
        self.ended_at_ms.is_none()
    }

    /// Largest radius seen recently; used as "large contact" evidence.
    pub fn size(&self) -> Option<f64> {
        self.history.max_radius()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_overwrites_oldest_sample() {
        let mut ring = SampleRing::with_capacity(2);
        for r in [2.0, 4.0, 10.0] {
            ring.push(Sample {
                radius: Some(r),
                pressure: None,
            });
        }
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.mean_radius(), Some(7.0));
        assert_eq!(ring.max_radius(), Some(10.0));
        assert_eq!(ring.mean_pressure(), None);
        assert!(ring.has_signal());
    }

    #[test]
    fn empty_signal_is_detected() {
        let mut ring = SampleRing::with_capacity(4);
        ring.push(Sample {
            radius: None,
            pressure: None,
        });
        assert!(!ring.has_signal());
    }
}
