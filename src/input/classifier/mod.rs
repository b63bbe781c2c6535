//! Palm rejection.
//!
//! Every contact runs through a small state machine keyed by contact id:
//! `Pending -> {Stylus, Palm}`, with `Ambiguous` in between while evidence
//! accumulates. Settled contacts never change class. Time only advances through
//! event timestamps and explicit [`ContactClassifier::tick`] calls, so the
//! classifier has no timers of its own.
//!
//! Stylus-classified events are appended to the caller's output buffer in
//! arrival order; palm events are swallowed.

mod contact;


pub use contact::ContactState;

use self::contact::Contact;
use super::InputError;
use super::events::{ContactId, RawEvent, ToolHint, TouchPhase};
use crate::config::{ClassifierConfig, ProximityShape};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Thresholds after the sensitivity level has been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub palm_radius: f64,
    pub stylus_radius: f64,
    pub stylus_pressure: f64,
}

impl Thresholds {
    /// Level 5 uses the configured values; higher levels reject more readily.
    pub fn scaled(config: &ClassifierConfig, level: u8) -> Self {
        let offset = (5.0 - f64::from(level.clamp(1, 10))) / 5.0;
        Self {
            palm_radius: config.palm_radius_threshold * (1.0 + 0.35 * offset),
            stylus_radius: config.stylus_radius_threshold * (1.0 + 0.2 * offset),
            stylus_pressure: (config.stylus_pressure_threshold * (1.0 + 0.25 * offset))
                .clamp(0.0, 1.0),
        }
    }

    fn radius_midpoint(&self) -> f64 {
        (self.palm_radius + self.stylus_radius) / 2.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Evidence {
    stylus_nearby: bool,
    large_nearby: bool,
}

/// Per-contact palm rejection state machine.
#[derive(Debug)]
pub struct ContactClassifier {
    config: ClassifierConfig,
    thresholds: Thresholds,
    sensitivity: u8,
    enabled: bool,
    hovering: bool,
    contacts: BTreeMap<ContactId, Contact>,
    signal_seen: bool,
    degraded: bool,
    degraded_reported: bool,
}

impl ContactClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let sensitivity = config.sensitivity.clamp(1, 10);
        Self {
            thresholds: Thresholds::scaled(&config, sensitivity),
            sensitivity,
            enabled: config.enabled,
            hovering: false,
            contacts: BTreeMap::new(),
            signal_seen: false,
            degraded: false,
            degraded_reported: false,
            config,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn sensitivity(&self) -> u8 {
        self.sensitivity
    }

    /// Changes the rejection level (clamped to 1-10) and rescales the thresholds.
    pub fn set_sensitivity(&mut self, level: u8) {
        self.sensitivity = level.clamp(1, 10);
        self.thresholds = Thresholds::scaled(&self.config, self.sensitivity);
        debug!(
            "Classifier sensitivity {} -> {:?}",
            self.sensitivity, self.thresholds
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns palm rejection on or off. Contacts already settled keep their class.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    /// Pen hover state from the device. Hovering forces rejection on.
    pub fn on_stylus_hover(&mut self, hovering: bool) {
        self.hovering = hovering;
        if hovering && !self.enabled {
            debug!("Stylus hover re-enabled palm rejection");
            self.enabled = true;
        }
    }

    /// True while no radius or pressure has ever been reported (tool-hint-only mode).
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Current class of a tracked contact, including recently ended ones.
    pub fn state_of(&self, id: ContactId) -> Option<ContactState> {
        self.contacts.get(&id).map(|c| c.state)
    }

    /// Contacts between down and up.
    pub fn live_contacts(&self) -> usize {
        self.contacts.values().filter(|c| c.is_live()).count()
    }

    /// Feeds one event. Events that should reach the stroke builder are pushed
    /// onto `out`, possibly together with earlier buffered events of the same
    /// contact.
    ///
    /// Errors are recoverable: the event was dropped and the classifier is
    /// unchanged apart from housekeeping.
    pub fn process(
        &mut self,
        event: &RawEvent,
        out: &mut Vec<RawEvent>,
    ) -> Result<ContactState, InputError> {
        let now = event.timestamp_ms;
        self.purge_ended(now);
        self.note_signal(event);

        match event.phase {
            TouchPhase::Down => self.on_down(event, out),
            TouchPhase::Move => self.on_move(event, out),
            TouchPhase::Up | TouchPhase::Cancel => self.on_end(event, out),
        }
    }

    /// Advances time: resolves ambiguous contacts past their deadline, expires
    /// silent contacts and forgets ended ones outside the proximity window.
    pub fn tick(&mut self, now: u64, out: &mut Vec<RawEvent>) {
        let timeout = self.config.ambiguous_timeout_ms;
        let overdue: Vec<ContactId> = self
            .contacts
            .values()
            .filter(|c| {
                c.is_live()
                    && c.state == ContactState::Ambiguous
                    && now.saturating_sub(c.first_seen_ms) >= timeout
            })
            .map(|c| c.id)
            .collect();
        for id in overdue {
            self.resolve(id, now, out);
        }

        let silent_for = self.config.contact_timeout_ms;
        let expired: Vec<ContactId> = self
            .contacts
            .values()
            .filter(|c| c.is_live() && now.saturating_sub(c.last_seen_ms) >= silent_for)
            .map(|c| c.id)
            .collect();
        for id in expired {
            if let Some(contact) = self.contacts.get_mut(&id) {
                debug!(
                    "Contact {} silent for {}ms, expiring",
                    id,
                    now.saturating_sub(contact.last_seen_ms)
                );
                match contact.state {
                    ContactState::Stylus => out.push(RawEvent {
                        contact_id: id,
                        x: contact.last_position.0,
                        y: contact.last_position.1,
                        pressure: None,
                        radius: None,
                        tool_hint: contact.tool_hint,
                        timestamp_ms: now,
                        phase: TouchPhase::Cancel,
                    }),
                    ContactState::Pending | ContactState::Ambiguous => {
                        contact.buffered.clear();
                        contact.state = ContactState::Palm;
                    }
                    ContactState::Palm => {}
                }
                contact.ended_at_ms = Some(now);
            }
        }

        self.purge_ended(now);
    }

    fn on_down(
        &mut self,
        event: &RawEvent,
        out: &mut Vec<RawEvent>,
    ) -> Result<ContactState, InputError> {
        let id = event.contact_id;
        if !event.x.is_finite() || !event.y.is_finite() {
            return Err(self.reject(InputError::MalformedPosition(id)));
        }
        if self.contacts.get(&id).is_some_and(Contact::is_live) {
            return Err(self.reject(InputError::DuplicateDown(id)));
        }

        let contact = Contact::new(event, self.config.history_len);
        let evidence = self.evidence(id, contact.last_position, event.timestamp_ms);
        let state = self.initial_state(&contact, evidence);
        self.contacts.insert(id, contact);

        debug!("Contact {} down ({:?}) -> {:?}", id, event.tool_hint, state);
        self.enter(id, state, event, out);
        Ok(self.state_of(id).unwrap_or(state))
    }

    fn on_move(
        &mut self,
        event: &RawEvent,
        out: &mut Vec<RawEvent>,
    ) -> Result<ContactState, InputError> {
        let id = event.contact_id;
        let Some(contact) = self.contacts.get(&id).filter(|c| c.is_live()) else {
            return Err(self.reject(InputError::UnknownContact(id)));
        };
        if event.timestamp_ms < contact.last_seen_ms {
            let last_ms = contact.last_seen_ms;
            return Err(self.reject(InputError::OutOfOrder {
                contact: id,
                timestamp_ms: event.timestamp_ms,
                last_ms,
            }));
        }
        if !event.x.is_finite() || !event.y.is_finite() {
            return Err(self.reject(InputError::MalformedPosition(id)));
        }

        let state = match self.contacts.get_mut(&id) {
            Some(contact) => {
                contact.observe(event);
                contact.state
            }
            None => return Err(InputError::UnknownContact(id)),
        };

        match state {
            ContactState::Stylus => out.push(*event),
            ContactState::Palm => {}
            ContactState::Pending | ContactState::Ambiguous => {
                self.buffer(id, event);
                self.reevaluate(id, event.timestamp_ms, out);
            }
        }
        Ok(self.state_of(id).unwrap_or(state))
    }

    fn on_end(
        &mut self,
        event: &RawEvent,
        out: &mut Vec<RawEvent>,
    ) -> Result<ContactState, InputError> {
        let id = event.contact_id;
        let Some(contact) = self.contacts.get(&id).filter(|c| c.is_live()) else {
            return Err(self.reject(InputError::UnknownContact(id)));
        };

        let mut end = *event;
        if !end.x.is_finite() || !end.y.is_finite() {
            end.x = contact.last_position.0;
            end.y = contact.last_position.1;
        }
        end.timestamp_ms = end.timestamp_ms.max(contact.last_seen_ms);

        let state = match self.contacts.get_mut(&id) {
            Some(contact) => {
                contact.observe(&end);
                contact.state
            }
            None => return Err(InputError::UnknownContact(id)),
        };

        match state {
            ContactState::Stylus => out.push(end),
            ContactState::Palm => {}
            ContactState::Pending | ContactState::Ambiguous => {
                self.buffer(id, &end);
                self.resolve(id, end.timestamp_ms, out);
            }
        }

        let settled = match self.contacts.get_mut(&id) {
            Some(contact) => {
                contact.ended_at_ms = Some(end.timestamp_ms);
                contact.state
            }
            None => state,
        };
        debug!("Contact {} ended as {:?}", id, settled);
        Ok(settled)
    }

    fn enter(&mut self, id: ContactId, state: ContactState, event: &RawEvent, out: &mut Vec<RawEvent>) {
        match state {
            ContactState::Stylus => {
                self.settle(id, ContactState::Stylus, out);
                out.push(*event);
            }
            ContactState::Palm => self.settle(id, ContactState::Palm, out),
            ContactState::Pending | ContactState::Ambiguous => {
                if let Some(contact) = self.contacts.get_mut(&id) {
                    contact.state = ContactState::Ambiguous;
                }
                self.buffer(id, event);
                self.reevaluate(id, event.timestamp_ms, out);
            }
        }
    }

    fn buffer(&mut self, id: ContactId, event: &RawEvent) {
        if let Some(contact) = self.contacts.get_mut(&id) {
            contact.buffered.push(*event);
            contact.ambiguous_samples = contact.ambiguous_samples.saturating_add(1);
        }
    }

    /// Re-runs the evidence rules for an ambiguous contact and forces a decision
    /// once the sample or time budget is spent.
    fn reevaluate(&mut self, id: ContactId, now: u64, out: &mut Vec<RawEvent>) {
        let Some(contact) = self.contacts.get(&id) else {
            return;
        };
        let evidence = self.evidence(id, contact.last_position, now);
        if let Some(state) = self.evidence_state(contact, evidence) {
            self.settle(id, state, out);
            return;
        }

        let samples_spent = contact.ambiguous_samples >= self.config.ambiguous_decision_samples;
        let time_spent = now.saturating_sub(contact.first_seen_ms) >= self.config.ambiguous_timeout_ms;
        if samples_spent || time_spent {
            self.resolve(id, now, out);
        }
    }

    /// Final decision for an ambiguous contact.
    fn resolve(&mut self, id: ContactId, now: u64, out: &mut Vec<RawEvent>) {
        let Some(contact) = self.contacts.get(&id) else {
            return;
        };
        if contact.state.is_settled() {
            return;
        }
        let evidence = self.evidence(id, contact.last_position, now);
        let state = self.evidence_state(contact, evidence).unwrap_or_else(|| {
            let t = &self.thresholds;
            let accepted = if evidence.large_nearby {
                false
            } else if let Some(radius) = contact.history.mean_radius() {
                radius <= t.radius_midpoint()
            } else if let Some(pressure) = contact.history.mean_pressure() {
                pressure >= t.stylus_pressure
            } else {
                hint_decision(contact.tool_hint) == ContactState::Stylus
            };
            if accepted {
                ContactState::Stylus
            } else {
                ContactState::Palm
            }
        });
        debug!(
            "Contact {} resolved from ambiguous after {} samples -> {:?}",
            id, contact.ambiguous_samples, state
        );
        self.settle(id, state, out);
    }

    /// Settles a contact; a stylus decision replays its buffered events.
    fn settle(&mut self, id: ContactId, state: ContactState, out: &mut Vec<RawEvent>) {
        let Some(contact) = self.contacts.get_mut(&id) else {
            return;
        };
        if contact.state.is_settled() {
            return;
        }
        contact.state = state;
        let buffered = std::mem::take(&mut contact.buffered);
        if state == ContactState::Stylus {
            out.extend(buffered);
        }
    }

    fn initial_state(&self, contact: &Contact, evidence: Evidence) -> ContactState {
        if !self.enabled {
            return ContactState::Stylus;
        }
        if contact.tool_hint == ToolHint::Stylus {
            return ContactState::Stylus;
        }
        self.evidence_state(contact, evidence)
            .unwrap_or(ContactState::Ambiguous)
    }

    /// Rules shared by the initial decision and ambiguous re-evaluation.
    fn evidence_state(&self, contact: &Contact, evidence: Evidence) -> Option<ContactState> {
        let t = &self.thresholds;
        if self.hovering || evidence.stylus_nearby {
            return Some(ContactState::Palm);
        }
        if contact.size().is_some_and(|r| r >= t.palm_radius) {
            return Some(ContactState::Palm);
        }
        if !contact.history.has_signal() {
            if evidence.large_nearby {
                return Some(ContactState::Palm);
            }
            // Only hardware that never reports a signal falls back to tool hints;
            // a silent sample elsewhere waits for more evidence.
            return self.degraded.then(|| hint_decision(contact.tool_hint));
        }
        if !evidence.large_nearby
            && contact
                .history
                .mean_radius()
                .is_some_and(|r| r <= t.stylus_radius)
        {
            return Some(ContactState::Stylus);
        }
        None
    }

    /// What other contacts inside the proximity window say about `position`.
    fn evidence(&self, id: ContactId, position: (f64, f64), now: u64) -> Evidence {
        let window_ms = self.config.proximity_window_duration_ms;
        let mut evidence = Evidence::default();
        for other in self.contacts.values() {
            if other.id == id {
                continue;
            }
            let recent = other
                .ended_at_ms
                .is_none_or(|ended| now.saturating_sub(ended) <= window_ms);
            if !recent || !self.within_window(position, other.last_position) {
                continue;
            }
            // A lifted pen is not concurrent; a lifted hand still is for the window.
            if other.state == ContactState::Stylus && other.is_live() {
                evidence.stylus_nearby = true;
            }
            if other.size().is_some_and(|r| r >= self.thresholds.palm_radius) {
                evidence.large_nearby = true;
            }
        }
        evidence
    }

    fn within_window(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        let radius = self.config.proximity_window_radius;
        let dx = (a.0 - b.0).abs();
        let dy = (a.1 - b.1).abs();
        match self.config.proximity_shape {
            ProximityShape::Circle => dx.hypot(dy) <= radius,
            ProximityShape::Box => dx <= radius && dy <= radius,
        }
    }

    fn note_signal(&mut self, event: &RawEvent) {
        if !event.lacks_signal() {
            self.signal_seen = true;
            self.degraded = false;
            return;
        }
        if !self.signal_seen && !self.degraded {
            self.degraded = true;
            if !self.degraded_reported {
                self.degraded_reported = true;
                warn!("Touch hardware reports neither radius nor pressure; palm rejection falls back to tool hints");
            }
        }
    }

    fn purge_ended(&mut self, now: u64) {
        let window_ms = self.config.proximity_window_duration_ms;
        self.contacts.retain(|_, c| {
            c.ended_at_ms
                .is_none_or(|ended| now.saturating_sub(ended) <= window_ms)
        });
    }

    fn reject(&self, err: InputError) -> InputError {
        debug!("Dropping input event: {}", err);
        err
    }
}

/// Tool-hint-only verdict for contacts that carry no radius or pressure.
fn hint_decision(hint: ToolHint) -> ContactState {
    match hint {
        ToolHint::Finger => ContactState::Palm,
        ToolHint::Stylus | ToolHint::Unknown => ContactState::Stylus,
    }
}
