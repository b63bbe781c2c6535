//! When to write annotations back to disk.
//!
//! No timers: the host passes its clock into [`Autosave::poll`] and the
//! document revision tells whether anything changed since the last save.

/// Debounced save policy. A save becomes due `interval_ms` after the first
/// unsaved change; an interval of zero disables autosave.
#[derive(Debug, Clone)]
pub struct Autosave {
    interval_ms: u64,
    saved_revision: u64,
    dirty_since_ms: Option<u64>,
}

impl Autosave {
    /// `revision` is the document revision that is already on disk.
    pub fn new(interval_ms: u64, revision: u64) -> Self {
        Self {
            interval_ms,
            saved_revision: revision,
            dirty_since_ms: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_ms > 0
    }

    pub fn has_unsaved_changes(&self, revision: u64) -> bool {
        revision != self.saved_revision
    }

    /// Returns true when a save should happen now.
    pub fn poll(&mut self, now_ms: u64, revision: u64) -> bool {
        if !self.has_unsaved_changes(revision) {
            self.dirty_since_ms = None;
            return false;
        }
        let since = *self.dirty_since_ms.get_or_insert(now_ms);
        self.is_enabled() && now_ms.saturating_sub(since) >= self.interval_ms
    }

    pub fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = revision;
        self.dirty_since_ms = None;
    }

    /// Pushes the next attempt a full interval out.
    pub fn mark_failed(&mut self, now_ms: u64) {
        self.dirty_since_ms = Some(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_waits_for_interval_after_first_change() {
        let mut autosave = Autosave::new(1_000, 0);
        assert!(!autosave.poll(0, 0));
        assert!(!autosave.poll(100, 1));
        assert!(!autosave.poll(900, 3));
        assert!(autosave.poll(1_100, 3));
        autosave.mark_saved(3);
        assert!(!autosave.poll(5_000, 3));
    }

    #[test]
    fn failure_retries_after_another_interval() {
        let mut autosave = Autosave::new(500, 0);
        autosave.poll(0, 2);
        assert!(autosave.poll(500, 2));
        autosave.mark_failed(500);
        assert!(!autosave.poll(900, 2));
        assert!(autosave.poll(1_000, 2));
    }

    #[test]
    fn zero_interval_never_fires() {
        let mut autosave = Autosave::new(0, 0);
        assert!(!autosave.poll(10_000, 4));
        assert!(autosave.has_unsaved_changes(4));
    }
}
