//! Per-conversation record of which stream messages have been persisted.

use std::collections::HashSet;

use crate::models::StreamMessage;

/// Seen-set plus snapshot flag for one conversation activation.
///
/// A stream message id moves `unseen -> in flight -> seen` on a successful
/// persist, or back to `unseen` on failure. System messages and the initial
/// snapshot go straight to `seen`.
#[derive(Debug, Clone, Default)]
pub struct PersistenceTracker {
    seen: HashSet<String>,
    in_flight: HashSet<String>,
    snapshot_consumed: bool,
}

impl PersistenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the initial snapshot has been taken.
    pub fn snapshot_consumed(&self) -> bool {
        self.snapshot_consumed
    }

    /// Mark every message present now as seen and leave the snapshot phase.
    /// Returns how many ids were marked.
    pub fn consume_snapshot(&mut self, messages: &[StreamMessage]) -> usize {
        let before = self.seen.len();
        self.seen.extend(messages.iter().map(|m| m.id.clone()));
        self.snapshot_consumed = true;
        self.seen.len() - before
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Neither seen nor being persisted by another pass.
    pub fn is_pending(&self, id: &str) -> bool {
        !self.is_seen(id) && !self.is_in_flight(id)
    }

    pub fn mark_seen(&mut self, id: &str) {
        self.seen.insert(id.to_string());
    }

    /// Reserve `id` for persisting. False if it is already seen or reserved.
    pub fn claim(&mut self, id: &str) -> bool {
        if !self.is_pending(id) {
            return false;
        }
        self.in_flight.insert(id.to_string())
    }

    /// Persist succeeded.
    pub fn complete(&mut self, id: &str) {
        self.in_flight.remove(id);
        self.seen.insert(id.to_string());
    }

    /// Persist failed; the next pass may retry.
    pub fn release(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Forget everything and re-enter the snapshot phase.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.in_flight.clear();
        self.snapshot_consumed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_marks_everything_seen() {
        let mut tracker = PersistenceTracker::new();
        let messages = vec![
            StreamMessage::user("u1", "a"),
            StreamMessage::assistant("a1", "b"),
            StreamMessage::user("u2", "c"),
        ];

        assert!(!tracker.snapshot_consumed());
        assert_eq!(tracker.consume_snapshot(&messages), 3);
        assert!(tracker.snapshot_consumed());
        assert!(messages.iter().all(|m| tracker.is_seen(&m.id)));
    }

    #[test]
    fn test_claim_complete_release() {
        let mut tracker = PersistenceTracker::new();

        assert!(tracker.claim("m1"));
        assert!(!tracker.claim("m1"));
        assert!(tracker.is_in_flight("m1"));

        tracker.release("m1");
        assert!(tracker.is_pending("m1"));

        assert!(tracker.claim("m1"));
        tracker.complete("m1");
        assert!(tracker.is_seen("m1"));
        assert!(!tracker.claim("m1"));
    }

    #[test]
    fn test_reset() {
        let mut tracker = PersistenceTracker::new();
        tracker.consume_snapshot(&[StreamMessage::user("u1", "a")]);
        tracker.claim("u2");

        tracker.reset();

        assert!(!tracker.snapshot_consumed());
        assert_eq!(tracker.seen_count(), 0);
        assert!(tracker.is_pending("u2"));
    }
}
