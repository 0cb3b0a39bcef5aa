//! Counter identity assignment for employee screens.
//!
//! Ids are small, dense, and reused: a new registration always takes the
//! lowest id no live session holds, so counter numbers on the public
//! display stay stable and human-sized across reconnects.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

/// Tracks which session holds which counter id.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    assignments: HashMap<Uuid, u32>,
    in_use: BTreeSet<u32>,
}

impl CounterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the lowest free counter id to a session.
    ///
    /// Idempotent: registering twice returns the id already held.
    pub fn assign(&mut self, session_id: Uuid) -> u32 {
        if let Some(&held) = self.assignments.get(&session_id) {
            return held;
        }
        let mut candidate = 1u32;
        for &taken in &self.in_use {
            if taken != candidate {
                break;
            }
            candidate += 1;
        }
        self.assignments.insert(session_id, candidate);
        self.in_use.insert(candidate);
        candidate
    }

    /// Release whatever id the session holds, returning it if there was one.
    pub fn release(&mut self, session_id: Uuid) -> Option<u32> {
        let freed = self.assignments.remove(&session_id)?;
        self.in_use.remove(&freed);
        Some(freed)
    }

    /// Whether the session may act as the given counter.
    ///
    /// Sessions that never registered as employees carry no assignment and
    /// are allowed through; the queue store still enforces ticket ownership
    /// for them.
    pub fn authorize(&self, session_id: Uuid, counter_id: u32) -> bool {
        match self.assignments.get(&session_id) {
            Some(&held) => held == counter_id,
            None => true,
        }
    }

    /// The id currently held by a session, if any.
    pub fn assignment(&self, session_id: Uuid) -> Option<u32> {
        self.assignments.get(&session_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_starting_at_one() {
        let mut registry = CounterRegistry::new();
        assert_eq!(registry.assign(Uuid::new_v4()), 1);
        assert_eq!(registry.assign(Uuid::new_v4()), 2);
        assert_eq!(registry.assign(Uuid::new_v4()), 3);
    }

    #[test]
    fn assignment_is_idempotent_per_session() {
        let mut registry = CounterRegistry::new();
        let session = Uuid::new_v4();
        assert_eq!(registry.assign(session), 1);
        assert_eq!(registry.assign(session), 1);
        assert_eq!(registry.assign(Uuid::new_v4()), 2);
    }

    #[test]
    fn released_ids_fill_the_lowest_gap_first() {
        let mut registry = CounterRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.assign(first);
        registry.assign(second);
        registry.assign(Uuid::new_v4());

        assert_eq!(registry.release(second), Some(2));
        assert_eq!(registry.assign(Uuid::new_v4()), 2);
        assert_eq!(registry.assign(Uuid::new_v4()), 4);
    }

    #[test]
    fn release_is_idempotent() {
        let mut registry = CounterRegistry::new();
        let session = Uuid::new_v4();
        registry.assign(session);
        assert_eq!(registry.release(session), Some(1));
        assert_eq!(registry.release(session), None);
    }

    #[test]
    fn sessions_may_only_act_as_their_own_counter() {
        let mut registry = CounterRegistry::new();
        let desk = Uuid::new_v4();
        registry.assign(desk);
        assert!(registry.authorize(desk, 1));
        assert!(!registry.authorize(desk, 2));
    }

    #[test]
    fn unregistered_sessions_pass_authorization() {
        let registry = CounterRegistry::new();
        assert!(registry.authorize(Uuid::new_v4(), 7));
    }
}
