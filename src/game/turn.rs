//! Turn Tracking
//!
//! Local view of the external round arbiter's decisions. The arbiter itself
//! lives outside this crate; it tells us which sessions are active and when
//! a new round begins.

use std::collections::BTreeSet;

use crate::core::identity::SessionId;

/// Which sessions currently hold the turn, and the round number.
#[derive(Debug, Clone, Default)]
pub struct TurnTracker {
    active: BTreeSet<SessionId>,
    round: u32,
}

impl TurnTracker {
    /// Nobody active, round 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an activation change. Returns true if it changed anything.
    pub fn set_active(&mut self, session: SessionId, active: bool) -> bool {
        if active {
            self.active.insert(session)
        } else {
            self.active.remove(&session)
        }
    }

    /// Does `session` hold the turn?
    #[inline]
    pub fn is_active(&self, session: &SessionId) -> bool {
        self.active.contains(session)
    }

    /// Record a new round. Returns false for a repeated round number.
    pub fn start_round(&mut self, round: u32) -> bool {
        if round == self.round {
            return false;
        }
        self.round = round;
        true
    }

    /// Current round.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Forget a session (leave or despawn).
    pub fn remove(&mut self, session: &SessionId) {
        self.active.remove(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation() {
        let mut turns = TurnTracker::new();
        let a = SessionId::new([1; 16]);

        assert!(!turns.is_active(&a));
        assert!(turns.set_active(a, true));
        assert!(!turns.set_active(a, true));
        assert!(turns.is_active(&a));

        turns.remove(&a);
        assert!(!turns.is_active(&a));
    }

    #[test]
    fn test_round_changes_once() {
        let mut turns = TurnTracker::new();
        assert!(turns.start_round(1));
        assert!(!turns.start_round(1));
        assert_eq!(turns.round(), 1);
    }
}
