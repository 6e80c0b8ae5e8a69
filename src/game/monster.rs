//! Monster Model and Projection
//!
//! Each session owns exactly one authoritative [`Monster`]. Everyone else
//! sees it through a [`MonsterProjection`], which is only ever rebuilt from
//! replicated fields and exposes no mutators.

use serde::{Serialize, Deserialize};

use crate::core::identity::Color;

/// Result of applying damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Damage soaked by block.
    pub blocked: u32,
    /// Damage that reached health.
    pub dealt: u32,
    /// Health went from positive to zero with this hit.
    pub defeated_now: bool,
}

/// A creature fighting for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    /// Display name.
    pub name: String,
    /// Tint, matches the owning session.
    pub color: Color,
    /// Current health.
    pub health: u32,
    /// Health ceiling.
    pub max_health: u32,
    /// Attack stat.
    pub attack: u32,
    /// Defense stat.
    pub defense: u32,
    /// Temporary damage absorption, cleared at turn start.
    pub block: u32,
}

impl Monster {
    /// Create a monster at full health.
    pub fn new(name: &str, color: Color, max_health: u32, attack: u32, defense: u32) -> Self {
        Self {
            name: name.to_string(),
            color,
            health: max_health,
            max_health,
            attack,
            defense,
            block: 0,
        }
    }

    /// Apply damage, block absorbed first, health clamped at zero.
    pub fn take_damage(&mut self, amount: u32) -> DamageOutcome {
        let was_alive = self.health > 0;

        let blocked = amount.min(self.block);
        self.block -= blocked;

        let remaining = amount - blocked;
        let dealt = remaining.min(self.health);
        self.health -= dealt;

        DamageOutcome {
            blocked,
            dealt,
            defeated_now: was_alive && self.health == 0,
        }
    }

    /// Add block.
    pub fn add_block(&mut self, amount: u32) {
        self.block = self.block.saturating_add(amount);
    }

    /// Drop all block.
    pub fn clear_block(&mut self) {
        self.block = 0;
    }

    /// Restore health, clamped at max.
    pub fn heal(&mut self, amount: u32) {
        self.health = self.health.saturating_add(amount).min(self.max_health);
    }

    /// Clamp-and-set, used when restoring saved values.
    pub fn set_health(&mut self, value: u32) {
        self.health = value.min(self.max_health);
    }

    /// Health reached zero.
    #[inline]
    pub fn is_defeated(&self) -> bool {
        self.health == 0
    }

    /// Copy for replication.
    pub fn snapshot(&self) -> Monster {
        self.clone()
    }
}

/// Read-only mirror of a remote monster.
#[derive(Debug, Default, Clone)]
pub struct MonsterProjection {
    current: Option<Monster>,
}

impl MonsterProjection {
    /// Empty projection (nothing replicated yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the latest replicated snapshot.
    ///
    /// Returns true only if the visible state changed, so repeated rebuilds
    /// from the same input never trigger a second notification.
    pub fn rebuild(&mut self, snapshot: &Monster) -> bool {
        if self.current.as_ref() == Some(snapshot) {
            return false;
        }
        self.current = Some(snapshot.clone());
        true
    }

    /// Current mirrored state.
    pub fn get(&self) -> Option<&Monster> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slime() -> Monster {
        Monster::new("Slime", Color::rgb(0, 200, 0), 20, 3, 1)
    }

    #[test]
    fn test_block_absorbs_first() {
        let mut m = slime();
        m.add_block(5);
        let out = m.take_damage(8);
        assert_eq!(out.blocked, 5);
        assert_eq!(out.dealt, 3);
        assert_eq!(m.health, 17);
        assert_eq!(m.block, 0);
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut m = slime();
        let out = m.take_damage(100);
        assert_eq!(m.health, 0);
        assert_eq!(out.dealt, 20);
        assert!(out.defeated_now);
        assert!(m.is_defeated());

        // Hitting a defeated monster is not a second defeat
        let again = m.take_damage(5);
        assert!(!again.defeated_now);
    }

    #[test]
    fn test_heal_clamps_at_max() {
        let mut m = slime();
        m.take_damage(5);
        m.heal(50);
        assert_eq!(m.health, m.max_health);
    }

    #[test]
    fn test_set_health_clamps() {
        let mut m = slime();
        m.set_health(999);
        assert_eq!(m.health, 20);
        m.set_health(4);
        assert_eq!(m.health, 4);
    }

    #[test]
    fn test_projection_rebuild_is_idempotent() {
        let mut projection = MonsterProjection::new();
        let snap = slime();

        assert!(projection.rebuild(&snap));
        let first = projection.get().cloned();
        assert!(!projection.rebuild(&snap));
        assert_eq!(projection.get().cloned(), first);

        let mut hurt = snap.clone();
        hurt.take_damage(2);
        assert!(projection.rebuild(&hurt));
        assert_eq!(projection.get().map(|m| m.health), Some(18));
    }
}
