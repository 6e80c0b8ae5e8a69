//! Per-Field Version Counters
//!
//! Change detection without snapshot diffing. The authority bumps a field's
//! counter on every write; an observer remembers the last version it acted on
//! and compares counters to decide what changed.

use serde::{Serialize, Deserialize};

/// Replicated fields of a combat record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Field {
    /// Player health.
    Health = 0,
    /// Player health ceiling.
    MaxHealth = 1,
    /// Energy available this turn.
    Energy = 2,
    /// Energy ceiling.
    MaxEnergy = 3,
    /// Accumulated score.
    Score = 4,
    /// Cards in hand.
    Hand = 5,
    /// Monster mirror fields.
    Monster = 6,
    /// Whether this session finished its fight this round.
    FightComplete = 7,
}

impl Field {
    /// Number of fields.
    pub const COUNT: usize = 8;

    /// All fields in index order.
    pub const ALL: [Field; Field::COUNT] = [
        Field::Health,
        Field::MaxHealth,
        Field::Energy,
        Field::MaxEnergy,
        Field::Score,
        Field::Hand,
        Field::Monster,
        Field::FightComplete,
    ];

    /// Whether the field feeds the `StatsChanged` notification.
    pub fn is_stat(self) -> bool {
        matches!(
            self,
            Field::Health | Field::MaxHealth | Field::Energy | Field::MaxEnergy | Field::Score
        )
    }
}

/// Version vector over [`Field`].
///
/// Version 0 means "never written".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldVersions {
    versions: [u64; Field::COUNT],
}

impl FieldVersions {
    /// All fields unwritten.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a field.
    #[inline]
    pub fn get(&self, field: Field) -> u64 {
        self.versions[field as usize]
    }

    /// Bump a field and return its new version.
    pub fn bump(&mut self, field: Field) -> u64 {
        let slot = &mut self.versions[field as usize];
        *slot += 1;
        *slot
    }

    /// Record that `version` of `field` was observed.
    ///
    /// Returns false (and leaves the vector unchanged) for stale or duplicate
    /// versions.
    pub fn observe(&mut self, field: Field, version: u64) -> bool {
        let slot = &mut self.versions[field as usize];
        if version <= *slot {
            return false;
        }
        *slot = version;
        true
    }

    /// Overwrite a field's version unconditionally.
    pub fn force(&mut self, field: Field, version: u64) {
        self.versions[field as usize] = version;
    }

    /// Fields whose version moved past `last_seen`.
    pub fn changed_since(&self, last_seen: &FieldVersions) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| self.get(*f) != last_seen.get(*f))
            .collect()
    }
}
