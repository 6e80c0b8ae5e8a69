//! Replicated Combat Fields
//!
//! Change sets flowing from an authority to its observers, and the
//! read-only replica observers keep.
//!
//! A replica applies a change only if its version is newer than the last one
//! it saw. Duplicate deliveries are dropped and per-record FIFO order is kept.

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::hash::{StateHash, StateHasher};
use crate::core::identity::{NodeId, SessionId};
use crate::core::version::{Field, FieldVersions};
use crate::game::card::{decode_hand, Card, NetCard};
use crate::game::monster::Monster;

/// Value of one replicated field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Player health.
    Health(u32),
    /// Player health ceiling.
    MaxHealth(u32),
    /// Energy.
    Energy(u32),
    /// Energy ceiling.
    MaxEnergy(u32),
    /// Score.
    Score(u32),
    /// Hand in network-safe form.
    Hand(Vec<NetCard>),
    /// Monster mirror.
    Monster(Monster),
    /// Fight finished this round.
    FightComplete(bool),
}

impl FieldValue {
    /// Which field this value belongs to.
    pub fn field(&self) -> Field {
        match self {
            FieldValue::Health(_) => Field::Health,
            FieldValue::MaxHealth(_) => Field::MaxHealth,
            FieldValue::Energy(_) => Field::Energy,
            FieldValue::MaxEnergy(_) => Field::MaxEnergy,
            FieldValue::Score(_) => Field::Score,
            FieldValue::Hand(_) => Field::Hand,
            FieldValue::Monster(_) => Field::Monster,
            FieldValue::FightComplete(_) => Field::FightComplete,
        }
    }
}

/// A versioned field write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Authority-side version after the write.
    pub version: u64,
    /// New value.
    pub value: FieldValue,
}

/// Push a change, replacing an earlier change to the same field.
pub fn push_change(changes: &mut Vec<FieldChange>, change: FieldChange) {
    let field = change.value.field();
    changes.retain(|c| c.value.field() != field);
    changes.push(change);
}

/// Borrowed read access shared by owned records and replicas.
#[derive(Debug, Clone, Copy)]
pub struct CombatView<'a> {
    /// Session the record belongs to.
    pub session: SessionId,
    /// Player health.
    pub health: u32,
    /// Player health ceiling.
    pub max_health: u32,
    /// Energy.
    pub energy: u32,
    /// Energy ceiling.
    pub max_energy: u32,
    /// Score.
    pub score: u32,
    /// Cards in hand.
    pub hand: &'a [Card],
    /// Monster mirror (None until replicated).
    pub monster: Option<&'a Monster>,
    /// Fight finished this round.
    pub fight_complete: bool,
}

impl CombatView<'_> {
    /// Hash of every replicated field.
    pub fn state_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_combat_record();
        hasher.update_uuid(self.session.as_bytes());
        hasher.update_u32(self.health);
        hasher.update_u32(self.max_health);
        hasher.update_u32(self.energy);
        hasher.update_u32(self.max_energy);
        hasher.update_u32(self.score);

        hasher.update_u32(self.hand.len() as u32);
        for card in self.hand {
            hasher.update_str(&card.name);
        }

        hasher.update_bool(self.monster.is_some());
        if let Some(m) = self.monster {
            hasher.update_str(&m.name);
            hasher.update_u32(m.health);
            hasher.update_u32(m.max_health);
            hasher.update_u32(m.attack);
            hasher.update_u32(m.defense);
            hasher.update_u32(m.block);
        }

        hasher.update_bool(self.fight_complete);
        hasher.finalize()
    }
}

/// Read-only copy of a record owned by another node.
#[derive(Debug, Clone)]
pub struct CombatReplica {
    session: SessionId,
    authority: NodeId,
    health: u32,
    max_health: u32,
    energy: u32,
    max_energy: u32,
    score: u32,
    hand: Vec<Card>,
    monster: Option<Monster>,
    fight_complete: bool,
    seen: FieldVersions,
}

impl CombatReplica {
    /// Empty replica, filled by the first snapshot.
    pub fn new(session: SessionId, authority: NodeId) -> Self {
        Self {
            session,
            authority,
            health: 0,
            max_health: 0,
            energy: 0,
            max_energy: 0,
            score: 0,
            hand: Vec::new(),
            monster: None,
            fight_complete: false,
            seen: FieldVersions::new(),
        }
    }

    /// Apply a change if it is newer than what this replica has seen.
    pub fn apply(&mut self, change: &FieldChange) -> bool {
        let field = change.value.field();
        if change.version <= self.seen.get(field) {
            return false;
        }
        if !self.write(&change.value) {
            return false;
        }
        self.seen.observe(field, change.version)
    }

    /// Apply a change regardless of version (resync).
    pub fn apply_forced(&mut self, change: &FieldChange) {
        if self.write(&change.value) {
            self.seen.force(change.value.field(), change.version);
        }
    }

    fn write(&mut self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Health(v) => self.health = *v,
            FieldValue::MaxHealth(v) => self.max_health = *v,
            FieldValue::Energy(v) => self.energy = *v,
            FieldValue::MaxEnergy(v) => self.max_energy = *v,
            FieldValue::Score(v) => self.score = *v,
            FieldValue::Hand(cards) => match decode_hand(cards.clone()) {
                Ok(hand) => self.hand = hand,
                Err(e) => {
                    warn!("Dropping malformed hand for {}: {}", self.session, e);
                    return false;
                }
            },
            FieldValue::Monster(m) => self.monster = Some(m.clone()),
            FieldValue::FightComplete(v) => self.fight_complete = *v,
        }
        true
    }

    /// Session this replica mirrors.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Node currently authoritative for the record.
    pub fn authority(&self) -> NodeId {
        self.authority
    }

    /// Record a new authority (e.g. after a migration).
    pub fn set_authority(&mut self, authority: NodeId) {
        self.authority = authority;
    }

    /// Last-seen versions.
    pub fn versions(&self) -> &FieldVersions {
        &self.seen
    }

    /// Mirrored monster.
    pub fn monster(&self) -> Option<&Monster> {
        self.monster.as_ref()
    }

    /// Read access.
    pub fn view(&self) -> CombatView<'_> {
        CombatView {
            session: self.session,
            health: self.health,
            max_health: self.max_health,
            energy: self.energy,
            max_energy: self.max_energy,
            score: self.score,
            hand: &self.hand,
            monster: self.monster.as_ref(),
            fight_complete: self.fight_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::Color;
    use crate::game::catalog;

    fn replica() -> CombatReplica {
        CombatReplica::new(SessionId::new([7; 16]), NodeId(2))
    }

    #[test]
    fn test_apply_is_version_gated() {
        let mut r = replica();
        let change = FieldChange { version: 2, value: FieldValue::Health(30) };

        assert!(r.apply(&change));
        assert_eq!(r.view().health, 30);

        // Duplicate delivery
        assert!(!r.apply(&change));

        // Stale write loses
        assert!(!r.apply(&FieldChange { version: 1, value: FieldValue::Health(99) }));
        assert_eq!(r.view().health, 30);
    }

    #[test]
    fn test_hand_decoded_from_net_form() {
        let mut r = replica();
        let hand = vec![catalog::strike(), catalog::defend()];
        let net = hand.iter().map(NetCard::from).collect();
        assert!(r.apply(&FieldChange { version: 1, value: FieldValue::Hand(net) }));
        assert_eq!(r.view().hand, hand.as_slice());
    }

    #[test]
    fn test_malformed_hand_is_dropped() {
        let mut r = replica();
        let mut bad = NetCard::from(&catalog::strike());
        bad.card_type = 200;
        assert!(!r.apply(&FieldChange { version: 1, value: FieldValue::Hand(vec![bad]) }));
        assert_eq!(r.versions().get(Field::Hand), 0);
    }

    #[test]
    fn test_forced_apply_overrides_versions() {
        let mut r = replica();
        r.apply(&FieldChange { version: 5, value: FieldValue::Score(3) });
        r.apply_forced(&FieldChange { version: 4, value: FieldValue::Score(2) });
        assert_eq!(r.view().score, 2);
        assert_eq!(r.versions().get(Field::Score), 4);
    }

    #[test]
    fn test_push_change_keeps_latest_per_field() {
        let mut changes = Vec::new();
        push_change(&mut changes, FieldChange { version: 1, value: FieldValue::Energy(3) });
        push_change(&mut changes, FieldChange { version: 1, value: FieldValue::Score(1) });
        push_change(&mut changes, FieldChange { version: 2, value: FieldValue::Energy(2) });

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1], FieldChange { version: 2, value: FieldValue::Energy(2) });
    }

    #[test]
    fn test_state_hash_tracks_monster() {
        let mut r = replica();
        let before = r.view().state_hash();
        let m = crate::game::monster::Monster::new("Slime", Color::default(), 10, 1, 1);
        r.apply(&FieldChange { version: 1, value: FieldValue::Monster(m) });
        assert_ne!(before, r.view().state_hash());
    }
}
