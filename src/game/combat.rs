//! Authoritative Combat State
//!
//! The canonical per-session record. Only the owning node may call the
//! mutators; each one checks the caller first and returns the change set to
//! broadcast. Cross-record effects (damaging someone else's monster) never go
//! through here directly; see `network::node` for the request protocol.

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::identity::{NodeId, SessionId};
use crate::core::version::{Field, FieldVersions};
use crate::game::card::{encode_hand, Card};
use crate::game::error::ActionError;
use crate::game::hand::{HandEngine, HandError};
use crate::game::monster::{DamageOutcome, Monster};
use crate::game::replica::{push_change, CombatView, FieldChange, FieldValue};

/// Combat tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Player health at match start.
    pub max_health: u32,
    /// Energy refilled each turn.
    pub max_energy: u32,
    /// Score granted for defeating a monster.
    pub defeat_score: u32,
    /// Ticks an in-flight request may wait for its response.
    pub request_timeout_ticks: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_health: 50,
            max_energy: 3,
            defeat_score: 1,
            request_timeout_ticks: 900, // 15 seconds @ 60Hz
        }
    }
}

impl From<HandError> for ActionError {
    fn from(err: HandError) -> Self {
        match err {
            HandError::Exhausted => ActionError::OutOfCards,
            HandError::InvalidIndex { index, len } => ActionError::InvalidCardIndex { index, len },
        }
    }
}

/// Authoritative record for one session.
#[derive(Debug, Clone)]
pub struct CombatState {
    session: SessionId,
    owner: NodeId,
    health: u32,
    max_health: u32,
    energy: u32,
    max_energy: u32,
    score: u32,
    fight_complete: bool,
    hand: HandEngine,
    monster: Monster,
    versions: FieldVersions,
}

impl CombatState {
    /// Create a record at full health and energy.
    pub fn new(
        session: SessionId,
        owner: NodeId,
        config: &CombatConfig,
        hand: HandEngine,
        monster: Monster,
    ) -> Self {
        let mut versions = FieldVersions::new();
        // Every field starts at version 1 so the spawn snapshot is accepted
        for field in Field::ALL {
            versions.bump(field);
        }

        Self {
            session,
            owner,
            health: config.max_health,
            max_health: config.max_health,
            energy: config.max_energy,
            max_energy: config.max_energy,
            score: 0,
            fight_complete: false,
            hand,
            monster,
            versions,
        }
    }

    /// Reject callers that are not the owner.
    pub fn check_authority(&self, caller: NodeId) -> Result<(), ActionError> {
        if caller != self.owner {
            warn!(
                "Authority violation: {} tried to mutate session {} owned by {}",
                caller, self.session, self.owner
            );
            return Err(ActionError::NotAuthority {
                session: self.session,
                caller,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Stat mutations
    // =========================================================================

    /// Add `delta` to health, clamped to `[0, max_health]`.
    pub fn modify_health(&mut self, caller: NodeId, delta: i32) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        let next = clamp_add(self.health, delta, self.max_health);
        if next == self.health {
            return Ok(Vec::new());
        }
        self.health = next;
        Ok(vec![self.change(Field::Health)])
    }

    /// Add `delta` to energy, clamped to `[0, max_energy]`.
    pub fn modify_energy(&mut self, caller: NodeId, delta: i32) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        let next = clamp_add(self.energy, delta, self.max_energy);
        if next == self.energy {
            return Ok(Vec::new());
        }
        self.energy = next;
        Ok(vec![self.change(Field::Energy)])
    }

    /// Add to score. Score never decreases.
    pub fn increase_score(&mut self, caller: NodeId, amount: u32) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        if amount == 0 {
            return Ok(Vec::new());
        }
        self.score = self.score.saturating_add(amount);
        Ok(vec![self.change(Field::Score)])
    }

    /// Set the fight-complete flag.
    pub fn set_fight_complete(&mut self, caller: NodeId, complete: bool) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        if self.fight_complete == complete {
            return Ok(Vec::new());
        }
        self.fight_complete = complete;
        Ok(vec![self.change(Field::FightComplete)])
    }

    // =========================================================================
    // Cards
    // =========================================================================

    /// Deal the opening hand.
    pub fn deal_opening_hand(&mut self, caller: NodeId) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        self.hand.shuffle_deck();
        let drawn = self.hand.draw_to_hand_size();
        debug!("Dealt {} cards to {}", drawn, self.session);
        Ok(vec![self.change(Field::Hand)])
    }

    /// Check that the card at `index` may be played right now.
    pub fn validate_play(&self, caller: NodeId, index: usize, turn_active: bool) -> Result<&Card, ActionError> {
        self.check_authority(caller)?;

        let card = self.hand.get(index).ok_or(ActionError::InvalidCardIndex {
            index,
            len: self.hand.hand().len(),
        })?;

        if card.cost as u32 > self.energy {
            return Err(ActionError::InsufficientEnergy {
                cost: card.cost as u32,
                available: self.energy,
            });
        }

        if !turn_active {
            return Err(ActionError::NotYourTurn(self.session));
        }

        Ok(card)
    }

    /// Pay for a resolved card and move it out of the hand.
    ///
    /// The card is located by name, starting from `index_hint`, so a hand that
    /// shifted while a request was in flight still resolves the right card.
    pub fn commit_play(
        &mut self,
        caller: NodeId,
        card_name: &str,
        index_hint: usize,
    ) -> Result<(Card, Vec<FieldChange>), ActionError> {
        self.check_authority(caller)?;

        let index = match self.hand.get(index_hint) {
            Some(c) if c.name == card_name => index_hint,
            _ => self.hand.position_of(card_name).ok_or(ActionError::InvalidCardIndex {
                index: index_hint,
                len: self.hand.hand().len(),
            })?,
        };

        let card = self.hand.play_card(index)?;
        self.energy = self.energy.saturating_sub(card.cost as u32);

        let mut changes = Vec::new();
        push_change(&mut changes, self.change(Field::Energy));
        push_change(&mut changes, self.change(Field::Hand));
        Ok((card, changes))
    }

    /// Apply a card's effects on the own side: block and heal on the monster,
    /// draw and energy gain on the player.
    pub fn apply_own_effects(&mut self, caller: NodeId, card: &Card) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        let mut changes = Vec::new();

        if card.block > 0 || card.heal > 0 {
            self.monster.add_block(card.block as u32);
            self.monster.heal(card.heal as u32);
            push_change(&mut changes, self.change(Field::Monster));
        }

        if card.energy_gain > 0 {
            self.energy = (self.energy + card.energy_gain as u32).min(self.max_energy);
            push_change(&mut changes, self.change(Field::Energy));
        }

        if card.draw > 0 {
            self.hand.draw(card.draw as usize);
            push_change(&mut changes, self.change(Field::Hand));
        }

        Ok(changes)
    }

    /// Damage this record's own monster.
    pub fn receive_damage(
        &mut self,
        caller: NodeId,
        amount: u32,
    ) -> Result<(DamageOutcome, Vec<FieldChange>), ActionError> {
        self.check_authority(caller)?;
        let outcome = self.monster.take_damage(amount);
        let changes = if outcome.blocked > 0 || outcome.dealt > 0 {
            vec![self.change(Field::Monster)]
        } else {
            Vec::new()
        };
        Ok((outcome, changes))
    }

    /// Start of this session's turn: refill energy, drop block, new hand.
    pub fn begin_turn(&mut self, caller: NodeId) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        let mut changes = Vec::new();

        if self.energy != self.max_energy {
            self.energy = self.max_energy;
            push_change(&mut changes, self.change(Field::Energy));
        }

        if self.monster.block > 0 {
            self.monster.clear_block();
            push_change(&mut changes, self.change(Field::Monster));
        }

        self.hand.prepare_for_new_round();
        push_change(&mut changes, self.change(Field::Hand));

        Ok(changes)
    }

    /// Restore saved health and monster after a rejoin.
    pub fn restore(
        &mut self,
        caller: NodeId,
        health: u32,
        monster: Option<Monster>,
    ) -> Result<Vec<FieldChange>, ActionError> {
        self.check_authority(caller)?;
        let mut changes = Vec::new();

        self.health = health.min(self.max_health);
        push_change(&mut changes, self.change(Field::Health));

        if let Some(saved) = monster {
            let health = saved.health;
            self.monster = saved;
            self.monster.set_health(health);
            push_change(&mut changes, self.change(Field::Monster));
        }

        Ok(changes)
    }

    // =========================================================================
    // Replication
    // =========================================================================

    fn value_of(&self, field: Field) -> FieldValue {
        match field {
            Field::Health => FieldValue::Health(self.health),
            Field::MaxHealth => FieldValue::MaxHealth(self.max_health),
            Field::Energy => FieldValue::Energy(self.energy),
            Field::MaxEnergy => FieldValue::MaxEnergy(self.max_energy),
            Field::Score => FieldValue::Score(self.score),
            Field::Hand => FieldValue::Hand(encode_hand(self.hand.hand())),
            Field::Monster => FieldValue::Monster(self.monster.snapshot()),
            Field::FightComplete => FieldValue::FightComplete(self.fight_complete),
        }
    }

    fn change(&mut self, field: Field) -> FieldChange {
        let version = self.versions.bump(field);
        FieldChange {
            version,
            value: self.value_of(field),
        }
    }

    /// Every field at its current version.
    pub fn full_snapshot(&self) -> Vec<FieldChange> {
        Field::ALL
            .iter()
            .map(|f| FieldChange {
                version: self.versions.get(*f),
                value: self.value_of(*f),
            })
            .collect()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Session this record belongs to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Node allowed to mutate this record.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Own monster.
    pub fn monster(&self) -> &Monster {
        &self.monster
    }

    /// Deck/hand/discard state.
    pub fn hand_engine(&self) -> &HandEngine {
        &self.hand
    }

    /// Current field versions.
    pub fn versions(&self) -> &FieldVersions {
        &self.versions
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
            hand: self.hand.hand(),
            monster: Some(&self.monster),
            fight_complete: self.fight_complete,
        }
    }
}

/// `value + delta`, clamped to `[0, max]`.
fn clamp_add(value: u32, delta: i32, max: u32) -> u32 {
    let next = value as i64 + delta as i64;
    next.clamp(0, max as i64) as u32
}
