//! Card Values
//!
//! Cards are immutable values drawn from a fixed catalog. The network-safe
//! form ([`NetCard`]) flattens enums into codes and booleans into a flag byte
//! so the hand can travel inside replication updates.

use serde::{Serialize, Deserialize};
use thiserror::Error;

// =============================================================================
// CARD TYPES
// =============================================================================

/// Card category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CardType {
    /// Deals damage.
    Attack = 0,
    /// Utility: block, heal, draw.
    Skill = 1,
    /// Lasting buffs.
    Power = 2,
}

impl CardType {
    /// Get from code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CardType::Attack),
            1 => Some(CardType::Skill),
            2 => Some(CardType::Power),
            _ => None,
        }
    }
}

/// What a card may be aimed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CardTarget {
    /// The player's own monster.
    SelfTarget = 0,
    /// A single opponent monster.
    Enemy = 1,
    /// Every opponent monster.
    AllEnemies = 2,
    /// Own monster and every opponent monster.
    All = 3,
}

impl CardTarget {
    /// Get from code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CardTarget::SelfTarget),
            1 => Some(CardTarget::Enemy),
            2 => Some(CardTarget::AllEnemies),
            3 => Some(CardTarget::All),
            _ => None,
        }
    }

    /// Whether the card may be aimed at the player's own monster.
    pub fn allows_own(self) -> bool {
        matches!(self, CardTarget::SelfTarget | CardTarget::All)
    }

    /// Whether the card may be aimed at an opponent monster.
    pub fn allows_opponent(self) -> bool {
        !matches!(self, CardTarget::SelfTarget)
    }

    /// Whether damage spreads to every opponent.
    pub fn hits_all_opponents(self) -> bool {
        matches!(self, CardTarget::AllEnemies | CardTarget::All)
    }
}

// =============================================================================
// CARD
// =============================================================================

/// A playable card.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// Display name (unique within the catalog).
    pub name: String,
    /// Energy cost.
    pub cost: u8,
    /// Category.
    pub card_type: CardType,
    /// Target class.
    pub target: CardTarget,
    /// Damage dealt to each targeted opponent monster.
    pub damage: u16,
    /// Block added to the own monster.
    pub block: u16,
    /// Health restored to the own monster.
    pub heal: u16,
    /// Cards drawn on play.
    pub draw: u8,
    /// Energy gained on play.
    pub energy_gain: u8,
    /// Removed from the combat after play.
    pub exhaust: bool,
    /// Exhausted if still in hand when the round ends.
    pub ethereal: bool,
}

impl Card {
    /// Create a card with no effects.
    pub fn new(name: &str, cost: u8, card_type: CardType, target: CardTarget) -> Self {
        Self {
            name: name.to_string(),
            cost,
            card_type,
            target,
            damage: 0,
            block: 0,
            heal: 0,
            draw: 0,
            energy_gain: 0,
            exhaust: false,
            ethereal: false,
        }
    }

    /// Set damage.
    pub fn with_damage(mut self, damage: u16) -> Self {
        self.damage = damage;
        self
    }

    /// Set block.
    pub fn with_block(mut self, block: u16) -> Self {
        self.block = block;
        self
    }

    /// Set heal.
    pub fn with_heal(mut self, heal: u16) -> Self {
        self.heal = heal;
        self
    }

    /// Set draw count.
    pub fn with_draw(mut self, draw: u8) -> Self {
        self.draw = draw;
        self
    }

    /// Set energy gain.
    pub fn with_energy_gain(mut self, energy_gain: u8) -> Self {
        self.energy_gain = energy_gain;
        self
    }

    /// Mark as exhaust.
    pub fn exhausting(mut self) -> Self {
        self.exhaust = true;
        self
    }

    /// Mark as ethereal.
    pub fn ethereal(mut self) -> Self {
        self.ethereal = true;
        self
    }

    /// Whether playing this card changes the own side.
    pub fn has_own_effect(&self) -> bool {
        self.block > 0 || self.heal > 0 || self.draw > 0 || self.energy_gain > 0
    }
}

// =============================================================================
// NETWORK-SAFE FORM
// =============================================================================

/// Card decoding errors.
#[derive(Debug, Error)]
pub enum CardError {
    /// Card type code out of range.
    #[error("unknown card type code {0}")]
    UnknownType(u8),

    /// Target code out of range.
    #[error("unknown card target code {0}")]
    UnknownTarget(u8),

    /// Binary codec failure.
    #[error("card codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Flat, fixed-width card encoding for replication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetCard {
    /// Card name.
    pub name: String,
    /// Energy cost.
    pub cost: u8,
    /// [`CardType`] code.
    pub card_type: u8,
    /// [`CardTarget`] code.
    pub target: u8,
    /// Damage.
    pub damage: u16,
    /// Block.
    pub block: u16,
    /// Heal.
    pub heal: u16,
    /// Draw count.
    pub draw: u8,
    /// Energy gain.
    pub energy_gain: u8,
    /// Packed flags:
    /// - Bit 0: exhaust
    /// - Bit 1: ethereal
    pub flags: u8,
}

impl NetCard {
    /// Exhaust flag bit
    pub const FLAG_EXHAUST: u8 = 0x01;

    /// Ethereal flag bit
    pub const FLAG_ETHEREAL: u8 = 0x02;

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CardError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CardError> {
        Ok(bincode::deserialize(data)?)
    }
}

impl From<&Card> for NetCard {
    fn from(card: &Card) -> Self {
        let mut flags = 0;
        if card.exhaust {
            flags |= NetCard::FLAG_EXHAUST;
        }
        if card.ethereal {
            flags |= NetCard::FLAG_ETHEREAL;
        }

        Self {
            name: card.name.clone(),
            cost: card.cost,
            card_type: card.card_type as u8,
            target: card.target as u8,
            damage: card.damage,
            block: card.block,
            heal: card.heal,
            draw: card.draw,
            energy_gain: card.energy_gain,
            flags,
        }
    }
}

impl TryFrom<NetCard> for Card {
    type Error = CardError;

    fn try_from(net: NetCard) -> Result<Self, Self::Error> {
        let card_type = CardType::from_code(net.card_type)
            .ok_or(CardError::UnknownType(net.card_type))?;
        let target = CardTarget::from_code(net.target)
            .ok_or(CardError::UnknownTarget(net.target))?;

        Ok(Card {
            name: net.name,
            cost: net.cost,
            card_type,
            target,
            damage: net.damage,
            block: net.block,
            heal: net.heal,
            draw: net.draw,
            energy_gain: net.energy_gain,
            exhaust: net.flags & NetCard::FLAG_EXHAUST != 0,
            ethereal: net.flags & NetCard::FLAG_ETHEREAL != 0,
        })
    }
}

/// Convert a hand to its network-safe form.
pub fn encode_hand(cards: &[Card]) -> Vec<NetCard> {
    cards.iter().map(NetCard::from).collect()
}

/// Convert a replicated hand back, failing on the first malformed card.
pub fn decode_hand(cards: Vec<NetCard>) -> Result<Vec<Card>, CardError> {
    cards.into_iter().map(Card::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_card() -> impl Strategy<Value = Card> {
        (
            "[A-Za-z ]{1,16}",
            any::<u8>(),
            0u8..3,
            0u8..4,
            any::<u16>(),
            any::<u16>(),
            any::<u16>(),
            any::<u8>(),
            any::<u8>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(name, cost, ty, target, damage, block, heal, draw, energy_gain, exhaust, ethereal)| Card {
                name,
                cost,
                card_type: CardType::from_code(ty).unwrap(),
                target: CardTarget::from_code(target).unwrap(),
                damage,
                block,
                heal,
                draw,
                energy_gain,
                exhaust,
                ethereal,
            })
    }

    proptest! {
        #[test]
        fn prop_net_form_preserves_every_field(card in arb_card()) {
            let bytes = NetCard::from(&card).to_bytes().unwrap();
            let back = Card::try_from(NetCard::from_bytes(&bytes).unwrap()).unwrap();
            prop_assert_eq!(back, card);
        }
    }

    #[test]
    fn test_flags_packing() {
        let card = Card::new("Ghost Strike", 1, CardType::Attack, CardTarget::Enemy)
            .exhausting()
            .ethereal();
        let net = NetCard::from(&card);
        assert_eq!(net.flags, NetCard::FLAG_EXHAUST | NetCard::FLAG_ETHEREAL);
    }

    #[test]
    fn test_unknown_codes_rejected() {
        let mut net = NetCard::from(&Card::new("X", 0, CardType::Skill, CardTarget::SelfTarget));
        net.target = 9;
        assert!(matches!(Card::try_from(net.clone()), Err(CardError::UnknownTarget(9))));

        net.target = 0;
        net.card_type = 7;
        assert!(matches!(Card::try_from(net), Err(CardError::UnknownType(7))));
    }

    #[test]
    fn test_json_debug_form() {
        let card = Card::new("Strike", 1, CardType::Attack, CardTarget::Enemy).with_damage(6);
        let json = serde_json::to_string(&NetCard::from(&card)).unwrap();
        assert!(json.contains("\"damage\":6"));
    }

    #[test]
    fn test_target_compatibility() {
        assert!(CardTarget::SelfTarget.allows_own());
        assert!(!CardTarget::SelfTarget.allows_opponent());
        assert!(!CardTarget::Enemy.allows_own());
        assert!(CardTarget::All.allows_own() && CardTarget::All.allows_opponent());
        assert!(CardTarget::AllEnemies.hits_all_opponents());
        assert!(!CardTarget::Enemy.hits_all_opponents());
    }
}
