//! Fixed Card and Monster Catalog

use crate::core::identity::Color;
use crate::core::rng::DeterministicRng;
use crate::game::card::{Card, CardTarget, CardType};
use crate::game::monster::Monster;

/// Every card in the game.
pub fn all_cards() -> Vec<Card> {
    vec![
        strike(),
        defend(),
        bash(),
        cleave(),
        bandage(),
        adrenaline(),
        thunderclap(),
        fortify(),
        phantom_slash(),
    ]
}

/// Look up a card by name.
pub fn card(name: &str) -> Option<Card> {
    all_cards().into_iter().find(|c| c.name == name)
}

/// Basic single-target attack.
pub fn strike() -> Card {
    Card::new("Strike", 1, CardType::Attack, CardTarget::Enemy).with_damage(6)
}

/// Basic block.
pub fn defend() -> Card {
    Card::new("Defend", 1, CardType::Skill, CardTarget::SelfTarget).with_block(5)
}

/// Heavy single-target attack.
pub fn bash() -> Card {
    Card::new("Bash", 2, CardType::Attack, CardTarget::Enemy).with_damage(10)
}

/// Hits every opponent.
pub fn cleave() -> Card {
    Card::new("Cleave", 1, CardType::Attack, CardTarget::AllEnemies).with_damage(5)
}

/// One-shot heal.
pub fn bandage() -> Card {
    Card::new("Bandage", 0, CardType::Skill, CardTarget::SelfTarget)
        .with_heal(4)
        .exhausting()
}

/// Draw and energy.
pub fn adrenaline() -> Card {
    Card::new("Adrenaline", 0, CardType::Skill, CardTarget::SelfTarget)
        .with_draw(2)
        .with_energy_gain(1)
        .exhausting()
}

/// Damages everyone else and shields the caster.
pub fn thunderclap() -> Card {
    Card::new("Thunderclap", 1, CardType::Attack, CardTarget::All)
        .with_damage(4)
        .with_block(3)
}

/// Large block.
pub fn fortify() -> Card {
    Card::new("Fortify", 2, CardType::Power, CardTarget::SelfTarget).with_block(12)
}

/// Cheap attack that fades if held.
pub fn phantom_slash() -> Card {
    Card::new("Phantom Slash", 0, CardType::Attack, CardTarget::Enemy)
        .with_damage(4)
        .ethereal()
}

/// Twelve-card deck every session starts with.
pub fn starter_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(12);
    deck.extend(std::iter::repeat_with(strike).take(5));
    deck.extend(std::iter::repeat_with(defend).take(4));
    deck.push(bash());
    deck.push(cleave());
    deck.push(bandage());
    deck
}

/// Starter monster templates: (name, max health, attack, defense).
pub const STARTER_MONSTERS: [(&str, u32, u32, u32); 4] = [
    ("Emberling", 30, 4, 1),
    ("Tidecaller", 34, 3, 2),
    ("Mossback", 40, 2, 3),
    ("Voltwing", 28, 5, 0),
];

/// Pick a starter monster for a session.
pub fn starter_monster(rng: &mut DeterministicRng, color: Color) -> Monster {
    let index = rng.next_int(STARTER_MONSTERS.len() as u32) as usize;
    let (name, max_health, attack, defense) = STARTER_MONSTERS[index];
    Monster::new(name, color, max_health, attack, defense)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_catalog_names_unique() {
        let names: BTreeSet<String> = all_cards().into_iter().map(|c| c.name).collect();
        assert_eq!(names.len(), all_cards().len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(card("Strike"), Some(strike()));
        assert!(card("Nope").is_none());
    }

    #[test]
    fn test_starter_deck_size() {
        assert_eq!(starter_deck().len(), 12);
    }

    #[test]
    fn test_starter_monster_is_deterministic() {
        let color = Color::from_index(1);
        let a = starter_monster(&mut DeterministicRng::new(5), color);
        let b = starter_monster(&mut DeterministicRng::new(5), color);
        assert_eq!(a, b);
        assert_eq!(a.color, color);
        assert_eq!(a.health, a.max_health);
    }
}
