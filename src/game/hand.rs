//! Hand Engine
//!
//! Deck, hand, discard and exhaust piles owned by a single combat record.
//! No internal locking: only the record's authority ever touches it.
//!
//! ## Flow
//!
//! ```text
//! deck (front) ──draw──▶ hand ──play──▶ discard ──reshuffle──▶ deck
//!                          │                 ▲
//!                          └─exhaust/ethereal┴──▶ exhaust (never returns)
//! ```

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::game::card::Card;

/// Hand sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandConfig {
    /// Hard ceiling on cards held.
    pub capacity: usize,
    /// Size refilled to at the start of a round.
    pub target_size: usize,
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            target_size: 5,
        }
    }
}

/// Hand engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandError {
    /// Deck and discard are both empty.
    #[error("deck and discard are empty")]
    Exhausted,

    /// No card at the index.
    #[error("no card at index {index} (hand holds {len})")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Hand size.
        len: usize,
    },
}

/// Where a drawn card ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Added to the hand.
    Hand,
    /// Hand was full; the card went straight to the discard.
    Overflow,
}

/// Deck/hand/discard state for one combat record.
#[derive(Debug, Clone)]
pub struct HandEngine {
    config: HandConfig,
    deck: VecDeque<Card>,
    hand: Vec<Card>,
    discard: Vec<Card>,
    exhaust: Vec<Card>,
    rng: DeterministicRng,
}

impl HandEngine {
    /// Create with the given deck order (front is drawn first).
    pub fn new(deck: Vec<Card>, config: HandConfig, rng: DeterministicRng) -> Self {
        Self {
            config,
            deck: deck.into(),
            hand: Vec::with_capacity(config.capacity),
            discard: Vec::new(),
            exhaust: Vec::new(),
            rng,
        }
    }

    /// Shuffle the remaining deck.
    pub fn shuffle_deck(&mut self) {
        let deck = self.deck.make_contiguous();
        self.rng.shuffle(deck);
    }

    /// Draw one card from the front of the deck.
    ///
    /// An empty deck is refilled once from a shuffled discard. Fails only if
    /// both piles are empty.
    pub fn draw_card(&mut self) -> Result<DrawOutcome, HandError> {
        if self.deck.is_empty() {
            if self.discard.is_empty() {
                return Err(HandError::Exhausted);
            }
            self.reshuffle_discard();
        }

        let card = self.deck.pop_front().ok_or(HandError::Exhausted)?;

        if self.hand.len() >= self.config.capacity {
            debug!("Hand full, {} goes to discard", card.name);
            self.discard.push(card);
            return Ok(DrawOutcome::Overflow);
        }

        self.hand.push(card);
        Ok(DrawOutcome::Hand)
    }

    /// Draw up to `count` cards, stopping at the first failure.
    ///
    /// Returns how many draws succeeded.
    pub fn draw(&mut self, count: usize) -> usize {
        let mut drawn = 0;
        for _ in 0..count {
            if self.draw_card().is_err() {
                break;
            }
            drawn += 1;
        }
        drawn
    }

    /// Draw until the hand reaches the target size or a draw fails.
    pub fn draw_to_hand_size(&mut self) -> usize {
        let mut drawn = 0;
        while self.hand.len() < self.config.target_size {
            match self.draw_card() {
                Ok(DrawOutcome::Hand) => drawn += 1,
                Ok(DrawOutcome::Overflow) | Err(_) => break,
            }
        }
        drawn
    }

    /// Play the card at `index`: it leaves the hand for the discard, or the
    /// exhaust pile if it exhausts.
    pub fn play_card(&mut self, index: usize) -> Result<Card, HandError> {
        if index >= self.hand.len() {
            return Err(HandError::InvalidIndex {
                index,
                len: self.hand.len(),
            });
        }

        let card = self.hand.remove(index);
        if card.exhaust {
            self.exhaust.push(card.clone());
        } else {
            self.discard.push(card.clone());
        }
        Ok(card)
    }

    /// Discard the hand (ethereal cards are exhausted) and refill it.
    pub fn prepare_for_new_round(&mut self) -> usize {
        for card in self.hand.drain(..) {
            if card.ethereal {
                self.exhaust.push(card);
            } else {
                self.discard.push(card);
            }
        }
        self.draw_to_hand_size()
    }

    fn reshuffle_discard(&mut self) {
        debug!("Reshuffling {} discarded cards into the deck", self.discard.len());
        let mut cards = std::mem::take(&mut self.discard);
        self.rng.shuffle(&mut cards);
        self.deck.extend(cards);
    }

    /// Cards in hand.
    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    /// Card at an index.
    pub fn get(&self, index: usize) -> Option<&Card> {
        self.hand.get(index)
    }

    /// Index of the first card with the given name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.hand.iter().position(|c| c.name == name)
    }

    /// Cards left in the deck.
    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    /// Cards in the discard.
    pub fn discard_len(&self) -> usize {
        self.discard.len()
    }

    /// Cards exhausted this combat.
    pub fn exhaust_len(&self) -> usize {
        self.exhaust.len()
    }

    /// Hand sizing in use.
    pub fn config(&self) -> HandConfig {
        self.config
    }
}
