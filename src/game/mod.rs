//! Game Logic Module
//!
//! Per-session combat rules. Nothing in here knows about the transport;
//! mutators return change sets and the network layer ships them.
//!
//! ## Module Structure
//!
//! - `card`: Card values and their network-safe form
//! - `catalog`: Fixed card and monster catalog
//! - `hand`: Deck/hand/discard engine
//! - `monster`: Monster model and read-only projection
//! - `combat`: Authoritative per-session record
//! - `replica`: Versioned change sets and observer replicas
//! - `turn`: Active-turn and round bookkeeping
//! - `events`: Typed event bus for the presentation layer
//! - `error`: Action errors and their classification

pub mod card;
pub mod catalog;
pub mod hand;
pub mod monster;
pub mod combat;
pub mod replica;
pub mod turn;
pub mod events;
pub mod error;

// Re-export key types
pub use card::{Card, CardTarget, CardType, NetCard};
pub use hand::{HandConfig, HandEngine};
pub use monster::{Monster, MonsterProjection};
pub use combat::{CombatConfig, CombatState};
pub use replica::{CombatReplica, CombatView, FieldChange, FieldValue};
pub use turn::TurnTracker;
pub use events::{EventBus, GameEvent, Subscription, Topic};
pub use error::{ActionError, ErrorKind};
