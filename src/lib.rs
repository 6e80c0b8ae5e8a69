//! # Card Clash Server
//!
//! Replication and turn-resolution core for a multiplayer card battler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CARD CLASH SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── identity.rs - Session/node ids, colors, positions       │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  ├── hash.rs     - State hashing for sync checks             │
//! │  └── version.rs  - Per-field version counters                │
//! │                                                              │
//! │  game/           - Combat rules (transport-agnostic)         │
//! │  ├── hand.rs     - Deck, hand and discard engine             │
//! │  ├── monster.rs  - Monster model and projection              │
//! │  ├── combat.rs   - Authoritative per-session record          │
//! │  ├── replica.rs  - Change sets and observer replicas         │
//! │  └── events.rs   - Typed event bus                           │
//! │                                                              │
//! │  network/        - Authority and replication                 │
//! │  ├── lobby.rs    - Readiness FSM and countdown               │
//! │  ├── transport.rs- Authority directory and delivery          │
//! │  ├── protocol.rs - Wire messages                             │
//! │  └── node.rs     - Request/response combat resolution        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Every combat record has exactly one authoritative node. Only that node
//! mutates the record; everyone else holds a replica fed by versioned
//! change sets. Cross-record effects (damage, score) travel as requests to
//! the target's authority and are answered exactly once.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod config;

// Re-export commonly used types
pub use crate::core::identity::{Color, NodeId, Position, SessionId};
pub use crate::core::rng::DeterministicRng;
pub use config::CoreConfig;
pub use game::{ActionError, Card, CombatState, ErrorKind, EventBus, GameEvent, Monster};
pub use network::{LobbyCoordinator, LocalHub, MatchContext, MatchNode, PlayOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
