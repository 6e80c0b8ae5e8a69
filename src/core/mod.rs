//! Core primitives.
//!
//! Identity, deterministic randomness, state hashing and version counters.
//! Nothing in this module knows about cards or sessions beyond their ids.

pub mod identity;
pub mod rng;
pub mod hash;
pub mod version;

// Re-export core types
pub use identity::{SessionId, NodeId, Color, Position};
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher};
pub use version::{Field, FieldVersions};
