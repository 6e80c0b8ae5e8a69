//! Session Identity
//!
//! Join-time identity of a participant: display name, readiness, cosmetic
//! color and avatar position. Readiness and position are only ever changed
//! on behalf of the owning node.

use serde::{Serialize, Deserialize};

use crate::core::identity::{Color, NodeId, Position, SessionId};

/// A participant in the lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Display name, unique within the lobby.
    pub name: String,
    /// Ready to start.
    pub ready: bool,
    /// Session color, shared with its monster.
    pub color: Color,
    /// Avatar position.
    pub position: Position,
    /// Node that owns this session and its combat record.
    pub owner: NodeId,
}

impl Session {
    /// Create an unready session.
    pub fn new(id: SessionId, name: String, owner: NodeId, color: Color, position: Position) -> Self {
        Self {
            id,
            name,
            ready: false,
            color,
            position,
            owner,
        }
    }

    /// Does `node` own this session?
    #[inline]
    pub fn is_owned_by(&self, node: NodeId) -> bool {
        self.owner == node
    }
}

/// Pick a display name not present in `taken`: `name`, `name_1`, `name_2`, ...
pub fn unique_name<'a, I>(name: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let is_taken = |candidate: &str| taken.clone().into_iter().any(|t| t == candidate);

    if !is_taken(name) {
        return name.to_string();
    }

    let mut suffix = 1u32;
    loop {
        let candidate = format!("{}_{}", name, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
