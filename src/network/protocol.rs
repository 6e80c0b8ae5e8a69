//! Protocol Messages
//!
//! Everything that travels between match nodes: directed requests and their
//! responses, replication updates, resync requests and despawns.
//!
//! Enums use serde's default external tagging so the same types encode with
//! both serde_json (debugging) and bincode (compact form).

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHash;
use crate::core::identity::{NodeId, SessionId};
use crate::game::error::ErrorKind;
use crate::game::replica::FieldChange;

/// Per-node request counter.
pub type RequestId = u64;

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// Mutation asked of the authority that owns `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Damage the target's own monster.
    ApplyDamage {
        /// Record whose monster takes the hit.
        target: SessionId,
        /// Session that played the card.
        attacker: SessionId,
        /// Raw damage before block.
        amount: u32,
    },

    /// Award score for a defeated monster.
    GrantScore {
        /// Record that receives the score.
        target: SessionId,
        /// Points to add.
        amount: u32,
    },
}

impl Action {
    /// Record the action mutates.
    pub fn target(&self) -> SessionId {
        match self {
            Action::ApplyDamage { target, .. } | Action::GrantScore { target, .. } => *target,
        }
    }
}

/// Answer to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Mutation applied and broadcast.
    Completed {
        /// The target monster went down with this request.
        defeated: bool,
    },
    /// Mutation refused; nothing changed.
    Rejected(ErrorKind),
}

// =============================================================================
// REPLICATION
// =============================================================================

/// How a replica should treat an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Changed fields only.
    Delta,
    /// Every field, version-gated like a delta, with a checksum.
    Snapshot,
    /// Every field, applied regardless of version (answer to a sync request).
    Resync,
}

/// Change set broadcast by a record's authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationUpdate {
    /// Record the changes belong to.
    pub record: SessionId,
    /// Node holding authority over the record.
    pub authority: NodeId,
    /// Update kind.
    pub kind: UpdateKind,
    /// Field writes in the order the authority applied them.
    pub changes: Vec<FieldChange>,
    /// Authority-side checksum (snapshots only).
    pub state_hash: Option<StateHash>,
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Messages exchanged between match nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// Directed request to a record's authority.
    Request {
        /// Sender-local id echoed in the response.
        id: RequestId,
        /// What to do.
        action: Action,
    },

    /// Answer to a request.
    Response {
        /// Id from the request.
        id: RequestId,
        /// Result.
        outcome: Outcome,
    },

    /// Field changes of a record.
    Replicate(ReplicationUpdate),

    /// Ask the authority for a forced full snapshot.
    SyncRequest {
        /// Record to resync.
        record: SessionId,
    },

    /// Record destroyed (leave or match end).
    Despawn {
        /// Record that no longer exists.
        record: SessionId,
    },
}

/// A message with its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sending node.
    pub from: NodeId,
    /// Payload.
    pub message: Message,
}

impl Message {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Message::Request { .. } => "request",
            Message::Response { .. } => "response",
            Message::Replicate(_) => "replicate",
            Message::SyncRequest { .. } => "sync_request",
            Message::Despawn { .. } => "despawn",
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

impl Envelope {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::Color;
    use crate::game::card::NetCard;
    use crate::game::catalog;
    use crate::game::monster::Monster;
    use crate::game::replica::FieldValue;

    fn sample_update() -> ReplicationUpdate {
        ReplicationUpdate {
            record: SessionId::new([3; 16]),
            authority: NodeId(2),
            kind: UpdateKind::Snapshot,
            changes: vec![
                FieldChange { version: 4, value: FieldValue::Health(41) },
                FieldChange {
                    version: 2,
                    value: FieldValue::Hand(vec![NetCard::from(&catalog::cleave())]),
                },
                FieldChange {
                    version: 7,
                    value: FieldValue::Monster(Monster::new("Mossback", Color::rgb(1, 2, 3), 40, 2, 3)),
                },
            ],
            state_hash: Some([9; 32]),
        }
    }

    #[test]
    fn test_request_json_roundtrip() {
        let msg = Message::Request {
            id: 17,
            action: Action::ApplyDamage {
                target: SessionId::new([2; 16]),
                attacker: SessionId::new([1; 16]),
                amount: 6,
            },
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("apply_damage"));
        assert_eq!(Message::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_replicate_binary_roundtrip() {
        let msg = Message::Replicate(sample_update());
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_envelope_binary_roundtrip() {
        let env = Envelope {
            from: NodeId(5),
            message: Message::Response {
                id: 3,
                outcome: Outcome::Rejected(ErrorKind::NotFound),
            },
        };
        let bytes = env.to_bytes().unwrap();
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), env);
    }

    #[test]
    fn test_action_target() {
        let target = SessionId::new([8; 16]);
        assert_eq!(Action::GrantScore { target, amount: 1 }.target(), target);
    }

    #[test]
    fn test_delta_without_hash_binary_roundtrip() {
        let mut update = sample_update();
        update.kind = UpdateKind::Delta;
        update.state_hash = None;
        let msg = Message::Replicate(update);
        assert_eq!(Message::from_bytes(&msg.to_bytes().unwrap()).unwrap(), msg);
    }
}
