//! Action Errors
//!
//! Every rejected operation is classified into one of a small set of kinds.
//! All of them are recovered locally: the operation returns the error, logs
//! it, and leaves state untouched.

use serde::{Serialize, Deserialize};

use crate::core::identity::{NodeId, SessionId};

/// Classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Mutation attempted by a node that is not the record's authority.
    AuthorityViolation,
    /// Draw beyond deck and discard availability.
    CapacityExceeded,
    /// Not enough energy, or not the caller's turn.
    ResourceInsufficient,
    /// Card target class does not match the chosen target.
    TargetInvalid,
    /// Referenced session or authority is gone.
    NotFound,
    /// A bounded wait ran past its deadline.
    Timeout,
}

/// Errors from combat and lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Caller does not hold authority over the record.
    #[error("{caller} is not the authority of session {session}")]
    NotAuthority {
        /// Record the caller tried to mutate.
        session: SessionId,
        /// Node that attempted the mutation.
        caller: NodeId,
    },

    /// Deck and discard are both empty.
    #[error("no cards left to draw")]
    OutOfCards,

    /// Card costs more than the energy available.
    #[error("card costs {cost} but only {available} energy is available")]
    InsufficientEnergy {
        /// Card cost.
        cost: u32,
        /// Unreserved energy.
        available: u32,
    },

    /// Session does not hold the active turn.
    #[error("it is not the turn of session {0}")]
    NotYourTurn(SessionId),

    /// A previous action of this session is still awaiting its response.
    #[error("session {0} already has an action in flight")]
    ActionInFlight(SessionId),

    /// No card at the given hand index.
    #[error("no card at index {index} (hand holds {len})")]
    InvalidCardIndex {
        /// Requested index.
        index: usize,
        /// Hand size.
        len: usize,
    },

    /// Card cannot be aimed at the chosen monster.
    #[error("card {card} cannot target {target}")]
    TargetMismatch {
        /// Card name.
        card: String,
        /// Classification of the chosen target.
        target: &'static str,
    },

    /// Session is not registered in this match.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// No node holds authority over the session's record.
    #[error("no authority for session {0}")]
    AuthorityNotFound(SessionId),

    /// Request did not complete before its deadline.
    #[error("request {0} timed out")]
    Timeout(u64),

    /// Remote authority answered with a rejection.
    #[error("remote authority rejected the request: {0:?}")]
    Rejected(ErrorKind),
}

impl ActionError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::NotAuthority { .. } => ErrorKind::AuthorityViolation,
            ActionError::OutOfCards => ErrorKind::CapacityExceeded,
            ActionError::InsufficientEnergy { .. }
            | ActionError::NotYourTurn(_)
            | ActionError::ActionInFlight(_) => ErrorKind::ResourceInsufficient,
            ActionError::InvalidCardIndex { .. }
            | ActionError::TargetMismatch { .. } => ErrorKind::TargetInvalid,
            ActionError::SessionNotFound(_)
            | ActionError::AuthorityNotFound(_) => ErrorKind::NotFound,
            ActionError::Timeout(_) => ErrorKind::Timeout,
            ActionError::Rejected(kind) => *kind,
        }
    }
}
