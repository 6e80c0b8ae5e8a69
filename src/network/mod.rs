//! Network Layer
//!
//! Lobby coordination, the authority directory and the cross-authority
//! combat protocol. Game rules live in `game/`; this layer decides who may
//! apply them and ships the resulting change sets.

pub mod protocol;
pub mod transport;
pub mod session;
pub mod lobby;
pub mod context;
pub mod node;

pub use protocol::{Action, Envelope, Message, Outcome, ReplicationUpdate, RequestId, UpdateKind};
pub use transport::{Directory, HubEndpoint, LocalHub, Transport, TransportError, WaitError};
pub use session::Session;
pub use lobby::{LobbyConfig, LobbyCoordinator, LobbyPhase, Registration, RejoinRecord};
pub use context::{InitError, MatchContext, MatchContextBuilder};
pub use node::{MatchNode, PlayOutcome};
