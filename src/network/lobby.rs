//! Lobby Coordinator
//!
//! Readiness aggregation and the countdown state machine that gates match
//! start, plus rejoin records kept per display name.
//!
//! ## Phases
//!
//! ```text
//! Idle ──all ready──▶ CountdownActive ──timer hits 0──▶ Started
//!  ▲                        │ (optional abort on unready)    │
//!  └────────────────────────┴───────────── reset ◀───────────┘
//! ```
//!
//! Time only advances through [`LobbyCoordinator::tick`]; the coordinator
//! never reads a clock.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::core::identity::{Color, NodeId, Position, SessionId};
use crate::game::error::ActionError;
use crate::game::events::{EventBus, GameEvent};
use crate::game::monster::Monster;
use crate::network::session::{unique_name, Session};

/// Lobby configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Countdown length once everyone is ready.
    pub countdown: Duration,
    /// Abort the countdown when a session toggles back to unready.
    pub abort_countdown_on_unready: bool,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(3),
            abort_countdown_on_unready: false,
        }
    }
}

/// Lobby state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// Waiting for everyone to be ready.
    Idle,
    /// Everyone was ready; counting down.
    CountdownActive {
        /// Time left.
        remaining: Duration,
    },
    /// Match started.
    Started,
}

/// State kept for a display name across leave and rejoin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejoinRecord {
    /// Last avatar position.
    pub position: Position,
    /// Session color.
    pub color: Color,
    /// Player health when the record was last refreshed.
    pub health: Option<u32>,
    /// Monster snapshot when the record was last refreshed.
    pub monster: Option<Monster>,
}

/// Result of a registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// The registered session (name possibly suffixed).
    pub session: Session,
    /// Rejoin record consumed by this registration, if any.
    pub restored: Option<RejoinRecord>,
}

/// Readiness FSM and rejoin store.
pub struct LobbyCoordinator {
    config: LobbyConfig,
    events: EventBus,
    sessions: BTreeMap<SessionId, Session>,
    phase: LobbyPhase,
    game_started: bool,
    rejoin: BTreeMap<String, RejoinRecord>,
    joins: usize,
}

impl LobbyCoordinator {
    /// Create an idle lobby publishing on `events`.
    pub fn new(config: LobbyConfig, events: EventBus) -> Self {
        Self {
            config,
            events,
            sessions: BTreeMap::new(),
            phase: LobbyPhase::Idle,
            game_started: false,
            rejoin: BTreeMap::new(),
            joins: 0,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a session owned by `owner`.
    ///
    /// A name already in use gets a numeric suffix. If a rejoin record exists
    /// under the final name, its position and color are restored and the
    /// record is handed back to the caller.
    pub fn register(&mut self, id: SessionId, name: &str, owner: NodeId) -> Registration {
        let name = unique_name(name, self.sessions.values().map(|s| s.name.as_str()));
        let restored = self.rejoin.remove(&name);

        let (color, position) = match &restored {
            Some(record) => (record.color, record.position),
            None => (Color::from_index(self.joins), spawn_position(self.joins)),
        };
        self.joins += 1;

        let session = Session::new(id, name, owner, color, position);
        info!(
            "Registered {} as {} ({}){}",
            id,
            session.name,
            owner,
            if restored.is_some() { ", restored" } else { "" }
        );
        self.sessions.insert(id, session.clone());

        self.evaluate_readiness();

        Registration { session, restored }
    }

    /// Remove a session and keep a rejoin record under its name.
    pub fn leave(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;

        let record = self.rejoin.entry(session.name.clone()).or_insert(RejoinRecord {
            position: session.position,
            color: session.color,
            health: None,
            monster: None,
        });
        record.position = session.position;
        record.color = session.color;

        info!("{} ({}) left the lobby", session.name, id);
        self.evaluate_readiness();
        Some(session)
    }

    /// Refresh the combat part of a rejoin record.
    pub fn update_rejoin_combat(&mut self, name: &str, health: u32, monster: Monster) {
        if !self.rejoin.contains_key(name) {
            let Some(session) = self.sessions.values().find(|s| s.name == name) else {
                debug!("No session or rejoin record named {}", name);
                return;
            };
            let record = RejoinRecord {
                position: session.position,
                color: session.color,
                health: None,
                monster: None,
            };
            self.rejoin.insert(name.to_string(), record);
        }

        if let Some(record) = self.rejoin.get_mut(name) {
            record.health = Some(health);
            record.monster = Some(monster);
        }
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    /// Set readiness of a session. Only its owner may do so.
    pub fn set_ready(&mut self, caller: NodeId, id: &SessionId, ready: bool) -> Result<(), ActionError> {
        let session = self.sessions.get_mut(id).ok_or(ActionError::SessionNotFound(*id))?;

        if !session.is_owned_by(caller) {
            warn!("{} tried to set readiness of {} owned by {}", caller, id, session.owner);
            return Err(ActionError::NotAuthority { session: *id, caller });
        }

        if session.ready == ready {
            return Ok(());
        }
        session.ready = ready;
        let name = session.name.clone();

        self.events.publish(GameEvent::ReadyStatusChanged(name, ready));
        self.evaluate_readiness();
        Ok(())
    }

    /// Move a session's avatar. Only its owner may do so.
    pub fn set_position(&mut self, caller: NodeId, id: &SessionId, position: Position) -> Result<(), ActionError> {
        let session = self.sessions.get_mut(id).ok_or(ActionError::SessionNotFound(*id))?;
        if !session.is_owned_by(caller) {
            warn!("{} tried to move {} owned by {}", caller, id, session.owner);
            return Err(ActionError::NotAuthority { session: *id, caller });
        }
        session.position = position;
        Ok(())
    }

    fn all_ready(&self) -> bool {
        !self.sessions.is_empty() && self.sessions.values().all(|s| s.ready)
    }

    fn evaluate_readiness(&mut self) {
        match self.phase {
            LobbyPhase::Idle if self.all_ready() => {
                info!("All {} sessions ready, starting countdown", self.sessions.len());
                self.phase = LobbyPhase::CountdownActive {
                    remaining: self.config.countdown,
                };
                self.events.publish(GameEvent::AllPlayersReady);
            }
            LobbyPhase::CountdownActive { .. }
                if self.config.abort_countdown_on_unready && !self.all_ready() =>
            {
                info!("Countdown aborted");
                self.phase = LobbyPhase::Idle;
            }
            _ => {}
        }
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Advance the countdown by `dt`.
    ///
    /// Returns the participating sessions on the tick the match starts.
    pub fn tick(&mut self, dt: Duration) -> Option<Vec<Session>> {
        let LobbyPhase::CountdownActive { remaining } = self.phase else {
            return None;
        };

        let remaining = remaining.saturating_sub(dt);
        if !remaining.is_zero() {
            self.phase = LobbyPhase::CountdownActive { remaining };
            return None;
        }

        self.phase = LobbyPhase::Started;
        self.game_started = true;
        info!("Countdown complete, starting match with {} sessions", self.sessions.len());

        self.events.publish(GameEvent::CountdownComplete);
        self.events.publish(GameEvent::GameStarted);

        Some(self.sessions.values().cloned().collect())
    }

    /// Back to idle. Registrations go, rejoin records stay.
    pub fn reset(&mut self) {
        self.sessions.clear();
        self.phase = LobbyPhase::Idle;
        self.game_started = false;
        debug!("Lobby reset, {} rejoin records kept", self.rejoin.len());
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current phase.
    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    /// Has the match started this cycle?
    pub fn game_started(&self) -> bool {
        self.game_started
    }

    /// Registered session by id.
    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Registered sessions in id order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Readiness map.
    pub fn readiness(&self) -> BTreeMap<SessionId, bool> {
        self.sessions.iter().map(|(id, s)| (*id, s.ready)).collect()
    }

    /// Rejoin record for a name.
    pub fn rejoin_record(&self, name: &str) -> Option<&RejoinRecord> {
        self.rejoin.get(name)
    }
}

/// Spread avatars along a line in join order.
fn spawn_position(index: usize) -> Position {
    Position::new(index as f32 * 2.0, 0.0, 0.0)
}
