//! Game Events
//!
//! Notifications fanned out to the presentation layer through a typed
//! publish/subscribe bus. One broadcast channel per topic; a subscriber only
//! sees the topics it asked for.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::core::identity::SessionId;
use crate::game::card::Card;
use crate::game::error::ErrorKind;

/// Per-topic channel depth.
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Topic an event is published on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Readiness and countdown.
    Lobby,
    /// Health, energy, score.
    Stats,
    /// Hand contents.
    Hand,
    /// Own monster and opponent projections.
    Monster,
    /// Round changes, fight completion, end-turn requests.
    Turn,
    /// Rejected or abandoned actions.
    Action,
}

impl Topic {
    /// Every topic.
    pub const ALL: [Topic; 6] = [
        Topic::Lobby,
        Topic::Stats,
        Topic::Hand,
        Topic::Monster,
        Topic::Turn,
        Topic::Action,
    ];
}

/// Event delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEvent {
    /// Health, energy, max values or score of a session changed.
    StatsChanged(SessionId),
    /// A session's hand changed.
    HandChanged(SessionId, Vec<Card>),
    /// The locally owned monster changed.
    OwnMonsterChanged,
    /// The projection of another session's monster changed.
    OpponentMonsterChanged(SessionId),
    /// New round number.
    RoundChanged(u32),
    /// A session toggled readiness.
    ReadyStatusChanged(String, bool),
    /// Every registered session is ready; countdown started.
    AllPlayersReady,
    /// Countdown reached zero.
    CountdownComplete,
    /// Match started (one-shot per lobby cycle).
    GameStarted,
    /// Fight-complete flag of a session changed.
    FightCompletionChanged(SessionId, bool),
    /// A session asked to end its turn.
    EndTurnRequested(SessionId),
    /// An action was rejected or abandoned after validation.
    ActionFailed(SessionId, ErrorKind),
}

impl GameEvent {
    /// Topic this event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            GameEvent::StatsChanged(_) => Topic::Stats,
            GameEvent::HandChanged(..) => Topic::Hand,
            GameEvent::OwnMonsterChanged | GameEvent::OpponentMonsterChanged(_) => Topic::Monster,
            GameEvent::RoundChanged(_)
            | GameEvent::FightCompletionChanged(..)
            | GameEvent::EndTurnRequested(_) => Topic::Turn,
            GameEvent::ReadyStatusChanged(..)
            | GameEvent::AllPlayersReady
            | GameEvent::CountdownComplete
            | GameEvent::GameStarted => Topic::Lobby,
            GameEvent::ActionFailed(..) => Topic::Action,
        }
    }
}

/// Publish/subscribe bus with one channel per topic.
#[derive(Debug, Clone)]
pub struct EventBus {
    topics: BTreeMap<Topic, broadcast::Sender<GameEvent>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus; `capacity` is the per-topic backlog before lagging.
    pub fn new(capacity: usize) -> Self {
        let topics = Topic::ALL
            .iter()
            .map(|t| (*t, broadcast::channel(capacity.max(1)).0))
            .collect();
        Self { topics }
    }

    /// Publish an event on its topic. Events with no subscriber are dropped.
    pub fn publish(&self, event: GameEvent) {
        let topic = event.topic();
        if let Some(tx) = self.topics.get(&topic) {
            if tx.send(event).is_err() {
                debug!("No subscribers on {:?}", topic);
            }
        }
    }

    /// Subscribe to a set of topics.
    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        let receivers = topics
            .iter()
            .filter_map(|t| self.topics.get(t).map(|tx| (*t, tx.subscribe())))
            .collect();
        Subscription { receivers }
    }

    /// Subscribe to everything.
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(&Topic::ALL)
    }

    /// Live subscriptions on a topic.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics.get(&topic).map_or(0, |tx| tx.receiver_count())
    }
}

/// Scoped subscription. Dropping it unsubscribes from every topic.
#[derive(Debug)]
pub struct Subscription {
    receivers: Vec<(Topic, broadcast::Receiver<GameEvent>)>,
}

impl Subscription {
    /// Next pending event, if any, without waiting.
    ///
    /// Topics are polled in subscription order, so ordering is only
    /// guaranteed within a topic.
    pub fn try_recv(&mut self) -> Option<GameEvent> {
        for (topic, rx) in self.receivers.iter_mut() {
            loop {
                match rx.try_recv() {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::TryRecvError::Lagged(n)) => {
                        warn!("Subscriber on {:?} lagged, {} events lost", topic, n);
                    }
                    Err(_) => break,
                }
            }
        }
        None
    }

    /// Drain everything currently pending.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Topics this subscription listens on.
    pub fn topics(&self) -> Vec<Topic> {
        self.receivers.iter().map(|(t, _)| *t).collect()
    }
}
