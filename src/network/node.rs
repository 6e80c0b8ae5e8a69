//! Match Node
//!
//! One participant's runtime. Owns the combat records this node is the
//! authority of, keeps read-only replicas of everyone else's, and resolves
//! card plays across authorities by message passing.
//!
//! ## Tick
//!
//! ```text
//! tick()
//!   ├─ drain inbox in arrival order
//!   │    Request     → mutate own record, broadcast, respond (+ score grant)
//!   │    Response    → commit or release the in-flight action
//!   │    Replicate   → version-gated apply to replica, checksum compare
//!   │    SyncRequest → forced full snapshot back to the asker
//!   │    Despawn     → drop replica, fail requests aimed at it
//!   ├─ expire pending requests (deadline, vanished authority)
//!   └─ change detection → events
//! ```
//!
//! Cross-record writes never happen directly: a play against a remotely owned
//! monster reserves the card and its energy, sends `ApplyDamage` to the
//! owner, and only commits once `Completed` comes back.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::identity::{NodeId, SessionId};
use crate::core::rng::DeterministicRng;
use crate::core::version::{Field, FieldVersions};
use crate::game::card::Card;
use crate::game::catalog;
use crate::game::combat::CombatState;
use crate::game::error::{ActionError, ErrorKind};
use crate::game::events::{EventBus, GameEvent};
use crate::game::hand::HandEngine;
use crate::game::monster::{Monster, MonsterProjection};
use crate::game::replica::{push_change, CombatReplica, CombatView, FieldChange};
use crate::game::turn::TurnTracker;
use crate::network::context::MatchContext;
use crate::network::lobby::RejoinRecord;
use crate::network::protocol::{
    Action, Envelope, Message, Outcome, ReplicationUpdate, RequestId, UpdateKind,
};
use crate::network::session::Session;
use crate::network::transport::{wait_for_record, WaitError};

/// Ticks between unsolicited checksum snapshots (5 seconds @ 60Hz).
pub const CHECKSUM_INTERVAL_TICKS: u64 = 300;

/// How a card play ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Applied and broadcast immediately.
    Resolved,
    /// Waiting on this many remote authorities.
    Pending(usize),
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    Damage { attacker: SessionId },
    Grant,
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    target: SessionId,
    kind: PendingKind,
    deadline: u64,
}

/// A card play waiting for remote responses. Card and energy stay reserved.
#[derive(Debug)]
struct InFlightAction {
    card: Card,
    index_hint: usize,
    awaiting: BTreeSet<RequestId>,
    resolved: bool,
    failure: Option<ActionError>,
}

/// Per-participant match runtime.
pub struct MatchNode {
    ctx: MatchContext,
    node: NodeId,
    owned: BTreeMap<SessionId, CombatState>,
    replicas: BTreeMap<SessionId, CombatReplica>,
    projections: BTreeMap<SessionId, MonsterProjection>,
    notified: BTreeMap<SessionId, FieldVersions>,
    turns: TurnTracker,
    pending: BTreeMap<RequestId, PendingRequest>,
    in_flight: BTreeMap<SessionId, InFlightAction>,
    next_request: RequestId,
    ticks: u64,
}

impl MatchNode {
    /// Create a node speaking through the context's transport.
    pub fn new(ctx: MatchContext) -> Self {
        let node = ctx.transport().local_node();
        Self {
            ctx,
            node,
            owned: BTreeMap::new(),
            replicas: BTreeMap::new(),
            projections: BTreeMap::new(),
            notified: BTreeMap::new(),
            turns: TurnTracker::new(),
            pending: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            next_request: 1,
            ticks: 0,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create the combat record of a session owned by this node, using the
    /// starter deck.
    pub fn spawn_combat(&mut self, session: &Session, restore: Option<&RejoinRecord>) -> Result<(), ActionError> {
        self.spawn_combat_with_deck(session, catalog::starter_deck(), restore)
    }

    /// Create the combat record of a session owned by this node.
    ///
    /// Registers authority with the transport, deals the opening hand and
    /// broadcasts a full snapshot. Saved health and monster are restored
    /// from `restore` when present.
    pub fn spawn_combat_with_deck(
        &mut self,
        session: &Session,
        deck: Vec<Card>,
        restore: Option<&RejoinRecord>,
    ) -> Result<(), ActionError> {
        if !session.is_owned_by(self.node) {
            warn!("{} refused to spawn {} owned by {}", self.node, session.id, session.owner);
            return Err(ActionError::NotAuthority {
                session: session.id,
                caller: self.node,
            });
        }
        if self.owned.contains_key(&session.id) {
            debug!("Combat record for {} already exists", session.id);
            return Ok(());
        }

        let config = self.ctx.config();
        let mut rng = DeterministicRng::for_deck(self.ctx.match_id(), &session.id);
        let monster = catalog::starter_monster(&mut rng, session.color);
        let hand = HandEngine::new(deck, config.hand, rng);
        let mut record = CombatState::new(session.id, self.node, &config.combat, hand, monster);

        record.deal_opening_hand(self.node)?;
        if let Some(saved) = restore {
            if saved.health.is_some() || saved.monster.is_some() {
                let health = saved.health.unwrap_or(config.combat.max_health);
                record.restore(self.node, health, saved.monster.clone())?;
            }
        }

        self.ctx.transport().assign_authority(session.id, self.node);
        self.replicas.remove(&session.id);
        self.projections.remove(&session.id);
        self.owned.insert(session.id, record);
        self.send_snapshot(session.id, UpdateKind::Snapshot, None);

        info!("Spawned combat record for {} ({}) on {}", session.name, session.id, self.node);
        Ok(())
    }

    /// Destroy an owned record (leave or match end) and tell everyone.
    ///
    /// Returns the final state so the caller can refresh the rejoin record.
    pub fn despawn(&mut self, session: &SessionId) -> Option<CombatState> {
        let record = self.owned.remove(session)?;

        if let Some(action) = self.in_flight.remove(session) {
            for id in &action.awaiting {
                self.pending.remove(id);
            }
        }
        self.ctx.transport().release_authority(session);
        if let Err(e) = self.ctx.transport().broadcast(Message::Despawn { record: *session }) {
            warn!("Failed to broadcast despawn of {}: {}", session, e);
        }
        self.notified.remove(session);
        self.turns.remove(session);

        info!("Despawned {} on {}", session, self.node);
        Some(record)
    }

    /// Resolve once `session` has an authority, or fail with a timeout.
    pub fn await_record(
        &self,
        session: SessionId,
        timeout: Duration,
    ) -> impl Future<Output = Result<NodeId, WaitError>> {
        wait_for_record(self.ctx.transport().watch_directory(), session, timeout)
    }

    // =========================================================================
    // Stat mutations
    // =========================================================================

    /// Add to health of an owned record.
    pub fn modify_health(&mut self, session: SessionId, delta: i32) -> Result<(), ActionError> {
        let node = self.node;
        let changes = self.owned_mut(&session)?.modify_health(node, delta)?;
        self.broadcast_changes(session, changes);
        Ok(())
    }

    /// Add to energy of an owned record.
    pub fn modify_energy(&mut self, session: SessionId, delta: i32) -> Result<(), ActionError> {
        let node = self.node;
        let changes = self.owned_mut(&session)?.modify_energy(node, delta)?;
        self.broadcast_changes(session, changes);
        Ok(())
    }

    /// Add to score of an owned record.
    pub fn increase_score(&mut self, session: SessionId, amount: u32) -> Result<(), ActionError> {
        let node = self.node;
        let changes = self.owned_mut(&session)?.increase_score(node, amount)?;
        self.broadcast_changes(session, changes);
        Ok(())
    }

    // =========================================================================
    // Card play
    // =========================================================================

    /// Play the card at `card_index` of `session`'s hand against `target`.
    ///
    /// `target == session` aims at the own monster; any other session aims at
    /// that session's monster. Nothing changes unless every check passes.
    pub fn play_card(
        &mut self,
        session: SessionId,
        card_index: usize,
        target: SessionId,
    ) -> Result<PlayOutcome, ActionError> {
        self.check_owned(&session)?;
        if self.in_flight.contains_key(&session) {
            return Err(ActionError::ActionInFlight(session));
        }

        let active = self.turns.is_active(&session);
        let card = self
            .owned
            .get(&session)
            .ok_or(ActionError::SessionNotFound(session))?
            .validate_play(self.node, card_index, active)?
            .clone();

        let aimed_at_own = target == session;
        if !aimed_at_own && !self.knows(&target) {
            return Err(ActionError::SessionNotFound(target));
        }
        let compatible = if aimed_at_own {
            card.target.allows_own()
        } else {
            card.target.allows_opponent()
        };
        if !compatible {
            return Err(ActionError::TargetMismatch {
                card: card.name,
                target: if aimed_at_own { "own monster" } else { "opponent monster" },
            });
        }

        // Who gets hit
        let victims: Vec<SessionId> = if card.damage == 0 {
            Vec::new()
        } else if card.target.hits_all_opponents() {
            self.opponents_of(&session)
        } else if aimed_at_own {
            Vec::new()
        } else {
            vec![target]
        };
        let spread = card.target.hits_all_opponents();

        // Route every victim before touching anything
        let mut local = Vec::new();
        let mut remote = Vec::new();
        for victim in victims {
            if self.owned.contains_key(&victim) {
                local.push(victim);
                continue;
            }
            match self.ctx.transport().authority_of(&victim) {
                Some(node) => remote.push((victim, node)),
                None if spread => debug!("Skipping {}: no authority", victim),
                None => {
                    warn!("No authority for {}, {} not played", victim, card.name);
                    return Err(ActionError::AuthorityNotFound(victim));
                }
            }
        }
        if spread && !card.has_own_effect() && local.is_empty() && remote.is_empty() {
            return Err(ActionError::AuthorityNotFound(target));
        }

        let amount = card.damage as u32;
        let deadline = self.request_deadline();
        let mut awaiting = BTreeSet::new();
        for (victim, node) in remote {
            let id = self.next_request_id();
            let request = Message::Request {
                id,
                action: Action::ApplyDamage {
                    target: victim,
                    attacker: session,
                    amount,
                },
            };
            match self.ctx.transport().send(node, request) {
                Ok(()) => {
                    self.pending.insert(id, PendingRequest {
                        target: victim,
                        kind: PendingKind::Damage { attacker: session },
                        deadline,
                    });
                    awaiting.insert(id);
                }
                Err(e) if spread => debug!("Skipping {}: {}", victim, e),
                Err(e) => {
                    warn!("Damage request for {} undeliverable: {}", victim, e);
                    return Err(ActionError::AuthorityNotFound(victim));
                }
            }
        }

        for victim in &local {
            self.damage_local(session, *victim, amount);
        }

        if awaiting.is_empty() {
            self.resolve_play(session, &card, card_index)?;
            return Ok(PlayOutcome::Resolved);
        }

        let count = awaiting.len();
        debug!("{} plays {}, awaiting {} response(s)", session, card.name, count);
        self.in_flight.insert(session, InFlightAction {
            card,
            index_hint: card_index,
            awaiting,
            resolved: !local.is_empty(),
            failure: None,
        });
        Ok(PlayOutcome::Pending(count))
    }

    /// Pay for the card, move it out of the hand, apply own-side effects.
    fn resolve_play(&mut self, session: SessionId, card: &Card, index_hint: usize) -> Result<(), ActionError> {
        let node = self.node;
        let record = self.owned_mut(&session)?;
        let (played, mut changes) = record.commit_play(node, &card.name, index_hint)?;
        for change in record.apply_own_effects(node, &played)? {
            push_change(&mut changes, change);
        }
        self.broadcast_changes(session, changes);
        Ok(())
    }

    /// Damage a record this node owns and grant score on defeat.
    fn damage_local(&mut self, attacker: SessionId, victim: SessionId, amount: u32) {
        if let Outcome::Completed { defeated: true } = self.apply_requested_damage(victim, amount) {
            info!("{} defeated the monster of {}", attacker, victim);
            self.grant_score(attacker);
        }
    }

    /// Award defeat score to `attacker`, locally or through its authority.
    fn grant_score(&mut self, attacker: SessionId) {
        let amount = self.ctx.config().combat.defeat_score;
        if self.owned.contains_key(&attacker) {
            self.apply_score_grant(attacker, amount);
            return;
        }

        let Some(node) = self.ctx.transport().authority_of(&attacker) else {
            debug!("Attacker {} is gone, score not granted", attacker);
            return;
        };
        let id = self.next_request_id();
        let request = Message::Request {
            id,
            action: Action::GrantScore {
                target: attacker,
                amount,
            },
        };
        match self.ctx.transport().send(node, request) {
            Ok(()) => {
                let deadline = self.request_deadline();
                self.pending.insert(id, PendingRequest {
                    target: attacker,
                    kind: PendingKind::Grant,
                    deadline,
                });
            }
            Err(e) => debug!("Score grant for {} undeliverable: {}", attacker, e),
        }
    }

    fn apply_score_grant(&mut self, target: SessionId, amount: u32) -> Outcome {
        let node = self.node;
        let Some(record) = self.owned.get_mut(&target) else {
            return Outcome::Rejected(ErrorKind::NotFound);
        };
        let result = record.increase_score(node, amount).and_then(|mut changes| {
            for change in record.set_fight_complete(node, true)? {
                push_change(&mut changes, change);
            }
            Ok(changes)
        });
        match result {
            Ok(changes) => {
                self.broadcast_changes(target, changes);
                Outcome::Completed { defeated: false }
            }
            Err(e) => Outcome::Rejected(e.kind()),
        }
    }

    // =========================================================================
    // Turn flow
    // =========================================================================

    /// Ask the round arbiter to end `session`'s turn.
    pub fn request_end_turn(&mut self, session: SessionId) -> Result<(), ActionError> {
        self.check_owned(&session)?;
        if !self.turns.is_active(&session) {
            return Err(ActionError::NotYourTurn(session));
        }
        self.ctx.events().publish(GameEvent::EndTurnRequested(session));
        Ok(())
    }

    /// Round arbiter changed who holds the turn.
    ///
    /// A play still awaiting responses is committed against the turn it was
    /// made in before anything else changes; its late responses are ignored.
    pub fn turn_state_changed(&mut self, session: SessionId, active: bool) {
        if !self.turns.set_active(session, active) {
            return;
        }
        if let Some(action) = self.in_flight.get_mut(&session) {
            debug!(
                "{} of {} settled at turn change, {} response(s) outstanding",
                action.card.name,
                session,
                action.awaiting.len()
            );
            action.resolved = true;
            self.finish_action(session);
        }
        if !active {
            return;
        }
        let node = self.node;
        let Some(record) = self.owned.get_mut(&session) else {
            return;
        };
        match record.begin_turn(node) {
            Ok(changes) => self.broadcast_changes(session, changes),
            Err(e) => warn!("Turn start for {} failed: {}", session, e),
        }
    }

    /// Round arbiter started round `round`.
    pub fn round_started(&mut self, round: u32) {
        if !self.turns.start_round(round) {
            return;
        }
        let node = self.node;
        let mut batches = Vec::new();
        for (id, record) in self.owned.iter_mut() {
            match record.set_fight_complete(node, false) {
                Ok(changes) => batches.push((*id, changes)),
                Err(e) => warn!("Round reset for {} failed: {}", id, e),
            }
        }
        for (id, changes) in batches {
            self.broadcast_changes(id, changes);
        }
        self.ctx.events().publish(GameEvent::RoundChanged(round));
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Run one simulation tick. Returns how many messages were handled.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;

        let transport = Arc::clone(self.ctx.transport());
        let mut handled = 0;
        while let Some(envelope) = transport.try_recv() {
            self.handle(envelope);
            handled += 1;
        }

        self.expire_requests();

        if self.ticks % CHECKSUM_INTERVAL_TICKS == 0 {
            self.publish_checksums();
        }

        self.detect_changes();
        handled
    }

    /// Broadcast a checksummed snapshot of every owned record.
    pub fn publish_checksums(&self) {
        for id in self.owned.keys() {
            self.send_snapshot(*id, UpdateKind::Snapshot, None);
        }
    }

    fn handle(&mut self, envelope: Envelope) {
        #[cfg(feature = "debug-tracing")]
        tracing::trace!("{} <- {}: {}", self.node, envelope.from, envelope.message.label());

        let from = envelope.from;
        match envelope.message {
            Message::Request { id, action } => self.handle_request(from, id, action),
            Message::Response { id, outcome } => self.handle_response(id, outcome),
            Message::Replicate(update) => self.handle_replicate(update),
            Message::SyncRequest { record } => {
                if self.owned.contains_key(&record) {
                    debug!("{} resyncing {} for {}", self.node, record, from);
                    self.send_snapshot(record, UpdateKind::Resync, Some(from));
                } else {
                    debug!("Sync request for {} which {} does not own", record, self.node);
                }
            }
            Message::Despawn { record } => self.forget(&record),
        }
    }

    fn handle_request(&mut self, from: NodeId, id: RequestId, action: Action) {
        let target = action.target();
        let (outcome, grant_to) = if !self.owned.contains_key(&target) {
            debug!("Request {} for {} which {} does not own", id, target, self.node);
            (Outcome::Rejected(ErrorKind::NotFound), None)
        } else {
            match action {
                Action::ApplyDamage { attacker, amount, .. } => {
                    let outcome = self.apply_requested_damage(target, amount);
                    let defeated = matches!(outcome, Outcome::Completed { defeated: true });
                    (outcome, defeated.then_some(attacker))
                }
                Action::GrantScore { amount, .. } => (self.apply_score_grant(target, amount), None),
            }
        };

        if let Err(e) = self.ctx.transport().send(from, Message::Response { id, outcome }) {
            debug!("Response {} to {} undeliverable: {}", id, from, e);
        }

        // Only after the damage response, so the grant lands second
        if let Some(attacker) = grant_to {
            self.grant_score(attacker);
        }
    }

    fn apply_requested_damage(&mut self, target: SessionId, amount: u32) -> Outcome {
        let node = self.node;
        let Some(record) = self.owned.get_mut(&target) else {
            return Outcome::Rejected(ErrorKind::NotFound);
        };
        match record.receive_damage(node, amount) {
            Ok((outcome, changes)) => {
                self.broadcast_changes(target, changes);
                Outcome::Completed {
                    defeated: outcome.defeated_now,
                }
            }
            Err(e) => Outcome::Rejected(e.kind()),
        }
    }

    fn handle_response(&mut self, id: RequestId, outcome: Outcome) {
        let Some(pending) = self.pending.remove(&id) else {
            debug!("Late response {} ignored", id);
            return;
        };

        match pending.kind {
            PendingKind::Grant => {
                if let Outcome::Rejected(kind) = outcome {
                    debug!("Score grant for {} rejected: {:?}", pending.target, kind);
                }
            }
            PendingKind::Damage { attacker } => {
                let Some(action) = self.in_flight.get_mut(&attacker) else {
                    return;
                };
                action.awaiting.remove(&id);
                match outcome {
                    Outcome::Completed { .. } => action.resolved = true,
                    Outcome::Rejected(kind) => action.failure = Some(ActionError::Rejected(kind)),
                }
                if action.awaiting.is_empty() {
                    self.finish_action(attacker);
                }
            }
        }
    }

    fn handle_replicate(&mut self, update: ReplicationUpdate) {
        let record = update.record;
        if self.owned.contains_key(&record) {
            warn!("{} received replication for its own record {}", self.node, record);
            return;
        }

        let fresh = !self.replicas.contains_key(&record);
        let replica = self
            .replicas
            .entry(record)
            .or_insert_with(|| CombatReplica::new(record, update.authority));
        if replica.authority() != update.authority {
            replica.set_authority(update.authority);
        }

        match update.kind {
            UpdateKind::Resync => {
                for change in &update.changes {
                    replica.apply_forced(change);
                }
                info!("{} resynced replica of {}", self.node, record);
            }
            UpdateKind::Delta | UpdateKind::Snapshot => {
                for change in &update.changes {
                    replica.apply(change);
                }
            }
        }

        let diverged = match (update.kind, update.state_hash) {
            (UpdateKind::Snapshot, Some(expected)) => replica.view().state_hash() != expected,
            (UpdateKind::Delta, _) => fresh,
            _ => false,
        };
        if diverged {
            warn!("Replica of {} out of sync on {}, requesting resync", record, self.node);
            if let Err(e) = self
                .ctx
                .transport()
                .send(update.authority, Message::SyncRequest { record })
            {
                debug!("Sync request for {} undeliverable: {}", record, e);
            }
        }
    }

    /// Drop everything known about a record that no longer exists.
    fn forget(&mut self, record: &SessionId) {
        self.replicas.remove(record);
        self.projections.remove(record);
        self.notified.remove(record);
        self.turns.remove(record);

        let orphaned: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.target == *record)
            .map(|(id, _)| *id)
            .collect();
        for id in orphaned {
            self.fail_request(id, ActionError::AuthorityNotFound(*record));
        }
        debug!("{} forgot {}", self.node, record);
    }

    /// Expire requests past their deadline or aimed at vanished authorities.
    fn expire_requests(&mut self) {
        let vanished: Vec<(RequestId, SessionId)> = self
            .pending
            .iter()
            .filter(|(_, p)| self.ctx.transport().authority_of(&p.target).is_none())
            .map(|(id, p)| (*id, p.target))
            .collect();
        for (id, target) in vanished {
            self.fail_request(id, ActionError::AuthorityNotFound(target));
        }

        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= self.ticks)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.fail_request(id, ActionError::Timeout(id));
        }
    }

    /// Mark a pending request failed; finishes its action when nothing else
    /// is outstanding.
    fn fail_request(&mut self, id: RequestId, error: ActionError) {
        let Some(pending) = self.pending.remove(&id) else {
            return;
        };
        let PendingKind::Damage { attacker } = pending.kind else {
            debug!("Score grant {} for {} dropped: {}", id, pending.target, error);
            return;
        };
        let Some(action) = self.in_flight.get_mut(&attacker) else {
            return;
        };
        action.awaiting.remove(&id);
        action.failure = Some(error);
        if action.awaiting.is_empty() {
            self.finish_action(attacker);
        }
    }

    /// Commit an action if any target resolved, otherwise release it.
    fn finish_action(&mut self, session: SessionId) {
        let Some(action) = self.in_flight.remove(&session) else {
            return;
        };
        for id in &action.awaiting {
            self.pending.remove(id);
        }

        if action.resolved {
            if let Err(e) = self.resolve_play(session, &action.card, action.index_hint) {
                warn!("Commit of {} for {} failed: {}", action.card.name, session, e);
                self.ctx.events().publish(GameEvent::ActionFailed(session, e.kind()));
            }
            return;
        }

        let error = action
            .failure
            .unwrap_or(ActionError::Rejected(ErrorKind::Timeout));
        info!("{} of {} released: {}", action.card.name, session, error);
        self.ctx.events().publish(GameEvent::ActionFailed(session, error.kind()));
    }

    // =========================================================================
    // Change detection
    // =========================================================================

    fn detect_changes(&mut self) {
        let events = self.ctx.events();

        for (id, record) in &self.owned {
            let last = self.notified.entry(*id).or_default();
            let changed = record.versions().changed_since(last);
            if changed.is_empty() {
                continue;
            }
            *last = *record.versions();
            notify(events, &changed, record.view(), true);
        }

        for (id, replica) in &self.replicas {
            let last = self.notified.entry(*id).or_default();
            let changed = replica.versions().changed_since(last);
            if changed.is_empty() {
                continue;
            }
            *last = *replica.versions();
            notify(events, &changed, replica.view(), false);

            if changed.contains(&Field::Monster) {
                if let Some(monster) = replica.monster() {
                    let projection = self.projections.entry(*id).or_default();
                    if projection.rebuild(monster) {
                        events.publish(GameEvent::OpponentMonsterChanged(*id));
                    }
                }
            }
        }
    }

    // =========================================================================
    // Replication helpers
    // =========================================================================

    fn broadcast_changes(&self, record: SessionId, changes: Vec<FieldChange>) {
        if changes.is_empty() {
            return;
        }
        let update = ReplicationUpdate {
            record,
            authority: self.node,
            kind: UpdateKind::Delta,
            changes,
            state_hash: None,
        };
        if let Err(e) = self.ctx.transport().broadcast(Message::Replicate(update)) {
            warn!("Broadcast for {} failed: {}", record, e);
        }
    }

    fn send_snapshot(&self, record: SessionId, kind: UpdateKind, to: Option<NodeId>) {
        let Some(state) = self.owned.get(&record) else {
            return;
        };
        let update = ReplicationUpdate {
            record,
            authority: self.node,
            kind,
            changes: state.full_snapshot(),
            state_hash: Some(state.view().state_hash()),
        };
        let message = Message::Replicate(update);
        let result = match to {
            Some(node) => self.ctx.transport().send(node, message),
            None => self.ctx.transport().broadcast(message),
        };
        if let Err(e) = result {
            warn!("Snapshot of {} not sent: {}", record, e);
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    fn check_owned(&self, session: &SessionId) -> Result<(), ActionError> {
        if self.owned.contains_key(session) {
            return Ok(());
        }
        if self.knows(session) || self.ctx.transport().authority_of(session).is_some() {
            warn!("{} is not the authority of {}", self.node, session);
            return Err(ActionError::NotAuthority {
                session: *session,
                caller: self.node,
            });
        }
        Err(ActionError::SessionNotFound(*session))
    }

    fn owned_mut(&mut self, session: &SessionId) -> Result<&mut CombatState, ActionError> {
        self.check_owned(session)?;
        self.owned
            .get_mut(session)
            .ok_or(ActionError::SessionNotFound(*session))
    }

    fn knows(&self, session: &SessionId) -> bool {
        self.owned.contains_key(session) || self.replicas.contains_key(session)
    }

    fn opponents_of(&self, session: &SessionId) -> Vec<SessionId> {
        self.owned
            .keys()
            .chain(self.replicas.keys())
            .filter(|id| *id != session)
            .copied()
            .collect()
    }

    fn request_deadline(&self) -> u64 {
        self.ticks + self.ctx.config().combat.request_timeout_ticks as u64
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_request;
        self.next_request += 1;
        id
    }

    /// Authority of a record, or NotFound once it is gone.
    pub fn lookup_authority(&self, session: &SessionId) -> Result<NodeId, ActionError> {
        self.ctx
            .transport()
            .authority_of(session)
            .ok_or(ActionError::AuthorityNotFound(*session))
    }

    /// This node's id.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Match context.
    pub fn context(&self) -> &MatchContext {
        &self.ctx
    }

    /// Event bus of this node.
    pub fn events(&self) -> &EventBus {
        self.ctx.events()
    }

    /// Is this node the authority of `session`?
    pub fn is_owned(&self, session: &SessionId) -> bool {
        self.owned.contains_key(session)
    }

    /// Does `session` have a play awaiting responses?
    pub fn has_action_in_flight(&self, session: &SessionId) -> bool {
        self.in_flight.contains_key(session)
    }

    /// Read access to an owned record or a replica.
    pub fn view(&self, session: &SessionId) -> Option<CombatView<'_>> {
        self.owned
            .get(session)
            .map(|r| r.view())
            .or_else(|| self.replicas.get(session).map(|r| r.view()))
    }

    /// Own monster of an owned record.
    pub fn own_monster(&self, session: &SessionId) -> Option<&Monster> {
        self.owned.get(session).map(|r| r.monster())
    }

    /// Projection of a remote monster.
    pub fn projection(&self, session: &SessionId) -> Option<&Monster> {
        self.projections.get(session).and_then(|p| p.get())
    }

    /// Current round.
    pub fn round(&self) -> u32 {
        self.turns.round()
    }
}

/// Publish the events for a set of changed fields.
fn notify(events: &EventBus, changed: &[Field], view: CombatView<'_>, own: bool) {
    if changed.iter().any(|f| f.is_stat()) {
        events.publish(GameEvent::StatsChanged(view.session));
    }
    if changed.contains(&Field::Hand) {
        events.publish(GameEvent::HandChanged(view.session, view.hand.to_vec()));
    }
    if own && changed.contains(&Field::Monster) {
        events.publish(GameEvent::OwnMonsterChanged);
    }
    if changed.contains(&Field::FightComplete) {
        events.publish(GameEvent::FightCompletionChanged(view.session, view.fight_complete));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::core::identity::{Color, Position};
    use crate::game::events::Subscription;
    use crate::network::lobby::{LobbyConfig, LobbyCoordinator};
    use crate::network::transport::{LocalHub, Transport};

    const MATCH_ID: [u8; 16] = [7; 16];

    fn node_with(hub: &Arc<LocalHub>, config: CoreConfig) -> MatchNode {
        let ctx = MatchContext::builder()
            .transport(Arc::new(hub.connect()))
            .config(config)
            .match_id(MATCH_ID)
            .build()
            .unwrap();
        MatchNode::new(ctx)
    }

    fn node(hub: &Arc<LocalHub>) -> MatchNode {
        node_with(hub, CoreConfig::default())
    }

    fn session(byte: u8, name: &str, owner: &MatchNode) -> Session {
        Session::new(
            SessionId::new([byte; 16]),
            name.to_string(),
            owner.node_id(),
            Color::from_index(byte as usize),
            Position::ZERO,
        )
    }

    fn pump(nodes: &mut [&mut MatchNode]) {
        for _ in 0..4 {
            for n in nodes.iter_mut() {
                n.tick();
            }
        }
    }

    /// Two nodes, one session each, replicas exchanged.
    fn duel(config: CoreConfig, deck_a: Vec<Card>, deck_b: Vec<Card>) -> (Arc<LocalHub>, MatchNode, MatchNode, Session, Session) {
        let hub = LocalHub::new();
        let mut a = node_with(&hub, config.clone());
        let mut b = node_with(&hub, config);
        let sa = session(1, "Ana", &a);
        let sb = session(2, "Bo", &b);

        a.spawn_combat_with_deck(&sa, deck_a, None).unwrap();
        b.spawn_combat_with_deck(&sb, deck_b, None).unwrap();
        pump(&mut [&mut a, &mut b]);

        (hub, a, b, sa, sb)
    }

    fn strikes() -> Vec<Card> {
        vec![catalog::strike(); 12]
    }

    fn failures(sub: &mut Subscription) -> Vec<GameEvent> {
        sub.drain()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::ActionFailed(..)))
            .collect()
    }

    #[test]
    fn test_spawn_replicates_to_peers() {
        let (_hub, a, b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());

        assert!(a.is_owned(&sa.id));
        assert!(!a.is_owned(&sb.id));

        let replica = a.view(&sb.id).unwrap();
        let original = b.view(&sb.id).unwrap();
        assert_eq!(replica.state_hash(), original.state_hash());
        assert_eq!(replica.hand.len(), 5);
        assert_eq!(a.projection(&sb.id), b.own_monster(&sb.id));
        assert_eq!(a.lookup_authority(&sb.id), Ok(b.node_id()));
    }

    #[test]
    fn test_remote_attack_waits_for_authority() {
        let (_hub, mut a, mut b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());
        let mut events = a.events().subscribe_all();
        a.turn_state_changed(sa.id, true);

        let before = a.projection(&sb.id).cloned().unwrap();
        let outcome = a.play_card(sa.id, 0, sb.id).unwrap();

        assert_eq!(outcome, PlayOutcome::Pending(1));
        assert!(a.has_action_in_flight(&sa.id));
        // Nothing optimistic: projection, energy and hand untouched
        assert_eq!(a.projection(&sb.id), Some(&before));
        assert_eq!(a.view(&sa.id).unwrap().energy, 3);
        assert_eq!(a.view(&sa.id).unwrap().hand.len(), 5);

        // B applies the hit on its own record
        b.tick();
        assert_eq!(b.own_monster(&sb.id).unwrap().health, before.health - 6);
        assert_eq!(a.projection(&sb.id), Some(&before));

        // A sees the broadcast and the Completed response
        a.tick();
        assert_eq!(a.projection(&sb.id).unwrap().health, before.health - 6);
        assert!(!a.has_action_in_flight(&sa.id));
        assert_eq!(a.view(&sa.id).unwrap().energy, 2);
        assert_eq!(a.view(&sa.id).unwrap().hand.len(), 4);

        let got = events.drain();
        assert!(got.contains(&GameEvent::OpponentMonsterChanged(sb.id)));
        assert!(got.contains(&GameEvent::StatsChanged(sa.id)));
    }

    #[test]
    fn test_leave_mid_flight_fails_not_found() {
        let (hub, mut a, b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());
        a.turn_state_changed(sa.id, true);
        a.tick();
        let mut events = a.events().subscribe_all();
        let hash_before = a.view(&sa.id).unwrap().state_hash();

        assert_eq!(a.play_card(sa.id, 0, sb.id), Ok(PlayOutcome::Pending(1)));

        // B drops off before answering
        hub.disconnect(b.node_id());
        a.tick();

        assert_eq!(a.lookup_authority(&sb.id), Err(ActionError::AuthorityNotFound(sb.id)));
        assert!(!a.has_action_in_flight(&sa.id));
        assert_eq!(a.view(&sa.id).unwrap().state_hash(), hash_before);
        assert_eq!(failures(&mut events), vec![GameEvent::ActionFailed(sa.id, ErrorKind::NotFound)]);

        // Further plays at B fail up front
        let err = a.play_card(sa.id, 0, sb.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(a.view(&sa.id).unwrap().state_hash(), hash_before);
    }

    #[test]
    fn test_despawn_mid_flight_releases_reservation() {
        let (_hub, mut a, mut b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());
        a.turn_state_changed(sa.id, true);
        a.tick();
        let mut events = a.events().subscribe_all();

        a.play_card(sa.id, 0, sb.id).unwrap();
        assert!(b.despawn(&sb.id).is_some());
        b.tick();
        a.tick();

        assert!(a.view(&sb.id).is_none());
        assert!(a.projection(&sb.id).is_none());
        assert_eq!(a.view(&sa.id).unwrap().energy, 3);
        assert_eq!(failures(&mut events), vec![GameEvent::ActionFailed(sa.id, ErrorKind::NotFound)]);
    }

    #[test]
    fn test_request_times_out() {
        let mut config = CoreConfig::default();
        config.combat.request_timeout_ticks = 3;
        let (_hub, mut a, _b, sa, sb) = duel(config, strikes(), strikes());
        a.turn_state_changed(sa.id, true);
        let mut events = a.events().subscribe_all();

        a.play_card(sa.id, 0, sb.id).unwrap();
        // B never ticks
        for _ in 0..3 {
            a.tick();
        }

        assert!(!a.has_action_in_flight(&sa.id));
        assert_eq!(a.view(&sa.id).unwrap().energy, 3);
        assert_eq!(failures(&mut events), vec![GameEvent::ActionFailed(sa.id, ErrorKind::Timeout)]);
    }

    #[test]
    fn test_one_action_in_flight() {
        let (_hub, mut a, _b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());
        a.turn_state_changed(sa.id, true);

        a.play_card(sa.id, 0, sb.id).unwrap();
        assert_eq!(a.play_card(sa.id, 1, sb.id), Err(ActionError::ActionInFlight(sa.id)));
    }

    #[test]
    fn test_defeat_grants_score_to_attacker() {
        let (_hub, mut a, mut b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());
        let mut events = a.events().subscribe_all();

        for _ in 0..5 {
            a.turn_state_changed(sa.id, true);
            for _ in 0..3 {
                if a.projection(&sb.id).map_or(false, |m| m.is_defeated()) {
                    break;
                }
                a.play_card(sa.id, 0, sb.id).unwrap();
                pump(&mut [&mut a, &mut b]);
            }
            a.turn_state_changed(sa.id, false);
        }

        assert!(b.own_monster(&sb.id).unwrap().is_defeated());
        assert!(a.projection(&sb.id).unwrap().is_defeated());
        let view = a.view(&sa.id).unwrap();
        assert_eq!(view.score, 1);
        assert!(view.fight_complete);
        // Replicated back to B
        assert_eq!(b.view(&sa.id).unwrap().score, 1);
        assert!(events.drain().contains(&GameEvent::FightCompletionChanged(sa.id, true)));
    }

    #[test]
    fn test_same_node_resolves_directly() {
        let hub = LocalHub::new();
        let mut host = node(&hub);
        let sa = session(1, "Ana", &host);
        let sb = session(2, "Bo", &host);
        host.spawn_combat_with_deck(&sa, strikes(), None).unwrap();
        host.spawn_combat_with_deck(&sb, strikes(), None).unwrap();
        host.turn_state_changed(sa.id, true);

        let before = host.own_monster(&sb.id).unwrap().health;
        assert_eq!(host.play_card(sa.id, 0, sb.id), Ok(PlayOutcome::Resolved));

        assert_eq!(host.own_monster(&sb.id).unwrap().health, before - 6);
        assert_eq!(host.view(&sa.id).unwrap().energy, 2);
    }

    #[test]
    fn test_own_target_and_mismatch() {
        let deck = vec![catalog::defend(); 12];
        let (_hub, mut a, _b, sa, sb) = duel(CoreConfig::default(), deck, strikes());
        a.turn_state_changed(sa.id, true);
        a.tick();
        let versions = *a.owned[&sa.id].versions();

        let err = a.play_card(sa.id, 0, sb.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TargetInvalid);
        assert_eq!(*a.owned[&sa.id].versions(), versions);

        assert_eq!(a.play_card(sa.id, 0, sa.id), Ok(PlayOutcome::Resolved));
        assert_eq!(a.own_monster(&sa.id).unwrap().block, 5);
        assert_eq!(a.view(&sa.id).unwrap().energy, 2);
    }

    #[test]
    fn test_enemy_card_on_self_rejected() {
        let (_hub, mut a, _b, sa, _sb) = duel(CoreConfig::default(), strikes(), strikes());
        a.turn_state_changed(sa.id, true);

        let err = a.play_card(sa.id, 0, sa.id).unwrap_err();
        assert!(matches!(err, ActionError::TargetMismatch { .. }));
    }

    #[test]
    fn test_not_your_turn_rejected() {
        let (_hub, mut a, _b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());
        let versions = *a.owned[&sa.id].versions();

        assert_eq!(a.play_card(sa.id, 0, sb.id), Err(ActionError::NotYourTurn(sa.id)));
        assert_eq!(*a.owned[&sa.id].versions(), versions);
    }

    #[test]
    fn test_unknown_target_not_found() {
        let (_hub, mut a, _b, sa, _sb) = duel(CoreConfig::default(), strikes(), strikes());
        a.turn_state_changed(sa.id, true);
        let ghost = SessionId::new([99; 16]);

        assert_eq!(a.play_card(sa.id, 0, ghost), Err(ActionError::SessionNotFound(ghost)));
    }

    #[test]
    fn test_non_owner_cannot_mutate() {
        let (_hub, a, mut b, sa, _sb) = duel(CoreConfig::default(), strikes(), strikes());
        let hash = a.view(&sa.id).unwrap().state_hash();

        let err = b.modify_health(sa.id, -10).unwrap_err();
        assert_eq!(err, ActionError::NotAuthority { session: sa.id, caller: b.node_id() });
        assert!(b.increase_score(sa.id, 3).is_err());
        assert_eq!(b.play_card(sa.id, 0, sa.id).unwrap_err().kind(), ErrorKind::AuthorityViolation);

        assert_eq!(a.view(&sa.id).unwrap().state_hash(), hash);
    }

    #[test]
    fn test_cleave_hits_every_opponent() {
        let hub = LocalHub::new();
        let mut a = node(&hub);
        let mut b = node(&hub);
        let mut c = node(&hub);
        let sa = session(1, "Ana", &a);
        let sb = session(2, "Bo", &b);
        let sc = session(3, "Cy", &c);
        a.spawn_combat_with_deck(&sa, vec![catalog::cleave(); 12], None).unwrap();
        b.spawn_combat_with_deck(&sb, strikes(), None).unwrap();
        c.spawn_combat_with_deck(&sc, strikes(), None).unwrap();
        pump(&mut [&mut a, &mut b, &mut c]);
        a.turn_state_changed(sa.id, true);

        let hb = b.own_monster(&sb.id).unwrap().health;
        let hc = c.own_monster(&sc.id).unwrap().health;
        assert_eq!(a.play_card(sa.id, 0, sb.id), Ok(PlayOutcome::Pending(2)));
        pump(&mut [&mut a, &mut b, &mut c]);

        assert_eq!(b.own_monster(&sb.id).unwrap().health, hb - 5);
        assert_eq!(c.own_monster(&sc.id).unwrap().health, hc - 5);
        assert_eq!(a.view(&sa.id).unwrap().energy, 2);
    }

    #[test]
    fn test_change_detection_is_idempotent() {
        let (_hub, mut a, _b, sa, _sb) = duel(CoreConfig::default(), strikes(), strikes());
        let mut events = a.events().subscribe_all();

        a.modify_health(sa.id, -5).unwrap();
        a.tick();
        assert_eq!(events.drain(), vec![GameEvent::StatsChanged(sa.id)]);

        a.tick();
        assert!(events.drain().is_empty());
    }

    #[test]
    fn test_round_and_end_turn() {
        let (_hub, mut a, _b, sa, _sb) = duel(CoreConfig::default(), strikes(), strikes());
        let mut events = a.events().subscribe_all();

        assert_eq!(a.request_end_turn(sa.id), Err(ActionError::NotYourTurn(sa.id)));
        a.turn_state_changed(sa.id, true);
        a.request_end_turn(sa.id).unwrap();
        a.round_started(2);
        a.round_started(2);

        let got = events.drain();
        assert!(got.contains(&GameEvent::EndTurnRequested(sa.id)));
        assert_eq!(got.iter().filter(|e| **e == GameEvent::RoundChanged(2)).count(), 1);
        assert_eq!(a.round(), 2);
    }

    #[test]
    fn test_checksum_mismatch_triggers_resync() {
        let (hub, mut a, mut b, _sa, sb) = duel(CoreConfig::default(), strikes(), strikes());

        // A forged delta pushes A's replica ahead of the authority
        let rogue = hub.connect();
        let forged = ReplicationUpdate {
            record: sb.id,
            authority: b.node_id(),
            kind: UpdateKind::Delta,
            changes: vec![FieldChange {
                version: 99,
                value: crate::game::replica::FieldValue::Score(42),
            }],
            state_hash: None,
        };
        rogue.send(a.node_id(), Message::Replicate(forged)).unwrap();
        a.tick();
        assert_eq!(a.view(&sb.id).unwrap().score, 42);

        b.publish_checksums();
        pump(&mut [&mut a, &mut b]);

        assert_eq!(a.view(&sb.id).unwrap().score, 0);
        assert_eq!(
            a.view(&sb.id).unwrap().state_hash(),
            b.view(&sb.id).unwrap().state_hash()
        );
    }

    #[test]
    fn test_lobby_to_combat_with_rejoin() {
        let hub = LocalHub::new();
        let mut a = node(&hub);
        let mut b = node(&hub);
        let mut lobby = LobbyCoordinator::new(LobbyConfig::default(), a.events().clone());
        let mut lobby_events = a.events().subscribe(&[crate::game::events::Topic::Lobby]);

        let ra = lobby.register(SessionId::new([1; 16]), "Ana", a.node_id());
        let rb = lobby.register(SessionId::new([2; 16]), "Bo", b.node_id());
        lobby.set_ready(a.node_id(), &ra.session.id, true).unwrap();
        lobby.set_ready(b.node_id(), &rb.session.id, true).unwrap();

        let started = lobby.tick(Duration::from_secs(3)).unwrap();
        for s in &started {
            if s.owner == a.node_id() {
                a.spawn_combat(s, None).unwrap();
            } else {
                b.spawn_combat(s, None).unwrap();
            }
        }
        pump(&mut [&mut a, &mut b]);
        assert!(lobby_events.drain().contains(&GameEvent::GameStarted));
        assert!(a.view(&rb.session.id).is_some());

        // Bo loses some health, leaves, and comes back
        b.modify_health(rb.session.id, -12).unwrap();
        let last = b.despawn(&rb.session.id).unwrap();
        lobby.update_rejoin_combat("Bo", last.view().health, last.monster().clone());
        lobby.leave(&rb.session.id);
        pump(&mut [&mut a, &mut b]);
        assert!(a.view(&rb.session.id).is_none());

        let back = lobby.register(SessionId::new([3; 16]), "Bo", b.node_id());
        b.spawn_combat(&back.session, back.restored.as_ref()).unwrap();
        pump(&mut [&mut a, &mut b]);

        assert_eq!(a.view(&back.session.id).unwrap().health, 38);
    }

    #[test]
    fn test_turn_change_settles_pending_play() {
        let (_hub, mut a, mut b, sa, sb) = duel(CoreConfig::default(), strikes(), strikes());
        let mut events = a.events().subscribe_all();
        a.turn_state_changed(sa.id, true);
        let health = b.own_monster(&sb.id).unwrap().health;

        assert_eq!(a.play_card(sa.id, 0, sb.id), Ok(PlayOutcome::Pending(1)));

        // Turn passes before B answers: the play is paid by the turn it was made in
        a.turn_state_changed(sa.id, false);
        assert!(!a.has_action_in_flight(&sa.id));
        assert_eq!(a.view(&sa.id).unwrap().energy, 2);
        assert_eq!(a.view(&sa.id).unwrap().hand.len(), 4);

        a.turn_state_changed(sa.id, true);
        let hand = a.view(&sa.id).unwrap().hand.to_vec();
        let discarded = a.owned[&sa.id].hand_engine().discard_len();

        b.tick();
        a.tick();

        // The late Completed leaves the new turn alone
        assert_eq!(b.own_monster(&sb.id).unwrap().health, health - 6);
        let view = a.view(&sa.id).unwrap();
        assert_eq!(view.energy, 3);
        assert_eq!(view.hand, hand.as_slice());
        assert_eq!(a.owned[&sa.id].hand_engine().discard_len(), discarded);
        assert!(failures(&mut events).is_empty());
    }

    #[test]
    fn test_all_target_shields_self_and_hits_opponents() {
        let (_hub, mut a, mut b, sa, sb) =
            duel(CoreConfig::default(), vec![catalog::thunderclap(); 12], strikes());
        a.turn_state_changed(sa.id, true);
        let health = b.own_monster(&sb.id).unwrap().health;

        assert_eq!(a.play_card(sa.id, 0, sa.id), Ok(PlayOutcome::Pending(1)));
        // Own block waits for the commit too
        assert_eq!(a.own_monster(&sa.id).unwrap().block, 0);

        pump(&mut [&mut a, &mut b]);

        assert_eq!(b.own_monster(&sb.id).unwrap().health, health - 4);
        assert_eq!(a.projection(&sb.id).unwrap().health, health - 4);
        assert_eq!(a.own_monster(&sa.id).unwrap().block, 3);
        assert_eq!(a.view(&sa.id).unwrap().energy, 2);
        assert!(!a.has_action_in_flight(&sa.id));
    }

    #[test]
    fn test_all_target_without_opponents_resolves_own_effects() {
        let hub = LocalHub::new();
        let mut solo = node(&hub);
        let sa = session(1, "Ana", &solo);
        solo.spawn_combat_with_deck(&sa, vec![catalog::thunderclap(); 12], None).unwrap();
        solo.turn_state_changed(sa.id, true);

        assert_eq!(solo.play_card(sa.id, 0, sa.id), Ok(PlayOutcome::Resolved));
        assert_eq!(solo.own_monster(&sa.id).unwrap().block, 3);
        assert_eq!(solo.view(&sa.id).unwrap().energy, 2);
    }

    #[test]
    fn test_unanswered_score_grant_expires() {
        let mut config = CoreConfig::default();
        config.combat.request_timeout_ticks = 3;
        let (hub, a, mut b, sa, sb) = duel(config, strikes(), strikes());
        let rogue = hub.connect();

        // Finishing blow credited to A, whose node never ticks
        let request = Message::Request {
            id: 1,
            action: Action::ApplyDamage {
                target: sb.id,
                attacker: sa.id,
                amount: 1_000,
            },
        };
        rogue.send(b.node_id(), request).unwrap();
        b.tick();
        assert!(b.own_monster(&sb.id).unwrap().is_defeated());
        assert_eq!(b.pending.len(), 1);

        for _ in 0..3 {
            b.tick();
        }
        assert!(b.pending.is_empty());
        assert_eq!(a.view(&sa.id).unwrap().score, 0);
    }

    #[tokio::test]
    async fn test_await_record_resolves_on_spawn() {
        let hub = LocalHub::new();
        let a = node(&hub);
        let mut b = node(&hub);
        let sb = session(2, "Bo", &b);

        let waiting = a.await_record(sb.id, Duration::from_secs(1));
        b.spawn_combat(&sb, None).unwrap();

        assert_eq!(waiting.await, Ok(b.node_id()));
    }

    #[tokio::test]
    async fn test_await_record_times_out() {
        let hub = LocalHub::new();
        let a = node(&hub);
        let ghost = SessionId::new([42; 16]);

        let result = a.await_record(ghost, Duration::from_millis(20)).await;

        assert_eq!(result, Err(WaitError::Timeout(ghost)));
    }
}
