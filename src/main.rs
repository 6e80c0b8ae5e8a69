//! Card Clash Server
//!
//! Runs a two-node demo match over the in-memory hub: lobby, countdown,
//! combat spawn and a few cross-authority card plays.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use card_clash::{
    CoreConfig, EventBus, LobbyCoordinator, LocalHub, MatchContext, MatchNode, PlayOutcome,
    SessionId, TICK_RATE, VERSION,
};
use card_clash::game::events::Topic;

#[tokio::main]
async fn main() -> Result<()> {
    let config = CoreConfig::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Card Clash Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    demo_match(config).await
}

/// Pump every node's inbox until nothing is left to deliver.
fn pump(nodes: &mut [&mut MatchNode]) {
    loop {
        let handled: usize = nodes.iter_mut().map(|n| n.tick()).sum();
        if handled == 0 {
            break;
        }
    }
}

async fn demo_match(config: CoreConfig) -> Result<()> {
    info!("=== Starting Demo Match ===");

    let hub = LocalHub::new();
    let match_id = uuid::Uuid::new_v4().into_bytes();
    let host_events = EventBus::default();

    let mut host = MatchNode::new(
        MatchContext::builder()
            .transport(Arc::new(hub.connect()))
            .events(host_events.clone())
            .config(config.clone())
            .match_id(match_id)
            .build()?,
    );
    let mut guest = MatchNode::new(
        MatchContext::builder()
            .transport(Arc::new(hub.connect()))
            .config(config.clone())
            .match_id(match_id)
            .build()?,
    );

    info!("Match ID: {}", hex::encode(match_id));
    info!("Nodes on hub: {:?}", hub.nodes());

    // Lobby
    let mut lobby = LobbyCoordinator::new(config.lobby, host_events.clone());
    let mut lobby_events = host_events.subscribe(&[Topic::Lobby]);

    let ana = lobby.register(SessionId::random(), "Ana", host.node_id()).session;
    let bo = lobby.register(SessionId::random(), "Bo", guest.node_id()).session;

    lobby.set_ready(host.node_id(), &ana.id, true)?;
    lobby.set_ready(guest.node_id(), &bo.id, true)?;

    let frame = Duration::from_secs(1) / TICK_RATE;
    let started = loop {
        if let Some(sessions) = lobby.tick(frame) {
            break sessions;
        }
    };
    for event in lobby_events.drain() {
        info!("Lobby: {:?}", event);
    }

    // Combat
    for session in &started {
        if session.is_owned_by(host.node_id()) {
            host.spawn_combat(session, None)?;
        } else {
            guest.spawn_combat(session, None)?;
        }
    }
    pump(&mut [&mut host, &mut guest]);

    let mut failures = host_events.subscribe(&[Topic::Action]);

    host.round_started(1);
    host.turn_state_changed(ana.id, true);
    pump(&mut [&mut host, &mut guest]);

    for index in 0..3 {
        match host.play_card(ana.id, 0, bo.id) {
            Ok(PlayOutcome::Resolved) => info!("Play {} resolved locally", index),
            Ok(PlayOutcome::Pending(n)) => info!("Play {} awaiting {} response(s)", index, n),
            Err(e) => {
                warn!("Play {} refused: {}", index, e);
                continue;
            }
        }
        pump(&mut [&mut host, &mut guest]);
    }

    for event in failures.drain() {
        warn!("Action failed: {:?}", event);
    }

    let Some(own) = host.view(&ana.id) else {
        bail!("host lost its own record");
    };
    info!("Ana: health {}, energy {}, hand {}", own.health, own.energy, own.hand.len());

    if let Some(monster) = host.projection(&bo.id) {
        info!("Bo's {} as seen by host: {}/{}", monster.name, monster.health, monster.max_health);
    }

    // Checksums agree after the exchange
    host.publish_checksums();
    guest.publish_checksums();
    pump(&mut [&mut host, &mut guest]);

    info!("=== Demo Complete ===");
    Ok(())
}
