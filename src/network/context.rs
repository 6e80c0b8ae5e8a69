//! Match Context
//!
//! The per-match registry handed to every component at construction:
//! transport, event bus, configuration and match id. Built once per match;
//! there is no global "current match".

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::CoreConfig;
use crate::game::events::EventBus;
use crate::network::transport::Transport;

/// Fatal initialization errors.
#[derive(Debug, Error)]
pub enum InitError {
    /// No transport/authority provider was supplied.
    #[error("no transport provider configured")]
    MissingTransport,
}

/// Shared per-match handles.
#[derive(Clone)]
pub struct MatchContext {
    transport: Arc<dyn Transport>,
    events: EventBus,
    config: Arc<CoreConfig>,
    match_id: [u8; 16],
}

impl MatchContext {
    /// Start building a context.
    pub fn builder() -> MatchContextBuilder {
        MatchContextBuilder::default()
    }

    /// Transport of the local node.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Match identifier (deck seeds derive from it).
    pub fn match_id(&self) -> &[u8; 16] {
        &self.match_id
    }
}

/// Builder for [`MatchContext`].
#[derive(Default)]
pub struct MatchContextBuilder {
    transport: Option<Arc<dyn Transport>>,
    events: Option<EventBus>,
    config: Option<CoreConfig>,
    match_id: Option<[u8; 16]>,
}

impl MatchContextBuilder {
    /// Transport provider (required).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Event bus (defaults to a fresh bus).
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Configuration (defaults to `CoreConfig::default()`).
    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Match id (defaults to a random UUID).
    pub fn match_id(mut self, match_id: [u8; 16]) -> Self {
        self.match_id = Some(match_id);
        self
    }

    /// Finish. Fails only if no transport was given.
    pub fn build(self) -> Result<MatchContext, InitError> {
        let transport = self.transport.ok_or(InitError::MissingTransport)?;
        let match_id = self
            .match_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().into_bytes());

        info!(
            "Match {} context ready on {}",
            hex::encode(&match_id[..4]),
            transport.local_node()
        );

        Ok(MatchContext {
            transport,
            events: self.events.unwrap_or_default(),
            config: Arc::new(self.config.unwrap_or_default()),
            match_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::transport::LocalHub;

    #[test]
    fn test_missing_transport_is_fatal() {
        let result = MatchContext::builder().config(CoreConfig::default()).build();
        assert!(matches!(result, Err(InitError::MissingTransport)));
    }

    #[test]
    fn test_build_with_transport() {
        let hub = LocalHub::new();
        let ctx = MatchContext::builder()
            .transport(Arc::new(hub.connect()))
            .match_id([3; 16])
            .build()
            .unwrap();

        assert_eq!(ctx.match_id(), &[3; 16]);
        assert_eq!(ctx.config().hand.target_size, 5);
        assert_eq!(ctx.transport().local_node().0, 1);
    }
}
