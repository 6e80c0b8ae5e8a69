//! Transport and Authority Provider
//!
//! The seam between match nodes and whatever carries their messages. A
//! transport assigns one authority node per record, delivers directed
//! messages FIFO per sender, and fans replication updates out to every other
//! node.
//!
//! [`LocalHub`] is the in-process implementation used by tests and the demo
//! binary: each connected node gets an unbounded inbox, and the authority
//! directory is published through a `watch` channel so callers can await a
//! record without polling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::core::identity::{NodeId, SessionId};
use crate::network::protocol::{Envelope, Message};

/// Record id → authority node.
pub type Directory = BTreeMap<SessionId, NodeId>;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Target node is not connected.
    #[error("{0} is not connected")]
    NodeUnreachable(NodeId),

    /// This endpoint has been disconnected.
    #[error("endpoint {0} is disconnected")]
    Disconnected(NodeId),
}

/// Bounded wait errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// Deadline passed before the record appeared.
    #[error("timed out waiting for record {0}")]
    Timeout(SessionId),

    /// Transport went away while waiting.
    #[error("transport closed while waiting for record {0}")]
    Closed(SessionId),
}

/// What a match node needs from the transport layer.
pub trait Transport: Send + Sync {
    /// Node this endpoint speaks for.
    fn local_node(&self) -> NodeId;

    /// Current authority of a record, if any.
    fn authority_of(&self, record: &SessionId) -> Option<NodeId>;

    /// Make `node` the authority of `record`.
    fn assign_authority(&self, record: SessionId, node: NodeId);

    /// Drop the authority mapping of `record`.
    fn release_authority(&self, record: &SessionId);

    /// Directed message to one node.
    fn send(&self, target: NodeId, message: Message) -> Result<(), TransportError>;

    /// Message to every other connected node.
    fn broadcast(&self, message: Message) -> Result<(), TransportError>;

    /// Next delivered message, if any. Never blocks.
    fn try_recv(&self) -> Option<Envelope>;

    /// Live view of the authority directory.
    fn watch_directory(&self) -> watch::Receiver<Directory>;
}

/// Wait until `record` has an authority, or fail after `timeout`.
pub async fn wait_for_record(
    mut directory: watch::Receiver<Directory>,
    record: SessionId,
    timeout: Duration,
) -> Result<NodeId, WaitError> {
    let wait = async {
        loop {
            let found = directory.borrow_and_update().get(&record).copied();
            if let Some(node) = found {
                return Ok(node);
            }
            if directory.changed().await.is_err() {
                return Err(WaitError::Closed(record));
            }
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| WaitError::Timeout(record))?
}

// =============================================================================
// IN-PROCESS HUB
// =============================================================================

#[derive(Default)]
struct Routes {
    inboxes: BTreeMap<NodeId, mpsc::UnboundedSender<Envelope>>,
    next_node: u32,
}

/// In-process transport shared by every node of a match.
pub struct LocalHub {
    routes: Mutex<Routes>,
    directory: watch::Sender<Directory>,
}

impl LocalHub {
    /// Create an empty hub.
    pub fn new() -> Arc<Self> {
        let (directory, _) = watch::channel(Directory::new());
        Arc::new(Self {
            routes: Mutex::new(Routes {
                inboxes: BTreeMap::new(),
                next_node: 1,
            }),
            directory,
        })
    }

    /// Connect a new node and return its endpoint.
    pub fn connect(self: &Arc<Self>) -> HubEndpoint {
        let (tx, rx) = mpsc::unbounded_channel();
        let node = {
            let mut routes = self.routes.lock();
            let node = NodeId(routes.next_node);
            routes.next_node += 1;
            routes.inboxes.insert(node, tx);
            node
        };
        info!("{} connected to hub", node);

        HubEndpoint {
            hub: Arc::clone(self),
            node,
            inbox: Mutex::new(rx),
        }
    }

    /// Disconnect a node: its inbox is dropped along with every authority
    /// mapping it held.
    pub fn disconnect(&self, node: NodeId) {
        let removed = self.routes.lock().inboxes.remove(&node).is_some();
        if removed {
            self.directory.send_modify(|dir| dir.retain(|_, owner| *owner != node));
            info!("{} disconnected from hub", node);
        }
    }

    /// Connected nodes.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.routes.lock().inboxes.keys().copied().collect()
    }

    fn deliver(&self, from: NodeId, target: NodeId, message: Message) -> Result<(), TransportError> {
        let routes = self.routes.lock();
        let tx = routes
            .inboxes
            .get(&target)
            .ok_or(TransportError::NodeUnreachable(target))?;
        tx.send(Envelope { from, message })
            .map_err(|_| TransportError::NodeUnreachable(target))
    }

    fn fan_out(&self, from: NodeId, message: Message) -> Result<(), TransportError> {
        let routes = self.routes.lock();
        if !routes.inboxes.contains_key(&from) {
            return Err(TransportError::Disconnected(from));
        }
        for (node, tx) in routes.inboxes.iter().filter(|(node, _)| **node != from) {
            if tx.send(Envelope { from, message: message.clone() }).is_err() {
                debug!("Inbox of {} closed, skipping", node);
            }
        }
        Ok(())
    }
}

/// One node's handle on a [`LocalHub`].
pub struct HubEndpoint {
    hub: Arc<LocalHub>,
    node: NodeId,
    inbox: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

impl Transport for HubEndpoint {
    fn local_node(&self) -> NodeId {
        self.node
    }

    fn authority_of(&self, record: &SessionId) -> Option<NodeId> {
        self.hub.directory.borrow().get(record).copied()
    }

    fn assign_authority(&self, record: SessionId, node: NodeId) {
        self.hub.directory.send_modify(|dir| {
            dir.insert(record, node);
        });
        debug!("{} is now authority of {}", node, record);
    }

    fn release_authority(&self, record: &SessionId) {
        self.hub.directory.send_modify(|dir| {
            dir.remove(record);
        });
    }

    fn send(&self, target: NodeId, message: Message) -> Result<(), TransportError> {
        self.hub.deliver(self.node, target, message)
    }

    fn broadcast(&self, message: Message) -> Result<(), TransportError> {
        self.hub.fan_out(self.node, message)
    }

    fn try_recv(&self) -> Option<Envelope> {
        self.inbox.lock().try_recv().ok()
    }

    fn watch_directory(&self) -> watch::Receiver<Directory> {
        self.hub.directory.subscribe()
    }
}
