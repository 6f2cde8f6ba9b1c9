//! Broadcast bus carrying committed graph mutations to subscribers

use super::{EventEmitter, GraphEvent};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default number of events a subscriber may fall behind before losing the oldest
pub const DEFAULT_CAPACITY: usize = 1024;

/// [`EventEmitter`] backed by a bounded `tokio::sync::broadcast` channel.
///
/// `emit` never blocks and needs no runtime. With no subscribers the event is
/// dropped; a subscriber lagging more than `capacity` events behind gets
/// `RecvError::Lagged` and resumes at the oldest retained event. Clones share
/// the channel, which is how the service and its store both reach it.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: GraphEvent) {
        let kind = event.kind;
        let graph_id = event.graph_id.clone();
        match self.sender.send(event) {
            Ok(subscribers) => {
                debug!(kind = %kind, graph_id = %graph_id, subscribers, "Graph event sent")
            }
            Err(_) => {
                trace!(kind = %kind, graph_id = %graph_id, "Graph event dropped, no subscribers")
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
