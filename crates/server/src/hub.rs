//! Outbound queues for live WebSocket connections

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use stockwatch_alerts::{ChannelId, PushChannel};
use stockwatch_core::{DeliveryError, DeliveryResult, ServerEvent};

/// Bounded outbound queue per channel; each connection's writer task drains its own
#[derive(Debug, Default)]
pub struct ChannelHub {
    queues: DashMap<ChannelId, mpsc::Sender<ServerEvent>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, channel: ChannelId, queue: mpsc::Sender<ServerEvent>) {
        self.queues.insert(channel, queue);
    }

    pub fn detach(&self, channel: ChannelId) -> bool {
        self.queues.remove(&channel).is_some()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

impl PushChannel for ChannelHub {
    fn send(&self, channel: ChannelId, event: ServerEvent) -> DeliveryResult<()> {
        let queue = self
            .queues
            .get(&channel)
            .ok_or_else(|| DeliveryError::Closed(channel.to_string()))?;

        queue.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Backpressure(channel.to_string()),
            TrySendError::Closed(_) => DeliveryError::Closed(channel.to_string()),
        })
    }
}
