//! Identity to live-channel registry
//!
//! At most one channel per identity. Registering again replaces the old
//! mapping silently; an entry only goes away when its own channel
//! disconnects, so a replaced channel that never reports a disconnect
//! is not cleaned up here.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use stockwatch_core::Identity;

/// Unique push channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Generates a new unique channel ID.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Registry of identities with a live channel
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    channels: RwLock<HashMap<Identity, ChannelId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `identity` to `channel`, returning the channel it replaced
    pub fn register(&self, identity: Identity, channel: ChannelId) -> Option<ChannelId> {
        self.channels.write().insert(identity, channel)
    }

    /// Drop the entry pointing at `channel`, if any
    pub fn unregister(&self, channel: ChannelId) -> Option<Identity> {
        let mut channels = self.channels.write();
        let identity = channels
            .iter()
            .find(|(_, c)| **c == channel)
            .map(|(identity, _)| identity.clone())?;
        channels.remove(&identity);
        Some(identity)
    }

    pub fn channel_for(&self, identity: &Identity) -> Option<ChannelId> {
        self.channels.read().get(identity).copied()
    }

    /// Point-in-time copy of every registration
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut entries: Vec<(Identity, ChannelId)> = self
            .channels
            .read()
            .iter()
            .map(|(identity, channel)| (identity.clone(), *channel))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        RegistrySnapshot { entries }
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

/// Registrations as of `ConnectionRegistry::snapshot`; iterate as often as needed
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: Vec<(Identity, ChannelId)>,
}

impl RegistrySnapshot {
    pub fn iter(&self) -> impl Iterator<Item = (&Identity, ChannelId)> + '_ {
        self.entries.iter().map(|(identity, channel)| (identity, *channel))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for RegistrySnapshot {
    type Item = (Identity, ChannelId);
    type IntoIter = std::vec::IntoIter<(Identity, ChannelId)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
