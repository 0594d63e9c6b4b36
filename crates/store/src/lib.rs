//! Identity store backends
//!
//! - `MemoryStore`: process-lifetime, concurrent map
//! - `FileStore`: JSON document on disk
//!
//! `open_store` prefers the file store and falls back to memory.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;
use tracing::{info, warn};

use stockwatch_core::{IdentityStore, StoreConfig};

/// Open the configured store, falling back to memory when the file store is unusable
pub async fn open_store(config: &StoreConfig) -> Arc<dyn IdentityStore> {
    if let Some(path) = &config.path {
        match FileStore::open(path, config.starting_cash).await {
            Ok(store) => {
                info!("Using file store at {:?}", store.path());
                return Arc::new(store);
            }
            Err(e) => {
                warn!("File store at {:?} unavailable ({}), falling back to memory", path, e);
            }
        }
    }

    info!("Using in-memory store");
    Arc::new(MemoryStore::new(config.starting_cash))
}
