// Persistence backends for derived group attributes
//
// Two interchangeable stores sit behind the `Store` trait: a durable
// file-backed store and an ephemeral in-memory store. The durable store
// is probed once at startup; if it is unavailable the synchronizer uses
// the in-memory store for the rest of the process lifetime.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::constants::{COLORS_FILE, COLORS_STORAGE_KEY, ICONS_FILE, ICONS_STORAGE_KEY};
use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A flat persisted document: group id -> string value.
pub type Document = BTreeMap<String, String>;

/// The two documents the synchronizer persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doc {
    Colors,
    Icons,
}

impl Doc {
    /// File name used by the durable store.
    pub fn file_name(self) -> &'static str {
        match self {
            Doc::Colors => COLORS_FILE,
            Doc::Icons => ICONS_FILE,
        }
    }

    /// Key name used by the ephemeral store.
    pub fn storage_key(self) -> &'static str {
        match self {
            Doc::Colors => COLORS_STORAGE_KEY,
            Doc::Icons => ICONS_STORAGE_KEY,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Read a document. A missing or unparseable document reads as an
    /// empty map; only hard I/O failures surface as errors.
    async fn read(&self, doc: Doc) -> Result<Document>;

    /// Replace a document's content. Old content must remain readable
    /// until the new content is fully written.
    async fn write(&self, doc: Doc, content: &Document) -> Result<()>;
}

/// Probe the durable backend once and pick a store for the process
/// lifetime. There is no later re-probe or upgrade.
pub fn select_store(data_dir: Option<&Path>) -> Arc<dyn Store> {
    match data_dir {
        Some(dir) => match FileStore::probe(dir) {
            Ok(store) => {
                log::info!("Using file store at {}", dir.display());
                Arc::new(store)
            }
            Err(e) => {
                log::warn!(
                    "File store unavailable at {} ({}), falling back to in-memory store",
                    dir.display(),
                    e
                );
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            log::warn!("No data directory available, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}
