// In-memory store
//
// The ephemeral fallback: scoped to the process, never touches disk.
// Document names map to the legacy local-storage key names so a host
// embedding both store kinds sees consistent namespacing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;

use super::{Doc, Document, Store};

#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<&'static str, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, doc: Doc) -> Result<Document> {
        let docs = self.docs.lock().unwrap();
        Ok(docs.get(doc.storage_key()).cloned().unwrap_or_default())
    }

    async fn write(&self, doc: Doc, content: &Document) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        docs.insert(doc.storage_key(), content.clone());
        Ok(())
    }
}
