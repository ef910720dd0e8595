// File-backed store
//
// One pretty-printed JSON file per document. Writes go through an atomic
// temp-fsync-rename so a crash mid-write never leaves a half-written
// document: readers see the old content until the rename lands. Writes
// share a deterministic temp path per document, so they are serialized
// behind an async lock; overlapping writers would otherwise truncate
// each other's temp file and rename a torn document into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::constants::TEMP_FILE_PREFIX;
use crate::error::Result;

use super::{Doc, Document, Store};

pub struct FileStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Probe the directory once: create it and confirm it is writable.
    /// Failure means the caller should fall back to the ephemeral store.
    pub fn probe(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let probe = dir.join(format!("{}probe", TEMP_FILE_PREFIX));
        std::fs::write(&probe, b"")?;
        std::fs::remove_file(&probe)?;
        Ok(FileStore {
            dir: dir.to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn path_for(&self, doc: Doc) -> PathBuf {
        self.dir.join(doc.file_name())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn read(&self, doc: Doc) -> Result<Document> {
        let path = self.path_for(doc);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(content) => Ok(content),
            Err(e) => {
                // Corrupt document: start fresh rather than fail the load
                log::warn!("Unreadable {} ({}), treating as empty", doc.file_name(), e);
                Ok(Document::new())
            }
        }
    }

    async fn write(&self, doc: Doc, content: &Document) -> Result<()> {
        let json = serde_json::to_string_pretty(content)?;

        let _guard = self.write_lock.lock().await;
        let tmp_path = self.dir.join(format!("{}{}", TEMP_FILE_PREFIX, doc.file_name()));
        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, self.path_for(doc)).await?;
        Ok(())
    }
}
