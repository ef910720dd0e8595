// Image source fetching seam
//
// The synchronizer never assumes where image bytes come from. Hosts
// plug in their own fetcher (browser favicon cache, HTTP, test fakes);
// the default reads local files.

use async_trait::async_trait;

use crate::error::{Result, TabTintError};

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the raw encoded bytes for one image source.
    async fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// Reads image sources from the local filesystem. Accepts plain paths
/// and `file://` URIs.
pub struct FileFetcher;

#[async_trait]
impl ImageFetcher for FileFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        let path = source.strip_prefix("file://").unwrap_or(source);
        tokio::fs::read(path)
            .await
            .map_err(|e| TabTintError::Fetch(format!("{}: {}", path, e)))
    }
}
