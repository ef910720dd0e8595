// Color extraction jobs
//
// One job per group: every member image source is fetched and decoded
// concurrently, each attempt reports exactly once through a channel,
// and the job completes when the processed count reaches the source
// count. Completion therefore never depends on which attempt finished
// first, and a failed or timed-out image is just a non-contributor.

pub mod fetcher;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::color::{self, Rgb};
use crate::config::SyncConfig;
use crate::error::Result;

pub use fetcher::{FileFetcher, ImageFetcher};

/// The extraction tunables, detached from SyncConfig so jobs can hold
/// them without the storage-related fields.
#[derive(Debug, Clone)]
pub struct ExtractParams {
    pub decode_timeout: Duration,
    pub alpha_threshold: u8,
    pub darkness_threshold: u32,
    pub placeholder_icon: String,
}

impl From<&SyncConfig> for ExtractParams {
    fn from(config: &SyncConfig) -> Self {
        ExtractParams {
            decode_timeout: config.decode_timeout,
            alpha_threshold: config.alpha_threshold,
            darkness_threshold: config.darkness_threshold,
            placeholder_icon: config.placeholder_icon.clone(),
        }
    }
}

/// Run one extraction job: decode every source, average the per-image
/// mean colors of the ones that contributed. None when no image
/// contributed (the caller must leave any cached color untouched).
pub async fn extract_color(
    group_id: &str,
    sources: &[String],
    fetcher: Arc<dyn ImageFetcher>,
    params: &ExtractParams,
) -> Option<Rgb> {
    if sources.is_empty() {
        log::debug!("Group {}: no image sources, nothing to extract", group_id);
        return None;
    }

    let total = sources.len();
    let (tx, mut rx) = mpsc::channel::<Option<Rgb>>(total);

    for source in sources {
        // Placeholder and empty sources count as processed without a
        // decode attempt. Capacity equals total, so try_send cannot fail.
        if source.is_empty() || *source == params.placeholder_icon {
            let _ = tx.try_send(None);
            continue;
        }

        let tx = tx.clone();
        let source = source.clone();
        let fetcher = Arc::clone(&fetcher);
        let params = params.clone();
        tokio::spawn(async move {
            let outcome =
                tokio::time::timeout(params.decode_timeout, sample_source(&source, &*fetcher, &params))
                    .await;
            let contribution = match outcome {
                Ok(Ok(Some(rgb))) => Some(rgb),
                Ok(Ok(None)) => {
                    log::debug!("No qualifying pixels in {}", source);
                    None
                }
                Ok(Err(e)) => {
                    log::warn!("Failed to decode {}: {}", source, e);
                    None
                }
                Err(_) => {
                    log::warn!("Timed out decoding {}", source);
                    None
                }
            };
            let _ = tx.send(contribution).await;
        });
    }
    drop(tx);

    // Counting join: the job is done exactly when every source has been
    // accounted for, in whatever order the attempts finish.
    let mut processed = 0usize;
    let mut colors = Vec::new();
    while processed < total {
        match rx.recv().await {
            Some(contribution) => {
                processed += 1;
                if let Some(rgb) = contribution {
                    colors.push(rgb);
                }
            }
            None => break,
        }
    }

    let result = color::average_colors(&colors);
    match &result {
        Some(rgb) => log::debug!(
            "Group {}: extracted {} from {} of {} images",
            group_id,
            rgb,
            colors.len(),
            total
        ),
        None => log::debug!("Group {}: no usable color from {} images", group_id, total),
    }
    result
}

/// Fetch, decode and sample one image source. Decoding happens inside
/// the calling task; images here are favicon-sized.
async fn sample_source(
    source: &str,
    fetcher: &dyn ImageFetcher,
    params: &ExtractParams,
) -> Result<Option<Rgb>> {
    let bytes = fetcher.fetch(source).await?;
    let img = image::load_from_memory(&bytes)?;
    let rgba = img.to_rgba8();
    Ok(color::sample_rgba_pixels(
        rgba.as_raw(),
        params.alpha_threshold,
        params.darkness_threshold,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TabTintError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher backed by a map of encoded images. Unknown sources fail;
    /// sources listed in `hang` never resolve (the timeout must fire).
    struct MapFetcher {
        images: HashMap<String, Vec<u8>>,
        hang: Vec<String>,
        calls: AtomicUsize,
    }

    impl MapFetcher {
        fn new(images: HashMap<String, Vec<u8>>) -> Self {
            MapFetcher {
                images,
                hang: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageFetcher for MapFetcher {
        async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang.iter().any(|s| s == source) {
                std::future::pending::<()>().await;
                unreachable!();
            }
            self.images
                .get(source)
                .cloned()
                .ok_or_else(|| TabTintError::Fetch(format!("unknown source {}", source)))
        }
    }

    fn png_bytes(r: u8, g: u8, b: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([r, g, b, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn params() -> ExtractParams {
        ExtractParams::from(&SyncConfig::default())
    }

    fn sources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_sources_resolve_none_without_decoding() {
        let fetcher = Arc::new(MapFetcher::new(HashMap::new()));
        let result = extract_color("g1", &[], Arc::clone(&fetcher) as Arc<dyn ImageFetcher>, &params()).await;
        assert_eq!(result, None);
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_placeholder_sources_are_skipped_not_fetched() {
        let fetcher = Arc::new(MapFetcher::new(HashMap::from([(
            "a.png".to_string(),
            png_bytes(100, 50, 0),
        )])));
        let p = params();
        let srcs = vec![
            "a.png".to_string(),
            p.placeholder_icon.clone(),
            String::new(),
        ];
        let result = extract_color("g1", &srcs, Arc::clone(&fetcher) as Arc<dyn ImageFetcher>, &p).await;
        assert_eq!(result, Some(Rgb::new(100, 50, 0)));
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_mean_of_per_image_means() {
        let fetcher = Arc::new(MapFetcher::new(HashMap::from([
            ("a.png".to_string(), png_bytes(20, 20, 20)),
            ("b.png".to_string(), png_bytes(100, 50, 0)),
        ])));
        let result =
            extract_color("g1", &sources(&["a.png", "b.png"]), fetcher as Arc<dyn ImageFetcher>, &params()).await;
        assert_eq!(result, Some(Rgb::new(60, 35, 10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_image_does_not_contribute() {
        // Third image hangs; the job must still complete with the mean
        // of the two successes.
        let mut fetcher = MapFetcher::new(HashMap::from([
            ("a.png".to_string(), png_bytes(20, 20, 20)),
            ("b.png".to_string(), png_bytes(100, 50, 0)),
        ]));
        fetcher.hang.push("c.png".to_string());

        let result = extract_color(
            "g1",
            &sources(&["a.png", "b.png", "c.png"]),
            Arc::new(fetcher) as Arc<dyn ImageFetcher>,
            &params(),
        )
        .await;
        assert_eq!(result, Some(Rgb::new(60, 35, 10)));
    }

    #[tokio::test]
    async fn test_all_failures_resolve_none() {
        let fetcher = Arc::new(MapFetcher::new(HashMap::from([(
            "bad.png".to_string(),
            b"not an image".to_vec(),
        )])));
        let result = extract_color(
            "g1",
            &sources(&["bad.png", "missing.png"]),
            fetcher as Arc<dyn ImageFetcher>,
            &params(),
        )
        .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_image_with_no_qualifying_pixels_is_noncontributing() {
        // Fully transparent image: decodes fine, contributes nothing.
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 200, 200, 0]));
        let mut transparent = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut transparent),
            image::ImageFormat::Png,
        )
        .unwrap();

        let fetcher = Arc::new(MapFetcher::new(HashMap::from([
            ("clear.png".to_string(), transparent),
            ("red.png".to_string(), png_bytes(200, 10, 10)),
        ])));
        let result = extract_color(
            "g1",
            &sources(&["clear.png", "red.png"]),
            fetcher as Arc<dyn ImageFetcher>,
            &params(),
        )
        .await;
        assert_eq!(result, Some(Rgb::new(200, 10, 10)));
    }
}
