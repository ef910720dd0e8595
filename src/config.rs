// Synchronizer configuration
//
// Defaults come from constants.rs; hosts and tests override individual
// fields (tests typically shrink the timing values).

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    ALPHA_VISIBLE_THRESHOLD, DARKNESS_THRESHOLD, DATA_DIR_NAME, DEBOUNCE_MS, DECODE_TIMEOUT_SECS,
    FLUSH_INTERVAL_SECS, PLACEHOLDER_ICON,
};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory for the durable store. When None, the platform data
    /// directory is used. If the directory cannot be created or written,
    /// the synchronizer falls back to the in-memory store for the
    /// process lifetime.
    pub data_dir: Option<PathBuf>,

    /// Quiet period after the last membership change before a group's
    /// color is recomputed.
    pub debounce: Duration,

    /// Cadence of the periodic cache-to-store flush.
    pub flush_interval: Duration,

    /// Upper bound on fetching and decoding a single image source.
    pub decode_timeout: Duration,

    /// Minimum alpha (exclusive) for a pixel to count as visible.
    pub alpha_threshold: u8,

    /// Minimum channel sum (exclusive) for a pixel to count as colored.
    pub darkness_threshold: u32,

    /// Image source skipped without a decode attempt.
    pub placeholder_icon: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            data_dir: None,
            debounce: Duration::from_millis(DEBOUNCE_MS),
            flush_interval: Duration::from_secs(FLUSH_INTERVAL_SECS),
            decode_timeout: Duration::from_secs(DECODE_TIMEOUT_SECS),
            alpha_threshold: ALPHA_VISIBLE_THRESHOLD,
            darkness_threshold: DARKNESS_THRESHOLD,
            placeholder_icon: PLACEHOLDER_ICON.to_string(),
        }
    }
}

impl SyncConfig {
    /// Resolve the directory for the durable store: the explicit
    /// `data_dir` if set, otherwise the platform data directory.
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Some(dir.clone());
        }
        directories::ProjectDirs::from("", "", DATA_DIR_NAME)
            .map(|dirs| dirs.data_dir().to_path_buf())
    }
}
