// Tab Tint Constants
// These values mirror the persisted-format contract. Do not change the
// document names without a migration for existing files.

// Persisted documents
pub const COLORS_FILE: &str = "tab_group_colors.json";
pub const ICONS_FILE: &str = "tab_group_icons.json";

// Key names used by the ephemeral (in-memory) store
pub const COLORS_STORAGE_KEY: &str = "advancedTabGroups_colors";
pub const ICONS_STORAGE_KEY: &str = "advancedTabGroups_icons";

// Timing
pub const DEBOUNCE_MS: u64 = 500;
pub const FLUSH_INTERVAL_SECS: u64 = 30;
pub const DECODE_TIMEOUT_SECS: u64 = 5;

// Pixel sampling thresholds. A pixel contributes to an image's mean color
// only when its alpha exceeds ALPHA_VISIBLE_THRESHOLD and its channel sum
// exceeds DARKNESS_THRESHOLD (near-black pixels bias the average).
pub const ALPHA_VISIBLE_THRESHOLD: u8 = 128;
pub const DARKNESS_THRESHOLD: u32 = 30;

// Stock placeholder favicon; carries no useful color and is never decoded.
pub const PLACEHOLDER_ICON: &str = "chrome://global/skin/icons/defaultFavicon.svg";

// Atomic write temp file prefix
pub const TEMP_FILE_PREFIX: &str = ".tmp_";

// Platform data directory name (used when no explicit data_dir is set)
pub const DATA_DIR_NAME: &str = "tab-tint";
