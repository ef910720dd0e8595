// Tab Tint - derived group attribute synchronizer
//
// Watches a host UI's tab groups (through explicit registration calls),
// derives a representative color from each group's member images,
// persists color/icon attributes across restarts, and reapplies them on
// demand. The host owns the groups and the rendering; this crate only
// computes and remembers the annotations.

pub mod cache;
pub mod color;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod store;
pub mod sync;

pub use color::Rgb;
pub use config::SyncConfig;
pub use error::{Result, TabTintError};
pub use extract::{FileFetcher, ImageFetcher};
pub use store::{Doc, Store};
pub use sync::{GroupAttribute, GroupSynchronizer, SourcesProvider};
