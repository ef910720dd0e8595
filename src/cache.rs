// In-process cache of derived group attributes
//
// The cache is the source of truth between flushes: store writes may
// fail transiently, but the cache is only mutated by the synchronizer
// and the recomputation callbacks, so the next flush converges.

use std::collections::HashMap;

use crate::color::Rgb;
use crate::store::Document;

/// Icon state for one group. `Cleared` records an explicit "remove the
/// icon" choice, which is distinct from never having set one: a cleared
/// icon guarantees the group's key is absent from the icons document
/// after the next flush.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IconSlot {
    #[default]
    Unset,
    Cleared,
    Set(String),
}

impl IconSlot {
    pub fn uri(&self) -> Option<&str> {
        match self {
            IconSlot::Set(uri) => Some(uri),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttributeRecord {
    pub color: Option<Rgb>,
    pub icon: IconSlot,
}

impl AttributeRecord {
    fn is_empty(&self) -> bool {
        self.color.is_none() && self.icon == IconSlot::Unset
    }
}

#[derive(Debug, Default)]
pub struct AttributeCache {
    records: HashMap<String, AttributeRecord>,
}

impl AttributeCache {
    pub fn new() -> Self {
        AttributeCache::default()
    }

    /// Merge the two persisted documents into per-group records.
    /// Color strings that no longer parse are skipped with a warning.
    pub fn load(colors: &Document, icons: &Document) -> Self {
        let mut cache = AttributeCache::new();
        for (group_id, text) in colors {
            match Rgb::parse(text) {
                Ok(color) => {
                    cache.records.entry(group_id.clone()).or_default().color = Some(color);
                }
                Err(e) => {
                    log::warn!("Skipping saved color for group {}: {}", group_id, e);
                }
            }
        }
        for (group_id, uri) in icons {
            cache.records.entry(group_id.clone()).or_default().icon = IconSlot::Set(uri.clone());
        }
        cache
    }

    pub fn get(&self, group_id: &str) -> Option<&AttributeRecord> {
        self.records.get(group_id)
    }

    pub fn set_color(&mut self, group_id: &str, color: Rgb) {
        self.records.entry(group_id.to_string()).or_default().color = Some(color);
    }

    pub fn set_icon(&mut self, group_id: &str, uri: String) {
        self.records.entry(group_id.to_string()).or_default().icon = IconSlot::Set(uri);
    }

    /// Record an explicit icon removal. The Cleared marker is what
    /// distinguishes "removed" from "never set" until the next flush
    /// drops the key from the icons document.
    pub fn clear_icon(&mut self, group_id: &str) {
        self.records.entry(group_id.to_string()).or_default().icon = IconSlot::Cleared;
    }

    /// Remove every attribute for a group. Returns whether anything was
    /// actually removed (eviction is idempotent).
    pub fn remove(&mut self, group_id: &str) -> bool {
        self.records.remove(group_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the current snapshot into the two flat documents.
    /// Cleared icons and empty records simply do not appear, which is
    /// how their keys get deleted from the backend on flush.
    pub fn to_documents(&self) -> (Document, Document) {
        let mut colors = Document::new();
        let mut icons = Document::new();
        for (group_id, record) in &self.records {
            if let Some(color) = record.color {
                colors.insert(group_id.clone(), color.to_string());
            }
            if let IconSlot::Set(uri) = &record.icon {
                icons.insert(group_id.clone(), uri.clone());
            }
        }
        (colors, icons)
    }

    /// Collapse Cleared markers and drop empty records. Called after a
    /// successful flush: once the key is gone from the backend, Cleared
    /// carries no more information than Unset.
    pub fn prune(&mut self) {
        for record in self.records.values_mut() {
            if record.icon == IconSlot::Cleared {
                record.icon = IconSlot::Unset;
            }
        }
        self.records.retain(|_, record| !record.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, &str)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_merges_documents() {
        let colors = doc(&[("g1", "rgb(10, 20, 30)"), ("g2", "rgb(1, 1, 1)")]);
        let icons = doc(&[("g1", "icons/star.svg"), ("g3", "icons/dot.svg")]);
        let cache = AttributeCache::load(&colors, &icons);

        assert_eq!(cache.len(), 3);
        let g1 = cache.get("g1").unwrap();
        assert_eq!(g1.color, Some(Rgb::new(10, 20, 30)));
        assert_eq!(g1.icon.uri(), Some("icons/star.svg"));
        assert!(cache.get("g3").unwrap().color.is_none());
    }

    #[test]
    fn test_load_skips_unparseable_colors() {
        let colors = doc(&[("g1", "garbage"), ("g2", "rgb(5, 5, 5)")]);
        let cache = AttributeCache::load(&colors, &Document::new());
        assert!(cache.get("g1").is_none());
        assert_eq!(cache.get("g2").unwrap().color, Some(Rgb::new(5, 5, 5)));
    }

    #[test]
    fn test_cleared_icon_is_distinct_from_unset() {
        let mut cache = AttributeCache::new();
        cache.set_color("g1", Rgb::new(1, 2, 3));
        cache.set_icon("g1", "icons/star.svg".to_string());
        cache.clear_icon("g1");

        assert_eq!(cache.get("g1").unwrap().icon, IconSlot::Cleared);
        assert_eq!(cache.get("g1").unwrap().icon.uri(), None);

        // Cleared icons are not persisted
        let (colors, icons) = cache.to_documents();
        assert!(colors.contains_key("g1"));
        assert!(!icons.contains_key("g1"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cache = AttributeCache::new();
        cache.set_color("g1", Rgb::new(1, 2, 3));
        assert!(cache.remove("g1"));
        assert!(!cache.remove("g1"));
        assert!(!cache.remove("never-seen"));
    }

    #[test]
    fn test_prune_collapses_cleared_markers() {
        let mut cache = AttributeCache::new();
        cache.set_icon("g1", "icons/star.svg".to_string());
        cache.clear_icon("g1");
        cache.set_color("g2", Rgb::new(1, 2, 3));
        cache.clear_icon("g2");

        cache.prune();
        assert!(cache.get("g1").is_none());
        let g2 = cache.get("g2").unwrap();
        assert_eq!(g2.icon, IconSlot::Unset);
        assert_eq!(g2.color, Some(Rgb::new(1, 2, 3)));
    }

    #[test]
    fn test_to_documents_roundtrip() {
        let mut cache = AttributeCache::new();
        cache.set_color("g1", Rgb::new(55, 30, 5));
        cache.set_icon("g2", "icons/star.svg".to_string());

        let (colors, icons) = cache.to_documents();
        let reloaded = AttributeCache::load(&colors, &icons);
        assert_eq!(reloaded.get("g1").unwrap().color, Some(Rgb::new(55, 30, 5)));
        assert_eq!(reloaded.get("g2").unwrap().icon.uri(), Some("icons/star.svg"));
    }
}
