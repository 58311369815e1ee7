//! Class-name to id lookup table
//!
//! Loaded once at pipeline build time, before any record is decoded.
//! The file is a JSON array of `{ "name", "id", "display_name"? }` items.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{FeedError, Result};

#[derive(Debug, Clone, Deserialize)]
struct LabelMapItem {
    name: String,
    id: i64,
    #[serde(default)]
    display_name: Option<String>,
}

/// Immutable class-name to id table
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    entries: HashMap<String, i64>,
}

impl LabelMap {
    /// Load a label map from a JSON file
    ///
    /// With `use_display_name`, entries are keyed by display name and
    /// every item must carry one.
    pub fn from_json_file(path: impl AsRef<Path>, use_display_name: bool) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw, use_display_name)
    }

    /// Parse a label map from JSON text
    pub fn from_json_str(raw: &str, use_display_name: bool) -> Result<Self> {
        let items: Vec<LabelMapItem> =
            serde_json::from_str(raw).map_err(|e| FeedError::LabelMapInvalid {
                reason: e.to_string(),
            })?;
        if items.is_empty() {
            return Err(FeedError::LabelMapInvalid {
                reason: "label map contains no items".into(),
            });
        }

        let mut entries = HashMap::with_capacity(items.len());
        for item in items {
            let key = if use_display_name {
                item.display_name.ok_or_else(|| FeedError::LabelMapInvalid {
                    reason: format!("item `{}` has no display_name", item.name),
                })?
            } else {
                item.name
            };
            if entries.insert(key.clone(), item.id).is_some() {
                return Err(FeedError::LabelMapInvalid {
                    reason: format!("duplicate label `{key}`"),
                });
            }
        }
        Ok(Self { entries })
    }

    /// Look up the id for a class name
    pub fn get(&self, name: &str) -> Option<i64> {
        self.entries.get(name).copied()
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"[
        {"name": "cat", "id": 1, "display_name": "Cat"},
        {"name": "dog", "id": 2, "display_name": "Dog"}
    ]"#;

    #[test]
    fn test_parse_by_name() {
        let map = LabelMap::from_json_str(MAP, false).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("cat"), Some(1));
        assert_eq!(map.get("Cat"), None);
    }

    #[test]
    fn test_parse_by_display_name() {
        let map = LabelMap::from_json_str(MAP, true).unwrap();
        assert_eq!(map.get("Dog"), Some(2));
        assert_eq!(map.get("dog"), None);
    }

    #[test]
    fn test_missing_display_name_rejected() {
        let raw = r#"[{"name": "cat", "id": 1}]"#;
        let err = LabelMap::from_json_str(raw, true).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_duplicate_rejected() {
        let raw = r#"[{"name": "cat", "id": 1}, {"name": "cat", "id": 2}]"#;
        assert!(LabelMap::from_json_str(raw, false).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(LabelMap::from_json_str("[]", false).is_err());
    }
}
