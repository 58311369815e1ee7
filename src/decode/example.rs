//! Decoded example representation
//!
//! An example is a string-keyed map of typed feature lists, the shape a
//! training loop consumes after decoding.

use std::collections::HashMap;

/// One typed feature: a list of byte strings, floats, or 64-bit ints
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    BytesList(Vec<Vec<u8>>),
    FloatList(Vec<f32>),
    Int64List(Vec<i64>),
}

impl Feature {
    /// Number of elements in the list
    pub fn len(&self) -> usize {
        match self {
            Feature::BytesList(v) => v.len(),
            Feature::FloatList(v) => v.len(),
            Feature::Int64List(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte-string elements, if this is a bytes list
    pub fn as_bytes_list(&self) -> Option<&[Vec<u8>]> {
        match self {
            Feature::BytesList(v) => Some(v),
            _ => None,
        }
    }

    /// Float elements, if this is a float list
    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Feature::FloatList(v) => Some(v),
            _ => None,
        }
    }

    /// Integer elements, if this is an int64 list
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Feature::Int64List(v) => Some(v),
            _ => None,
        }
    }
}

/// A decoded record: named features ready for batching
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Example {
    features: HashMap<String, Feature>,
}

impl Example {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a feature
    pub fn insert(&mut self, key: impl Into<String>, feature: Feature) -> Option<Feature> {
        self.features.insert(key.into(), feature)
    }

    /// Look up a feature by name
    pub fn get(&self, key: &str) -> Option<&Feature> {
        self.features.get(key)
    }

    /// Remove a feature by name
    pub fn remove(&mut self, key: &str) -> Option<Feature> {
        self.features.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.features.contains_key(key)
    }

    /// Iterate over feature names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    /// Iterate over name/feature pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<(String, Feature)> for Example {
    fn from_iter<T: IntoIterator<Item = (String, Feature)>>(iter: T) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_accessors() {
        let f = Feature::FloatList(vec![0.5, 1.5]);
        assert_eq!(f.len(), 2);
        assert_eq!(f.as_floats(), Some(&[0.5, 1.5][..]));
        assert!(f.as_ints().is_none());
    }

    #[test]
    fn test_example_insert_get() {
        let mut ex = Example::new();
        ex.insert("label", Feature::Int64List(vec![3]));
        assert!(ex.contains("label"));
        assert_eq!(ex.get("label").unwrap().as_ints(), Some(&[3i64][..]));
        assert!(ex.get("missing").is_none());
        assert_eq!(ex.len(), 1);
    }
}
