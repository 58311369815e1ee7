//! Reference JSON example decoder
//!
//! Record payloads are JSON objects; each top-level field becomes one
//! feature. Strings map to bytes lists, integers to int64 lists, other
//! numerics to float lists. When a label map is attached, the class
//! feature's names are rewritten to ids.

use std::sync::Arc;

use serde_json::Value;

use super::example::{Example, Feature};
use super::label_map::LabelMap;
use super::RecordDecoder;
use crate::error::{FeedError, Result};

/// Decoder for JSON-encoded example payloads
#[derive(Clone, Default)]
pub struct JsonExampleDecoder {
    label_map: Option<Arc<LabelMap>>,
    class_feature_key: Option<String>,
}

impl JsonExampleDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a label map that rewrites `class_feature_key` from class
    /// names to ids
    pub fn with_label_map(
        mut self,
        label_map: Arc<LabelMap>,
        class_feature_key: impl Into<String>,
    ) -> Self {
        self.label_map = Some(label_map);
        self.class_feature_key = Some(class_feature_key.into());
        self
    }

    fn map_classes(&self, feature: Feature) -> Result<Feature> {
        let map = match &self.label_map {
            Some(m) => m,
            None => return Ok(feature),
        };
        // Already-numeric class features pass through untouched
        let names = match &feature {
            Feature::BytesList(names) => names,
            _ => return Ok(feature),
        };
        let mut ids = Vec::with_capacity(names.len());
        for raw in names {
            let name = std::str::from_utf8(raw).map_err(|_| FeedError::DecodeFailed {
                reason: "class name is not valid UTF-8".into(),
            })?;
            let id = map.get(name).ok_or_else(|| FeedError::UnknownClass {
                name: name.to_string(),
            })?;
            ids.push(id);
        }
        Ok(Feature::Int64List(ids))
    }
}

impl RecordDecoder for JsonExampleDecoder {
    fn decode(&self, record: &[u8]) -> Result<Example> {
        let value: Value =
            serde_json::from_slice(record).map_err(|e| FeedError::DecodeFailed {
                reason: e.to_string(),
            })?;
        let obj = match value {
            Value::Object(obj) => obj,
            _ => {
                return Err(FeedError::DecodeFailed {
                    reason: "record payload is not a JSON object".into(),
                })
            }
        };

        let mut example = Example::new();
        for (key, val) in obj {
            let mut feature = json_to_feature(&key, &val)?;
            if self.class_feature_key.as_deref() == Some(key.as_str()) {
                feature = self.map_classes(feature)?;
            }
            example.insert(key, feature);
        }
        Ok(example)
    }
}

fn json_to_feature(key: &str, value: &Value) -> Result<Feature> {
    match value {
        Value::String(s) => Ok(Feature::BytesList(vec![s.clone().into_bytes()])),
        Value::Bool(b) => Ok(Feature::Int64List(vec![*b as i64])),
        Value::Number(n) => {
            if let Some(i) = integer_value(n) {
                Ok(Feature::Int64List(vec![i]))
            } else {
                Ok(Feature::FloatList(vec![n.as_f64().unwrap_or(0.0) as f32]))
            }
        }
        Value::Array(items) => array_to_feature(key, items),
        _ => Err(FeedError::DecodeFailed {
            reason: format!("feature `{key}` has unsupported JSON type"),
        }),
    }
}

fn array_to_feature(key: &str, items: &[Value]) -> Result<Feature> {
    // Empty lists carry no type information; int64 is the neutral choice
    if items.is_empty() {
        return Ok(Feature::Int64List(Vec::new()));
    }
    if items.iter().all(|v| v.is_string()) {
        let bytes = items
            .iter()
            .map(|v| v.as_str().unwrap_or_default().as_bytes().to_vec())
            .collect();
        return Ok(Feature::BytesList(bytes));
    }

    let mut ints = Vec::with_capacity(items.len());
    let mut floats = Vec::with_capacity(items.len());
    let mut all_int = true;
    for v in items {
        match v {
            Value::Number(n) => {
                match integer_value(n) {
                    Some(i) => ints.push(i),
                    None => all_int = false,
                }
                floats.push(n.as_f64().unwrap_or(0.0) as f32);
            }
            _ => {
                return Err(FeedError::DecodeFailed {
                    reason: format!("feature `{key}` mixes element types"),
                })
            }
        }
    }
    if all_int {
        Ok(Feature::Int64List(ints))
    } else {
        Ok(Feature::FloatList(floats))
    }
}

fn integer_value(n: &serde_json::Number) -> Option<i64> {
    n.as_i64().or_else(|| n.as_u64().map(|u| u as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalar_types() {
        let decoder = JsonExampleDecoder::new();
        let ex = decoder
            .decode(br#"{"id": 7, "score": 0.25, "tag": "aux", "flag": true}"#)
            .unwrap();
        assert_eq!(ex.get("id").unwrap().as_ints(), Some(&[7i64][..]));
        assert_eq!(ex.get("score").unwrap().as_floats(), Some(&[0.25f32][..]));
        assert_eq!(
            ex.get("tag").unwrap().as_bytes_list().unwrap()[0],
            b"aux".to_vec()
        );
        assert_eq!(ex.get("flag").unwrap().as_ints(), Some(&[1i64][..]));
    }

    #[test]
    fn test_decode_lists() {
        let decoder = JsonExampleDecoder::new();
        let ex = decoder
            .decode(br#"{"boxes": [0.1, 0.2, 0.9, 0.8], "ids": [1, 2, 3], "names": ["a", "b"], "none": []}"#)
            .unwrap();
        assert_eq!(ex.get("boxes").unwrap().as_floats().unwrap().len(), 4);
        assert_eq!(ex.get("ids").unwrap().as_ints(), Some(&[1i64, 2, 3][..]));
        assert_eq!(ex.get("names").unwrap().len(), 2);
        assert_eq!(ex.get("none").unwrap().as_ints(), Some(&[][..]));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        let decoder = JsonExampleDecoder::new();
        assert!(decoder.decode(b"[1, 2]").is_err());
        assert!(decoder.decode(b"not json").is_err());
    }

    #[test]
    fn test_decode_rejects_mixed_array() {
        let decoder = JsonExampleDecoder::new();
        assert!(decoder.decode(br#"{"bad": [1, "two"]}"#).is_err());
    }

    #[test]
    fn test_label_map_rewrites_classes() {
        let map = LabelMap::from_json_str(
            r#"[{"name": "cat", "id": 1}, {"name": "dog", "id": 2}]"#,
            false,
        )
        .unwrap();
        let decoder = JsonExampleDecoder::new().with_label_map(Arc::new(map), "class");
        let ex = decoder
            .decode(br#"{"class": ["dog", "cat", "dog"]}"#)
            .unwrap();
        assert_eq!(ex.get("class").unwrap().as_ints(), Some(&[2i64, 1, 2][..]));
    }

    #[test]
    fn test_unknown_class_errors() {
        let map =
            LabelMap::from_json_str(r#"[{"name": "cat", "id": 1}]"#, false).unwrap();
        let decoder = JsonExampleDecoder::new().with_label_map(Arc::new(map), "class");
        let err = decoder.decode(br#"{"class": ["bird"]}"#).unwrap_err();
        assert!(matches!(err, FeedError::UnknownClass { .. }));
    }

    #[test]
    fn test_numeric_classes_pass_through() {
        let map =
            LabelMap::from_json_str(r#"[{"name": "cat", "id": 1}]"#, false).unwrap();
        let decoder = JsonExampleDecoder::new().with_label_map(Arc::new(map), "class");
        let ex = decoder.decode(br#"{"class": [4, 5]}"#).unwrap();
        assert_eq!(ex.get("class").unwrap().as_ints(), Some(&[4i64, 5][..]));
    }
}
