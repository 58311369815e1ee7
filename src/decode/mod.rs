//! Record decoding
//!
//! Turns raw record payloads into structured [`Example`]s. The pipeline
//! only depends on the [`RecordDecoder`] trait; the JSON implementation
//! here is the reference decoder, and real deployments plug in their own.

pub mod example;
pub mod json;
pub mod label_map;

use std::sync::Arc;

pub use example::{Example, Feature};
pub use json::JsonExampleDecoder;
pub use label_map::LabelMap;

use crate::error::Result;

/// Decodes one record payload into an [`Example`]
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, record: &[u8]) -> Result<Example>;
}

/// User-supplied transform applied to every decoded example
pub type TransformFn = Arc<dyn Fn(Example) -> Result<Example> + Send + Sync>;
