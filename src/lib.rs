//! tensorfeed - record-file input pipeline for training loops
//!
//! Reads framed record files from disk and feeds a training or evaluation
//! loop with ready-to-consume example batches:
//! - Glob expansion, sharded parallel reads, epoch repetition
//! - Filename and record shuffling
//! - Parallel decode with a pluggable record decoder and user transform
//! - Fixed-size batching and bounded prefetch with backpressure
//!
//! Everything is driven by a declarative [`InputReaderConfig`].

pub mod config;
pub mod decode;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;

pub use config::InputReaderConfig;
pub use decode::{Example, Feature, JsonExampleDecoder, LabelMap, RecordDecoder, TransformFn};
pub use error::{FeedError, Result};
pub use pipeline::{ExampleBatch, InputPipeline, PipelineBuilder, RecordStream};
pub use record::{RecordFileReader, RecordFileWriter};

/// Default number of batches buffered ahead of the consumer
pub const DEFAULT_PREFETCH_BATCHES: usize = 4;

/// Default per-file read buffer size
pub const DEFAULT_READ_BUFFER_BYTES: usize = 8 * 1000 * 1000;

/// Default record shuffle reservoir size
pub const DEFAULT_SHUFFLE_BUFFER_SIZE: usize = 2048;
