//! Input reader configuration
//!
//! Declarative description of an input pipeline: where the record files
//! live and how they are sharded, shuffled, decoded, and prefetched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};
use crate::{DEFAULT_PREFETCH_BATCHES, DEFAULT_READ_BUFFER_BYTES, DEFAULT_SHUFFLE_BUFFER_SIZE};

/// Configuration for building an input pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputReaderConfig {
    /// Glob patterns for record files
    pub input_paths: Vec<String>,
    /// Number of files read in parallel (cycle length); clamped to the
    /// number of matched files
    pub num_readers: usize,
    /// Contiguous records taken from one file per reader turn
    pub read_block_length: usize,
    /// Per-file read buffer size in bytes
    pub read_buffer_bytes: usize,
    /// Shuffle filenames and records; also relaxes interleave ordering
    pub shuffle: bool,
    /// Window size for the per-epoch filename shuffle
    pub filename_shuffle_buffer_size: usize,
    /// Record shuffle reservoir size
    pub shuffle_buffer_size: usize,
    /// Number of passes over the input files; 0 repeats forever
    pub num_epochs: u64,
    /// Keep every n-th record; 1 keeps everything
    pub sample_1_of_n: u64,
    /// Decode workers when no batch size is set; 0 uses the CPU count
    pub num_parallel_map_calls: usize,
    /// Decode workers per batch slot when batching: workers =
    /// batch_size * num_parallel_batches
    pub num_parallel_batches: usize,
    /// Batches buffered ahead of the consumer
    pub num_prefetch_batches: usize,
    /// Drop the final short batch of an epoch
    pub drop_remainder: bool,
    /// Seed for deterministic shuffling
    pub seed: Option<u64>,
    /// Optional class-name to id table for the decoder
    pub label_map_path: Option<PathBuf>,
    /// Key the label map by display name instead of name
    pub use_display_name: bool,
    /// Feature whose class names the label map rewrites to ids
    pub class_feature_key: String,
    /// Upper bound on a single record's payload size
    pub max_record_bytes: usize,
}

impl Default for InputReaderConfig {
    fn default() -> Self {
        Self {
            input_paths: Vec::new(),
            num_readers: 8,
            read_block_length: 32,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            shuffle: true,
            filename_shuffle_buffer_size: 100,
            shuffle_buffer_size: DEFAULT_SHUFFLE_BUFFER_SIZE,
            num_epochs: 0,
            sample_1_of_n: 1,
            num_parallel_map_calls: 0,
            num_parallel_batches: 2,
            num_prefetch_batches: DEFAULT_PREFETCH_BATCHES,
            drop_remainder: true,
            seed: None,
            label_map_path: None,
            use_display_name: false,
            class_feature_key: "class".into(),
            max_record_bytes: 256 * 1024 * 1024,
        }
    }
}

impl InputReaderConfig {
    /// Create a configuration reading the given patterns, with defaults
    /// for everything else
    pub fn new(input_paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            input_paths: input_paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Load a configuration from a TOML file and validate it
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| FeedError::InvalidConfig {
            reason: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a buildable pipeline
    pub fn validate(&self) -> Result<()> {
        if self.input_paths.is_empty() {
            return Err(FeedError::NoInputPaths);
        }
        if self.num_readers == 0 {
            return Err(FeedError::InvalidConfig {
                reason: "num_readers must be at least 1".into(),
            });
        }
        if self.read_block_length == 0 {
            return Err(FeedError::InvalidConfig {
                reason: "read_block_length must be at least 1".into(),
            });
        }
        if self.sample_1_of_n == 0 {
            return Err(FeedError::InvalidConfig {
                reason: "sample_1_of_n must be at least 1".into(),
            });
        }
        if self.num_prefetch_batches == 0 {
            return Err(FeedError::InvalidConfig {
                reason: "num_prefetch_batches must be at least 1".into(),
            });
        }
        if self.max_record_bytes == 0 {
            return Err(FeedError::InvalidConfig {
                reason: "max_record_bytes must be at least 1".into(),
            });
        }
        if self.shuffle && self.shuffle_buffer_size == 0 {
            return Err(FeedError::InvalidConfig {
                reason: "shuffle_buffer_size must be at least 1 when shuffle is enabled".into(),
            });
        }
        Ok(())
    }

    /// Effective decode worker count for the given batch size
    pub fn parallel_map_calls(&self, batch_size: Option<usize>) -> usize {
        match batch_size {
            Some(b) => (b * self.num_parallel_batches).max(1),
            None => {
                if self.num_parallel_map_calls == 0 {
                    num_cpus::get()
                } else {
                    self.num_parallel_map_calls
                }
            }
        }
    }
}
