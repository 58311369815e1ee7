//! Error types for tensorfeed
//!
//! Covers configuration, file I/O, record framing, decoding, and
//! pipeline delivery errors.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for all tensorfeed operations
#[derive(Debug, Error)]
pub enum FeedError {
    // ========== Configuration Errors ==========

    /// Configuration failed validation
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// No input paths were specified
    #[error("at least one input path must be specified")]
    NoInputPaths,

    /// A glob pattern matched no files
    #[error("no files matched input pattern `{pattern}`")]
    NoFilesMatched { pattern: String },

    /// A glob pattern could not be parsed
    #[error("invalid input pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    // ========== I/O Errors ==========

    /// File operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ========== Record Framing Errors ==========

    /// Record checksum did not match
    #[error("checksum mismatch in {path} at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        path: PathBuf,
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// File ended in the middle of a record
    #[error("truncated record in {path} at offset {offset}")]
    TruncatedRecord { path: PathBuf, offset: u64 },

    /// Record length exceeded the configured bound
    #[error("record of {len} bytes in {path} at offset {offset} exceeds limit of {max} bytes")]
    RecordTooLarge {
        path: PathBuf,
        offset: u64,
        len: u64,
        max: u64,
    },

    // ========== Decode Errors ==========

    /// Record payload could not be decoded
    #[error("failed to decode record: {reason}")]
    DecodeFailed { reason: String },

    /// Class name missing from the label map
    #[error("class `{name}` not present in label map")]
    UnknownClass { name: String },

    /// Label map file was malformed
    #[error("invalid label map: {reason}")]
    LabelMapInvalid { reason: String },

    // ========== Pipeline Errors ==========

    /// All epochs have been consumed
    #[error("input pipeline exhausted")]
    Exhausted,

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl FeedError {
    /// Returns true if this error indicates corrupt input data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            FeedError::ChecksumMismatch { .. }
                | FeedError::TruncatedRecord { .. }
                | FeedError::LabelMapInvalid { .. }
        )
    }

    /// Returns true if retrying the operation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Io { .. })
    }
}

/// Result type alias for tensorfeed operations
pub type Result<T> = std::result::Result<T, FeedError>;
