//! Input file planning
//!
//! Expands glob patterns into a concrete file list and clamps the reader
//! count to what is actually on disk.

use std::path::PathBuf;

use tracing::warn;

use crate::config::InputReaderConfig;
use crate::error::{FeedError, Result};

/// Concrete read plan: the matched files and the effective reader count
#[derive(Debug, Clone)]
pub struct FilePlan {
    /// Matched record files, sorted for a stable base order
    pub files: Vec<PathBuf>,
    /// Reader count after clamping to the file count
    pub num_readers: usize,
}

/// Expand glob patterns into a sorted, deduplicated file list
///
/// Every pattern must match at least one file.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    if patterns.is_empty() {
        return Err(FeedError::NoInputPaths);
    }

    let mut files = Vec::new();
    for pattern in patterns {
        let entries = glob::glob(pattern).map_err(|e| FeedError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;

        let before = files.len();
        for entry in entries {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        files.push(path);
                    }
                }
                Err(e) => {
                    let path = e.path().to_path_buf();
                    return Err(FeedError::Io {
                        path,
                        source: e.into_error(),
                    });
                }
            }
        }
        if files.len() == before {
            return Err(FeedError::NoFilesMatched {
                pattern: pattern.clone(),
            });
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Build the read plan for a configuration
pub fn plan_files(config: &InputReaderConfig) -> Result<FilePlan> {
    let files = expand_patterns(&config.input_paths)?;

    let mut num_readers = config.num_readers;
    if num_readers > files.len() {
        num_readers = files.len();
        warn!(
            "num_readers has been reduced to {} to match input file shards",
            num_readers
        );
    }
    if !config.shuffle && num_readers > 1 {
        warn!(
            "`shuffle` is false, but records are still interleaved across {} parallel readers",
            num_readers
        );
    }

    Ok(FilePlan { files, num_readers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_expand_sorted_and_deduped() {
        let dir = tempfile::tempdir().unwrap();
        let b = touch(dir.path(), "b.rec");
        let a = touch(dir.path(), "a.rec");

        let pattern = dir.path().join("*.rec").to_string_lossy().into_owned();
        let files = expand_patterns(&[pattern.clone(), pattern]).unwrap();
        assert_eq!(files, vec![a, b]);
    }

    #[test]
    fn test_no_match_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.rec").to_string_lossy().into_owned();
        let err = expand_patterns(&[pattern]).unwrap_err();
        assert!(matches!(err, FeedError::NoFilesMatched { .. }));
    }

    #[test]
    fn test_plan_clamps_readers() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.rec");
        touch(dir.path(), "b.rec");

        let pattern = dir.path().join("*.rec").to_string_lossy().into_owned();
        let mut config = InputReaderConfig::new([pattern]);
        config.num_readers = 16;

        let plan = plan_files(&config).unwrap();
        assert_eq!(plan.files.len(), 2);
        assert_eq!(plan.num_readers, 2);
    }
}
