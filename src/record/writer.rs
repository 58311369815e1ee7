//! Buffered record file writer

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::framing::encode_record;
use crate::error::{FeedError, Result};

/// Sequential writer producing framed record files
pub struct RecordFileWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records_written: u64,
}

impl RecordFileWriter {
    /// Create (truncating) a record file
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await.map_err(|source| FeedError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records_written: 0,
        })
    }

    /// Append one framed record
    pub async fn write_record(&mut self, payload: &[u8]) -> Result<()> {
        let framed = encode_record(payload);
        self.writer
            .write_all(&framed)
            .await
            .map_err(|source| FeedError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush buffers and sync the file
    pub async fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .await
            .map_err(|source| FeedError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|source| FeedError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(self.records_written)
    }
}
