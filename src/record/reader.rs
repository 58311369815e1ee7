//! Buffered record file reader
//!
//! Reads framed records sequentially, verifying both frame checksums.
//! A clean EOF at a record boundary ends the stream; anything else is
//! reported as corruption.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use super::framing::{unmask_crc, RECORD_HEADER_BYTES};
use crate::error::{FeedError, Result};

/// Sequential reader over one record file
#[derive(Debug)]
pub struct RecordFileReader {
    reader: BufReader<File>,
    path: PathBuf,
    /// Byte offset of the record currently being read
    offset: u64,
    max_record_bytes: usize,
}

impl RecordFileReader {
    /// Open a record file with the given read buffer size
    pub async fn open(
        path: impl AsRef<Path>,
        buffer_bytes: usize,
        max_record_bytes: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|source| FeedError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            reader: BufReader::with_capacity(buffer_bytes.max(1), file),
            path,
            offset: 0,
            max_record_bytes,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next record payload
    ///
    /// Returns `Ok(None)` at a clean end of file. EOF inside a record is
    /// a [`FeedError::TruncatedRecord`].
    pub async fn next_record(&mut self) -> Result<Option<Bytes>> {
        let mut len_bytes = [0u8; 8];
        if !self.read_header(&mut len_bytes).await? {
            return Ok(None);
        }

        let mut len_crc = [0u8; 4];
        self.read_fully(&mut len_crc).await?;
        let stored = unmask_crc(u32::from_le_bytes(len_crc));
        let actual = crc32c::crc32c(&len_bytes);
        if stored != actual {
            return Err(FeedError::ChecksumMismatch {
                path: self.path.clone(),
                offset: self.offset,
                expected: stored,
                actual,
            });
        }

        let len = u64::from_le_bytes(len_bytes);
        if len > self.max_record_bytes as u64 {
            return Err(FeedError::RecordTooLarge {
                path: self.path.clone(),
                offset: self.offset,
                len,
                max: self.max_record_bytes as u64,
            });
        }

        let mut payload = vec![0u8; len as usize];
        self.read_fully(&mut payload).await?;

        let mut payload_crc = [0u8; 4];
        self.read_fully(&mut payload_crc).await?;
        let stored = unmask_crc(u32::from_le_bytes(payload_crc));
        let actual = crc32c::crc32c(&payload);
        if stored != actual {
            return Err(FeedError::ChecksumMismatch {
                path: self.path.clone(),
                offset: self.offset,
                expected: stored,
                actual,
            });
        }

        self.offset += (RECORD_HEADER_BYTES + payload.len() + 4) as u64;
        Ok(Some(Bytes::from(payload)))
    }

    /// Read the length header, distinguishing clean EOF (returns false)
    /// from a partial header (truncation error)
    async fn read_header(&mut self, buf: &mut [u8; 8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .await
                .map_err(|source| FeedError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(FeedError::TruncatedRecord {
                    path: self.path.clone(),
                    offset: self.offset,
                });
            }
            filled += n;
        }
        Ok(true)
    }

    async fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::UnexpectedEof {
                FeedError::TruncatedRecord {
                    path: self.path.clone(),
                    offset: self.offset,
                }
            } else {
                FeedError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        Ok(())
    }
}
