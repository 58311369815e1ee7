//! Record file format
//!
//! Length-delimited binary records with masked crc32c checksums on both
//! the length header and the payload.

pub mod framing;
pub mod reader;
pub mod writer;

pub use framing::{encode_record, masked_crc32c, RECORD_HEADER_BYTES};
pub use reader::RecordFileReader;
pub use writer::RecordFileWriter;
