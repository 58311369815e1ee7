//! Record wire framing
//!
//! Each record is stored as:
//!
//! ```text
//! u64 LE  payload length
//! u32 LE  masked crc32c of the 8 length bytes
//! payload
//! u32 LE  masked crc32c of the payload
//! ```
//!
//! Checksums are masked so that a checksum stored inside a payload does
//! not validate against the surrounding frame.

use bytes::{BufMut, Bytes, BytesMut};

/// Bytes preceding the payload: length plus length checksum
pub const RECORD_HEADER_BYTES: usize = 8 + 4;

/// Bytes following the payload: payload checksum
pub const RECORD_FOOTER_BYTES: usize = 4;

const MASK_DELTA: u32 = 0xa282_ead8;

/// Mask a crc32c for storage in a record frame
pub fn mask_crc(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Undo [`mask_crc`]
pub fn unmask_crc(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(MASK_DELTA);
    (rot >> 17) | (rot << 15)
}

/// Masked crc32c of a byte slice
pub fn masked_crc32c(data: &[u8]) -> u32 {
    mask_crc(crc32c::crc32c(data))
}

/// Frame a payload into a complete on-disk record
pub fn encode_record(payload: &[u8]) -> Bytes {
    let mut buf =
        BytesMut::with_capacity(RECORD_HEADER_BYTES + payload.len() + RECORD_FOOTER_BYTES);
    let len_bytes = (payload.len() as u64).to_le_bytes();
    buf.put_slice(&len_bytes);
    buf.put_u32_le(masked_crc32c(&len_bytes));
    buf.put_slice(payload);
    buf.put_u32_le(masked_crc32c(payload));
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_roundtrip() {
        for crc in [0u32, 1, 0xdead_beef, u32::MAX] {
            assert_eq!(unmask_crc(mask_crc(crc)), crc);
        }
    }

    #[test]
    fn test_mask_changes_value() {
        let crc = crc32c::crc32c(b"payload");
        assert_ne!(mask_crc(crc), crc);
    }

    #[test]
    fn test_encode_layout() {
        let rec = encode_record(b"abc");
        assert_eq!(rec.len(), RECORD_HEADER_BYTES + 3 + RECORD_FOOTER_BYTES);
        assert_eq!(&rec[..8], &3u64.to_le_bytes());
        assert_eq!(&rec[12..15], b"abc");

        let len_crc = u32::from_le_bytes(rec[8..12].try_into().unwrap());
        assert_eq!(len_crc, masked_crc32c(&3u64.to_le_bytes()));
        let payload_crc = u32::from_le_bytes(rec[15..19].try_into().unwrap());
        assert_eq!(payload_crc, masked_crc32c(b"abc"));
    }

    #[test]
    fn test_empty_payload() {
        let rec = encode_record(b"");
        assert_eq!(rec.len(), RECORD_HEADER_BYTES + RECORD_FOOTER_BYTES);
    }
}
