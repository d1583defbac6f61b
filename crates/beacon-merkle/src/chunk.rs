//! Chunks and roots
//!
//! The 32-byte unit every Merkle tree in this crate is built from, plus the
//! SSZ packing helpers used to turn primitive field values into chunks.

use thiserror::Error;

/// Number of bytes in a chunk.
pub const BYTES_PER_CHUNK: usize = 32;

/// A fixed-size leaf or internal node of a Merkle tree.
pub type Chunk = [u8; BYTES_PER_CHUNK];

/// The top node of a Merkle tree.
pub type Root = Chunk;

/// The all-zero chunk used for padding.
pub const ZERO_CHUNK: Chunk = [0u8; BYTES_PER_CHUNK];

/// Errors from parsing hex-encoded fixed-size values.
#[derive(Debug, Error, PartialEq)]
pub enum HexError {
    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Encode a `u64` as a little-endian, zero-padded chunk.
#[must_use]
pub fn chunk_from_u64(value: u64) -> Chunk {
    let mut chunk = ZERO_CHUNK;
    chunk[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// Encode a boolean as a chunk (`0x01` or `0x00` in the first byte).
#[must_use]
pub fn chunk_from_bool(value: bool) -> Chunk {
    let mut chunk = ZERO_CHUNK;
    chunk[0] = u8::from(value);
    chunk
}

/// Pack raw bytes into chunks, zero-padding the trailing partial chunk.
///
/// An empty input packs to no chunks.
#[must_use]
pub fn pack_bytes(bytes: &[u8]) -> Vec<Chunk> {
    bytes
        .chunks(BYTES_PER_CHUNK)
        .map(|part| {
            let mut chunk = ZERO_CHUNK;
            chunk[..part.len()].copy_from_slice(part);
            chunk
        })
        .collect()
}

/// Parse a `0x`-prefixed (or bare) hex string into a fixed-size byte array.
///
/// # Errors
/// Returns an error if the string is not valid hex or has the wrong length.
pub fn parse_hex_array<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| HexError::InvalidLength {
        expected: N,
        actual,
    })
}

/// Format bytes as a `0x`-prefixed lowercase hex string.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_from_u64_is_little_endian() {
        let chunk = chunk_from_u64(0x0102);
        assert_eq!(chunk[0], 0x02);
        assert_eq!(chunk[1], 0x01);
        assert!(chunk[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_chunk_from_bool() {
        assert_eq!(chunk_from_bool(false), ZERO_CHUNK);
        assert_eq!(chunk_from_bool(true)[0], 1);
    }

    #[test]
    fn test_pack_bytes_pads_last_chunk() {
        let packed = pack_bytes(&[0xab; 48]);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0], [0xab; 32]);
        assert_eq!(&packed[1][..16], &[0xab; 16]);
        assert_eq!(&packed[1][16..], &[0u8; 16]);
    }

    #[test]
    fn test_pack_bytes_empty() {
        assert!(pack_bytes(&[]).is_empty());
    }

    #[test]
    fn test_parse_hex_array() {
        let parsed: [u8; 4] = parse_hex_array("0x01020304").unwrap();
        assert_eq!(parsed, [1, 2, 3, 4]);

        let bare: [u8; 2] = parse_hex_array("ffee").unwrap();
        assert_eq!(bare, [0xff, 0xee]);
    }

    #[test]
    fn test_parse_hex_array_wrong_length() {
        let err = parse_hex_array::<32>("0x0102").unwrap_err();
        assert_eq!(
            err,
            HexError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn test_parse_hex_array_invalid_digit() {
        let err = parse_hex_array::<2>("0xzz00").unwrap_err();
        assert!(matches!(err, HexError::InvalidHex(_)));
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0xde, 0xad]), "0xdead");
    }
}
