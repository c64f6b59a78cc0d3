//! Base64 transport for binary CRDT snapshots.
//!
//! Snapshots travel inside JSON metadata, so the raw bytes produced by the
//! CRDT library are carried as standard (padded) base64 strings.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::Result;

/// Encode snapshot bytes as base64. Empty input yields an empty string.
pub fn bytes_to_base64(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    STANDARD.encode(bytes)
}

/// Decode a base64 snapshot. Empty (or whitespace-only) input yields an
/// empty buffer.
///
/// # Errors
///
/// Returns [`BranchDocError::Base64`](crate::error::BranchDocError::Base64)
/// if the text is not valid base64.
pub fn base64_to_bytes(b64: &str) -> Result<Vec<u8>> {
    let trimmed = b64.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(STANDARD.decode(trimmed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BranchDocError;

    #[test]
    fn test_empty_round_trip() {
        assert_eq!(bytes_to_base64(&[]), "");
        assert!(base64_to_bytes("").unwrap().is_empty());
        assert!(base64_to_bytes("   ").unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_preserves_bytes() {
        let samples: [&[u8]; 4] = [b"a", b"ab", b"abc", &[0, 255, 1, 254, 128]];
        for sample in samples {
            assert_eq!(base64_to_bytes(&bytes_to_base64(sample)).unwrap(), sample);
        }
    }

    #[test]
    fn test_large_buffer_round_trip() {
        // Larger than any chunk size a host might impose on string conversion
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let encoded = bytes_to_base64(&bytes);
        assert_eq!(base64_to_bytes(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_known_encoding() {
        assert_eq!(bytes_to_base64(b"hello"), "aGVsbG8=");
        assert_eq!(base64_to_bytes("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            base64_to_bytes("not base64!"),
            Err(BranchDocError::Base64(_))
        ));
    }
}
