use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode bytes as standard base64
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, tolerating surrounding whitespace
pub fn from_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded.trim())
}

/// Convert i16 samples to little-endian PCM bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert little-endian PCM bytes to i16 samples (a trailing odd byte is dropped)
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Decode a sequence of base64 chunks and join them in the given order
///
/// Each chunk carries its own padding, so chunks are decoded one by one
/// rather than joined as text first.
pub fn concat_base64_chunks<S: AsRef<str>>(chunks: &[S]) -> Result<Vec<u8>, base64::DecodeError> {
    let mut pcm = Vec::new();
    for chunk in chunks {
        pcm.extend_from_slice(&from_base64(chunk.as_ref())?);
    }
    Ok(pcm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_bytes_little_endian() {
        let bytes = samples_to_bytes(&[1, -2, 0x1234]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0x34, 0x12]);
        assert_eq!(bytes_to_samples(&bytes), vec![1, -2, 0x1234]);
    }

    #[test]
    fn test_odd_trailing_byte_dropped() {
        assert_eq!(bytes_to_samples(&[0x01, 0x00, 0x7F]), vec![1]);
    }

    #[test]
    fn test_concat_padded_chunks() {
        // "a" and "b" each encode with padding; naive string joining breaks
        let chunks = vec![to_base64(b"a"), to_base64(b"bc")];
        assert_eq!(concat_base64_chunks(&chunks).unwrap(), b"abc".to_vec());
    }

    #[test]
    fn test_concat_empty() {
        let chunks: Vec<String> = Vec::new();
        assert!(concat_base64_chunks(&chunks).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_base64() {
        assert!(from_base64("@@not base64@@").is_err());
    }
}
