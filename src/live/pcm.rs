//! PCM16 wire codec for live audio frames
//!
//! The agent endpoint speaks 16-bit signed little-endian PCM wrapped in
//! standard base64. Outbound samples are clamped to [-1, 1] and scaled
//! asymmetrically (32768 for negative, 32767 for non-negative values);
//! inbound samples are normalized by dividing by 32768.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Encode float samples to 16-bit signed little-endian PCM bytes
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        let value = if s < 0.0 {
            (s * 32768.0) as i16
        } else {
            (s * 32767.0) as i16
        };
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode 16-bit signed little-endian PCM bytes to float samples in [-1, 1]
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect()
}

/// Encode raw bytes as standard base64 for transport
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode transport base64 back to raw bytes
pub fn from_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(data)
}

/// Mean absolute sample value over a block, the capture volume metric
pub fn mean_abs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_one_step() {
        let values = [-1.0, -0.75, -0.5, -0.001, 0.0, 0.001, 0.25, 0.5, 0.999, 1.0];
        let bytes = encode_pcm16(&values);
        let decoded = decode_pcm16(&bytes);

        assert_eq!(decoded.len(), values.len());
        for (orig, round) in values.iter().zip(decoded.iter()) {
            assert!(
                (orig - round).abs() <= 1.0 / 32768.0,
                "{} round-tripped to {}",
                orig,
                round
            );
        }
    }

    #[test]
    fn test_extremes_map_to_full_scale() {
        let bytes = encode_pcm16(&[-1.0, 1.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MIN);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MAX);
    }

    #[test]
    fn test_out_of_range_samples_clamp() {
        let bytes = encode_pcm16(&[-2.5, 3.0]);
        assert_eq!(bytes, encode_pcm16(&[-1.0, 1.0]));
    }

    #[test]
    fn test_zero_block_encodes_to_zero_bytes() {
        let block = vec![0.0f32; 4096];
        let bytes = encode_pcm16(&block);
        assert_eq!(bytes.len(), 8192);
        assert!(bytes.iter().all(|&b| b == 0));

        let b64 = to_base64(&bytes);
        assert!(b64.starts_with("AAAA"));
        assert_eq!(b64.len(), 4 * ((8192usize + 2) / 3));
    }

    #[test]
    fn test_base64_round_trip() {
        let bytes = encode_pcm16(&[0.1, -0.2, 0.3]);
        let b64 = to_base64(&bytes);
        assert_eq!(from_base64(&b64).unwrap(), bytes);
    }

    #[test]
    fn test_mean_abs() {
        assert_eq!(mean_abs(&[]), 0.0);
        assert_eq!(mean_abs(&[0.0, 0.0]), 0.0);
        assert!((mean_abs(&[0.5, -0.5]) - 0.5).abs() < f32::EPSILON);
        assert!((mean_abs(&[1.0, -0.5, 0.0, 0.5]) - 0.5).abs() < f32::EPSILON);
    }
}
