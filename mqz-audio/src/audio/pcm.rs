//! Durable-store payload codec
//!
//! Stored values are base64 of raw 16-bit signed little-endian mono PCM at
//! 24000 Hz. There is no header; the rate is implied.

use crate::audio::resampler::Resampler;
use crate::audio::types::AudioAsset;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Sample rate of every stored payload
pub const STORE_SAMPLE_RATE: u32 = 24_000;

/// Decode raw s16le bytes into an asset at [`STORE_SAMPLE_RATE`].
///
/// A trailing odd byte is ignored.
pub fn decode_raw(bytes: &[u8]) -> AudioAsset {
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    AudioAsset::new(samples, STORE_SAMPLE_RATE)
}

/// Decode a base64 payload read from the store.
pub fn decode_base64(payload: &str) -> Result<AudioAsset> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Decode(format!("Invalid base64 payload: {}", e)))?;

    if bytes.is_empty() {
        return Err(Error::Decode("Empty PCM payload".to_string()));
    }

    Ok(decode_raw(&bytes))
}

/// Encode an asset as a store payload, resampling to 24 kHz when needed.
pub fn encode_base64(asset: &AudioAsset) -> Result<String> {
    let samples = if asset.sample_rate == STORE_SAMPLE_RATE {
        asset.samples.clone()
    } else {
        Resampler::resample(&asset.samples, asset.sample_rate, STORE_SAMPLE_RATE)?
    };

    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    Ok(STANDARD.encode(bytes))
}
