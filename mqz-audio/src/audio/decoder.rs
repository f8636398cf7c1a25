//! Audio decoder using symphonia
//!
//! Decodes packaged narration files (MP3, WAV, FLAC, Vorbis) held in memory to
//! mono f32 samples. Static assets are fetched whole, so decoding always
//! works on a byte buffer rather than a file handle.

use crate::audio::types::AudioAsset;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Stateless decoder
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode a complete encoded clip.
    ///
    /// `extension_hint` (e.g. `"mp3"`) helps the probe; it may be `None`.
    ///
    /// # Errors
    /// - Unsupported or unrecognized container
    /// - No audio track
    /// - Stream decoded to zero samples
    pub fn decode_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<AudioAsset> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut interleaved = Vec::new();
        let mut channels = 1u16;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels = spec.channels.count() as u16;
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frame; skip it and keep going
                    warn!("Decode error: {}", e);
                }
                Err(e) => return Err(Error::Decode(format!("Decoder failed: {}", e))),
            }
        }

        if interleaved.is_empty() {
            return Err(Error::Decode("Stream contained no samples".to_string()));
        }

        let asset = AudioAsset::from_interleaved(&interleaved, channels, sample_rate);
        debug!(
            "Decoded {} frames at {}Hz ({} channels)",
            asset.frame_count(),
            sample_rate,
            channels
        );

        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let value = ((i % 100) as i16 - 50) * 200;
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_wav() {
        let asset = SimpleDecoder::decode_bytes(wav_bytes(1, 22050, 2205), Some("wav")).unwrap();
        assert_eq!(asset.sample_rate, 22050);
        assert_eq!(asset.frame_count(), 2205);
    }

    #[test]
    fn test_decode_stereo_wav_downmixes() {
        let asset = SimpleDecoder::decode_bytes(wav_bytes(2, 44100, 441), None).unwrap();
        assert_eq!(asset.sample_rate, 44100);
        assert_eq!(asset.frame_count(), 441);
    }

    #[test]
    fn test_garbage_rejected() {
        let result = SimpleDecoder::decode_bytes(vec![0x13; 512], Some("mp3"));
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
