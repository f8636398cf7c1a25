//! Core audio data types

use std::time::Duration;

/// Decoded narration or effect clip.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Always mono; multi-channel sources are downmixed on decode
/// - Sample rate is whatever the source had; the output mixer resamples
///
/// Once in the memory tier an asset is shared read-only behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    /// Mono PCM samples
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioAsset {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of frames (equal to samples for mono)
    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Downmix interleaved samples with `channels` channels to mono.
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1) as usize;
        if channels == 1 {
            return Self::new(interleaved.to_vec(), sample_rate);
        }

        let samples = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self::new(samples, sample_rate)
    }
}
