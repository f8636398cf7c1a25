//! Sample rate conversion using rubato
//!
//! Narration clips arrive at whatever rate their source had (24 kHz from the
//! durable store, 44.1/48 kHz from packaged files). The mixer needs them at
//! the device rate; the store needs them at 24 kHz.

use crate::audio::types::AudioAsset;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Mono resampler
pub struct Resampler;

impl Resampler {
    /// Resample mono samples from `input_rate` to `output_rate`.
    ///
    /// Same-rate input is returned as a copy. The whole clip is processed as
    /// one chunk since narration clips are short.
    pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == output_rate || input.is_empty() {
            return Ok(input.to_vec());
        }

        if input_rate == 0 || output_rate == 0 {
            return Err(Error::Resample(format!(
                "Invalid rates {} -> {}",
                input_rate, output_rate
            )));
        }

        debug!(
            "Resampling {} frames from {}Hz to {}Hz",
            input.len(),
            input_rate,
            output_rate
        );

        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Cubic,
            input.len(),
            1,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {}", e)))?;

        let mut planar = resampler
            .process(&[input], None)
            .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;

        Ok(planar.pop().unwrap_or_default())
    }

    /// Convert an asset to `output_rate`, sharing nothing with the source.
    pub fn to_rate(asset: &AudioAsset, output_rate: u32) -> Result<AudioAsset> {
        let samples = Self::resample(&asset.samples, asset.sample_rate, output_rate)?;
        Ok(AudioAsset::new(samples, output_rate))
    }
}
