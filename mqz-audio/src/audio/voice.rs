//! Oscillator voices
//!
//! A tone voice is one oscillator shaped by a gain envelope:
//! - 50 ms linear attack from silence to the target volume
//! - then either an exponential decay reaching 0.001 at the end of the tone,
//!   or a hold followed by a linear release over the final 50 ms
//!
//! Everything here is a pure function of time since the voice started, so the
//! mixer can render voices at any device rate.

use std::time::Duration;

/// Attack (and linear release) length in seconds
pub const RAMP_SECONDS: f64 = 0.05;

/// Gain reached at the end of an exponential decay
const DECAY_FLOOR: f64 = 0.001;

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Value at `phase` cycles (only the fractional part matters).
    pub fn value(&self, phase: f64) -> f32 {
        let p = phase.fract();
        let v = match self {
            Waveform::Sine => (std::f64::consts::TAU * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        };
        v as f32
    }
}

impl std::str::FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            other => Err(format!("Unknown waveform: {}", other)),
        }
    }
}

/// Envelope shape after the attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decay {
    /// Exponential fall to 0.001 at the end of the tone
    Exponential,
    /// Hold, then a linear release over the final 50 ms
    Linear,
}

/// One oscillator voice, relative to its own start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    /// Frequency in Hz
    pub frequency: f32,
    pub waveform: Waveform,
    pub duration: Duration,
    /// Peak gain after the attack
    pub volume: f32,
    pub decay: Decay,
}

impl ToneSpec {
    pub fn new(frequency: f32, waveform: Waveform, duration_s: f64, volume: f32) -> Self {
        Self {
            frequency,
            waveform,
            duration: Duration::from_secs_f64(duration_s.max(0.0)),
            volume,
            decay: Decay::Exponential,
        }
    }

    /// Switch to hold-then-release shaping.
    pub fn sustained(mut self) -> Self {
        self.decay = Decay::Linear;
        self
    }

    /// Envelope gain `t` seconds after the voice started.
    pub fn gain_at(&self, t: f64) -> f32 {
        let duration = self.duration.as_secs_f64();
        let volume = self.volume as f64;

        if t < 0.0 || t >= duration || volume <= 0.0 {
            return 0.0;
        }

        let attack = RAMP_SECONDS.min(duration);
        if t < attack {
            return (volume * t / attack) as f32;
        }

        let gain = match self.decay {
            Decay::Exponential => {
                let span = duration - attack;
                if span <= 0.0 {
                    volume
                } else {
                    let floor = DECAY_FLOOR.min(volume);
                    volume * (floor / volume).powf((t - attack) / span)
                }
            }
            Decay::Linear => {
                let release_start = (duration - RAMP_SECONDS).max(attack);
                if t < release_start {
                    volume
                } else {
                    let span = duration - release_start;
                    volume * (1.0 - (t - release_start) / span).max(0.0)
                }
            }
        };

        gain as f32
    }

    /// Output sample `t` seconds after the voice started.
    pub fn sample_at(&self, t: f64) -> f32 {
        let gain = self.gain_at(t);
        if gain == 0.0 {
            return 0.0;
        }
        self.waveform.value(self.frequency as f64 * t) * gain
    }
}
