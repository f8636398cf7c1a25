//! Fixed sound effects
//!
//! Each melody is a table of tones handed to [`ToneSynthesizer::play_tone`].
//! Melodies do not silence anything themselves; exclusivity is decided by the
//! playback coordinator.

use crate::audio::voice::{Decay, Waveform};
use crate::synth::tone::ToneSynthesizer;
use rand::Rng;
use std::time::Duration;

/// One row of a melody table: frequency (Hz), duration (s), start offset (s)
type Note = (f32, f64, f64);

/// Heartbeat repetition period
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

/// Rings in one phone-ring effect
pub const PHONE_RINGS: usize = 3;

/// Simultaneous voices in the crowd murmur
pub const MURMUR_VOICES: usize = 12;

const FANFARE: [Note; 7] = [
    (392.00, 0.2, 0.0),  // G4
    (523.25, 0.2, 0.2),  // C5
    (659.25, 0.2, 0.4),  // E5
    (783.99, 0.4, 0.6),  // G5
    (523.25, 0.2, 1.0),  // C5
    (659.25, 0.2, 1.2),  // E5
    (1046.50, 0.8, 1.4), // C6
];

const JINGLE: [Note; 14] = [
    (523.25, 0.15, 0.0),
    (523.25, 0.15, 0.2),
    (523.25, 0.15, 0.4),
    (659.25, 0.4, 0.6),
    (783.99, 0.4, 1.0),
    (523.25, 0.2, 1.4),
    (659.25, 0.2, 1.6),
    (783.99, 0.6, 1.8),
    (880.00, 0.2, 2.5),
    (783.99, 0.2, 2.7),
    (698.46, 0.2, 2.9),
    (659.25, 0.2, 3.1),
    (587.33, 0.2, 3.3),
    (523.25, 0.8, 3.5),
];

const ARPEGGIO: [Note; 4] = [
    (261.63, 0.5, 0.0),
    (329.63, 0.5, 0.5),
    (392.00, 0.5, 1.0),
    (523.25, 1.0, 1.5),
];

impl ToneSynthesizer {
    /// Rising triangle fanfare over a two-second sawtooth bass (C3)
    pub fn intro_fanfare(&self) {
        for (f, d, t) in FANFARE {
            self.play_tone(f, Waveform::Triangle, d, t, 0.2, Decay::Exponential);
        }
        self.play_tone(130.81, Waveform::Sawtooth, 2.0, 0.0, 0.1, Decay::Exponential);
    }

    /// Square-wave jingle with a triangle arpeggio underneath
    pub fn celebration_jingle(&self) {
        for (f, d, t) in JINGLE {
            self.play_tone(f, Waveform::Square, d, t, 0.15, Decay::Exponential);
        }
        for (f, d, t) in ARPEGGIO {
            self.play_tone(f, Waveform::Triangle, d, t, 0.1, Decay::Exponential);
        }
    }

    /// Two falling sawtooth buzzes
    pub fn wrong_buzz(&self) {
        self.play_tone(150.0, Waveform::Sawtooth, 0.5, 0.0, 0.3, Decay::Exponential);
        self.play_tone(100.0, Waveform::Sawtooth, 1.0, 0.4, 0.3, Decay::Exponential);
    }

    /// Heartbeat: low thump, then a tick half a second later. Repeats every
    /// [`HEARTBEAT_PERIOD`] until stopped.
    pub fn suspense_heartbeat(&self) {
        self.start_repeating(HEARTBEAT_PERIOD, Self::heartbeat_beat);
    }

    fn heartbeat_beat(&self) {
        self.play_tone(110.0, Waveform::Sine, 0.1, 0.0, 0.15, Decay::Exponential);
        self.play_tone(220.0, Waveform::Square, 0.05, 0.5, 0.05, Decay::Exponential);
    }

    /// Two-tone telephone ring, [`PHONE_RINGS`] times (about two seconds)
    pub fn phone_ring(&self) {
        for ring in 0..PHONE_RINGS {
            let start = ring as f64 * 0.7;
            for burst in 0..2 {
                let t = start + burst as f64 * 0.2;
                self.play_tone(440.0, Waveform::Sine, 0.15, t, 0.08, Decay::Linear);
                self.play_tone(480.0, Waveform::Sine, 0.15, t, 0.08, Decay::Linear);
            }
        }
    }

    /// Overlapping low voices with random pitch and timing (about two seconds)
    pub fn crowd_murmur(&self) {
        let mut rng = rand::thread_rng();
        for _ in 0..MURMUR_VOICES {
            let frequency = rng.gen_range(110.0..260.0);
            let start = rng.gen_range(0.0..0.8);
            let duration = rng.gen_range(0.8..1.2);
            let waveform = if rng.gen_bool(0.5) {
                Waveform::Sawtooth
            } else {
                Waveform::Triangle
            };
            self.play_tone(frequency, waveform, duration, start, 0.02, Decay::Linear);
        }
    }

    /// Short two-note ding
    pub fn short_ding(&self) {
        self.play_tone(880.0, Waveform::Sine, 0.1, 0.0, 0.1, Decay::Exponential);
        self.play_tone(1760.0, Waveform::Sine, 0.3, 0.1, 0.05, Decay::Exponential);
    }
}
