//! Software mixer
//!
//! Sums every live voice into one mono stream at the device rate. Tone voices
//! are scheduled at an absolute frame so that future-dated tones (the second
//! half of a heartbeat, a melody's later notes) can be cancelled before they
//! become audible. Clip voices play already-resampled narration.
//!
//! The mixer is driven from the real-time audio callback; every method is
//! allocation-light and never blocks beyond the caller's mutex.

use crate::audio::voice::ToneSpec;
use std::sync::Arc;

/// Handle identifying one scheduled voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

enum VoiceKind {
    Tone(ToneSpec),
    Clip(Arc<Vec<f32>>),
}

struct Voice {
    id: VoiceId,
    start_frame: u64,
    end_frame: u64,
    kind: VoiceKind,
}

/// Mono mixer clocked by frames rendered
pub struct Mixer {
    sample_rate: u32,
    frame: u64,
    next_id: u64,
    volume: f32,
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frame: 0,
            next_id: 1,
            volume: 1.0,
            voices: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Master volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Frames rendered so far
    pub fn position(&self) -> u64 {
        self.frame
    }

    fn allocate_id(&mut self) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Schedule a tone `offset_s` seconds after the current position.
    pub fn schedule_tone(&mut self, tone: ToneSpec, offset_s: f64) -> VoiceId {
        let rate = self.sample_rate as f64;
        let start_frame = self.frame + (offset_s.max(0.0) * rate).round() as u64;
        let length = (tone.duration.as_secs_f64() * rate).round() as u64;

        let id = self.allocate_id();
        self.voices.push(Voice {
            id,
            start_frame,
            end_frame: start_frame + length,
            kind: VoiceKind::Tone(tone),
        });
        id
    }

    /// Start a clip immediately. Samples must already be at the mixer rate.
    pub fn add_clip(&mut self, samples: Arc<Vec<f32>>) -> VoiceId {
        let id = self.allocate_id();
        let start_frame = self.frame;
        self.voices.push(Voice {
            id,
            start_frame,
            end_frame: start_frame + samples.len() as u64,
            kind: VoiceKind::Clip(samples),
        });
        id
    }

    /// Remove a voice whether or not it has started. Unknown ids are ignored.
    pub fn stop(&mut self, id: VoiceId) {
        self.voices.retain(|v| v.id != id);
    }

    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    /// True while the voice is scheduled or sounding
    pub fn is_live(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|v| v.id == id)
    }

    pub fn live_count(&self) -> usize {
        self.voices.len()
    }

    /// Render one mono frame and advance the clock.
    pub fn next_sample(&mut self) -> f32 {
        let frame = self.frame;
        let rate = self.sample_rate as f64;
        let mut sum = 0.0f32;

        for voice in &self.voices {
            if frame < voice.start_frame || frame >= voice.end_frame {
                continue;
            }
            let local = frame - voice.start_frame;
            sum += match &voice.kind {
                VoiceKind::Tone(tone) => tone.sample_at(local as f64 / rate),
                VoiceKind::Clip(samples) => samples.get(local as usize).copied().unwrap_or(0.0),
            };
        }

        self.frame += 1;
        if self.voices.iter().any(|v| v.end_frame <= self.frame) {
            let now = self.frame;
            self.voices.retain(|v| v.end_frame > now);
        }

        (sum * self.volume).clamp(-1.0, 1.0)
    }

    /// Fill an interleaved buffer, copying the mono signal to every channel.
    pub fn fill(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks_mut(channels) {
            let sample = self.next_sample();
            for slot in frame.iter_mut() {
                *slot = sample;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::Waveform;

    #[test]
    fn test_silence_when_empty() {
        let mut mixer = Mixer::new(8000);
        assert_eq!(mixer.next_sample(), 0.0);
        assert_eq!(mixer.position(), 1);
    }

    #[test]
    fn test_future_tone_is_silent_until_start() {
        let mut mixer = Mixer::new(1000);
        let tone = ToneSpec::new(100.0, Waveform::Square, 0.1, 0.5).sustained();
        let id = mixer.schedule_tone(tone, 0.5);

        for _ in 0..500 {
            assert_eq!(mixer.next_sample(), 0.0);
        }
        assert!(mixer.is_live(id));

        let audible = (0..100).map(|_| mixer.next_sample().abs()).fold(0.0, f32::max);
        assert!(audible > 0.4);
        assert!(!mixer.is_live(id));
    }

    #[test]
    fn test_stop_cancels_scheduled_tone() {
        let mut mixer = Mixer::new(1000);
        let tone = ToneSpec::new(100.0, Waveform::Square, 0.1, 0.5);
        let id = mixer.schedule_tone(tone, 0.2);
        mixer.stop(id);
        assert_eq!(mixer.live_count(), 0);

        for _ in 0..400 {
            assert_eq!(mixer.next_sample(), 0.0);
        }
    }

    #[test]
    fn test_clip_plays_then_expires() {
        let mut mixer = Mixer::new(4);
        let id = mixer.add_clip(Arc::new(vec![0.1, 0.2, 0.3]));
        let out: Vec<f32> = (0..4).map(|_| mixer.next_sample()).collect();
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.0]);
        assert!(!mixer.is_live(id));
    }

    #[test]
    fn test_volume_and_clamp() {
        let mut mixer = Mixer::new(4);
        mixer.set_volume(0.5);
        mixer.add_clip(Arc::new(vec![0.8]));
        assert!((mixer.next_sample() - 0.4).abs() < 1e-6);

        mixer.set_volume(1.0);
        mixer.add_clip(Arc::new(vec![0.9]));
        mixer.add_clip(Arc::new(vec![0.9]));
        assert_eq!(mixer.next_sample(), 1.0);

        mixer.set_volume(3.0);
        assert_eq!(mixer.volume(), 1.0);
    }

    #[test]
    fn test_fill_duplicates_channels() {
        let mut mixer = Mixer::new(4);
        mixer.add_clip(Arc::new(vec![0.25, 0.5]));
        let mut data = [0.0f32; 4];
        mixer.fill(&mut data, 2);
        assert_eq!(data, [0.25, 0.25, 0.5, 0.5]);
    }
}
