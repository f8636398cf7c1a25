//! Procedural tone synthesizer
//!
//! Schedules oscillator voices on the shared output device and remembers
//! them so they can be silenced, including voices scheduled to start later.
//! A registration lives until 100 ms after its voice ends.
//!
//! One repeating pattern (the suspense heartbeat) may run at a time as a
//! tokio task; [`ToneSynthesizer::stop_all`] aborts it together with every
//! registered voice.

use crate::audio::mixer::VoiceId;
use crate::audio::output::OutputDevice;
use crate::audio::voice::{Decay, ToneSpec, Waveform};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Grace period after a voice ends before its registration is dropped
const REGISTRATION_GRACE: Duration = Duration::from_millis(100);

struct Registration {
    id: VoiceId,
    expires_at: Instant,
}

struct SynthInner {
    output: Arc<dyn OutputDevice>,
    voices: Mutex<Vec<Registration>>,
    repeating: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SynthInner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.repeating.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Tone effects engine. Clones share voices and the repeating pattern.
#[derive(Clone)]
pub struct ToneSynthesizer {
    inner: Arc<SynthInner>,
}

impl ToneSynthesizer {
    pub fn new(output: Arc<dyn OutputDevice>) -> Self {
        Self {
            inner: Arc::new(SynthInner {
                output,
                voices: Mutex::new(Vec::new()),
                repeating: Mutex::new(None),
            }),
        }
    }

    /// Schedule one voice `start_offset_s` seconds from now.
    ///
    /// Without an output device this is a no-op.
    pub fn play_tone(
        &self,
        frequency: f32,
        waveform: Waveform,
        duration_s: f64,
        start_offset_s: f64,
        volume: f32,
        decay: Decay,
    ) {
        let mut tone = ToneSpec::new(frequency, waveform, duration_s, volume);
        tone.decay = decay;
        self.schedule(tone, Duration::from_secs_f64(start_offset_s.max(0.0)));
    }

    /// Schedule a prepared voice.
    pub fn schedule(&self, tone: ToneSpec, start_offset: Duration) {
        let Some(id) = self.inner.output.play_tone(tone, start_offset) else {
            return;
        };

        let now = Instant::now();
        let expires_at = now + start_offset + tone.duration + REGISTRATION_GRACE;

        if let Ok(mut voices) = self.inner.voices.lock() {
            voices.retain(|r| r.expires_at > now);
            voices.push(Registration { id, expires_at });
        }
    }

    /// Halt every registered voice and cancel the repeating pattern.
    ///
    /// Idempotent.
    pub fn stop_all(&self) {
        self.stop_heartbeat();

        let drained: Vec<Registration> = match self.inner.voices.lock() {
            Ok(mut voices) => voices.drain(..).collect(),
            Err(_) => return,
        };

        if !drained.is_empty() {
            debug!("Stopping {} tone voices", drained.len());
        }
        for registration in drained {
            self.inner.output.stop_voice(registration.id);
        }
    }

    /// Cancel only the repeating pattern; voices already scheduled play out.
    pub fn stop_heartbeat(&self) {
        if let Ok(mut slot) = self.inner.repeating.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
                debug!("Repeating pattern cancelled");
            }
        }
    }

    /// Run `pattern` now and then every `period` until stopped.
    ///
    /// Replaces any pattern already running. Outside a tokio runtime nothing
    /// is played.
    pub fn start_repeating(&self, period: Duration, pattern: fn(&ToneSynthesizer)) {
        self.stop_heartbeat();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Repeating pattern not started: {}", e);
                return;
            }
        };

        pattern(self);

        let weak: Weak<SynthInner> = Arc::downgrade(&self.inner);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                pattern(&ToneSynthesizer { inner });
            }
        });

        if let Ok(mut slot) = self.inner.repeating.lock() {
            *slot = Some(handle);
        }
    }

    /// True while a repeating pattern is scheduled
    pub fn is_repeating(&self) -> bool {
        self.inner
            .repeating
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Registrations that have not yet expired
    pub fn live_voices(&self) -> usize {
        let now = Instant::now();
        self.inner
            .voices
            .lock()
            .map(|voices| voices.iter().filter(|r| r.expires_at > now).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::AudioAsset;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingOutput {
        next: AtomicU64,
        stopped: Mutex<Vec<VoiceId>>,
    }

    impl OutputDevice for CountingOutput {
        fn play_tone(&self, _tone: ToneSpec, _start_offset: Duration) -> Option<VoiceId> {
            Some(VoiceId(self.next.fetch_add(1, Ordering::SeqCst)))
        }

        fn play_clip(&self, _clip: Arc<AudioAsset>) -> Option<VoiceId> {
            None
        }

        fn stop_voice(&self, id: VoiceId) {
            self.stopped.lock().unwrap().push(id);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_expires_after_grace() {
        let output = Arc::new(CountingOutput::default());
        let synth = ToneSynthesizer::new(output.clone());

        synth.play_tone(440.0, Waveform::Sine, 0.2, 0.3, 0.1, Decay::Exponential);
        assert_eq!(synth.live_voices(), 1);

        // Still registered while waiting to start and while sounding
        tokio::time::advance(Duration::from_millis(550)).await;
        assert_eq!(synth.live_voices(), 1);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(synth.live_voices(), 0);
    }

    #[tokio::test]
    async fn test_stop_all_stops_registered_and_is_idempotent() {
        let output = Arc::new(CountingOutput::default());
        let synth = ToneSynthesizer::new(output.clone());

        synth.play_tone(880.0, Waveform::Sine, 0.1, 0.0, 0.1, Decay::Exponential);
        synth.play_tone(1760.0, Waveform::Sine, 0.3, 0.1, 0.05, Decay::Exponential);

        synth.stop_all();
        assert_eq!(output.stopped.lock().unwrap().len(), 2);
        assert_eq!(synth.live_voices(), 0);

        synth.stop_all();
        assert_eq!(output.stopped.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_repeating_without_runtime_does_not_start() {
        let output = Arc::new(CountingOutput::default());
        let synth = ToneSynthesizer::new(output.clone());

        synth.start_repeating(Duration::from_secs(1), ToneSynthesizer::short_ding);

        assert!(!synth.is_repeating());
        assert_eq!(output.next.load(Ordering::SeqCst), 0);
        synth.stop_all();
    }

    #[tokio::test]
    async fn test_no_device_registers_nothing() {
        let synth = ToneSynthesizer::new(Arc::new(crate::audio::output::NullOutput));
        synth.play_tone(440.0, Waveform::Square, 0.5, 0.0, 0.2, Decay::Linear);
        assert_eq!(synth.live_voices(), 0);
        synth.stop_all();
    }
}
