//! Playback coordinator
//!
//! The single consumer-facing surface of the audio core. It owns the shared
//! output device, the tone synthesizer, the narration cache and the speech
//! fallback, and enforces which sounds may overlap:
//!
//! | sound                         | exclusive |
//! |-------------------------------|-----------|
//! | narration (`speak`)           | yes       |
//! | intro, celebration, wrong     | yes       |
//! | suspense heartbeat            | yes       |
//! | ding, phone ring, crowd murmur| no        |
//!
//! Starting an exclusive sound calls [`PlaybackCoordinator::stop_all_sounds`]
//! first. No method returns an error; failures are logged and degrade to
//! silence or synthesized speech.
//!
//! Every `speak` and `stop_all_sounds` advances a narration epoch. A `speak`
//! whose lookup settles after a newer epoch began is discarded instead of
//! talking over whatever replaced it.

use crate::audio::mixer::VoiceId;
use crate::audio::output::OutputDevice;
use crate::cache::TieredAudioCache;
use crate::playback::speech::{select_voice, SpeechEngine, Utterance, VoiceInfo};
use crate::synth::ToneSynthesizer;
use mqz_common::config::SpeechConfig;
use mqz_common::phrases;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Speech fallback tuning
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub rate: f32,
    pub pitch: f32,
    pub preferred_voices: Vec<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        SpeechSettings::from(&SpeechConfig::default())
    }
}

impl From<&SpeechConfig> for SpeechSettings {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            rate: config.rate,
            pitch: config.pitch,
            preferred_voices: config.preferred_voices.clone(),
        }
    }
}

/// Coordinates narration and effects on one output device.
pub struct PlaybackCoordinator {
    cache: TieredAudioCache,
    synth: ToneSynthesizer,
    output: Arc<dyn OutputDevice>,
    speech: Arc<dyn SpeechEngine>,
    settings: SpeechSettings,
    /// Narration clip currently on the device
    narration: Mutex<Option<VoiceId>>,
    epoch: AtomicU64,
    voices: OnceCell<Vec<VoiceInfo>>,
}

impl PlaybackCoordinator {
    pub fn new(
        cache: TieredAudioCache,
        output: Arc<dyn OutputDevice>,
        speech: Arc<dyn SpeechEngine>,
        settings: SpeechSettings,
    ) -> Self {
        let synth = ToneSynthesizer::new(Arc::clone(&output));
        Self {
            cache,
            synth,
            output,
            speech,
            settings,
            narration: Mutex::new(None),
            epoch: AtomicU64::new(0),
            voices: OnceCell::new(),
        }
    }

    pub fn cache(&self) -> &TieredAudioCache {
        &self.cache
    }

    pub fn synth(&self) -> &ToneSynthesizer {
        &self.synth
    }

    /// Master volume for tones and clips (0.0-1.0)
    pub fn set_volume(&self, volume: f32) {
        self.output.set_volume(volume);
    }

    /// Start loading narration into memory; returns immediately.
    pub fn preload(&self, text: &str, lang: &str, static_id: Option<&str>) {
        self.cache.preload(text, lang, static_id);
    }

    /// Preload every fixed phrase.
    pub fn warm_up(&self) {
        let all = phrases::all();
        info!("Warming up {} fixed phrases", all.len());
        for phrase in all {
            self.cache
                .preload(phrase.text, phrase.lang, Some(&phrase.static_id));
        }
    }

    /// Narrate `text`, from cache when possible, else by synthesized speech.
    ///
    /// Silences every other sound first. Returns once playback has started
    /// (or was skipped because a newer request superseded this one).
    pub async fn speak(&self, text: &str, lang: &str, static_id: Option<&str>) {
        self.stop_all_sounds();
        let epoch = self.current_epoch();

        let asset = self.cache.resolve(text, lang, static_id).await;
        if self.current_epoch() != epoch {
            debug!("Discarding stale narration for '{}'", text);
            return;
        }

        if let Some(asset) = asset {
            match self.output.play_clip(asset) {
                Some(id) => {
                    if let Ok(mut narration) = self.narration.lock() {
                        *narration = Some(id);
                    }
                }
                None => debug!("No output device for narration"),
            }
            return;
        }

        self.speak_fallback(text, lang, epoch).await;
    }

    async fn speak_fallback(&self, text: &str, lang: &str, epoch: u64) {
        let voice = {
            let voices = self.ensure_voices().await;
            select_voice(voices, lang, &self.settings.preferred_voices).map(|v| v.name.clone())
        };

        if self.current_epoch() != epoch {
            debug!("Discarding stale speech for '{}'", text);
            return;
        }

        debug!("Cache miss, synthesizing '{}' with voice {:?}", text, voice);
        let utterance = Utterance {
            text: text.to_string(),
            lang: lang.to_string(),
            voice,
            rate: self.settings.rate,
            pitch: self.settings.pitch,
        };

        if let Err(e) = self.speech.speak(utterance).await {
            warn!("Speech fallback failed: {}", e);
            return;
        }

        // Stopped while the engine was starting up
        if self.current_epoch() != epoch {
            self.speech.cancel();
        }
    }

    /// Installed voices, loaded once on first use.
    pub async fn ensure_voices(&self) -> &[VoiceInfo] {
        self.voices
            .get_or_init(|| async {
                match self.speech.voices().await {
                    Ok(voices) => {
                        debug!("Loaded {} speech voices", voices.len());
                        voices
                    }
                    Err(e) => {
                        warn!("Could not list speech voices: {}", e);
                        Vec::new()
                    }
                }
            })
            .await
    }

    /// Silence tones, the narration clip and any synthesized utterance.
    ///
    /// Idempotent.
    pub fn stop_all_sounds(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.synth.stop_all();

        let narration = self.narration.lock().ok().and_then(|mut n| n.take());
        if let Some(id) = narration {
            self.output.stop_voice(id);
        }

        self.speech.cancel();
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Short ding; overlaps whatever is playing
    pub fn play_ding(&self) {
        self.synth.short_ding();
    }

    pub fn play_correct_sound(&self) {
        self.play_ding();
    }

    pub fn play_intro_music(&self) {
        self.stop_all_sounds();
        self.synth.intro_fanfare();
    }

    pub fn play_celebration_music(&self) {
        self.stop_all_sounds();
        self.synth.celebration_jingle();
    }

    pub fn play_wrong_sound(&self) {
        self.stop_all_sounds();
        self.synth.wrong_buzz();
    }

    /// Heartbeat loop until stopped. Requires a tokio runtime.
    pub fn start_suspense_music(&self) {
        self.stop_all_sounds();
        self.synth.suspense_heartbeat();
    }

    /// Stop scheduling heartbeats; a beat already scheduled plays out.
    pub fn stop_suspense_music(&self) {
        self.synth.stop_heartbeat();
    }

    /// Phone ring; overlaps whatever is playing
    pub fn play_phone_ring(&self) {
        self.synth.phone_ring();
    }

    /// Crowd murmur; overlaps whatever is playing
    pub fn play_audience_thinking(&self) {
        self.synth.crowd_murmur();
    }

    /// React to an answer with a random fixed phrase.
    pub async fn encourage(&self, correct: bool) {
        let phrase = phrases::pick_encouragement(correct, &mut rand::thread_rng());
        self.speak(phrase.text, phrase.lang, Some(&phrase.static_id))
            .await;
    }
}
