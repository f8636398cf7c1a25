//! Test doubles for mqz-audio integration tests
//!
//! - `RecordingOutput`: output device that records what was played/stopped
//! - `CountingStore` / `CountingStatics`: backing tiers that count accesses
//! - `RecordingSpeech`: speech engine that records utterances and cancels
//! - `wav_bytes`: WAV fixture generation with hound

#![allow(dead_code)]

use async_trait::async_trait;
use mqz_audio::audio::{AudioAsset, OutputDevice, ToneSpec, VoiceId};
use mqz_audio::cache::StaticAssetSource;
use mqz_audio::db::DurableStore;
use mqz_audio::playback::{SpeechEngine, Utterance, VoiceInfo};
use mqz_audio::Result;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a `RecordingOutput` was asked to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Tone { id: VoiceId, frequency: f32 },
    Clip { id: VoiceId, frames: usize },
    Stop(VoiceId),
}

#[derive(Default)]
pub struct RecordingOutput {
    next: AtomicU64,
    events: Mutex<Vec<OutputEvent>>,
}

impl RecordingOutput {
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clips(&self) -> Vec<VoiceId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::Clip { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn tone_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, OutputEvent::Tone { .. }))
            .count()
    }

    pub fn stopped(&self) -> Vec<VoiceId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::Stop(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn next_id(&self) -> VoiceId {
        VoiceId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl OutputDevice for RecordingOutput {
    fn play_tone(&self, tone: ToneSpec, _start_offset: Duration) -> Option<VoiceId> {
        let id = self.next_id();
        self.events.lock().unwrap().push(OutputEvent::Tone {
            id,
            frequency: tone.frequency,
        });
        Some(id)
    }

    fn play_clip(&self, clip: Arc<AudioAsset>) -> Option<VoiceId> {
        let id = self.next_id();
        self.events.lock().unwrap().push(OutputEvent::Clip {
            id,
            frames: clip.frame_count(),
        });
        Some(id)
    }

    fn stop_voice(&self, id: VoiceId) {
        self.events.lock().unwrap().push(OutputEvent::Stop(id));
    }
}

/// In-memory durable store counting reads
#[derive(Default)]
pub struct CountingStore {
    entries: Mutex<HashMap<String, String>>,
    pub gets: AtomicUsize,
    /// Delay applied to every read
    pub latency: Duration,
}

impl CountingStore {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn insert(&self, key: &str, payload: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), payload.to_string());
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, payload: &str) -> Result<()> {
        self.insert(key, payload);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries.lock().unwrap().len() as u64)
    }
}

/// Packaged assets held in memory, counting fetches
#[derive(Default)]
pub struct CountingStatics {
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl CountingStatics {
    pub fn with_file(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(name.to_string(), bytes);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StaticAssetSource for CountingStatics {
    async fn fetch(&self, static_id: &str) -> Result<Option<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.files.get(static_id).cloned())
    }
}

/// Speech engine recording every request
pub struct RecordingSpeech {
    voices: Vec<VoiceInfo>,
    pub utterances: Mutex<Vec<Utterance>>,
    pub cancels: AtomicUsize,
    pub voice_listings: AtomicUsize,
}

impl RecordingSpeech {
    pub fn new(voices: Vec<VoiceInfo>) -> Self {
        Self {
            voices,
            utterances: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            voice_listings: AtomicUsize::new(0),
        }
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        self.utterances.lock().unwrap().clone()
    }
}

impl Default for RecordingSpeech {
    fn default() -> Self {
        Self::new(vec![
            voice("Samantha", "en-US"),
            voice("Tarik", "ar-SA"),
            voice("Maged", "ar-SA"),
        ])
    }
}

#[async_trait]
impl SpeechEngine for RecordingSpeech {
    async fn voices(&self) -> Result<Vec<VoiceInfo>> {
        self.voice_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.voices.clone())
    }

    async fn speak(&self, utterance: Utterance) -> Result<()> {
        self.utterances.lock().unwrap().push(utterance);
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn voice(name: &str, lang: &str) -> VoiceInfo {
    VoiceInfo {
        name: name.to_string(),
        lang: lang.to_string(),
    }
}

/// Mono 16-bit WAV of a 440 Hz sine
pub fn wav_bytes(sample_rate: u32, frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
            writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
