//! Audio output using cpal
//!
//! One output device is shared by tone effects and narration clips. The
//! [`OutputDevice`] trait is the seam between the playback layer and the
//! hardware; [`SharedOutput`] is the production implementation that opens the
//! cpal device on first use and reopens it after a stream error.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread for
//! its whole life. The callback pulls from a [`Mixer`] behind a mutex.

use crate::audio::mixer::{Mixer, VoiceId};
use crate::audio::resampler::Resampler;
use crate::audio::types::AudioAsset;
use crate::audio::voice::ToneSpec;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Anything that can render tones and clips.
///
/// Every method is a no-op returning `None` when no device is available.
pub trait OutputDevice: Send + Sync {
    /// Schedule a tone to start `start_offset` from now.
    fn play_tone(&self, tone: ToneSpec, start_offset: Duration) -> Option<VoiceId>;

    /// Start a clip immediately.
    fn play_clip(&self, clip: Arc<AudioAsset>) -> Option<VoiceId>;

    /// Stop a voice, scheduled or sounding. Unknown ids are ignored.
    fn stop_voice(&self, id: VoiceId);

    /// Master volume (0.0-1.0)
    fn set_volume(&self, _volume: f32) {}
}

/// Output that discards everything (`--no-audio`, headless hosts)
#[derive(Debug, Default)]
pub struct NullOutput;

impl OutputDevice for NullOutput {
    fn play_tone(&self, _tone: ToneSpec, _start_offset: Duration) -> Option<VoiceId> {
        None
    }

    fn play_clip(&self, _clip: Arc<AudioAsset>) -> Option<VoiceId> {
        None
    }

    fn stop_voice(&self, _id: VoiceId) {}
}

/// An open cpal stream feeding from a mixer.
pub struct CpalOutput {
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    channels: u16,
    device_name: String,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    /// Dropping this ends the stream thread
    _shutdown: mpsc::Sender<()>,
}

impl CpalOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open a device and start its stream.
    ///
    /// `device_name` of `None` or `"default"` selects the host default. A
    /// named device that cannot be found falls back to the default device.
    pub fn open(device_name: Option<String>, volume: f32) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(Arc<Mutex<Mixer>>, u32, u16, String)>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let error_flag = Arc::new(AtomicBool::new(false));
        let thread_error_flag = Arc::clone(&error_flag);

        std::thread::Builder::new()
            .name("mqz-audio-output".to_string())
            .spawn(move || {
                let stream = match Self::start_stream(device_name, volume, thread_error_flag) {
                    Ok((stream, mixer, rate, channels, name)) => {
                        let _ = ready_tx.send(Ok((mixer, rate, channels, name)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until the owning CpalOutput is dropped
                let _ = shutdown_rx.recv();
                if let Err(e) = stream.pause() {
                    debug!("Failed to pause stream on shutdown: {}", e);
                }
                debug!("Audio output thread exiting");
            })?;

        let (mixer, sample_rate, channels, device_name) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio output thread exited".to_string()))??;

        info!(
            "Audio output ready: {} ({}Hz, {} channels)",
            device_name, sample_rate, channels
        );

        Ok(Self {
            mixer,
            sample_rate,
            channels,
            device_name,
            error_flag,
            _shutdown: shutdown_tx,
        })
    }

    #[allow(clippy::type_complexity)]
    fn start_stream(
        device_name: Option<String>,
        volume: f32,
        error_flag: Arc<AtomicBool>,
    ) -> Result<(Stream, Arc<Mutex<Mixer>>, u32, u16, String)> {
        let device = Self::select_device(device_name.as_deref())?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let mut mixer = Mixer::new(config.sample_rate.0);
        mixer.set_volume(volume);
        let mixer = Arc::new(Mutex::new(mixer));

        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, Arc::clone(&mixer), error_flag)?
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, Arc::clone(&mixer), error_flag)?
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, Arc::clone(&mixer), error_flag)?
            }
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        Ok((stream, mixer, config.sample_rate.0, config.channels, name))
    }

    fn select_device(name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = name.filter(|n| *n != "default") {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }

            warn!(
                "Requested device '{}' not found, falling back to default device",
                name
            );
        }

        host.default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mixer: Arc<Mutex<Mixer>>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    match mixer.lock() {
                        Ok(mut mixer) => mixer.fill(&mut scratch, channels),
                        Err(_) => scratch.iter_mut().for_each(|s| *s = 0.0),
                    }
                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(*sample);
                    }
                },
                move |err| {
                    error!("Audio stream error: {} - marking for reopen", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// True once the stream reported an error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    fn with_mixer<R>(&self, f: impl FnOnce(&mut Mixer) -> R) -> Option<R> {
        match self.mixer.lock() {
            Ok(mut mixer) => Some(f(&mut mixer)),
            Err(_) => {
                warn!("Mixer lock poisoned");
                None
            }
        }
    }
}

impl OutputDevice for CpalOutput {
    fn play_tone(&self, tone: ToneSpec, start_offset: Duration) -> Option<VoiceId> {
        self.with_mixer(|m| m.schedule_tone(tone, start_offset.as_secs_f64()))
    }

    fn play_clip(&self, clip: Arc<AudioAsset>) -> Option<VoiceId> {
        let samples = match Resampler::resample(&clip.samples, clip.sample_rate, self.sample_rate)
        {
            Ok(samples) => Arc::new(samples),
            Err(e) => {
                warn!("Dropping clip that failed to resample: {}", e);
                return None;
            }
        };
        self.with_mixer(|m| m.add_clip(samples))
    }

    fn stop_voice(&self, id: VoiceId) {
        self.with_mixer(|m| m.stop(id));
    }

    fn set_volume(&self, volume: f32) {
        self.with_mixer(|m| m.set_volume(volume));
    }
}

/// Minimum spacing between attempts to open the device
const REOPEN_INTERVAL: Duration = Duration::from_secs(1);

/// Spaces out device open attempts so a melody on a machine without sound
/// does not probe the host once per note.
#[derive(Debug)]
struct ReopenThrottle {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl ReopenThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    /// True (and the attempt recorded) if `now` is far enough past the last one.
    fn try_attempt(&mut self, now: Instant) -> bool {
        match self.last_attempt {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_attempt = Some(now);
                true
            }
        }
    }
}

/// Lazily opened device shared by the synthesizer and the coordinator.
///
/// The device is opened on the first call that needs it. If opening fails the
/// call is a no-op, and calls within the next second do not try again; a
/// stream that reported an error is dropped and reopened the same way.
pub struct SharedOutput {
    device_name: Option<String>,
    volume: Mutex<f32>,
    device: Mutex<Option<CpalOutput>>,
    throttle: Mutex<ReopenThrottle>,
    warned: AtomicBool,
}

impl SharedOutput {
    pub fn new(device_name: Option<String>, volume: f32) -> Self {
        Self {
            device_name,
            volume: Mutex::new(volume.clamp(0.0, 1.0)),
            device: Mutex::new(None),
            throttle: Mutex::new(ReopenThrottle::new(REOPEN_INTERVAL)),
            warned: AtomicBool::new(false),
        }
    }

    fn current_volume(&self) -> f32 {
        self.volume.lock().map(|v| *v).unwrap_or(1.0)
    }

    fn with_device<R>(&self, f: impl FnOnce(&CpalOutput) -> R) -> Option<R> {
        let mut slot = self.device.lock().ok()?;

        if slot.as_ref().is_some_and(|d| d.has_error()) {
            warn!("Audio stream errored, reopening device");
            *slot = None;
        }

        if slot.is_none() {
            let may_open = self
                .throttle
                .lock()
                .map(|mut t| t.try_attempt(Instant::now()))
                .unwrap_or(false);
            if !may_open {
                return None;
            }

            match CpalOutput::open(self.device_name.clone(), self.current_volume()) {
                Ok(device) => {
                    self.warned.store(false, Ordering::SeqCst);
                    *slot = Some(device);
                }
                Err(e) => {
                    if !self.warned.swap(true, Ordering::SeqCst) {
                        warn!("Audio output unavailable, sound is disabled: {}", e);
                    } else {
                        debug!("Audio output still unavailable: {}", e);
                    }
                    return None;
                }
            }
        }

        slot.as_ref().map(f)
    }
}

impl OutputDevice for SharedOutput {
    fn play_tone(&self, tone: ToneSpec, start_offset: Duration) -> Option<VoiceId> {
        self.with_device(|d| d.play_tone(tone, start_offset)).flatten()
    }

    fn play_clip(&self, clip: Arc<AudioAsset>) -> Option<VoiceId> {
        self.with_device(|d| d.play_clip(clip)).flatten()
    }

    fn stop_voice(&self, id: VoiceId) {
        // Never open a device just to stop something
        if let Ok(slot) = self.device.lock() {
            if let Some(device) = slot.as_ref() {
                device.stop_voice(id);
            }
        }
    }

    fn set_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        if let Ok(mut v) = self.volume.lock() {
            *v = clamped;
        }
        if let Ok(slot) = self.device.lock() {
            if let Some(device) = slot.as_ref() {
                device.set_volume(clamped);
            }
        }
        debug!("Volume set to {:.2}", clamped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::Waveform;

    #[test]
    fn test_list_devices() {
        // Requires audio hardware; only verify it doesn't panic
        let _ = CpalOutput::list_devices();
    }

    #[test]
    fn test_null_output_is_noop() {
        let output = NullOutput;
        let tone = ToneSpec::new(440.0, Waveform::Sine, 0.1, 0.1);
        assert!(output.play_tone(tone, Duration::ZERO).is_none());
        assert!(output
            .play_clip(Arc::new(AudioAsset::new(vec![0.0; 10], 24000)))
            .is_none());
        output.stop_voice(VoiceId(1));
    }

    #[test]
    fn test_shared_output_stop_without_device() {
        let output = SharedOutput::new(None, 0.8);
        // Must not try to open a device
        output.stop_voice(VoiceId(42));
        output.set_volume(2.0);
        assert_eq!(output.current_volume(), 1.0);
    }

    #[test]
    fn test_reopen_throttle_spaces_attempts() {
        let mut throttle = ReopenThrottle::new(Duration::from_secs(1));
        let start = Instant::now();

        assert!(throttle.try_attempt(start));
        // Every note of a melody lands inside the window
        for ms in [1u64, 50, 400, 999] {
            assert!(!throttle.try_attempt(start + Duration::from_millis(ms)));
        }
        assert!(throttle.try_attempt(start + Duration::from_millis(1000)));
        assert!(!throttle.try_attempt(start + Duration::from_millis(1500)));
        assert!(throttle.try_attempt(start + Duration::from_millis(2100)));
    }
}
