//! Synthesized speech fallback
//!
//! Used only when narration misses every cache tier. The engine sits behind
//! [`SpeechEngine`]; production uses the `espeak-ng` executable, and
//! [`SilentEngine`] stands in when no engine is installed.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// One installed voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Engine-specific voice identifier
    pub name: String,
    /// Language tag, e.g. `ar` or `en-us`
    pub lang: String,
}

/// Request for one spoken line
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    /// Voice chosen by [`select_voice`]; `None` uses the engine default
    pub voice: Option<String>,
    /// Relative speaking rate (1.0 = normal)
    pub rate: f32,
    /// Relative pitch (1.0 = normal)
    pub pitch: f32,
}

/// Speech synthesizer
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Installed voices
    async fn voices(&self) -> Result<Vec<VoiceInfo>>;

    /// Start speaking. Returns once the utterance has started, not when it
    /// finishes. A previous utterance still speaking is cancelled first.
    async fn speak(&self, utterance: Utterance) -> Result<()>;

    /// Cancel the current utterance, if any. Idempotent.
    fn cancel(&self);
}

/// Primary language subtag, lowercased (`ar-SA` → `ar`)
pub fn primary_subtag(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Pick the best voice for `lang`.
///
/// Candidates are voices sharing the primary subtag. A candidate whose name
/// contains one of `preferred` wins (in `preferred` order); otherwise the
/// first candidate. `None` means "use the engine default".
pub fn select_voice<'a>(
    voices: &'a [VoiceInfo],
    lang: &str,
    preferred: &[String],
) -> Option<&'a VoiceInfo> {
    let primary = primary_subtag(lang);
    let candidates: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| primary_subtag(&v.lang) == primary)
        .collect();

    preferred
        .iter()
        .find_map(|p| candidates.iter().find(|v| v.name.contains(p.as_str())))
        .or_else(|| candidates.first())
        .copied()
}

/// `espeak-ng` subprocess engine
pub struct EspeakEngine {
    command: String,
    current: Mutex<Option<Child>>,
}

/// espeak-ng defaults the relative rate and pitch scale
const ESPEAK_BASE_WPM: f32 = 175.0;
const ESPEAK_BASE_PITCH: f32 = 50.0;

impl EspeakEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            current: Mutex::new(None),
        }
    }

    /// Build an engine if `command` runs, else `None`.
    pub async fn detect(command: &str) -> Option<Self> {
        let status = Command::new(command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() => {
                info!("Speech fallback engine: {}", command);
                Some(Self::new(command))
            }
            Ok(s) => {
                warn!("{} --version exited with {}", command, s);
                None
            }
            Err(e) => {
                warn!("Speech engine '{}' unavailable: {}", command, e);
                None
            }
        }
    }

    /// Parse `espeak-ng --voices` output.
    ///
    /// Columns: `Pty Language Age/Gender VoiceName File [Other Languages]`.
    pub fn parse_voice_list(listing: &str) -> Vec<VoiceInfo> {
        listing
            .lines()
            .skip(1)
            .filter_map(|line| {
                let mut cols = line.split_whitespace();
                let _priority = cols.next()?;
                let lang = cols.next()?;
                let _age_gender = cols.next()?;
                let _display_name = cols.next()?;
                let file = cols.next()?;
                Some(VoiceInfo {
                    name: file.to_string(),
                    lang: lang.to_string(),
                })
            })
            .collect()
    }

    fn build_args(utterance: &Utterance) -> Vec<String> {
        let voice = utterance
            .voice
            .clone()
            .unwrap_or_else(|| primary_subtag(&utterance.lang));
        let wpm = (ESPEAK_BASE_WPM * utterance.rate).round().clamp(80.0, 450.0) as u32;
        let pitch = (ESPEAK_BASE_PITCH * utterance.pitch).round().clamp(0.0, 99.0) as u32;

        vec![
            "-v".to_string(),
            voice,
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "--".to_string(),
            utterance.text.clone(),
        ]
    }
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    async fn voices(&self) -> Result<Vec<VoiceInfo>> {
        let output = Command::new(&self.command)
            .arg("--voices")
            .stderr(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Speech(format!(
                "{} --voices exited with {}",
                self.command, output.status
            )));
        }

        let voices = Self::parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        debug!("{} voices installed", voices.len());
        Ok(voices)
    }

    async fn speak(&self, utterance: Utterance) -> Result<()> {
        self.cancel();

        let child = Command::new(&self.command)
            .args(Self::build_args(&utterance))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        debug!("Speaking '{}' ({})", utterance.text, utterance.lang);
        if let Ok(mut current) = self.current.lock() {
            *current = Some(child);
        }
        Ok(())
    }

    fn cancel(&self) {
        let child = match self.current.lock() {
            Ok(mut current) => current.take(),
            Err(_) => None,
        };

        if let Some(mut child) = child {
            // Already-exited children make this fail; nothing to do then
            if child.start_kill().is_ok() {
                debug!("Cancelled speech utterance");
            }
        }
    }
}

/// Engine used when no synthesizer is installed: logs and stays silent
#[derive(Debug, Default)]
pub struct SilentEngine;

#[async_trait]
impl SpeechEngine for SilentEngine {
    async fn voices(&self) -> Result<Vec<VoiceInfo>> {
        Ok(Vec::new())
    }

    async fn speak(&self, utterance: Utterance) -> Result<()> {
        info!("(silent) {}: {}", utterance.lang, utterance.text);
        Ok(())
    }

    fn cancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str) -> VoiceInfo {
        VoiceInfo {
            name: name.to_string(),
            lang: lang.to_string(),
        }
    }

    fn preferred() -> Vec<String> {
        ["Google", "Samantha", "Laila", "Maged"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("ar-SA"), "ar");
        assert_eq!(primary_subtag("en_US"), "en");
        assert_eq!(primary_subtag("EN"), "en");
    }

    #[test]
    fn test_preferred_voice_wins() {
        let voices = vec![
            voice("Tarik", "ar-SA"),
            voice("Maged", "ar-SA"),
            voice("Samantha", "en-US"),
        ];
        let chosen = select_voice(&voices, "ar-SA", &preferred()).unwrap();
        assert_eq!(chosen.name, "Maged");
    }

    #[test]
    fn test_first_match_without_preferred() {
        let voices = vec![voice("Daniel", "en-GB"), voice("Tarik", "ar"), voice("Hoda", "ar-EG")];
        let chosen = select_voice(&voices, "ar-SA", &preferred()).unwrap();
        assert_eq!(chosen.name, "Tarik");
    }

    #[test]
    fn test_no_match_uses_default() {
        let voices = vec![voice("Daniel", "en-GB")];
        assert!(select_voice(&voices, "ar-SA", &preferred()).is_none());
        assert!(select_voice(&[], "ar-SA", &preferred()).is_none());
    }

    #[test]
    fn test_parse_voice_list() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  ar              --/M      Arabic             sem/ar
 2  en-us           --/M      English_(America)  gmw/en-US            (en 10)
";
        let voices = EspeakEngine::parse_voice_list(listing);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[1], voice("sem/ar", "ar"));
        assert_eq!(voices[2].lang, "en-us");
    }

    #[test]
    fn test_build_args_scales_rate_and_pitch() {
        let args = EspeakEngine::build_args(&Utterance {
            text: "مرحبا".to_string(),
            lang: "ar-SA".to_string(),
            voice: None,
            rate: 0.9,
            pitch: 1.1,
        });
        assert_eq!(args, vec!["-v", "ar", "-s", "158", "-p", "55", "--", "مرحبا"]);
    }

    #[tokio::test]
    async fn test_silent_engine() {
        let engine = SilentEngine;
        assert!(engine.voices().await.unwrap().is_empty());
        engine
            .speak(Utterance {
                text: "hello".to_string(),
                lang: "en-US".to_string(),
                voice: None,
                rate: 1.0,
                pitch: 1.0,
            })
            .await
            .unwrap();
        engine.cancel();
    }
}
