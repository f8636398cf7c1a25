//! Narration and effect playback

pub mod coordinator;
pub mod speech;

pub use coordinator::{PlaybackCoordinator, SpeechSettings};
pub use speech::{select_voice, EspeakEngine, SilentEngine, SpeechEngine, Utterance, VoiceInfo};
