//! Audio plumbing: decoding, resampling, mixing and device output

pub mod decoder;
pub mod mixer;
pub mod output;
pub mod pcm;
pub mod resampler;
pub mod types;
pub mod voice;

pub use mixer::VoiceId;
pub use output::{NullOutput, OutputDevice, SharedOutput};
pub use types::AudioAsset;
pub use voice::{Decay, ToneSpec, Waveform};
