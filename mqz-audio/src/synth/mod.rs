//! Procedural sound effects

pub mod melodies;
pub mod tone;

pub use melodies::{HEARTBEAT_PERIOD, MURMUR_VOICES, PHONE_RINGS};
pub use tone::ToneSynthesizer;
