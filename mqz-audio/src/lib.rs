//! # MQZ Audio Library (mqz-audio)
//!
//! Narration cache and sound playback for the quiz.
//!
//! **Purpose:** Resolve spoken text to playable audio through a tiered cache
//! (memory, packaged static assets, durable SQLite store), fall back to
//! synthesized speech on a miss, and play procedural sound effects on the
//! same output device without exclusive sounds overlapping.
//!
//! **Architecture:** symphonia + rubato decode/resample into a software
//! mixer driven by a cpal output stream; lookups run on tokio.
//!
//! Entry point for consumers is [`playback::PlaybackCoordinator`].

pub mod audio;
pub mod cache;
pub mod db;
pub mod error;
pub mod playback;
pub mod session;
pub mod synth;

pub use cache::TieredAudioCache;
pub use error::{Error, Result};
pub use playback::PlaybackCoordinator;
pub use session::SessionPrefetchBuffer;
pub use synth::ToneSynthesizer;
