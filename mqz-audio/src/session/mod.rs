//! Quiz session helpers

pub mod prefetch;

pub use prefetch::SessionPrefetchBuffer;
