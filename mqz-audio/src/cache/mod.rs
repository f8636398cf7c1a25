//! Narration resource cache
//!
//! - `keys`: pure key and asset path resolution
//! - `static_assets`: packaged recordings (directory or HTTP)
//! - `tiered`: memory → static → durable store lookup with in-flight sharing

pub mod keys;
pub mod static_assets;
pub mod tiered;

pub use keys::{resolve_key, static_asset_path, text_key, AssetPath, CacheKey};
pub use static_assets::{source_for, DirectorySource, HttpSource, StaticAssetSource};
pub use tiered::{CacheStats, TieredAudioCache};
