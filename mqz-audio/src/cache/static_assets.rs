//! Packaged static assets
//!
//! Pre-recorded narration ships as files named by static id, either in a
//! local directory or under an HTTP base URL. An absent file or a
//! non-success status is `Ok(None)`; transport and I/O failures are errors
//! the cache logs and treats as a miss.

use crate::cache::keys::{static_asset_path, AssetPath};
use crate::error::Result;
use async_trait::async_trait;
use mqz_common::config::AssetLocation;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("mqz-audio/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT_SECS: u64 = 15;

/// Source of encoded static assets
#[async_trait]
pub trait StaticAssetSource: Send + Sync {
    /// Encoded bytes of `static_id`, or `None` when the asset does not exist.
    async fn fetch(&self, static_id: &str) -> Result<Option<Vec<u8>>>;
}

/// Build the source matching a configured asset location.
pub fn source_for(location: &AssetLocation) -> Result<Arc<dyn StaticAssetSource>> {
    Ok(match location {
        AssetLocation::Directory(dir) => Arc::new(DirectorySource::new(dir.clone())),
        AssetLocation::Url(base) => Arc::new(HttpSource::new(base.clone())?),
    })
}

/// Static ids are plain file names; anything that could escape the root is
/// treated as absent.
fn is_plain_name(static_id: &str) -> bool {
    !static_id.is_empty()
        && !static_id.contains(['/', '\\'])
        && static_id != "."
        && static_id != ".."
}

/// Assets in a local directory
pub struct DirectorySource {
    root: AssetLocation,
}

impl DirectorySource {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: AssetLocation::Directory(root),
        }
    }
}

#[async_trait]
impl StaticAssetSource for DirectorySource {
    async fn fetch(&self, static_id: &str) -> Result<Option<Vec<u8>>> {
        if !is_plain_name(static_id) {
            return Ok(None);
        }

        let path = match static_asset_path(&self.root, static_id) {
            AssetPath::File(path) => path,
            AssetPath::Url(_) => return Ok(None),
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read static asset {} ({} bytes)", path.display(), bytes.len());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Assets under an HTTP(S) base URL
pub struct HttpSource {
    root: AssetLocation,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            root: AssetLocation::Url(base_url.trim_end_matches('/').to_string()),
            client,
        })
    }
}

#[async_trait]
impl StaticAssetSource for HttpSource {
    async fn fetch(&self, static_id: &str) -> Result<Option<Vec<u8>>> {
        if !is_plain_name(static_id) {
            return Ok(None);
        }

        let url = match static_asset_path(&self.root, static_id) {
            AssetPath::Url(url) => url,
            AssetPath::File(_) => return Ok(None),
        };

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!("Static asset {} returned status {}", url, status);
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        debug!("Fetched static asset {} ({} bytes)", url, bytes.len());
        Ok(Some(bytes.to_vec()))
    }
}
