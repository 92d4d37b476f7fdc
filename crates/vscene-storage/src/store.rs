//! Artifact store abstraction over R2 and the local filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{R2Client, R2Config};
use crate::error::{StorageError, StorageResult};

/// Default key prefix for published clips.
pub const DEFAULT_PREFIX: &str = "video-clips";

/// Build the object key `{prefix}/{job_id}/{sequence:03}.{ext}`.
pub fn object_key(prefix: &str, job_id: &str, sequence: u32, ext: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{:03}.{}", job_id, sequence, ext)
    } else {
        format!("{}/{}/{:03}.{}", prefix, job_id, sequence, ext)
    }
}

/// Join a public base URL and an object key.
pub fn join_public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

/// Reference to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub public_url: String,
    pub size_bytes: u64,
    pub provider: String,
}

/// Durable object storage with public URLs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store the file at `path` under `key`.
    async fn put(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<StoredObject>;

    /// Public URL for `key`.
    fn public_url(&self, key: &str) -> String;

    /// Provider name recorded on clip descriptors.
    fn provider(&self) -> &'static str;
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Cloudflare R2 store.
#[derive(Clone)]
pub struct R2Store {
    client: R2Client,
    public_base: String,
}

impl R2Store {
    pub fn new(config: &R2Config) -> Self {
        Self {
            client: R2Client::new(config),
            public_base: config.public_base(),
        }
    }

    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(&R2Config::from_env()?))
    }

    pub fn client(&self) -> &R2Client {
        &self.client
    }
}

#[async_trait]
impl ArtifactStore for R2Store {
    async fn put(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<StoredObject> {
        validate_key(key)?;
        let size_bytes = tokio::fs::metadata(path).await?.len();
        self.client.upload_file(path, key, content_type).await?;

        Ok(StoredObject {
            key: key.to_string(),
            public_url: self.public_url(key),
            size_bytes,
            provider: self.provider().to_string(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base, key)
    }

    fn provider(&self) -> &'static str {
        "r2"
    }
}

/// Filesystem store for development and tests.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    public_base: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    /// `VSCENE_LOCAL_STORE_DIR` (./clips) served from `VSCENE_LOCAL_PUBLIC_URL`.
    pub fn from_env() -> Self {
        let root =
            std::env::var("VSCENE_LOCAL_STORE_DIR").unwrap_or_else(|_| "./clips".to_string());
        let public_base = std::env::var("VSCENE_LOCAL_PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:8000/clips".to_string());
        Self::new(root, public_base)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        path: &Path,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        validate_key(key)?;
        let target = self.root.join(key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size_bytes = tokio::fs::copy(path, &target).await?;
        debug!("Stored {} at {}", key, target.display());

        Ok(StoredObject {
            key: key.to_string(),
            public_url: self.public_url(key),
            size_bytes,
            provider: self.provider().to_string(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base, key)
    }

    fn provider(&self) -> &'static str {
        "local"
    }
}

/// R2 when its credentials are configured, the local store otherwise.
pub fn store_from_env() -> StorageResult<Box<dyn ArtifactStore>> {
    if R2Config::is_configured() {
        let store = R2Store::from_env()?;
        info!("Using R2 artifact store (bucket {})", store.client().bucket());
        Ok(Box::new(store))
    } else {
        let store = LocalStore::from_env();
        info!("R2 not configured, storing clips under {}", store.root().display());
        Ok(Box::new(store))
    }
}
