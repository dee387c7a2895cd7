//! Artifact fetching into the staging area

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use prov_catalog::FetchSpec;
use sha2::{Digest, Sha256};

use crate::error::FetchError;

/// Fetch service contract. The orchestrator only looks at success or
/// failure; retry and mirror policy belong to the implementation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Place the artifact described by `spec` under `dest_dir` and return
    /// its local path.
    async fn fetch(&self, spec: &FetchSpec, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

/// Copies `file://` URLs and plain local paths, verifying SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl FileFetcher {
    fn source_path(url: &str) -> Option<PathBuf> {
        if let Some(rest) = url.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        if url.contains("://") {
            return None;
        }
        Some(PathBuf::from(url))
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, spec: &FetchSpec, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let network = |message: String| FetchError::Network {
            url: spec.url.clone(),
            message,
        };
        let source = Self::source_path(&spec.url).ok_or_else(|| network("unsupported URL scheme".to_string()))?;
        let file_name = source
            .file_name()
            .ok_or_else(|| network("URL has no file name".to_string()))?;

        let bytes = tokio::fs::read(&source).await.map_err(|e| network(e.to_string()))?;
        let actual = sha256_hex(&bytes);
        let expected = spec.sha256.trim().to_lowercase();
        if actual != expected {
            tracing::warn!(url = %spec.url, %expected, %actual, "Artifact digest mismatch");
            return Err(FetchError::Integrity {
                url: spec.url.clone(),
                expected,
                actual,
            });
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| network(e.to_string()))?;
        let dest = dest_dir.join(file_name);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| network(e.to_string()))?;
        tracing::debug!(url = %spec.url, dest = %dest.display(), "Artifact staged");
        Ok(dest)
    }
}
