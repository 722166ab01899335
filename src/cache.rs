// ABOUTME: ModelCache trait and a filesystem-backed implementation over the platform cache dir
// ABOUTME: ensure_file is idempotent across processes via a plain existence check
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Cache (C18, §4.15, §6).

use crate::errors::ModelLoadError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Resolves where model/vocabulary/semantic-data files live and ensures a
/// given asset is present, delegating the actual fetch to a caller-supplied
/// closure (the HTTP transport itself is out of scope, §1, §6).
#[async_trait]
pub trait ModelCache: Send + Sync {
    fn root(&self) -> &Path;

    /// Ensures `name` exists under `subdir`, invoking `fetch` to populate it
    /// if absent. Idempotent across processes: a present file is never
    /// re-fetched (§4.15).
    async fn ensure_file(
        &self,
        subdir: &str,
        name: &str,
        fetch: &(dyn Fn(&Path) -> Result<(), ModelLoadError> + Send + Sync),
    ) -> Result<PathBuf, ModelLoadError>;
}

/// Platform cache directory resolution via the `dirs` crate: `~/Library/Caches/<app>`
/// on macOS, `$XDG_CACHE_HOME` or `~/.cache/<app>` on Linux, `%LOCALAPPDATA%/<app>`
/// on Windows (§6).
pub struct FileSystemModelCache {
    root: PathBuf,
}

impl FileSystemModelCache {
    /// Resolves the platform cache root for `app_name` (e.g. `"rehydra-anonymizer"`),
    /// falling back to `./.cache/<app_name>` if no platform cache dir can be
    /// determined.
    #[must_use]
    pub fn for_app(app_name: &str) -> Self {
        let root = dirs::cache_dir()
            .map(|base| base.join(app_name))
            .unwrap_or_else(|| PathBuf::from(".cache").join(app_name));
        Self { root }
    }

    #[must_use]
    pub fn at_root(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ModelCache for FileSystemModelCache {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_file(
        &self,
        subdir: &str,
        name: &str,
        fetch: &(dyn Fn(&Path) -> Result<(), ModelLoadError> + Send + Sync),
    ) -> Result<PathBuf, ModelLoadError> {
        let dir = self.root.join(subdir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ModelLoadError::DownloadFailed {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        let path = dir.join(name);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            fetch(&path)?;
        }

        Ok(path)
    }
}
