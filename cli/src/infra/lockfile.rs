//! Infrastructure implementation of the `LockfileStore` port.
//!
//! Pretty-printed JSON, written atomically (temp file + rename in the
//! target directory) under `tokio::task::spawn_blocking` so a crashed run
//! never leaves a torn artifact.

use std::path::Path;

use anyhow::{Context, Result};
use flotilla_common::LockManifest;

use crate::application::ports::LockfileStore;

/// Production implementation of `LockfileStore`.
pub struct JsonLockfileStore;

impl JsonLockfileStore {
    fn save_sync(path: &Path, lock: &LockManifest) -> Result<()> {
        let content = serde_json::to_string_pretty(lock).context("serializing lock manifest")?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("finalizing lock manifest {}", path.display()))?;
        Ok(())
    }
}

impl LockfileStore for JsonLockfileStore {
    async fn save_async(&self, path: &Path, lock: &LockManifest) -> Result<()> {
        let path = path.to_path_buf();
        let lock = lock.clone();
        tokio::task::spawn_blocking(move || Self::save_sync(&path, &lock))
            .await
            .context("lock manifest save task panicked")?
    }
}
