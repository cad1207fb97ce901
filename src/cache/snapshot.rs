use std::path::Path;

use crate::error::{EngineError, Result};
use crate::io_atomic;

use super::store::TaskCache;

pub struct LoadedCache {
    pub cache: TaskCache,
    /// Set when there was nothing usable on disk and the vault should be
    /// rescanned to rebuild it.
    pub rescan_recommended: bool,
}

fn decode(bytes: &[u8]) -> Result<TaskCache> {
    serde_json::from_slice(bytes).map_err(|e| EngineError::CacheCorrupt(e.to_string()))
}

/// A missing or corrupt snapshot is an empty cache plus a rescan
/// recommendation, never an error.
pub fn load_snapshot(path: &Path, vault_name: &str) -> LoadedCache {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %error, "task cache unreadable");
            }
            return LoadedCache {
                cache: TaskCache::new(vault_name),
                rescan_recommended: true,
            };
        }
    };
    match decode(&bytes) {
        Ok(mut cache) => {
            if cache.vault_name.is_empty() {
                cache.vault_name = vault_name.to_string();
            }
            LoadedCache {
                cache,
                rescan_recommended: false,
            }
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "discarding task cache");
            LoadedCache {
                cache: TaskCache::new(vault_name),
                rescan_recommended: true,
            }
        }
    }
}

pub fn save_snapshot(path: &Path, cache: &TaskCache) -> Result<()> {
    io_atomic::write_json_atomic(path, cache)?;
    Ok(())
}
