//! Durable storage for persistent clients.
//!
//! One JSON snapshot per collection under `<dir>/collections/`, named by the
//! SHA-256 of the collection name. Every write goes to a `.tmp` sibling, is
//! fsynced and then renamed over the snapshot, so after a crash each file
//! holds either the previous or the new state of its collection.

use ragstore_common::{RagStoreError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::collection::CollectionState;

const COLLECTIONS_DIR: &str = "collections";
const SNAPSHOT_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

/// Snapshot directory of a persistent client
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    root: PathBuf,
    collections_dir: PathBuf,
}

impl Storage {
    /// Open (creating if needed) a storage directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let collections_dir = root.join(COLLECTIONS_DIR);
        tokio::fs::create_dir_all(&collections_dir).await.map_err(|e| {
            RagStoreError::persistence(format!(
                "Failed to create storage directory {}: {}",
                collections_dir.display(),
                e
            ))
        })?;

        Ok(Self { root, collections_dir })
    }

    /// Storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot file for a collection name
    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        let digest = Sha256::digest(name.as_bytes());
        self.collections_dir
            .join(format!("{}.{}", hex::encode(digest), SNAPSHOT_EXT))
    }

    /// Load every snapshot; any unreadable snapshot fails the whole load
    pub async fn load_all(&self) -> Result<Vec<CollectionState>> {
        let mut states = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.collections_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|s| s.to_str()) {
                Some(SNAPSHOT_EXT) => {
                    let state = Self::load_snapshot(&path).await?;
                    if self.snapshot_path(&state.name) != path {
                        return Err(RagStoreError::persistence(format!(
                            "Snapshot {} does not belong to collection '{}'",
                            path.display(),
                            state.name
                        )));
                    }
                    states.push(state);
                }
                Some(TMP_EXT) => {
                    // interrupted write; the previous snapshot is still intact
                    warn!("Removing stale temporary snapshot {}", path.display());
                    tokio::fs::remove_file(&path).await?;
                }
                _ => debug!("Ignoring unexpected file {}", path.display()),
            }
        }

        states.sort_by(|a, b| a.name.cmp(&b.name));
        info!(
            "Loaded {} collections from {}",
            states.len(),
            self.root.display()
        );
        Ok(states)
    }

    async fn load_snapshot(path: &Path) -> Result<CollectionState> {
        let data = tokio::fs::read(path).await?;
        let state: CollectionState = serde_json::from_slice(&data).map_err(|e| {
            RagStoreError::persistence(format!("Corrupt snapshot {}: {}", path.display(), e))
        })?;
        state.validate().map_err(|e| {
            RagStoreError::persistence(format!("Invalid snapshot {}: {}", path.display(), e))
        })?;
        Ok(state)
    }

    /// Atomically replace a collection snapshot
    pub async fn save(&self, state: &CollectionState) -> Result<()> {
        let path = self.snapshot_path(&state.name);
        let tmp_path = path.with_extension(TMP_EXT);
        let data = serde_json::to_vec(state)?;

        let write = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await?;
            self.sync_dir().await;
            Ok::<(), std::io::Error>(())
        };

        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(RagStoreError::persistence(format!(
                "Failed to write snapshot for '{}': {}",
                state.name, e
            )));
        }

        debug!(
            "Saved collection '{}' ({} bytes, {} documents)",
            state.name,
            data.len(),
            state.store.len()
        );
        Ok(())
    }

    /// Remove a collection snapshot (missing files are fine)
    pub async fn remove(&self, name: &str) -> Result<()> {
        let path = self.snapshot_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.sync_dir().await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagStoreError::persistence(format!(
                "Failed to remove snapshot for '{}': {}",
                name, e
            ))),
        }
    }

    /// Make renames/removals durable; not every platform can fsync a directory
    async fn sync_dir(&self) {
        #[cfg(unix)]
        {
            match tokio::fs::File::open(&self.collections_dir).await {
                Ok(dir) => {
                    if let Err(e) = dir.sync_all().await {
                        debug!("Directory fsync failed: {}", e);
                    }
                }
                Err(e) => debug!("Directory open for fsync failed: {}", e),
            }
        }
    }
}
