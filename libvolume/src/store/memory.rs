//! Map-backed store.
//!
//! [`MemoryStore`] tracks existence in an in-process map while still owning
//! one directory per volume under the root.  Call [`MemoryStore::recover`]
//! after construction to rebuild the map from the directories left by a
//! previous process, so both stores honour the same contract.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{VolumeStore, create_volume_dir, remove_volume_dir, scan_root};
use crate::error::VolumeError;
use crate::types::VolumeName;

/// Store whose state is an explicit set of names.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: PathBuf,
    entries: HashSet<VolumeName>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: HashSet::new(),
        }
    }

    /// Register every existing volume directory under the root.
    ///
    /// Returns the number of volumes known afterwards.
    pub async fn recover(&mut self) -> usize {
        for name in scan_root(&self.root).await {
            self.entries.insert(name);
        }
        info!(
            root = %self.root.display(),
            count = self.entries.len(),
            "recovery complete",
        );
        self.entries.len()
    }
}

#[async_trait]
impl VolumeStore for MemoryStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn contains(&self, name: &VolumeName) -> io::Result<bool> {
        Ok(self.entries.contains(name))
    }

    async fn create(&mut self, name: &VolumeName) -> Result<(), VolumeError> {
        create_volume_dir(&self.root, name).await?;
        self.entries.insert(name.clone());
        Ok(())
    }

    async fn remove(&mut self, name: &VolumeName) -> Result<(), VolumeError> {
        // Disk first: on failure the entry stays so the directory is not
        // orphaned.
        remove_volume_dir(&self.root, name).await?;
        self.entries.remove(name);
        Ok(())
    }

    async fn names(&self) -> Vec<VolumeName> {
        self.entries.iter().cloned().collect()
    }
}
