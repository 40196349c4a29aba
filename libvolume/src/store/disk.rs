//! Directory-presence store.
//!
//! [`DiskStore`] keeps no state of its own: a volume exists exactly when its
//! directory exists under the root.  Restarting the process therefore loses
//! nothing, at the cost of "registered but empty" and "created" being the same
//! thing.
//!
//! # On-disk layout
//!
//! ```text
//! <root>/
//!   <volume-name>/     # one directory per volume, bind-mounted by the caller
//! ```

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{VolumeStore, create_volume_dir, remove_volume_dir, scan_root, volume_dir_exists};
use crate::error::VolumeError;
use crate::types::VolumeName;

/// Store whose state is the directory tree under `root`.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl VolumeStore for DiskStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn contains(&self, name: &VolumeName) -> io::Result<bool> {
        volume_dir_exists(&self.root, name).await
    }

    async fn create(&mut self, name: &VolumeName) -> Result<(), VolumeError> {
        create_volume_dir(&self.root, name).await
    }

    async fn remove(&mut self, name: &VolumeName) -> Result<(), VolumeError> {
        remove_volume_dir(&self.root, name).await
    }

    async fn names(&self) -> Vec<VolumeName> {
        scan_root(&self.root).await
    }
}
