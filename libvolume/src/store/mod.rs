//! Pluggable volume existence stores.
//!
//! A [`VolumeStore`] answers "which volumes exist" and owns the backing
//! directories under the configured root.  The registry's operation logic is
//! written once against this trait; the store is chosen at construction time.
//!
//! | Store | Existence means |
//! |---|---|
//! | [`DiskStore`] | `<root>/<name>` is a directory |
//! | [`MemoryStore`] | `<name>` is a key of an in-process map |

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::VolumeError;
use crate::types::VolumeName;

pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Backing store for volume existence.
///
/// Mutating methods take `&mut self`: callers serialize them behind the
/// registry's write lock.
#[async_trait]
pub trait VolumeStore: Send + Sync {
    /// Directory under which every volume lives.
    fn root(&self) -> &Path;

    /// Whether `name` is a registered volume.
    async fn contains(&self, name: &VolumeName) -> io::Result<bool>;

    /// Create the backing directory (and any missing parents) and register
    /// `name`.  Only called when `contains` reported `false`.
    async fn create(&mut self, name: &VolumeName) -> Result<(), VolumeError>;

    /// Delete the backing directory and unregister `name`.  If deletion
    /// fails the volume must stay registered.
    async fn remove(&mut self, name: &VolumeName) -> Result<(), VolumeError>;

    /// All registered names.  Unreadable state yields an empty list.
    async fn names(&self) -> Vec<VolumeName>;

    /// Backing directory of `name`.
    fn mountpoint(&self, name: &VolumeName) -> PathBuf {
        name.mountpoint(self.root())
    }
}

/// Create `<root>/<name>` recursively.
///
/// Anything already at that path other than a real directory (a file, or a
/// symlink even to a directory) is refused, so the volume always resolves
/// inside `root`.
pub(crate) async fn create_volume_dir(root: &Path, name: &VolumeName) -> Result<(), VolumeError> {
    let path = name.mountpoint(root);
    match tokio::fs::symlink_metadata(&path).await {
        Ok(meta) if !meta.is_dir() => {
            return Err(VolumeError::creation(
                name.as_str(),
                format!("{}: exists and is not a directory", path.display()),
            ));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(VolumeError::creation(
                name.as_str(),
                format!("{}: {e}", path.display()),
            ));
        }
    }
    tokio::fs::create_dir_all(&path)
        .await
        .map_err(|e| VolumeError::creation(name.as_str(), format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), "volume directory created");
    Ok(())
}

/// Remove `<root>/<name>` recursively.  A directory that is already gone is
/// not an error.
pub(crate) async fn remove_volume_dir(root: &Path, name: &VolumeName) -> Result<(), VolumeError> {
    let path = name.mountpoint(root);
    match tokio::fs::remove_dir_all(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "volume directory already absent");
        }
        Err(e) => {
            return Err(VolumeError::removal(
                name.as_str(),
                format!("{}: {e}", path.display()),
            ));
        }
    }
    Ok(())
}

/// List the subdirectories of `root` that are valid volume names.
///
/// A missing root means "no volumes yet" since it is created lazily by the
/// first `create`.  Other read errors are logged and also yield an empty list.
pub(crate) async fn scan_root(root: &Path) -> Vec<VolumeName> {
    let mut dir = match tokio::fs::read_dir(root).await {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(
                root = %root.display(),
                error = %e,
                "cannot read storage root, reporting no volumes"
            );
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    loop {
        let entry = match dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "error while scanning storage root");
                break;
            }
        };

        // file_type() does not follow symlinks; a symlinked directory could
        // point outside the root and is not a volume.
        match entry.file_type().await {
            Ok(ft) if ft.is_dir() => {}
            _ => continue,
        }

        let Some(raw) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(path = %entry.path().display(), "skipping non-UTF8 directory name");
            continue;
        };
        match VolumeName::new(raw) {
            Ok(name) => names.push(name),
            Err(e) => debug!(error = %e, "skipping directory with unusable name"),
        }
    }
    names
}

/// Whether `<root>/<name>` is a real directory (symlinks are not followed).
pub(crate) async fn volume_dir_exists(root: &Path, name: &VolumeName) -> io::Result<bool> {
    match tokio::fs::symlink_metadata(name.mountpoint(root)).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
