//! The volume registry: lifecycle state for every known volume.
//!
//! [`Registry`] implements [`VolumeDriver`] on top of any [`VolumeStore`].
//! All state lives behind a single owned [`RwLock`]:
//!
//! * `create`, `remove`, `mount` and `unmount` hold the write lock for the
//!   whole operation, filesystem I/O included, so operations on the same
//!   name are linearizable;
//! * `get`, `path` and `list` share the read lock and never observe a
//!   half-created or half-removed volume.
//!
//! Per-volume state machine:
//!
//! ```text
//! Unknown --create--> Created --mount--> Mounted --unmount (last id)--> Created
//!    ^                   |
//!    +------remove-------+
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::driver::VolumeDriver;
use crate::error::VolumeError;
use crate::store::VolumeStore;
use crate::types::{
    Capabilities, CreateRequest, MountRequest, Scope, Volume, VolumeName, VolumeState,
};

/// Process-wide volume state, constructed once from configuration and shared
/// behind an `Arc`.
pub struct Registry {
    scope: Scope,
    root: PathBuf,
    inner: RwLock<Inner>,
}

struct Inner {
    store: Box<dyn VolumeStore>,
    /// Mount IDs holding each volume.  Absent key means no holders.
    mounts: HashMap<VolumeName, BTreeSet<String>>,
}

impl Inner {
    async fn exists(&self, name: &VolumeName) -> Result<bool, VolumeError> {
        self.store
            .contains(name)
            .await
            .map_err(|e| VolumeError::Internal(format!("inspect volume {name}: {e}")))
    }

    async fn require(&self, name: &VolumeName) -> Result<(), VolumeError> {
        if self.exists(name).await? {
            Ok(())
        } else {
            Err(VolumeError::NotFound(name.to_string()))
        }
    }

    /// Like [`Inner::require`], but also drops holders left behind by a
    /// volume whose directory vanished outside the driver.
    async fn require_pruning(&mut self, name: &VolumeName) -> Result<(), VolumeError> {
        let result = self.require(name).await;
        if matches!(result, Err(VolumeError::NotFound(_))) && self.mounts.remove(name).is_some() {
            debug!("dropped holders of a vanished volume");
        }
        result
    }

    fn describe(&self, name: &VolumeName) -> Volume {
        let active_mounts = self.mounts.get(name).cloned().unwrap_or_default();
        let state = if active_mounts.is_empty() {
            VolumeState::Created
        } else {
            VolumeState::Mounted
        };
        Volume {
            name: name.clone(),
            mountpoint: self.store.mountpoint(name),
            state,
            active_mounts,
        }
    }
}

impl Registry {
    /// Build a registry over `store`.  `scope` is advertised unchanged for
    /// the registry's lifetime.
    pub fn new(store: impl VolumeStore + 'static, scope: Scope) -> Self {
        let root = store.root().to_path_buf();
        Self {
            scope,
            root,
            inner: RwLock::new(Inner {
                store: Box::new(store),
                mounts: HashMap::new(),
            }),
        }
    }

    /// Directory under which all volumes live.
    pub fn root(&self) -> &Path {
        &self.root
    }

}

#[async_trait]
impl VolumeDriver for Registry {
    #[instrument(skip(self), fields(name = %req.name))]
    async fn create(&self, req: CreateRequest) -> Result<Volume, VolumeError> {
        let name = VolumeName::new(req.name)?;
        let mut inner = self.inner.write().await;

        let exists = inner
            .store
            .contains(&name)
            .await
            .map_err(|e| VolumeError::creation(name.as_str(), e))?;
        if exists {
            debug!("volume already exists, returning it for idempotent create");
            return Ok(inner.describe(&name));
        }

        inner.store.create(&name).await?;
        // Holders recorded against a previous incarnation of this name are
        // meaningless now.
        inner.mounts.remove(&name);

        if !req.options.is_empty() {
            debug!(options = ?req.options, "ignoring driver options");
        }
        let volume = inner.describe(&name);
        info!(mountpoint = %volume.mountpoint.display(), "volume created");
        Ok(volume)
    }

    #[instrument(skip(self))]
    async fn remove(&self, name: &str) -> Result<(), VolumeError> {
        let name = VolumeName::new(name)?;
        let mut inner = self.inner.write().await;

        let exists = inner
            .store
            .contains(&name)
            .await
            .map_err(|e| VolumeError::removal(name.as_str(), e))?;
        if !exists {
            inner.mounts.remove(&name);
            debug!("volume absent, nothing to remove");
            return Ok(());
        }

        if let Some(ids) = inner.mounts.get(&name)
            && !ids.is_empty()
        {
            return Err(VolumeError::InUse {
                name: name.to_string(),
                mounts: ids.len(),
            });
        }

        inner.store.remove(&name).await?;
        inner.mounts.remove(&name);
        info!("volume removed");
        Ok(())
    }

    #[instrument(skip(self), fields(name = %req.name, id = %req.id))]
    async fn mount(&self, req: MountRequest) -> Result<PathBuf, VolumeError> {
        let name = VolumeName::new(req.name)?;
        let mut inner = self.inner.write().await;
        inner.require_pruning(&name).await?;

        let holders = inner.mounts.entry(name.clone()).or_default();
        if !holders.insert(req.id) {
            debug!("mount id already holds the volume");
        }
        let count = holders.len();

        let mountpoint = inner.store.mountpoint(&name);
        info!(mountpoint = %mountpoint.display(), holders = count, "volume mounted");
        Ok(mountpoint)
    }

    #[instrument(skip(self), fields(name = %req.name, id = %req.id))]
    async fn unmount(&self, req: MountRequest) -> Result<(), VolumeError> {
        let name = VolumeName::new(req.name)?;
        let mut inner = self.inner.write().await;
        inner.require_pruning(&name).await?;

        let Some(holders) = inner.mounts.get_mut(&name) else {
            debug!("volume not mounted, nothing to unmount");
            return Ok(());
        };
        if !holders.remove(&req.id) {
            debug!("mount id does not hold the volume, nothing to unmount");
            return Ok(());
        }
        let remaining = holders.len();
        if remaining == 0 {
            inner.mounts.remove(&name);
        }
        info!(remaining, "volume unmounted");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Volume, VolumeError> {
        let name = VolumeName::new(name)?;
        let inner = self.inner.read().await;
        inner.require(&name).await?;
        Ok(inner.describe(&name))
    }

    async fn path(&self, name: &str) -> Result<PathBuf, VolumeError> {
        let name = VolumeName::new(name)?;
        let inner = self.inner.read().await;
        inner.require(&name).await?;
        Ok(inner.store.mountpoint(&name))
    }

    async fn list(&self) -> Vec<Volume> {
        let inner = self.inner.read().await;
        let mut volumes: Vec<Volume> = inner
            .store
            .names()
            .await
            .iter()
            .map(|name| inner.describe(name))
            .collect();
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        volumes
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { scope: self.scope }
    }
}
