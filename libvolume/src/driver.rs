//! Volume driver trait.
//!
//! [`VolumeDriver`] is the synchronous-call contract between a transport and
//! the lifecycle core: every operation takes an already-decoded request and
//! returns a typed result or a [`VolumeError`].

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::VolumeError;
use crate::types::{Capabilities, CreateRequest, MountRequest, Volume};

/// Volume lifecycle operations served to the orchestrator.
///
/// Implementations must be safe to call concurrently from many tasks, and
/// `create`, `remove` and `unmount` must resolve "already in the desired
/// state" as success.
#[async_trait]
pub trait VolumeDriver: Send + Sync {
    /// Provision a volume.  Idempotent: an existing volume is returned as-is.
    async fn create(&self, req: CreateRequest) -> Result<Volume, VolumeError>;

    /// Delete a volume and its backing directory.  Idempotent.
    async fn remove(&self, name: &str) -> Result<(), VolumeError>;

    /// Record a consumer and return the path to bind-mount.
    async fn mount(&self, req: MountRequest) -> Result<PathBuf, VolumeError>;

    /// Release a consumer.  Releasing an ID that is not held is a no-op.
    async fn unmount(&self, req: MountRequest) -> Result<(), VolumeError>;

    /// Describe a single volume.
    async fn get(&self, name: &str) -> Result<Volume, VolumeError>;

    /// Return the backing path of a volume.
    async fn path(&self, name: &str) -> Result<PathBuf, VolumeError>;

    /// List all volumes.  Never fails.
    async fn list(&self) -> Vec<Volume>;

    /// Static driver capabilities.
    fn capabilities(&self) -> Capabilities;
}
