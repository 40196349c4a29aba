//! Mount-root verification.
//!
//! In global scope the storage root must be a distinct mounted filesystem
//! (the shared filesystem) rather than a plain directory on the local disk.
//! Startup is gated on [`MountRootVerifier::verify`].

use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::error::VolumeError;

/// Decides whether a path is the root of a mounted filesystem.
pub trait MountProbe: Send + Sync {
    fn is_mountpoint(&self, path: &Path) -> Result<bool, VolumeError>;
}

/// Device/inode comparison against the parent directory.
///
/// `path` is a mountpoint when it lives on a different device than
/// `path/..`, or when both resolve to the same inode (`path` is `/`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceProbe;

impl MountProbe for DeviceProbe {
    fn is_mountpoint(&self, path: &Path) -> Result<bool, VolumeError> {
        let own = nix::sys::stat::stat(path)
            .map_err(|e| VolumeError::Internal(format!("stat {}: {e}", path.display())))?;
        let parent_path = path.join("..");
        let parent = nix::sys::stat::stat(parent_path.as_path())
            .map_err(|e| VolumeError::Internal(format!("stat {}: {e}", parent_path.display())))?;
        Ok(own.st_dev != parent.st_dev || own.st_ino == parent.st_ino)
    }
}

/// Bounded retry loop around a [`MountProbe`].
#[derive(Debug, Clone, Copy)]
pub struct MountRootVerifier {
    max_attempts: u32,
    interval: Duration,
}

impl Default for MountRootVerifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

impl MountRootVerifier {
    pub const DEFAULT_ATTEMPTS: u32 = 10;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

    /// `max_attempts` of zero is treated as one.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probe `root` until it is a mountpoint or the attempts run out.
    ///
    /// Sleeps `interval` between attempts (not after the last one) and
    /// returns the 1-based attempt that succeeded.  On exhaustion returns
    /// [`VolumeError::ConfigurationFatal`] carrying the last observation;
    /// callers must treat that as fatal.
    #[instrument(
        skip(self, probe),
        fields(root = %root.display(), max_attempts = self.max_attempts)
    )]
    pub async fn verify<P>(&self, root: &Path, probe: &P) -> Result<u32, VolumeError>
    where
        P: MountProbe + ?Sized,
    {
        let mut last = String::from("not a mountpoint");

        for attempt in 1..=self.max_attempts {
            match probe.is_mountpoint(root) {
                Ok(true) => {
                    info!(attempt, "storage root is a mountpoint");
                    return Ok(attempt);
                }
                Ok(false) => {
                    last = "not a mountpoint".to_owned();
                    warn!(attempt, "storage root is not a mountpoint yet");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "storage root probe failed");
                    last = e.to_string();
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(VolumeError::ConfigurationFatal {
            root: root.display().to_string(),
            attempts: self.max_attempts,
            reason: last,
        })
    }
}
