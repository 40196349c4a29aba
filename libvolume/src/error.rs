//! Volume driver error types.
//!
//! All errors in the `libvolume` crate are represented by the [`VolumeError`]
//! enum.  Variants carry owned strings rather than source errors so they are
//! [`Clone`] and can be rendered verbatim into the `Err` field of a plugin
//! protocol response.

use thiserror::Error;

/// Unified error type for volume driver operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeError {
    /// The requested volume is not registered.
    #[error("volume {0} not found")]
    NotFound(String),

    /// The caller supplied a name that cannot be mapped under the root.
    #[error("invalid volume name {0:?}")]
    InvalidName(String),

    /// Creating the backing directory failed.
    #[error("failed to create directory for volume {name}: {reason}")]
    Creation {
        /// Volume being created.
        name: String,
        /// Underlying filesystem error.
        reason: String,
    },

    /// Removing the backing directory failed.
    #[error("failed to remove volume {name}: {reason}")]
    Removal {
        /// Volume being removed.
        name: String,
        /// Underlying filesystem error.
        reason: String,
    },

    /// The volume still has active mount IDs.
    #[error("volume {name} is in use by {mounts} mount(s)")]
    InUse {
        /// Volume being removed.
        name: String,
        /// Number of mount IDs still holding it.
        mounts: usize,
    },

    /// The storage root could not be verified as a mounted filesystem.
    ///
    /// This is the only process-fatal condition: the transport must not be
    /// started after it is returned.
    #[error("storage root {root} is not a mountpoint after {attempts} attempt(s): {reason}")]
    ConfigurationFatal {
        /// Configured storage root.
        root: String,
        /// Number of probes performed.
        attempts: u32,
        /// Last observed error or determination.
        reason: String,
    },

    /// A socket / transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VolumeError {
    /// Create a [`VolumeError::Creation`] for `name` from any displayable cause.
    pub fn creation<E: std::fmt::Display>(name: impl Into<String>, e: E) -> Self {
        Self::Creation {
            name: name.into(),
            reason: e.to_string(),
        }
    }

    /// Create a [`VolumeError::Removal`] for `name` from any displayable cause.
    pub fn removal<E: std::fmt::Display>(name: impl Into<String>, e: E) -> Self {
        Self::Removal {
            name: name.into(),
            reason: e.to_string(),
        }
    }

    /// Create a [`VolumeError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }
}
