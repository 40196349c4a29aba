//! Core volume types: names, scope, descriptors, and requests.
//!
//! These types form the data model shared by the driver trait, the registry,
//! the stores, and the plugin protocol layer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::VolumeError;

/// Longest name accepted, the limit for a single path component.
const MAX_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Volume name
// ---------------------------------------------------------------------------

/// A validated volume name.
///
/// A `VolumeName` is always a single, normal path component, so
/// `root.join(name)` can never resolve outside `root`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VolumeName(String);

impl VolumeName {
    /// Validate `name` and wrap it.
    ///
    /// Rejects empty names, `.` and `..`, names containing `/`, `\` or NUL,
    /// and names longer than 255 bytes.
    pub fn new(name: impl Into<String>) -> Result<Self, VolumeError> {
        let name = name.into();
        let bad = name.is_empty()
            || name == "."
            || name == ".."
            || name.len() > MAX_NAME_LEN
            || name.contains(['/', '\\', '\0']);
        if bad {
            return Err(VolumeError::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The backing directory of this volume under `root`.
    pub fn mountpoint(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for VolumeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VolumeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for VolumeName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Scope & capabilities
// ---------------------------------------------------------------------------

/// Where volumes created by this driver are usable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only on this host.
    Local,
    /// Cluster-wide, via a shared filesystem mounted at the root.
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Static capabilities advertised by the driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    /// Scope fixed at construction time.
    pub scope: Scope,
}

// ---------------------------------------------------------------------------
// Volume descriptor
// ---------------------------------------------------------------------------

/// Lifecycle state of a registered volume.
///
/// Unregistered names have no state; operations on them report
/// [`VolumeError::NotFound`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VolumeState {
    /// Backing directory exists and no mount ID holds it.
    Created,
    /// At least one mount ID holds the volume.
    Mounted,
}

/// Descriptor of a registered volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    /// Volume name.
    pub name: VolumeName,
    /// Host directory backing the volume.
    pub mountpoint: PathBuf,
    /// Current lifecycle state.
    pub state: VolumeState,
    /// Mount IDs currently holding the volume.
    #[serde(default)]
    pub active_mounts: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request to create a volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Volume name.
    pub name: String,
    /// Driver options passed by the caller.  Accepted and logged; the
    /// directory backend has no tunables.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl CreateRequest {
    /// A request with no options.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: HashMap::new(),
        }
    }
}

/// Request to mount or unmount a volume on behalf of one consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountRequest {
    /// Volume name.
    pub name: String,
    /// Opaque caller-supplied mount identifier.
    pub id: String,
}

impl MountRequest {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}
