//! Docker volume plugin protocol messages.
//!
//! Every protocol method is a `POST /<Method>` carrying a JSON object with
//! PascalCase keys.  [`PluginRequest`] is the decoded form of one call and
//! [`PluginResponse`] the body sent back.  Errors travel in the `Err` field.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Capabilities, CreateRequest, MountRequest, Volume};

/// Media type used by Docker for plugin requests and responses.
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.2+json";

/// Interface name advertised by `Plugin.Activate`.
pub const VOLUME_DRIVER_INTERFACE: &str = "VolumeDriver";

/// Failure to turn an HTTP call into a [`PluginRequest`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown plugin method {0}")]
    UnknownMethod(String),

    #[error("malformed {method} request: {reason}")]
    Malformed { method: String, reason: String },
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NameBody {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateBody {
    name: String,
    // Docker sends `"Opts": null` when no options were given.
    #[serde(default)]
    opts: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MountBody {
    name: String,
    #[serde(rename = "ID", default)]
    id: String,
}

/// One decoded plugin call.
#[derive(Debug, Clone)]
pub enum PluginRequest {
    /// Handshake (`Plugin.Activate`).
    Activate,
    Create(CreateRequest),
    Remove(String),
    Mount(MountRequest),
    Unmount(MountRequest),
    Path(String),
    Get(String),
    List,
    Capabilities,
}

impl PluginRequest {
    /// Decode the call named `method` with JSON `body`.
    ///
    /// An empty body is read as `{}`; the content type is not checked since
    /// Docker uses its own vendor media type.
    pub fn decode(method: &str, body: &[u8]) -> Result<Self, ProtocolError> {
        let body = if body.iter().all(u8::is_ascii_whitespace) {
            b"{}".as_slice()
        } else {
            body
        };

        let request = match method {
            "Plugin.Activate" => Self::Activate,
            "VolumeDriver.Create" => {
                let b: CreateBody = parse(method, body)?;
                Self::Create(CreateRequest {
                    name: b.name,
                    options: b.opts.unwrap_or_default(),
                })
            }
            "VolumeDriver.Remove" => Self::Remove(parse::<NameBody>(method, body)?.name),
            "VolumeDriver.Mount" => {
                let b: MountBody = parse(method, body)?;
                Self::Mount(MountRequest::new(b.name, b.id))
            }
            "VolumeDriver.Unmount" => {
                let b: MountBody = parse(method, body)?;
                Self::Unmount(MountRequest::new(b.name, b.id))
            }
            "VolumeDriver.Path" => Self::Path(parse::<NameBody>(method, body)?.name),
            "VolumeDriver.Get" => Self::Get(parse::<NameBody>(method, body)?.name),
            "VolumeDriver.List" => Self::List,
            "VolumeDriver.Capabilities" => Self::Capabilities,
            other => return Err(ProtocolError::UnknownMethod(other.to_owned())),
        };
        Ok(request)
    }
}

fn parse<T: DeserializeOwned>(method: &str, body: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(body).map_err(|e| ProtocolError::Malformed {
        method: method.to_owned(),
        reason: e.to_string(),
    })
}

impl fmt::Display for PluginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate => f.write_str("Activate"),
            Self::Create(req) => write!(f, "Create({})", req.name),
            Self::Remove(name) => write!(f, "Remove({name})"),
            Self::Mount(req) => write!(f, "Mount({}, id={})", req.name, req.id),
            Self::Unmount(req) => write!(f, "Unmount({}, id={})", req.name, req.id),
            Self::Path(name) => write!(f, "Path({name})"),
            Self::Get(name) => write!(f, "Get({name})"),
            Self::List => f.write_str("List"),
            Self::Capabilities => f.write_str("Capabilities"),
        }
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Volume as seen on the wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct WireVolume {
    pub name: String,
    pub mountpoint: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BTreeMap<String, serde_json::Value>>,
}

impl WireVolume {
    /// Name and mountpoint only, as `List` reports them.
    pub fn summary(volume: &Volume) -> Self {
        Self {
            name: volume.name.to_string(),
            mountpoint: volume.mountpoint.clone(),
            status: None,
        }
    }

    /// Full descriptor including state and holders, as `Get` reports it.
    pub fn detailed(volume: &Volume) -> Self {
        let status = BTreeMap::from([
            (
                "State".to_owned(),
                serde_json::json!(format!("{:?}", volume.state)),
            ),
            (
                "ActiveMounts".to_owned(),
                serde_json::json!(volume.active_mounts.len()),
            ),
        ]);
        Self {
            status: Some(status),
            ..Self::summary(volume)
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct WireCapabilities {
    pub scope: String,
}

/// Body returned for a plugin call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PluginResponse {
    Activate {
        #[serde(rename = "Implements")]
        implements: Vec<String>,
    },
    Mountpoint {
        #[serde(rename = "Mountpoint")]
        mountpoint: PathBuf,
        #[serde(rename = "Err")]
        err: String,
    },
    Volume {
        #[serde(rename = "Volume")]
        volume: WireVolume,
        #[serde(rename = "Err")]
        err: String,
    },
    Volumes {
        #[serde(rename = "Volumes")]
        volumes: Vec<WireVolume>,
        #[serde(rename = "Err")]
        err: String,
    },
    Capabilities {
        #[serde(rename = "Capabilities")]
        capabilities: WireCapabilities,
    },
    /// Success with no payload, or failure when `err` is non-empty.
    Ack {
        #[serde(rename = "Err")]
        err: String,
    },
}

impl PluginResponse {
    pub fn activate() -> Self {
        Self::Activate {
            implements: vec![VOLUME_DRIVER_INTERFACE.to_owned()],
        }
    }

    pub fn ok() -> Self {
        Self::Ack { err: String::new() }
    }

    pub fn error(err: impl fmt::Display) -> Self {
        Self::Ack {
            err: err.to_string(),
        }
    }

    pub fn mountpoint(mountpoint: PathBuf) -> Self {
        Self::Mountpoint {
            mountpoint,
            err: String::new(),
        }
    }

    pub fn volume(volume: &Volume) -> Self {
        Self::Volume {
            volume: WireVolume::detailed(volume),
            err: String::new(),
        }
    }

    pub fn volumes(volumes: &[Volume]) -> Self {
        Self::Volumes {
            volumes: volumes.iter().map(WireVolume::summary).collect(),
            err: String::new(),
        }
    }

    pub fn capabilities(caps: Capabilities) -> Self {
        Self::Capabilities {
            capabilities: WireCapabilities {
                scope: caps.scope.to_string(),
            },
        }
    }

    /// Whether this response reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Ack { err } if !err.is_empty())
    }
}

impl fmt::Display for PluginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate { implements } => write!(f, "Activate({})", implements.join(",")),
            Self::Mountpoint { mountpoint, .. } => {
                write!(f, "Mountpoint({})", mountpoint.display())
            }
            Self::Volume { volume, .. } => write!(f, "Volume({})", volume.name),
            Self::Volumes { volumes, .. } => write!(f, "Volumes(count={})", volumes.len()),
            Self::Capabilities { capabilities } => {
                write!(f, "Capabilities({})", capabilities.scope)
            }
            Self::Ack { err } if err.is_empty() => f.write_str("Ok"),
            Self::Ack { err } => write!(f, "Error({err})"),
        }
    }
}
