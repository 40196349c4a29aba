//! rkvol daemon configuration.
//!
//! Every option can be given as a flag or through the environment:
//!
//! - `ROOT_PATH`: directory holding one subdirectory per volume.
//!   Defaults to `/var/lib/rkvol`.
//! - `VOLUME_SCOPE`: `local` or `global`.  Required; in `global` scope the
//!   root must be a mounted shared filesystem before anything is served.
//! - `VOLUME_STORE`: `disk` (existence = directory presence) or `memory`
//!   (existence = in-process map, recovered from disk at startup).
//! - `PLUGIN_NAME` / `PLUGIN_SOCKET_DIR`: the socket is
//!   `<PLUGIN_SOCKET_DIR>/<PLUGIN_NAME>.sock`.
//! - `VERIFY_ATTEMPTS` / `VERIFY_INTERVAL_SECS`: mount-root retry policy.
//! - `RKVOL_LOG_JSON`: emit JSON log lines.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use libvolume::{MountRootVerifier, PluginServer, Registry, Scope};

pub const DEFAULT_ROOT: &str = "/var/lib/rkvol";
pub const DEFAULT_SOCKET_DIR: &str = "/run/docker/plugins";
pub const DEFAULT_PLUGIN_NAME: &str = "rkvol";

#[derive(Debug, Parser)]
#[command(name = "rkvol")]
#[command(version, about = "Directory-backed Docker volume plugin", long_about = None)]
pub struct Config {
    /// Storage root; each volume is a subdirectory.
    #[arg(long, env = "ROOT_PATH", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Volume scope advertised to the orchestrator.
    #[arg(long, env = "VOLUME_SCOPE", value_enum)]
    pub scope: ScopeArg,

    /// How volume existence is tracked.
    #[arg(long, env = "VOLUME_STORE", value_enum, default_value_t = StoreArg::Disk)]
    pub store: StoreArg,

    /// Plugin name; also the socket file stem.
    #[arg(long, env = "PLUGIN_NAME", default_value = DEFAULT_PLUGIN_NAME)]
    pub plugin_name: String,

    /// Directory Docker scans for plugin sockets.
    #[arg(long, env = "PLUGIN_SOCKET_DIR", default_value = DEFAULT_SOCKET_DIR)]
    pub socket_dir: PathBuf,

    /// Mount-root probes before giving up (global scope only).
    #[arg(
        long,
        env = "VERIFY_ATTEMPTS",
        default_value_t = MountRootVerifier::DEFAULT_ATTEMPTS
    )]
    pub verify_attempts: u32,

    /// Seconds between mount-root probes.
    #[arg(
        long,
        env = "VERIFY_INTERVAL_SECS",
        default_value_t = MountRootVerifier::DEFAULT_INTERVAL.as_secs()
    )]
    pub verify_interval_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long, env = "RKVOL_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Local,
    Global,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Self::Local,
            ScopeArg::Global => Self::Global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreArg {
    Disk,
    Memory,
}

impl Config {
    pub fn scope(&self) -> Scope {
        self.scope.into()
    }

    pub fn verifier(&self) -> MountRootVerifier {
        MountRootVerifier::new(
            self.verify_attempts,
            Duration::from_secs(self.verify_interval_secs),
        )
    }

    pub fn socket_path(&self) -> PathBuf {
        PluginServer::<Registry>::socket_path_for(&self.socket_dir, &self.plugin_name)
    }
}
