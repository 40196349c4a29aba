//! # libvolume — directory-backed volume plugin core for RK8s
//!
//! `libvolume` implements the host side of the Docker volume plugin
//! protocol: every named volume maps to a directory under a configured root,
//! optionally a shared filesystem mounted there.  It follows the RK8s
//! conventions (Tokio async runtime, `tracing` for observability,
//! `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data model: `VolumeName`, `Volume`, `Scope`, requests. |
//! | [`error`] | [`VolumeError`] enum covering all failure modes. |
//! | [`driver`] | [`VolumeDriver`] trait — the eight lifecycle operations. |
//! | [`registry`] | [`Registry`] — concurrency-safe, idempotent driver. |
//! | [`store`] | Existence stores: directory presence or in-memory map. |
//! | [`mount`] | Mount-root verifier gating global-scope startup. |
//! | [`protocol`] | Plugin protocol request/response records. |
//! | [`transport`] | HTTP server on a Unix socket built on `axum`. |

pub mod driver;
pub mod error;
pub mod mount;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod transport;
pub mod types;

pub use driver::VolumeDriver;
pub use error::VolumeError;
pub use mount::{DeviceProbe, MountProbe, MountRootVerifier};
pub use registry::Registry;
pub use store::{DiskStore, MemoryStore, VolumeStore};
pub use transport::PluginServer;
pub use types::*;
