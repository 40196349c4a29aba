//! Transport for the plugin protocol.
//!
//! Docker reaches volume plugins over HTTP/1 on a Unix domain socket; this
//! module provides [`PluginServer`], which serves any
//! [`VolumeDriver`](crate::driver::VolumeDriver) that way.

pub mod server;

pub use server::{PluginServer, dispatch};
