//! HTTP-over-Unix-socket server that Docker talks to, dispatching plugin
//! calls to a [`VolumeDriver`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use crate::driver::VolumeDriver;
use crate::error::VolumeError;
use crate::protocol::{PLUGIN_CONTENT_TYPE, PluginRequest, PluginResponse, ProtocolError};

/// A plugin server bound to `<socket_dir>/<plugin_name>.sock`.
pub struct PluginServer<T> {
    socket_path: PathBuf,
    driver: Arc<T>,
}

impl<T> PluginServer<T>
where
    T: VolumeDriver + 'static,
{
    pub fn new(socket_path: impl Into<PathBuf>, driver: Arc<T>) -> Self {
        Self {
            socket_path: socket_path.into(),
            driver,
        }
    }

    /// Socket path Docker discovers plugins by: `<dir>/<name>.sock`.
    pub fn socket_path_for(socket_dir: &Path, plugin_name: &str) -> PathBuf {
        socket_dir.join(format!("{plugin_name}.sock"))
    }

    /// Router serving one `POST /<Method>` endpoint per protocol method.
    pub fn router(driver: Arc<T>) -> Router {
        Router::new()
            .route("/{method}", post(handle::<T>))
            .with_state(driver)
    }

    /// Bind the socket and serve until `shutdown` resolves.
    ///
    /// A stale socket left by a previous run is replaced; the socket file is
    /// removed again on a clean exit.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), VolumeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                VolumeError::Transport(format!("create {}: {e}", parent.display()))
            })?;
        }
        match tokio::fs::remove_file(&self.socket_path).await {
            Ok(()) => debug!(path = %self.socket_path.display(), "removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(VolumeError::Transport(format!(
                    "remove stale socket {}: {e}",
                    self.socket_path.display()
                )));
            }
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            VolumeError::Transport(format!("bind {}: {e}", self.socket_path.display()))
        })?;
        info!(socket = %self.socket_path.display(), "volume plugin listening");

        let result = axum::serve(listener, Self::router(Arc::clone(&self.driver)))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(VolumeError::transport);

        if let Err(e) = tokio::fs::remove_file(&self.socket_path).await {
            warn!(socket = %self.socket_path.display(), error = %e, "failed to remove socket");
        }
        info!("volume plugin stopped");
        result
    }
}

/// Decode one call, dispatch it, and encode the reply.
async fn handle<T>(
    State(driver): State<Arc<T>>,
    UrlPath(method): UrlPath<String>,
    body: Bytes,
) -> Response
where
    T: VolumeDriver + 'static,
{
    let (status, response) = match PluginRequest::decode(&method, &body) {
        Ok(request) => {
            debug!(%method, %request, "plugin request received");
            let response = dispatch(driver.as_ref(), request).await;
            let status = if response.is_error() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            (status, response)
        }
        Err(e @ ProtocolError::UnknownMethod(_)) => {
            warn!(%method, error = %e, "unknown plugin method");
            (StatusCode::NOT_FOUND, PluginResponse::error(e))
        }
        Err(e @ ProtocolError::Malformed { .. }) => {
            warn!(%method, error = %e, "malformed plugin request");
            (StatusCode::BAD_REQUEST, PluginResponse::error(e))
        }
    };

    debug!(%method, %response, status = status.as_u16(), "plugin response");
    match serde_json::to_vec(&response) {
        Ok(payload) => {
            (status, [(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], payload).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Map a [`PluginRequest`] to the matching driver call and wrap the result
/// in a [`PluginResponse`].
pub async fn dispatch<T>(driver: &T, request: PluginRequest) -> PluginResponse
where
    T: VolumeDriver + ?Sized,
{
    match request {
        PluginRequest::Activate => PluginResponse::activate(),
        PluginRequest::Create(req) => match driver.create(req).await {
            Ok(_) => PluginResponse::ok(),
            Err(e) => PluginResponse::error(e),
        },
        PluginRequest::Remove(name) => match driver.remove(&name).await {
            Ok(()) => PluginResponse::ok(),
            Err(e) => PluginResponse::error(e),
        },
        PluginRequest::Mount(req) => match driver.mount(req).await {
            Ok(path) => PluginResponse::mountpoint(path),
            Err(e) => PluginResponse::error(e),
        },
        PluginRequest::Unmount(req) => match driver.unmount(req).await {
            Ok(()) => PluginResponse::ok(),
            Err(e) => PluginResponse::error(e),
        },
        PluginRequest::Path(name) => match driver.path(&name).await {
            Ok(path) => PluginResponse::mountpoint(path),
            Err(e) => PluginResponse::error(e),
        },
        PluginRequest::Get(name) => match driver.get(&name).await {
            Ok(volume) => PluginResponse::volume(&volume),
            Err(e) => PluginResponse::error(e),
        },
        PluginRequest::List => PluginResponse::volumes(&driver.list().await),
        PluginRequest::Capabilities => PluginResponse::capabilities(driver.capabilities()),
    }
}
