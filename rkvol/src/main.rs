use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libvolume::{DeviceProbe, DiskStore, MemoryStore, PluginServer, Registry, Scope};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::{Config, StoreArg};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);
    run(config, shutdown_signal()).await
}

fn init_tracing(json: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rkvol=info,libvolume=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(false)))
        .init();
}

async fn run<F>(config: Config, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let scope = config.scope();
    info!(
        root = %config.root.display(),
        %scope,
        store = ?config.store,
        "starting rkvol",
    );

    // A global-scope driver must never write to an unmounted shared root.
    if scope == Scope::Global {
        let verifier = config.verifier();
        if let Err(e) = verifier.verify(&config.root, &DeviceProbe).await {
            error!(error = %e, "storage root verification failed, refusing to serve");
            return Err(e).context("global scope requires a mounted storage root");
        }
    }

    let registry = build_registry(&config).await;
    let server = PluginServer::new(config.socket_path(), Arc::new(registry));
    server
        .serve(shutdown)
        .await
        .context("volume plugin server failed")
}

async fn build_registry(config: &Config) -> Registry {
    let scope = config.scope();
    match config.store {
        StoreArg::Disk => Registry::new(DiskStore::new(&config.root), scope),
        StoreArg::Memory => {
            let mut store = MemoryStore::new(&config.root);
            store.recover().await;
            Registry::new(store, scope)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
