//! arena-daemon - Accepts match launch requests and submits them to the cluster
//!
//! One request launches one match: a single Job holding the game server,
//! every bot, their code-fetch init containers and the egress lockdown.

use anyhow::Result;
use arena_core::LaunchContext;
use arena_core::kube::KubeClient;
use arena_core::upload::TemplateIssuer;
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing_subscriber::EnvFilter;

mod config;
mod server;

use config::DaemonConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("arena=info".parse()?))
        .init();

    tracing::info!("arena-daemon starting");

    let config = DaemonConfig::load()?;
    tracing::info!(
        namespace = %config.launch.namespace,
        api_server = %config.kube.api_server,
        socket = ?config.socket_path,
        "configuration loaded"
    );

    let platform = KubeClient::new(&config.kube, config.launch.namespace.clone())?;
    let issuer = TemplateIssuer::new(config.upload_url_template.clone())?;
    let ctx = LaunchContext::new(config.launch.clone(), Arc::new(platform), Arc::new(issuer))?;

    // Create socket directory if needed
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Remove existing socket
    let _ = std::fs::remove_file(&config.socket_path);

    let listener = UnixListener::bind(&config.socket_path)?;
    tracing::info!(socket = ?config.socket_path, "listening");

    tokio::select! {
        result = server::run(listener, ctx) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    let _ = std::fs::remove_file(&config.socket_path);
    Ok(())
}
