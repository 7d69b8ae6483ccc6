//! arena CLI - Command line interface for match launches

use anyhow::{Context, bail};
use arena_core::config::default_socket_path;
use arena_core::manifest;
use arena_core::platform::{ArtifactHandle, OwnerRef, Platform, TaskHandle};
use arena_core::protocol::{self, Request, Response};
use arena_core::upload::{TemplateIssuer, UploadUrlIssuer};
use arena_core::{LaunchConfig, LaunchContext, LinkStatus, Match};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "arena")]
#[command(author, version, about = "Launch isolated bot matches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ConfigMap and Job for a match without submitting them
    Render {
        /// Match description (JSON)
        #[arg(value_name = "MATCH")]
        match_file: PathBuf,

        /// Namespace written into the manifests
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Replay upload URL template
        #[arg(long, default_value = "http://replays/{match_id}")]
        upload_url: String,
    },

    /// Launch a match through the daemon
    Launch {
        /// Match description (JSON)
        #[arg(value_name = "MATCH")]
        match_file: PathBuf,

        /// Socket path (defaults to ARENA_SOCKET env var or /run/arena/arena.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Ping the daemon
    Ping {
        /// Socket path (defaults to ARENA_SOCKET env var or /run/arena/arena.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },
}

/// Platform that refuses every call; rendering never reaches it
struct Offline;

#[async_trait::async_trait]
impl Platform for Offline {
    async fn create_config_artifact(
        &self,
        _: &arena_core::isolation::ConfigArtifact,
    ) -> Result<ArtifactHandle, arena_core::error::PlatformError> {
        Err(offline())
    }

    async fn update_config_artifact(
        &self,
        _: &ArtifactHandle,
        _: &OwnerRef,
    ) -> Result<(), arena_core::error::PlatformError> {
        Err(offline())
    }

    async fn create_task(
        &self,
        _: &arena_core::task::Task,
    ) -> Result<TaskHandle, arena_core::error::PlatformError> {
        Err(offline())
    }
}

fn offline() -> arena_core::error::PlatformError {
    arena_core::error::PlatformError::Other("rendering does not contact the platform".into())
}

fn read_match(path: &Path) -> anyhow::Result<Match> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn call(socket: &Path, request: &Request) -> anyhow::Result<Response> {
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("connecting to {}", socket.display()))?;
    protocol::write_frame(&mut stream, &protocol::encode(request)?).await?;
    let body = protocol::read_frame(&mut stream)
        .await?
        .context("daemon closed the connection")?;
    Ok(protocol::decode(&body)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arena=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            match_file,
            namespace,
            upload_url,
        } => {
            let game = read_match(&match_file)?;
            let config = LaunchConfig::builder().namespace(namespace.clone()).build();
            let issuer = TemplateIssuer::new(upload_url)?;
            let upload_url = issuer.issue(game.id).await?;

            let ctx = LaunchContext::new(config, Arc::new(Offline), Arc::new(issuer))?;
            let plan = ctx.plan(&game, &upload_url)?;

            let objects = [
                manifest::config_map(&plan.artifact, &namespace),
                manifest::job(&plan.task, &namespace),
            ];
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }

        Commands::Launch { match_file, socket } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            let game = read_match(&match_file)?;
            match call(&socket, &Request::Launch(game)).await? {
                Response::Launched(outcome) => {
                    println!("task {} ({})", outcome.task.name, outcome.task.uid);
                    println!("mapping {}", outcome.mapping);
                    if let LinkStatus::Failed(reason) = outcome.link {
                        eprintln!(
                            "warning: config artifact {} not linked to task: {reason}",
                            outcome.artifact.name
                        );
                    }
                }
                Response::Error { message } => bail!("launch failed: {message}"),
                Response::Pong => bail!("unexpected response from daemon"),
            }
        }

        Commands::Ping { socket } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            match call(&socket, &Request::Ping).await? {
                Response::Pong => println!("pong from {}", socket.display()),
                other => bail!("unexpected response from daemon: {other:?}"),
            }
        }
    }

    Ok(())
}
