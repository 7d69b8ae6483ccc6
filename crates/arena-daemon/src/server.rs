//! Unix socket server

use arena_core::LaunchContext;
use arena_core::protocol::{self, Request, Response};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};

/// Run the daemon server
pub async fn run(listener: UnixListener, ctx: LaunchContext) -> anyhow::Result<()> {
    let ctx = Arc::new(ctx);

    loop {
        let (stream, _) = listener.accept().await?;
        let ctx = Arc::clone(&ctx);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, ctx).await {
                tracing::error!(error = %e, "connection error");
            }
        });
    }
}

/// Handle a single client connection
async fn handle_connection(mut stream: UnixStream, ctx: Arc<LaunchContext>) -> anyhow::Result<()> {
    while let Some(body) = protocol::read_frame(&mut stream).await? {
        let response = match protocol::decode::<Request>(&body) {
            Ok(request) => handle_request(request, &ctx).await,
            Err(e) => Response::Error {
                message: format!("malformed request: {e}"),
            },
        };

        let response_bytes = protocol::encode(&response)?;
        protocol::write_frame(&mut stream, &response_bytes).await?;
    }

    Ok(())
}

/// Handle a single request
async fn handle_request(request: Request, ctx: &LaunchContext) -> Response {
    match request {
        Request::Launch(game) => match ctx.launch(&game).await {
            Ok(outcome) => Response::Launched(outcome),
            Err(e) => {
                tracing::error!(match_id = %game.id, error = %e, "match launch failed");
                Response::Error {
                    message: e.to_string(),
                }
            }
        },
        Request::Ping => Response::Pong,
    }
}
