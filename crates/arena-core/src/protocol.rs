//! Wire protocol between the CLI and the launch daemon
//!
//! Each message is a 4-byte big-endian length followed by a msgpack body.

use crate::launch::LaunchOutcome;
use crate::model::Match;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body
pub const MAX_FRAME: usize = 4 * 1024 * 1024;

/// Request types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Launch a match
    Launch(Match),
    /// Ping
    Ping,
}

/// Response types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    /// Task created
    Launched(LaunchOutcome),
    /// Pong
    Pong,
    /// Error
    Error { message: String },
}

/// Encode a message to msgpack
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(msg)
}

/// Decode a message from msgpack
pub fn decode<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T, rmp_serde::decode::Error> {
    rmp_serde::from_slice(data)
}

/// Read one frame body; `Ok(None)` on a clean end of stream
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    // End of stream is only clean on a frame boundary
    if reader.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[1..]).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds {MAX_FRAME}"),
        ));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write one length-prefixed frame
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame too large"))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Participant;
    use uuid::Uuid;

    #[tokio::test]
    async fn launch_request_survives_framing() {
        let game = Match {
            id: Uuid::new_v4(),
            server_image: "server:1".into(),
            server_config: "cfg".into(),
            participants: vec![Participant {
                id: Uuid::new_v4(),
                name: Some("Alice".into()),
                repo_url: "https://example.com/a.git".into(),
                image: "bot:1".into(),
            }],
        };

        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &encode(&Request::Launch(game.clone())).unwrap())
            .await
            .unwrap();
        drop(client);

        let body = read_frame(&mut server).await.unwrap().unwrap();
        match decode::<Request>(&body).unwrap() {
            Request::Launch(decoded) => assert_eq!(decoded, game),
            other => panic!("unexpected request {other:?}"),
        }
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_header_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0]).await.unwrap();
        drop(client);

        let err = read_frame(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = u32::try_from(MAX_FRAME + 1).unwrap();
        client.write_all(&len.to_be_bytes()).await.unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
