use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Transport-level failures. These never escape the stream task; they only
/// move the stream to `Disconnected`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// Raw text frames from an open connection. The stream ends when the server
/// closes the connection.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens a connection to the log server. Dropping the returned stream closes it.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<FrameStream, TransportError>>;
}

/// WebSocket transport
#[derive(Clone, Debug, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<FrameStream, TransportError>> {
        let url = url.to_string();
        async move {
            let (ws_stream, _) = connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;

            tracing::debug!(%url, "websocket connected");

            let frames = ws_stream
                .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
                .filter_map(|message| {
                    future::ready(match message {
                        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                        Ok(Message::Binary(data)) => {
                            Some(Ok(String::from_utf8_lossy(&data).into_owned()))
                        }
                        // Ping/pong are answered by the library
                        Ok(_) => None,
                        Err(e) => Some(Err(TransportError::Stream(e.to_string()))),
                    })
                });

            Ok(frames.boxed())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Serve one WebSocket connection on a loopback port, sending `messages`
    /// and then closing cleanly when `close` is set or dropping the socket otherwise.
    async fn serve_once(messages: Vec<Message>, close: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            for message in messages {
                ws.send(message).await.unwrap();
            }
            if close {
                ws.close(None).await.unwrap();
                // Let the client answer the close handshake
                while ws.next().await.is_some() {}
            }
        });
        format!("ws://{addr}/ws/logs")
    }

    #[tokio::test]
    async fn test_frames_until_close() {
        let url = serve_once(
            vec![
                Message::text("first"),
                Message::binary(vec![b'h', 0xff, b'i']),
                Message::text("last"),
            ],
            true,
        )
        .await;

        let frames: Vec<String> = WebSocketTransport
            .open(&url)
            .await
            .unwrap()
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        assert_eq!(frames, vec!["first", "h\u{FFFD}i", "last"]);
    }

    #[tokio::test]
    async fn test_reset_without_close_is_stream_error() {
        let url = serve_once(vec![Message::text("only")], false).await;

        let mut frames = WebSocketTransport.open(&url).await.unwrap();
        assert_eq!(frames.next().await.unwrap().unwrap(), "only");
        assert!(matches!(
            frames.next().await,
            Some(Err(TransportError::Stream(_)))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WebSocketTransport.open(&format!("ws://{addr}/ws/logs")).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
