//! Single-connection WebSocket runner.
//!
//! Connects once, signals the caller, and forwards every text frame to a
//! callback until the server closes, the stream errors, or shutdown is
//! signaled. There is deliberately no reconnection here: on restart the
//! engine rebuilds its books from fresh snapshots, so reconnect policy
//! belongs to whatever supervises the engine.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::error::{FeedError, FeedResult};

/// Connection lifecycle signals delivered to the stream callback.
#[derive(Debug, Clone)]
pub enum StreamSignal {
    /// The socket is open and subscribed
    Connected,
    /// A text frame arrived
    Message(String),
    /// The connection ended; the engine will not receive further frames
    Closed(String),
}

/// Callback receiving stream signals.
pub type StreamCallback = Arc<dyn Fn(StreamSignal) + Send + Sync>;

/// Run one WebSocket connection to completion.
///
/// Emits `Connected` once the socket is up, `Message` per frame, and
/// `Closed` when the connection ends for any reason. Returns `Ok(())` on
/// graceful shutdown, an error when the stream fails.
pub async fn run(
    url: &str,
    callback: StreamCallback,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> FeedResult<()> {
    url::Url::parse(url)
        .map_err(|e| FeedError::Configuration(format!("Invalid WebSocket URL: {}", e)))?;

    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| FeedError::Connection(format!("Failed to connect: {}", e)))?;

    info!("WebSocket connected to {}", url);
    callback(StreamSignal::Connected);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing WebSocket");
                if let Err(e) = write.send(Message::Close(None)).await {
                    warn!("Failed to send close frame: {}", e);
                }
                callback(StreamSignal::Closed("shutdown".to_string()));
                return Ok(());
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        callback(StreamSignal::Message(text));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(text) = String::from_utf8(data) {
                            callback(StreamSignal::Message(text));
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        info!("WebSocket closed by server: {:?}", frame);
                        callback(StreamSignal::Closed("server closed connection".to_string()));
                        return Err(FeedError::Stream("Server closed connection".to_string()));
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        callback(StreamSignal::Closed(e.to_string()));
                        return Err(FeedError::Stream(e.to_string()));
                    }
                    None => {
                        callback(StreamSignal::Closed("stream ended".to_string()));
                        return Err(FeedError::Stream("Stream ended".to_string()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let callback: StreamCallback = Arc::new(|_| {});
        let (_tx, rx) = broadcast::channel(1);

        let err = run("not a url", callback, rx).await.unwrap_err();
        assert!(matches!(err, FeedError::Configuration(_)));
    }
}
