//! Abstracts the control channel's byte transport away from the session
//! state machine so the latter is testable over an in-memory duplex
//! stream instead of a live socket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// One control-channel connection: text frames in, text frames out.
#[async_trait]
pub trait ControlTransport: Send {
    /// `None` on clean or abrupt close.
    async fn recv_text(&mut self) -> Option<String>;
    /// `false` if the transport is already gone; the caller should stop
    /// trying to write to it.
    async fn send_text(&mut self, text: String) -> bool;
}

#[async_trait]
impl<S> ControlTransport for WebSocketStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv_text(&mut self) -> Option<String> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Binary(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(_)) => return None,
            }
        }
    }

    async fn send_text(&mut self, text: String) -> bool {
        self.send(Message::Text(text)).await.is_ok()
    }
}
