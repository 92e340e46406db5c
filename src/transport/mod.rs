//! Duplex transport capability
//!
//! The session talks to an abstract [`Transport`] so scenarios can run over
//! an in-memory mock; the production implementation is a WebSocket client
//! with a bearer credential on the upgrade request.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Async duplex channel carrying wire text frames
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one outbound frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the channel is broken
    async fn send(&self, text: String) -> Result<()>;

    /// Await the next inbound frame; `None` means the peer closed cleanly
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the channel is broken
    async fn receive(&self) -> Result<Option<String>>;

    /// Close the channel
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the close handshake fails
    async fn close(&self) -> Result<()>;
}

/// WebSocket transport with bearer auth and model selection
pub struct WsTransport {
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
}

impl WsTransport {
    /// Open the upgrade request: `Authorization: Bearer <key>` header plus a
    /// `?model=` query parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection cannot be established
    pub async fn connect(endpoint: &str, api_key: &str, model: &str) -> Result<Self> {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let url = format!("{endpoint}{separator}model={model}");

        let mut request = url
            .into_client_request()
            .map_err(|e| Error::Transport(e.to_string()))?;
        if !api_key.is_empty() {
            let header = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| Error::Transport(e.to_string()))?;
            request.headers_mut().insert("Authorization", header);
        }

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        tracing::debug!(endpoint, model, "websocket connected");

        let (writer, reader) = ws.split();
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, text: String) -> Result<()> {
        self.writer
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn receive(&self) -> Result<Option<String>> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                // Control and binary frames carry no protocol events
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::Transport(e.to_string())),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.writer
            .lock()
            .await
            .send(Message::Close(None))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}
