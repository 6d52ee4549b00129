//! WebSocket transport for the push channel.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use examdash_core::{Error, Result};

use crate::transport::{Connection, Transport};

/// Connects to the dashboard's push endpoint over WebSocket.
///
/// The bearer token, if any, goes in the `Authorization` header of the
/// upgrade request.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
    token: Option<String>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Config(format!("Invalid channel URL {}: {}", self.url, e)))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Config(format!("Invalid channel token: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        debug!(url = %self.url, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| Error::Decode(format!("Binary frame is not UTF-8: {}", e))),
                    )
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    return None;
                }
                Ok(other) => {
                    trace!(kind = ?other, "Skipping control frame");
                }
                Err(e) => return Some(Err(Error::Transport(e.to_string()))),
            }
        }
    }
}
