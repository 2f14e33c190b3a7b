//! Websocket link over tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::{Connector, Link};
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens real websocket connections
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Link>> {
        let (stream, response) = connect_async(url.as_str()).await?;
        debug!(%url, status = response.status().as_u16(), "websocket open");
        Ok(Box::new(WsLink { stream }))
    }
}

/// One websocket connection carrying text frames
pub struct WsLink {
    stream: WsStream,
}

#[async_trait]
impl Link for WsLink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(data) => {
                    return String::from_utf8(data)
                        .map(Some)
                        .map_err(|e| Error::Protocol(format!("non UTF-8 frame: {}", e)))
                }
                Message::Close(frame) => {
                    debug!(?frame, "websocket closed by server");
                    return Ok(None);
                }
                // Pings are answered by tungstenite on the next read
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
