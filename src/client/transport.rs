//! Websocket link to the feed.
//!
//! A [`Link`] hands inbound text frames to the connection through a bounded
//! channel and exposes an `alive` flag. The flag can drop while the frame
//! channel stays open, so callers must poll it rather than wait for the
//! channel to end.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::client::config::ConnectionConfig;
use crate::client::utils;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("Invalid connection request: {0}")]
    Request(String),
    #[error("Already connected")]
    AlreadyConnected,
}

/// Opens links to the feed.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, config: &ConnectionConfig) -> Result<Link, TransportError>;
}

pub struct Link {
    frames: mpsc::Receiver<String>,
    alive: Arc<AtomicBool>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl Link {
    pub fn new(frames: mpsc::Receiver<String>, alive: Arc<AtomicBool>, close_tx: oneshot::Sender<()>) -> Self {
        Self {
            frames,
            alive,
            close_tx: Some(close_tx),
        }
    }

    pub fn into_parts(self) -> (mpsc::Receiver<String>, LinkHandle) {
        let handle = LinkHandle {
            alive: self.alive,
            close_tx: self.close_tx,
        };
        (self.frames, handle)
    }
}

/// Control side of a link, kept by the connection after the frames are
/// handed to the receive loop.
pub struct LinkHandle {
    alive: Arc<AtomicBool>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl LinkHandle {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn alive_flag(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }

    /// Asks the link to close. Safe to call more than once.
    pub fn close(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// [`Transport`] backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, config: &ConnectionConfig) -> Result<Link, TransportError> {
        let request = utils::build_request(config).map_err(|e| TransportError::Request(e.to_string()))?;
        let (ws_stream, _) = tokio::time::timeout(config.handshake_timeout(), tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| TransportError::HandshakeTimeout(config.handshake_timeout()))??;
        tracing::debug!("Websocket handshake with {} done", config.url());

        let (frames_tx, frames_rx) = mpsc::channel(config.capacity());
        let alive = Arc::new(AtomicBool::new(true));
        let (close_tx, close_rx) = oneshot::channel();

        tokio::spawn(pump(
            ws_stream,
            frames_tx,
            alive.clone(),
            close_rx,
            config.ping_interval(),
            config.ping_timeout(),
        ));

        Ok(Link::new(frames_rx, alive, close_tx))
    }
}

async fn pump(
    ws_stream: WsStream,
    frames: mpsc::Sender<String>,
    alive: Arc<AtomicBool>,
    mut close_rx: oneshot::Receiver<()>,
    ping_interval: Duration,
    ping_timeout: Duration,
) {
    let (mut write, mut read) = ws_stream.split();

    let mut ping_ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let pong_deadline = tokio::time::sleep(ping_timeout);
    tokio::pin!(pong_deadline);
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = &mut close_rx => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!("failed to send close frame: {}", e);
                }
                break;
            }
            _ = ping_ticker.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    tracing::warn!("failed to send ping: {}", e);
                    break;
                }
                if !awaiting_pong {
                    awaiting_pong = true;
                    pong_deadline.as_mut().reset(Instant::now() + ping_timeout);
                }
            }
            _ = &mut pong_deadline, if awaiting_pong => {
                tracing::warn!("No pong within {:?}, dropping link", ping_timeout);
                break;
            }
            message = read.next() => {
                let message = match message {
                    None => {
                        tracing::info!("websocket stream ended");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("failed to read message: {}", e);
                        break;
                    }
                    Some(Ok(message)) => message,
                };
                awaiting_pong = false;
                match message {
                    Message::Text(text) => {
                        if frames.send(text).await.is_err() {
                            break;
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
}
