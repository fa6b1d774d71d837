use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::MissedTickBehavior;

use crate::client::dump::FrameDump;
use crate::client::stats::Stats;
use crate::client::transport::{LinkHandle, Transport, TransportError};
use crate::dispatcher::{Dispatch, Dispatcher};

pub mod config;
pub mod consts;
pub mod dump;
pub mod stats;
pub mod transport;
mod utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

struct Status {
    state: ConnectionState,
    alive: Option<Arc<AtomicBool>>,
}

struct ActiveLink {
    handle: LinkHandle,
    closing: Arc<Notify>,
    recv_handle: tokio::task::JoinHandle<()>,
}

/// Owns the link to the feed and keeps it up.
///
/// `connect` and `disconnect` are serialized on the link slot, so the
/// keep-alive watchdog and the main task can both call them.
pub struct Connection<T: Transport> {
    transport: T,
    config: config::ConnectionConfig,
    dispatcher: Arc<tokio::sync::Mutex<Dispatcher>>,
    dump: Option<Arc<FrameDump>>,
    status: Arc<Mutex<Status>>,
    link: tokio::sync::Mutex<Option<ActiveLink>>,
    stop_tx: watch::Sender<bool>,
    stats: Arc<Mutex<Stats>>,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, config: config::ConnectionConfig, dispatcher: Dispatcher) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            transport,
            config,
            dispatcher: Arc::new(tokio::sync::Mutex::new(dispatcher)),
            dump: None,
            status: Arc::new(Mutex::new(Status {
                state: ConnectionState::Disconnected,
                alive: None,
            })),
            link: tokio::sync::Mutex::new(None),
            stop_tx,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    /// Appends every inbound frame to `dump` before dispatching it.
    pub fn with_dump(mut self, dump: FrameDump) -> Self {
        self.dump = Some(Arc::new(dump));
        self
    }

    pub fn config(&self) -> &config::ConnectionConfig {
        &self.config
    }

    /// Current state. A link that died on its own reads as `Disconnected`
    /// even before the watchdog has noticed.
    pub fn state(&self) -> ConnectionState {
        let status = lock(&self.status);
        match (status.state, status.alive.as_ref()) {
            (ConnectionState::Connected, Some(alive)) if !alive.load(Ordering::SeqCst) => {
                ConnectionState::Disconnected
            }
            (state, _) => state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn stats(&self) -> Stats {
        lock(&self.stats).clone()
    }

    /// Opens a link and starts the receive loop on its own task.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let mut slot = self.link.lock().await;
        if slot.as_ref().is_some_and(|active| active.handle.is_alive()) {
            return Err(TransportError::AlreadyConnected);
        }
        if let Some(stale) = slot.take() {
            shutdown(stale).await;
        }

        self.set_status(ConnectionState::Connecting, None);
        let link = match self.transport.open(&self.config).await {
            Ok(link) => link,
            Err(e) => {
                self.set_status(ConnectionState::Disconnected, None);
                return Err(e);
            }
        };

        let (frames, handle) = link.into_parts();
        self.set_status(ConnectionState::Connected, Some(handle.alive_flag()));

        let closing = Arc::new(Notify::new());
        let recv_handle = tokio::spawn(receive_loop(
            frames,
            closing.clone(),
            handle.alive_flag(),
            self.dispatcher.clone(),
            self.dump.clone(),
            self.stats.clone(),
        ));
        *slot = Some(ActiveLink {
            handle,
            closing,
            recv_handle,
        });

        tracing::info!("Connected to {}", self.config.url());
        Ok(())
    }

    /// Closes the current link, if any, and waits for its receive loop to
    /// finish. Calling it while disconnected is a no-op.
    pub async fn disconnect(&self) {
        let mut slot = self.link.lock().await;
        if let Some(active) = slot.take() {
            shutdown(active).await;
            tracing::info!("Disconnected from {}", self.config.url());
        }
        self.set_status(ConnectionState::Disconnected, None);
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        self.disconnect().await;
        self.connect().await
    }

    /// Watchdog: polls liveness every keep-alive interval and replaces a dead
    /// link with a fresh one. Returns once [`Connection::stop`] is called.
    pub async fn keep_alive(&self) {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut ticker = tokio::time::interval(self.config.keep_alive_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            if self.is_connected() {
                continue;
            }

            self.set_state(ConnectionState::Reconnecting);
            tracing::warn!("Socket is not connected, reconnecting");
            let result = tokio::select! {
                result = self.reconnect() => result,
                _ = stop_rx.changed() => {
                    tracing::info!("Stop requested during reconnect, abandoning attempt");
                    self.abandon_attempt();
                    break;
                }
            };
            match result {
                Ok(()) => {
                    if let Ok(mut stats) = self.stats.lock() {
                        stats.record_reconnect();
                    } else {
                        tracing::error!("failed to update stats");
                    }
                }
                Err(TransportError::AlreadyConnected) => {}
                Err(e) => tracing::warn!("Reconnect failed: {}", e),
            }
        }

        tracing::info!("Keep-alive stopped");
    }

    /// Signals the watchdog to exit. An in-flight reconnect is dropped.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Marks a cancelled connection attempt as disconnected. A link that
    /// another caller brought up in the meantime is left alone.
    fn abandon_attempt(&self) {
        let mut status = lock(&self.status);
        if matches!(status.state, ConnectionState::Connecting | ConnectionState::Reconnecting) {
            status.state = ConnectionState::Disconnected;
            status.alive = None;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        lock(&self.status).state = state;
    }

    fn set_status(&self, state: ConnectionState, alive: Option<Arc<AtomicBool>>) {
        let mut status = lock(&self.status);
        status.state = state;
        status.alive = alive;
    }
}

fn lock<V>(mutex: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn shutdown(mut active: ActiveLink) {
    active.handle.close();
    active.closing.notify_one();
    if let Err(e) = active.recv_handle.await {
        tracing::error!("receive loop failed: {}", e);
    }
}

async fn receive_loop(
    mut frames: mpsc::Receiver<String>,
    closing: Arc<Notify>,
    alive: Arc<AtomicBool>,
    dispatcher: Arc<tokio::sync::Mutex<Dispatcher>>,
    dump: Option<Arc<FrameDump>>,
    stats: Arc<Mutex<Stats>>,
) {
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => handle_frame(&frame, &dispatcher, dump.as_deref(), &stats).await,
                None => break,
            },
            _ = closing.notified() => {
                frames.close();
                while let Some(frame) = frames.recv().await {
                    handle_frame(&frame, &dispatcher, dump.as_deref(), &stats).await;
                }
                break;
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    tracing::info!("Socket was closed");
}

async fn handle_frame(
    frame: &str,
    dispatcher: &tokio::sync::Mutex<Dispatcher>,
    dump: Option<&FrameDump>,
    stats: &Mutex<Stats>,
) {
    tracing::debug!("received frame: {}", frame);
    lock(stats).record_frame();

    if let Some(dump) = dump {
        if let Err(e) = dump.append(frame).await {
            tracing::warn!("failed to dump frame to {}: {}", dump.path().display(), e);
        }
    }

    let result = dispatcher.lock().await.dispatch(frame).await;
    match result {
        Ok(Dispatch::Handled(_)) => {}
        Ok(Dispatch::Unmatched(_)) => lock(stats).record_dropped(),
        Err(e) => {
            lock(stats).record_handler_failure();
            tracing::error!("failed to handle frame: {:#}", e);
        }
    }
}
