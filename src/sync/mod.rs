//! The market-data sync engine.
//!
//! [`MarketDataSync`] owns one background tokio task per started run. The
//! task owns the socket; the public API only touches shared state under
//! short locks and nudges the task over an unbounded command channel, so
//! every operation is synchronous and non-blocking.
//!
//! Each run is tagged with an epoch. `start()` and `stop()` bump it, and the
//! task checks its own epoch before publishing anything, so a task that is
//! still winding down after `stop()` can neither change the connection state
//! nor touch the snapshot.

mod listeners;
mod task;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::shared::{Channel, Instrument};
use crate::snapshot::{MarketSnapshot, Update};
use crate::ws::transport::Connector;
use crate::ws::{ConnectionState, ServerError, SubscriptionSet, WsConfig};

pub use listeners::ListenerId;
use task::{Command, TaskState};

// ─── Shared state ────────────────────────────────────────────────────────────

/// State shared between the public handle and the background task.
pub(crate) struct Shared {
    config: RwLock<WsConfig>,
    state: RwLock<ConnectionState>,
    snapshot: RwLock<Arc<MarketSnapshot>>,
    desired: RwLock<SubscriptionSet>,
    listeners: listeners::Listeners,
    epoch: AtomicU64,
    /// Serializes epoch changes with everything published under an epoch.
    /// Reentrant so listeners may call back into the sync.
    lifecycle: ReentrantMutex<()>,
}

impl Shared {
    fn new(config: WsConfig) -> Self {
        let snapshot = MarketSnapshot::new(config.trade_history_limit);
        Self {
            config: RwLock::new(config),
            state: RwLock::new(ConnectionState::Idle),
            snapshot: RwLock::new(Arc::new(snapshot)),
            desired: RwLock::new(SubscriptionSet::new()),
            listeners: listeners::Listeners::default(),
            epoch: AtomicU64::new(0),
            lifecycle: ReentrantMutex::new(()),
        }
    }

    pub(crate) fn config(&self) -> WsConfig {
        self.config.read().clone()
    }

    pub(crate) fn desired(&self) -> SubscriptionSet {
        self.desired.read().clone()
    }

    /// Start a new epoch in `state`. Returns the new epoch and whether the
    /// state changed; the caller emits the change.
    fn advance_epoch(&self, state: ConnectionState) -> (u64, bool) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        (epoch, self.replace_state(state))
    }

    fn replace_state(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write();
        let changed = *state != next;
        *state = next;
        changed
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Move to `next` if `epoch` is still current. Returns `false` if fenced.
    pub(crate) fn set_state(&self, epoch: u64, next: ConnectionState) -> bool {
        let _lifecycle = self.lifecycle.lock();
        if !self.is_current(epoch) {
            return false;
        }
        if self.replace_state(next) {
            tracing::debug!("Connection state -> {}", next);
            self.listeners.emit_state(next);
        }
        true
    }

    /// Merge `update` into the snapshot and notify listeners, if `epoch` is
    /// still current.
    pub(crate) fn publish_update(&self, epoch: u64, update: Update) -> bool {
        let _lifecycle = self.lifecycle.lock();
        if !self.is_current(epoch) {
            return false;
        }
        let next = {
            let mut snapshot = self.snapshot.write();
            let next = Arc::new(snapshot.apply(update, Utc::now()));
            *snapshot = Arc::clone(&next);
            next
        };
        self.listeners.emit_snapshot(&next);
        true
    }

    pub(crate) fn publish_server_error(&self, epoch: u64, error: &ServerError) -> bool {
        let _lifecycle = self.lifecycle.lock();
        if !self.is_current(epoch) {
            return false;
        }
        self.listeners.emit_error(error);
        true
    }
}

// ─── Public MarketDataSync ───────────────────────────────────────────────────

struct Run {
    cmd_tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

/// Live market-data synchronization over a reconnecting WebSocket.
///
/// Holds the latest [`MarketSnapshot`], republishes every applied update to
/// listeners and keeps the server's channel subscriptions in line with
/// [`subscribe`](Self::subscribe)/[`unsubscribe`](Self::unsubscribe).
/// Connectivity and data problems are never returned as errors: they are
/// logged and reported through [`ConnectionState`].
///
/// Must be started from within a tokio runtime. Dropping the sync aborts its
/// task.
pub struct MarketDataSync {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    run: Mutex<Option<Run>>,
}

impl MarketDataSync {
    /// Create a sync using the `tokio-tungstenite` transport. Does not connect yet.
    #[cfg(feature = "ws-native")]
    pub fn new(config: WsConfig) -> Self {
        Self::with_connector(config, crate::ws::native::TungsteniteConnector)
    }

    /// Create a sync over a custom transport. Does not connect yet.
    pub fn with_connector(config: WsConfig, connector: impl Connector) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
            connector: Arc::new(connector),
            run: Mutex::new(None),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Start connecting.
    ///
    /// No-op while a run is alive (connecting, connected, or waiting out a
    /// reconnect backoff). Outside a tokio runtime this logs and does nothing.
    pub fn start(&self) {
        let _lifecycle = self.shared.lifecycle.lock();

        if let Some(run) = self.run.lock().as_ref() {
            if !run.handle.is_finished() {
                tracing::debug!("start() ignored, already running");
                return;
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("start() called outside a tokio runtime, ignoring");
                return;
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (epoch, changed) = self.shared.advance_epoch(ConnectionState::Connecting);
        let task = TaskState::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.connector),
            cmd_rx,
            epoch,
        );
        let handle = runtime.spawn(task::run_task(task));
        *self.run.lock() = Some(Run { cmd_tx, handle });

        tracing::info!("Market data sync started");
        if changed {
            self.shared.listeners.emit_state(ConnectionState::Connecting);
        }
    }

    /// Stop: close the socket with a normal close frame and cancel any pending
    /// reconnect. Nothing reconnects until the next [`start`](Self::start).
    pub fn stop(&self) {
        let _lifecycle = self.shared.lifecycle.lock();

        let run = self.run.lock().take();
        let (_, changed) = self.shared.advance_epoch(ConnectionState::Idle);

        if let Some(Run { cmd_tx, handle }) = run {
            let _ = cmd_tx.send(Command::Shutdown);
            drop(cmd_tx);
            let grace = self.shared.config.read().shutdown_grace;
            reap(handle, grace);
            tracing::info!("Market data sync stopped");
        }

        if changed {
            self.shared.listeners.emit_state(ConnectionState::Idle);
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────────

    /// Add channels to the desired set.
    ///
    /// While connected, the newly added channels are sent right away; either
    /// way the full set is sent on every (re)connect.
    pub fn subscribe<I, C>(&self, channels: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Channel>,
    {
        let added = self.shared.desired.write().insert_all(channels);
        if added.is_empty() {
            return;
        }
        tracing::debug!("Subscribing to {:?}", added);
        self.nudge(Command::SyncSubscriptions);
    }

    /// Remove channels from the desired set; sends an unsubscribe while connected.
    pub fn unsubscribe<I, C>(&self, channels: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Channel>,
    {
        let removed = self.shared.desired.write().remove_all(channels);
        if removed.is_empty() {
            return;
        }
        tracing::debug!("Unsubscribing from {:?}", removed);
        self.nudge(Command::SyncSubscriptions);
    }

    /// Select the instrument the server should stream.
    ///
    /// Attached to every subscribe message from now on; while connected the
    /// full subscription set is re-sent immediately.
    pub fn select_instrument(&self, instrument: impl Into<Instrument>) {
        let instrument = instrument.into();
        {
            let mut config = self.shared.config.write();
            if config.instrument.as_ref() == Some(&instrument) {
                return;
            }
            tracing::info!("Selecting instrument {}", instrument);
            config.instrument = Some(instrument);
        }
        self.nudge(Command::Resubscribe);
    }

    fn nudge(&self, cmd: Command) {
        if let Some(run) = self.run.lock().as_ref() {
            let _ = run.cmd_tx.send(cmd);
        }
    }

    // ── Listeners ────────────────────────────────────────────────────────

    /// Called with the new snapshot after every applied update.
    pub fn on_snapshot_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<MarketSnapshot>) + Send + Sync + 'static,
    {
        self.shared.listeners.add_snapshot(Arc::new(listener))
    }

    /// Called on every connection state transition.
    pub fn on_connection_state_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.shared.listeners.add_state(Arc::new(listener))
    }

    /// Called when the server reports an application-level error.
    pub fn on_server_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ServerError) + Send + Sync + 'static,
    {
        self.shared.listeners.add_error(Arc::new(listener))
    }

    /// Deregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        Arc::clone(&self.shared.snapshot.read())
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// The desired channel set.
    pub fn subscriptions(&self) -> Vec<Channel> {
        self.shared.desired.read().to_vec()
    }

    pub fn config(&self) -> WsConfig {
        self.shared.config()
    }
}

impl Drop for MarketDataSync {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.handle.abort();
        }
    }
}

impl std::fmt::Debug for MarketDataSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataSync")
            .field("state", &self.connection_state())
            .field("subscriptions", &self.subscriptions())
            .finish_non_exhaustive()
    }
}

/// Give the task `grace` to close its socket, then abort it.
fn reap(mut handle: JoinHandle<()>, grace: Duration) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if tokio::time::timeout(grace, &mut handle).await.is_err() {
                    tracing::warn!("Sync task did not stop within {:?}, aborting", grace);
                    handle.abort();
                }
            });
        }
        Err(_) => handle.abort(),
    }
}
