//! Background connection task.
//!
//! One task per run: connect, reconcile subscriptions, pump inbound frames
//! into the snapshot, and back off between attempts. The command channel is
//! raced against every await point, so `stop()` is honoured whether the task
//! is connecting, connected, or sleeping.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::Shared;
use crate::error::WsError;
use crate::ws::transport::{Connection, Connector, FrameSink, Inbound, Outbound};
use crate::ws::{ConnectionState, MessageIn, MessageOut, SubscriptionSet};

// ─── Commands from public API to background task ─────────────────────────────

#[derive(Debug)]
pub(crate) enum Command {
    /// The desired set changed; send whatever the connection is missing.
    SyncSubscriptions,
    /// The instrument changed; re-send the full set.
    Resubscribe,
    Shutdown,
}

// ─── Background task state ───────────────────────────────────────────────────

pub(crate) struct TaskState {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    epoch: u64,
    reconnect_attempts: u32,
}

impl TaskState {
    pub(crate) fn new(
        shared: Arc<Shared>,
        connector: Arc<dyn Connector>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        epoch: u64,
    ) -> Self {
        Self {
            shared,
            connector,
            cmd_rx,
            epoch,
            reconnect_attempts: 0,
        }
    }

    fn set_state(&self, state: ConnectionState) -> bool {
        self.shared.set_state(self.epoch, state)
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

pub(crate) async fn run_task(mut task: TaskState) {
    loop {
        // ── 1. Attempt connection ────────────────────────────────────────
        let lost = match attempt_connect(&mut task).await {
            None => return,
            Some(Ok(connection)) => {
                // ── 2. Connected ─────────────────────────────────────────
                if !task.set_state(ConnectionState::Connected) {
                    close(connection.sink).await;
                    return;
                }
                task.reconnect_attempts = 0;
                tracing::info!("Market data WebSocket connected");

                match run_connected(&mut task, connection).await {
                    Some(state) => state,
                    None => return,
                }
            }
            Some(Err(e)) => {
                tracing::error!("WebSocket connection failed: {}", e);
                ConnectionState::Error
            }
        };

        // ── 3. Post-disconnect: report, back off, retry ──────────────────
        if !task.set_state(lost) {
            return;
        }
        if !backoff_sleep(&mut task).await {
            return;
        }
        if !task.set_state(ConnectionState::Connecting) {
            return;
        }
    }
}

/// Connect, bounded by the configured timeout. `None` if shut down meanwhile.
async fn attempt_connect(task: &mut TaskState) -> Option<Result<Connection, WsError>> {
    let config = task.shared.config();
    let connect = tokio::time::timeout(
        config.connect_timeout,
        task.connector.connect(&config.url),
    );
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => {
                return Some(result.unwrap_or(Err(WsError::Timeout)));
            }
            cmd = task.cmd_rx.recv() => match cmd {
                // Reconciled once connected.
                Some(Command::SyncSubscriptions) | Some(Command::Resubscribe) => {}
                Some(Command::Shutdown) | None => return None,
            }
        }
    }
}

/// The inner connected loop. Returns the state to report once the
/// connection is lost, or `None` on shutdown.
async fn run_connected(task: &mut TaskState, connection: Connection) -> Option<ConnectionState> {
    let Connection {
        mut sink,
        mut stream,
    } = connection;
    let mut sent = SubscriptionSet::new();

    let desired = task.shared.desired();
    if !desired.is_empty() {
        tracing::info!("Subscribing to {} channel(s)", desired.len());
    }
    reconcile(task, &mut sink, &mut sent).await;

    loop {
        tokio::select! {
            // ── a) Incoming frame ────────────────────────────────────────
            frame = stream.next() => match frame {
                Some(Ok(Inbound::Text(text))) => handle_text(task, &text),
                Some(Ok(Inbound::Close { code, reason })) => {
                    tracing::info!("WebSocket closed by server: {} {}", code, reason);
                    return Some(ConnectionState::Disconnected);
                }
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {}", e);
                    return Some(ConnectionState::Error);
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Some(ConnectionState::Disconnected);
                }
            },

            // ── b) Command from public API ───────────────────────────────
            cmd = task.cmd_rx.recv() => match cmd {
                Some(Command::SyncSubscriptions) => reconcile(task, &mut sink, &mut sent).await,
                Some(Command::Resubscribe) => {
                    resubscribe(task, &mut sink, &mut sent).await;
                }
                Some(Command::Shutdown) | None => {
                    close(sink).await;
                    return None;
                }
            },
        }
    }
}

// ─── Inbound ─────────────────────────────────────────────────────────────────

fn handle_text(task: &TaskState, text: &str) {
    match MessageIn::parse(text) {
        Ok(MessageIn::MarketUpdate(update)) => {
            for issue in &update.issues {
                tracing::warn!("Dropped malformed field: {}", issue);
            }
            if !update.has_data() && !update.issues.is_empty() {
                return;
            }
            task.shared.publish_update(task.epoch, update);
        }
        Ok(MessageIn::ServerError(err)) => {
            tracing::warn!("Server error: {}", err);
            task.shared.publish_server_error(task.epoch, &err);
        }
        Ok(MessageIn::Ignored(kind)) => {
            tracing::debug!("Ignoring message of type {:?}", kind);
        }
        Err(e) => {
            tracing::warn!("WS deserialization error: {}, raw: {}", e, text);
        }
    }
}

// ─── Outbound ────────────────────────────────────────────────────────────────

/// Send what the connection is missing relative to the desired set.
async fn reconcile(task: &TaskState, sink: &mut FrameSink, sent: &mut SubscriptionSet) {
    let diff = task.shared.desired().diff(sent);
    let instrument = task.shared.config().instrument;

    if !diff.added.is_empty() {
        let msg = MessageOut::subscribe(diff.added.clone(), instrument.clone());
        match send_msg(sink, &msg).await {
            Ok(()) => {
                sent.insert_all(diff.added);
            }
            Err(e) => tracing::warn!("Failed to subscribe: {}", e),
        }
    }
    if !diff.removed.is_empty() {
        let msg = MessageOut::unsubscribe(diff.removed.clone(), instrument);
        match send_msg(sink, &msg).await {
            Ok(()) => {
                sent.remove_all(diff.removed);
            }
            Err(e) => tracing::warn!("Failed to unsubscribe: {}", e),
        }
    }
}

/// Re-send the full desired set with the current instrument.
async fn resubscribe(task: &TaskState, sink: &mut FrameSink, sent: &mut SubscriptionSet) {
    let desired = task.shared.desired();
    let instrument = task.shared.config().instrument;
    if desired.is_empty() && instrument.is_none() {
        return;
    }

    tracing::info!("Resubscribing to {} channel(s)", desired.len());
    let msg = MessageOut::subscribe(desired.to_vec(), instrument);
    match send_msg(sink, &msg).await {
        Ok(()) => *sent = desired,
        Err(e) => tracing::warn!("Failed to resubscribe: {}", e),
    }
}

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut FrameSink, msg: &MessageOut) -> Result<(), WsError> {
    let json = serde_json::to_string(msg).map_err(|e| WsError::SendFailed(e.to_string()))?;
    sink.send(Outbound::Text(json)).await
}

async fn close(mut sink: FrameSink) {
    if let Err(e) = sink.send(Outbound::Close).await {
        tracing::debug!("Close frame not sent: {}", e);
    }
    let _ = sink.close().await;
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

/// Sleep before the next attempt. `false` if the attempt bound is exhausted
/// or the task was shut down meanwhile.
async fn backoff_sleep(task: &mut TaskState) -> bool {
    task.reconnect_attempts += 1;
    let config = task.shared.config();

    if let Some(max) = config.max_reconnect_attempts {
        if task.reconnect_attempts > max {
            tracing::error!("Giving up after {} reconnect attempt(s)", max);
            task.set_state(ConnectionState::Error);
            return false;
        }
    }

    let delay = config.backoff.delay(task.reconnect_attempts);
    tracing::info!(
        "Reconnect attempt {}/{} in {}ms",
        task.reconnect_attempts,
        config
            .max_reconnect_attempts
            .map_or_else(|| "unbounded".to_string(), |m| m.to_string()),
        delay.as_millis()
    );

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = task.cmd_rx.recv() => match cmd {
                Some(Command::SyncSubscriptions) | Some(Command::Resubscribe) => {}
                Some(Command::Shutdown) | None => return false,
            }
        }
    }
}
