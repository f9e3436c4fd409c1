//! Listener registry.
//!
//! Callbacks are cloned out under a read lock and invoked after it is
//! released, so a callback may register or remove listeners itself. A
//! callback that panics is logged and skipped; the remaining listeners and
//! the sync task carry on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::snapshot::MarketSnapshot;
use crate::ws::{ConnectionState, ServerError};

/// Handle returned by the `on_*` registration methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type SnapshotListener = dyn Fn(&Arc<MarketSnapshot>) + Send + Sync;
pub(crate) type StateListener = dyn Fn(ConnectionState) + Send + Sync;
pub(crate) type ErrorListener = dyn Fn(&ServerError) + Send + Sync;

struct Registry<F: ?Sized> {
    entries: RwLock<Vec<(ListenerId, Arc<F>)>>,
}

impl<F: ?Sized> Default for Registry<F> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<F: ?Sized> Registry<F> {
    fn add(&self, id: ListenerId, listener: Arc<F>) {
        self.entries.write().push((id, listener));
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn current(&self) -> Vec<Arc<F>> {
        self.entries.read().iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    snapshot: Registry<SnapshotListener>,
    state: Registry<StateListener>,
    error: Registry<ErrorListener>,
}

impl Listeners {
    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_snapshot(&self, listener: Arc<SnapshotListener>) -> ListenerId {
        let id = self.next_id();
        self.snapshot.add(id, listener);
        id
    }

    pub fn add_state(&self, listener: Arc<StateListener>) -> ListenerId {
        let id = self.next_id();
        self.state.add(id, listener);
        id
    }

    pub fn add_error(&self, listener: Arc<ErrorListener>) -> ListenerId {
        let id = self.next_id();
        self.error.add(id, listener);
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.snapshot.remove(id) || self.state.remove(id) || self.error.remove(id)
    }

    pub fn emit_snapshot(&self, snapshot: &Arc<MarketSnapshot>) {
        for listener in self.snapshot.current() {
            guarded("snapshot", || listener(snapshot));
        }
    }

    pub fn emit_state(&self, state: ConnectionState) {
        for listener in self.state.current() {
            guarded("connection state", || listener(state));
        }
    }

    pub fn emit_error(&self, error: &ServerError) {
        for listener in self.error.current() {
            guarded("server error", || listener(error));
        }
    }
}

fn guarded(kind: &str, call: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(call)) {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        tracing::error!("{} listener panicked: {}", kind, message);
    }
}
