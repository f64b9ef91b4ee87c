//! The published sender of the open logs stream.
//!
//! The logs subscription publishes its sending half into a [`LogsRequestSlot`]
//! so other tasks can push filter updates while the subscription keeps
//! receiving. Only the latest published sender is live: publishing a new one,
//! or the stream ending, makes earlier [`LogsRequester`]s stale. Fetch the
//! current requester before each send rather than holding on to one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::client::LogsRequestSink;
use crate::error::{normalize, BackendError};
use crate::proto::LogsFilterRequest;

/// Sends filter requests on one logs stream.
pub struct LogsRequester {
    generation: u64,
    sink: AsyncMutex<Box<dyn LogsRequestSink>>,
    retired: AtomicBool,
}

impl LogsRequester {
    fn new(generation: u64, sink: Box<dyn LogsRequestSink>) -> Self {
        Self {
            generation,
            sink: AsyncMutex::new(sink),
            retired: AtomicBool::new(false),
        }
    }

    /// Push a filter update. Concurrent callers are serialized.
    pub async fn send(&self, req: LogsFilterRequest) -> Result<(), BackendError> {
        if self.is_stale() {
            return Err(BackendError::StaleSender);
        }
        let mut sink = self.sink.lock().await;
        // may have been retired while waiting for the lock
        if self.is_stale() {
            return Err(BackendError::StaleSender);
        }
        sink.send(req).await.map_err(normalize)
    }

    /// Returns `true` once the stream behind this sender is no longer current.
    pub fn is_stale(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Publication counter; increases by one per published stream.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for LogsRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogsRequester")
            .field("generation", &self.generation)
            .field("stale", &self.is_stale())
            .finish()
    }
}

#[derive(Default)]
struct SlotState {
    current: Option<Arc<LogsRequester>>,
    generation: u64,
}

/// Single-slot cell holding the sender of the currently open logs stream.
///
/// Cheap to clone; clones share the slot.
#[derive(Clone, Default)]
pub struct LogsRequestSlot {
    state: Arc<Mutex<SlotState>>,
}

impl LogsRequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `sink` as the live sender, retiring the previous one.
    pub fn publish(&self, sink: Box<dyn LogsRequestSink>) -> Arc<LogsRequester> {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        let requester = Arc::new(LogsRequester::new(state.generation, sink));
        if let Some(previous) = state.current.replace(Arc::clone(&requester)) {
            previous.retire();
        }
        tracing::debug!(generation = state.generation, "published logs requester");
        requester
    }

    /// The live sender, if a logs stream is open.
    pub fn current(&self) -> Option<Arc<LogsRequester>> {
        self.state.lock().unwrap().current.clone()
    }

    /// Send on whichever stream is live right now.
    pub async fn send(&self, req: LogsFilterRequest) -> Result<(), BackendError> {
        let requester = self.current().ok_or(BackendError::NoLogsSubscription)?;
        requester.send(req).await
    }

    /// Mark `requester` stale and clear the slot if it still holds it.
    pub fn retire(&self, requester: &Arc<LogsRequester>) {
        requester.retire();
        let mut state = self.state.lock().unwrap();
        if state
            .current
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, requester))
        {
            state.current = None;
        }
    }

    /// Number of senders published so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }
}

impl std::fmt::Debug for LogsRequestSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("LogsRequestSlot")
            .field("generation", &state.generation)
            .field("open", &state.current.is_some())
            .finish()
    }
}
