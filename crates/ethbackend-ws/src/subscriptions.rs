//! Routing of subscription notifications to their streams.
//!
//! Each open stream owns the receiving end of a channel registered here.
//! Dropping the entry ends the stream cleanly; a lost connection ends every
//! stream with an error instead. Streams are not re-opened after a reconnect.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use ethbackend_core::TransportError;

use crate::client::WsCommand;

/// A subscription ID returned by an `ethbackend_subscribe*` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One item routed to a subscription stream.
pub type Delivery = Result<Value, TransportError>;

struct SubscriptionEntry {
    /// `"events"` or `"logs"`, for diagnostics.
    kind: &'static str,
    sender: mpsc::UnboundedSender<Delivery>,
}

/// Open subscriptions of one connection.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    entries: Arc<Mutex<HashMap<SubscriptionId, SubscriptionEntry>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscription and return the receiving end of its stream.
    pub fn register(
        &self,
        id: SubscriptionId,
        kind: &'static str,
    ) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries
            .lock()
            .unwrap()
            .insert(id, SubscriptionEntry { kind, sender: tx });
        rx
    }

    /// Forward one notification to its subscription.
    ///
    /// Returns `false` if the subscription is unknown or its stream was dropped.
    pub fn dispatch(&self, id: &SubscriptionId, message: Value) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let delivered = match entries.get(id) {
            Some(entry) => entry.sender.send(Ok(message)).is_ok(),
            None => return false,
        };
        if !delivered {
            entries.remove(id);
        }
        delivered
    }

    /// End a subscription cleanly; its stream yields `None` after the
    /// messages already delivered.
    pub fn close(&self, id: &SubscriptionId) -> bool {
        self.entries.lock().unwrap().remove(id).is_some()
    }

    /// End every subscription with `Closed`.
    pub fn fail_all(&self) {
        let drained: Vec<_> = self.entries.lock().unwrap().drain().collect();
        for (id, entry) in drained {
            tracing::debug!(subscription = %id, kind = entry.kind, "failing subscription");
            let _ = entry.sender.send(Err(TransportError::Closed));
        }
    }

    /// Number of open subscriptions.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if there are no open subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed stream over one subscription. Unsubscribes when dropped early.
pub(crate) struct SubscriptionStream<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Delivery>,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    finished: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T> SubscriptionStream<T> {
    pub(crate) fn new(
        id: SubscriptionId,
        rx: mpsc::UnboundedReceiver<Delivery>,
        cmd_tx: mpsc::UnboundedSender<WsCommand>,
    ) -> Self {
        Self {
            id,
            rx,
            cmd_tx,
            finished: false,
            _item: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Stream for SubscriptionStream<T> {
    type Item = Result<T, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(value))) => {
                Poll::Ready(Some(serde_json::from_value(value).map_err(TransportError::from)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for SubscriptionStream<T> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.cmd_tx.send(WsCommand::Unsubscribe(self.id.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn register_and_dispatch() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0xdeadbeef".into());
        let mut rx = mgr.register(id.clone(), "events");

        assert!(mgr.dispatch(&id, serde_json::json!({"type": "HEADER"})));

        let msg = rx.try_recv().unwrap().unwrap();
        assert_eq!(msg["type"], "HEADER");
    }

    #[test]
    fn dispatch_to_dropped_stream_removes_entry() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x1".into());
        drop(mgr.register(id.clone(), "logs"));
        assert!(!mgr.dispatch(&id, Value::Null));
        assert!(mgr.is_empty());
    }

    #[test]
    fn close_ends_stream_after_pending_messages() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x2".into());
        let mut rx = mgr.register(id.clone(), "events");
        mgr.dispatch(&id, Value::from(1));
        assert!(mgr.close(&id));

        assert!(rx.try_recv().unwrap().is_ok());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn fail_all_sends_closed() {
        let mgr = SubscriptionManager::new();
        let mut a = mgr.register(SubscriptionId("0xa".into()), "events");
        let mut b = mgr.register(SubscriptionId("0xb".into()), "logs");
        mgr.fail_all();
        assert_eq!(mgr.len(), 0);
        assert!(matches!(a.try_recv(), Ok(Err(TransportError::Closed))));
        assert!(matches!(b.try_recv(), Ok(Err(TransportError::Closed))));
    }

    #[tokio::test]
    async fn typed_stream_decodes_and_ends() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x3".into());
        let rx = mgr.register(id.clone(), "events");
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let mut stream = SubscriptionStream::<u64>::new(id.clone(), rx, cmd_tx);

        mgr.dispatch(&id, Value::from(42));
        mgr.close(&id);

        assert_eq!(stream.next().await.unwrap().unwrap(), 42);
        assert!(stream.next().await.is_none());
        drop(stream);
        // finished streams do not unsubscribe
        assert!(cmd_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_open_stream_unsubscribes() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x4".into());
        let rx = mgr.register(id.clone(), "logs");
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        drop(SubscriptionStream::<u64>::new(id.clone(), rx, cmd_tx));

        match cmd_rx.try_recv() {
            Ok(WsCommand::Unsubscribe(got)) => assert_eq!(got, id),
            _ => panic!("expected unsubscribe"),
        }
    }
}
