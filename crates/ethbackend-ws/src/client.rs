//! WebSocket client for the ETHBACKEND service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use ethbackend_core::proto::{
    ClientVersionReply, ClientVersionRequest, EtherbaseReply, EtherbaseRequest, LogsFilterRequest,
    NetPeerCountReply, NetPeerCountRequest, NetVersionReply, NetVersionRequest, NodesInfoReply,
    NodesInfoRequest, ProtocolVersionReply, ProtocolVersionRequest, SubscribeLogsReply,
    SubscribeReply, SubscribeRequest, VersionReply,
};
use ethbackend_core::{
    CallOptions, EthBackendClient, LogsRequestSink, LogsStream, ReplyStream, Status,
    TransportError,
};

use crate::request::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RpcId};
use crate::subscriptions::{Delivery, SubscriptionId, SubscriptionManager, SubscriptionStream};

const NOTIFY_ITEM: &str = "ethbackend_subscription";
const NOTIFY_CLOSED: &str = "ethbackend_subscriptionClosed";

/// Configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Reconnect backoff starting duration.
    pub reconnect_initial: Duration,
    /// Maximum reconnect backoff.
    pub reconnect_max: Duration,
    /// Upper bound on waiting for a reply to a single request.
    pub request_timeout: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

type Opened = (SubscriptionId, mpsc::UnboundedReceiver<Delivery>);

/// Command sent from callers to the background WS task.
pub(crate) enum WsCommand {
    Call {
        req: JsonRpcRequest,
        tx: oneshot::Sender<Result<Value, TransportError>>,
    },
    Subscribe {
        req: JsonRpcRequest,
        kind: &'static str,
        tx: oneshot::Sender<Result<Opened, TransportError>>,
    },
    Unsubscribe(SubscriptionId),
    /// The caller stopped waiting for the reply to this request.
    Forget(u64),
    Close,
}

/// A request waiting for its response.
enum Pending {
    Call(oneshot::Sender<Result<Value, TransportError>>),
    Subscribe {
        kind: &'static str,
        tx: oneshot::Sender<Result<Opened, TransportError>>,
    },
}

impl Pending {
    fn fail(self, err: TransportError) {
        match self {
            Self::Call(tx) => {
                let _ = tx.send(Err(err));
            }
            Self::Subscribe { tx, .. } => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

/// State shared by the client, its log sinks and its streams.
struct Shared {
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    ready: watch::Receiver<bool>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl Shared {
    async fn ensure_ready(&self, opts: CallOptions) -> Result<(), TransportError> {
        if *self.ready.borrow() {
            return Ok(());
        }
        if !opts.wait_for_ready {
            return Err(Status::unavailable("connection not ready").into());
        }
        let mut ready = self.ready.clone();
        ready
            .wait_for(|up| *up)
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn await_reply<T>(
        &self,
        id: u64,
        rx: oneshot::Receiver<Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        let mut waiting = Waiting {
            id,
            cmd_tx: &self.cmd_tx,
            done: false,
        };
        let reply = time::timeout(self.request_timeout, rx).await;
        // a resolved receiver means the task already dropped its entry
        waiting.done = reply.is_ok();
        reply
            .map_err(|_| TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            })?
            .map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
        opts: CallOptions,
    ) -> Result<T, TransportError> {
        self.ensure_ready(opts).await?;
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Call {
                req: JsonRpcRequest::new(id, method, params),
                tx,
            })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;
        let result = self.await_reply(id, rx).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn open(
        &self,
        method: &str,
        params: Vec<Value>,
        kind: &'static str,
        opts: CallOptions,
    ) -> Result<Opened, TransportError> {
        self.ensure_ready(opts).await?;
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Subscribe {
                req: JsonRpcRequest::new(id, method, params),
                kind,
                tx,
            })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;
        self.await_reply(id, rx).await
    }
}

/// Tells the WS task to forget request `id` if the caller gives up on it,
/// whether by timeout or by dropping the call.
struct Waiting<'a> {
    id: u64,
    cmd_tx: &'a mpsc::UnboundedSender<WsCommand>,
    done: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.cmd_tx.send(WsCommand::Forget(self.id));
        }
    }
}

/// ETHBACKEND client over one WebSocket connection.
///
/// A background task owns the socket, reconnects with exponential backoff
/// and multiplexes requests and subscriptions over it.
pub struct WsBackendClient {
    url: String,
    shared: Arc<Shared>,
}

impl WsBackendClient {
    /// Start the background task for `url`. Returns before the first
    /// connection attempt completes.
    pub async fn connect(
        url: impl Into<String>,
        config: WsClientConfig,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        url::Url::parse(&url)
            .map_err(|e| TransportError::Other(format!("invalid URL {url}: {e}")))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let (ready_tx, ready_rx) = watch::channel(false);
        let url_clone = url.clone();
        let task_config = config.clone();

        tokio::spawn(async move {
            ws_task(url_clone, cmd_rx, ready_tx, task_config).await;
        });

        Ok(Self {
            url,
            shared: Arc::new(Shared {
                cmd_tx,
                ready: ready_rx,
                next_id: AtomicU64::new(1),
                request_timeout: config.request_timeout,
            }),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the connection is currently up.
    pub fn is_ready(&self) -> bool {
        *self.shared.ready.borrow()
    }

    async fn unary<Req: Serialize, Rep: DeserializeOwned>(
        &self,
        method: &str,
        req: Req,
        opts: CallOptions,
    ) -> Result<Rep, TransportError> {
        let params = vec![serde_json::to_value(req)?];
        self.shared.call(method, params, opts).await
    }
}

impl Drop for WsBackendClient {
    fn drop(&mut self) {
        let _ = self.shared.cmd_tx.send(WsCommand::Close);
    }
}

/// Sending half of a logs subscription.
struct WsLogsSink {
    id: SubscriptionId,
    shared: Arc<Shared>,
}

#[async_trait]
impl LogsRequestSink for WsLogsSink {
    async fn send(&mut self, req: LogsFilterRequest) -> Result<(), TransportError> {
        let params = vec![Value::String(self.id.0.clone()), serde_json::to_value(req)?];
        let _: Value = self
            .shared
            .call("ethbackend_logsFilter", params, CallOptions::default())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EthBackendClient for WsBackendClient {
    async fn version(&self, opts: CallOptions) -> Result<VersionReply, TransportError> {
        self.shared.call("ethbackend_version", vec![], opts).await
    }

    async fn etherbase(
        &self,
        req: EtherbaseRequest,
        opts: CallOptions,
    ) -> Result<EtherbaseReply, TransportError> {
        self.unary("ethbackend_etherbase", req, opts).await
    }

    async fn net_version(
        &self,
        req: NetVersionRequest,
        opts: CallOptions,
    ) -> Result<NetVersionReply, TransportError> {
        self.unary("ethbackend_netVersion", req, opts).await
    }

    async fn net_peer_count(
        &self,
        req: NetPeerCountRequest,
        opts: CallOptions,
    ) -> Result<NetPeerCountReply, TransportError> {
        self.unary("ethbackend_netPeerCount", req, opts).await
    }

    async fn protocol_version(
        &self,
        req: ProtocolVersionRequest,
        opts: CallOptions,
    ) -> Result<ProtocolVersionReply, TransportError> {
        self.unary("ethbackend_protocolVersion", req, opts).await
    }

    async fn client_version(
        &self,
        req: ClientVersionRequest,
        opts: CallOptions,
    ) -> Result<ClientVersionReply, TransportError> {
        self.unary("ethbackend_clientVersion", req, opts).await
    }

    async fn node_info(
        &self,
        req: NodesInfoRequest,
        opts: CallOptions,
    ) -> Result<NodesInfoReply, TransportError> {
        self.unary("ethbackend_nodeInfo", req, opts).await
    }

    async fn subscribe(
        &self,
        req: SubscribeRequest,
        opts: CallOptions,
    ) -> Result<ReplyStream<SubscribeReply>, TransportError> {
        let params = vec![serde_json::to_value(req)?];
        let (id, rx) = self
            .shared
            .open("ethbackend_subscribe", params, "events", opts)
            .await?;
        let stream = SubscriptionStream::new(id, rx, self.shared.cmd_tx.clone());
        Ok(stream.boxed())
    }

    async fn subscribe_logs(&self, opts: CallOptions) -> Result<LogsStream, TransportError> {
        let (id, rx) = self
            .shared
            .open("ethbackend_subscribeLogs", vec![], "logs", opts)
            .await?;
        let replies: SubscriptionStream<SubscribeLogsReply> =
            SubscriptionStream::new(id.clone(), rx, self.shared.cmd_tx.clone());
        Ok(LogsStream {
            sink: Box::new(WsLogsSink {
                id,
                shared: Arc::clone(&self.shared),
            }),
            replies: replies.boxed(),
        })
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(
    url: String,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    ready: watch::Sender<bool>,
    config: WsClientConfig,
) {
    let subscriptions = SubscriptionManager::new();
    let mut pending: HashMap<u64, Pending> = HashMap::new();
    let mut backoff = config.reconnect_initial;

    loop {
        tracing::info!(url = %url, "connecting via WebSocket");

        let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "WS connect failed, retrying in {backoff:?}");
                time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.reconnect_max);
                continue;
            }
        };

        backoff = config.reconnect_initial;
        let _ = ready.send(true);
        let (mut sink, mut stream) = ws_stream.split();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let (req, entry) = match cmd {
                        None | Some(WsCommand::Close) => {
                            let _ = ready.send(false);
                            fail_everything(&mut pending, &subscriptions);
                            let _ = sink.send(Message::Close(None)).await;
                            return;
                        }
                        Some(WsCommand::Call { req, tx }) => (req, Some(Pending::Call(tx))),
                        Some(WsCommand::Subscribe { req, kind, tx }) => {
                            (req, Some(Pending::Subscribe { kind, tx }))
                        }
                        Some(WsCommand::Unsubscribe(id)) => {
                            subscriptions.close(&id);
                            (unsubscribe_request(id), None)
                        }
                        Some(WsCommand::Forget(id)) => {
                            forget(&mut pending, id);
                            continue;
                        }
                    };
                    if let (RpcId::Number(n), Some(entry)) = (&req.id, entry) {
                        pending.insert(*n, entry);
                    }
                    let msg = match serde_json::to_string(&req) {
                        Ok(msg) => msg,
                        Err(e) => {
                            if let RpcId::Number(n) = req.id {
                                if let Some(entry) = pending.remove(&n) {
                                    entry.fail(e.into());
                                }
                            }
                            continue;
                        }
                    };
                    if sink.send(Message::Text(msg)).await.is_err() {
                        // connection dropped, reconnect
                        break;
                    }
                }
                msg = stream.next() => {
                    match msg {
                        None => break,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WS receive error");
                            break;
                        }
                        Some(Ok(Message::Text(text))) => {
                            let Some(orphan) = handle_message(text.as_str(), &mut pending, &subscriptions) else {
                                continue;
                            };
                            tracing::debug!(subscription = %orphan, "caller gone, unsubscribing");
                            let Ok(msg) = serde_json::to_string(&unsubscribe_request(orphan)) else {
                                continue;
                            };
                            if sink.send(Message::Text(msg)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => break,
                        _ => {}
                    }
                }
            }
        }

        let _ = ready.send(false);
        fail_everything(&mut pending, &subscriptions);
        tracing::warn!(url = %url, "WS disconnected, reconnecting in {backoff:?}");
        time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.reconnect_max);
    }
}

fn fail_everything(pending: &mut HashMap<u64, Pending>, subscriptions: &SubscriptionManager) {
    for (_, entry) in pending.drain() {
        entry.fail(TransportError::Closed);
    }
    subscriptions.fail_all();
}

/// Unsubscribe frames carry id 0, which no caller request uses, so their
/// replies are ignored.
fn unsubscribe_request(id: SubscriptionId) -> JsonRpcRequest {
    JsonRpcRequest::new(0, "ethbackend_unsubscribe", vec![Value::String(id.0)])
}

/// Drop a call the caller stopped waiting for. Subscribe requests stay
/// pending so a late success can still be cancelled on the server.
fn forget(pending: &mut HashMap<u64, Pending>, id: u64) {
    if matches!(pending.get(&id), Some(Pending::Call(_))) {
        pending.remove(&id);
    }
}

/// Route one text frame. Returns the id of a subscription that opened after
/// its caller went away; it must be cancelled on the server.
fn handle_message(
    text: &str,
    pending: &mut HashMap<u64, Pending>,
    subscriptions: &SubscriptionManager,
) -> Option<SubscriptionId> {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        tracing::debug!("failed to parse WS message as JSON");
        return None;
    };

    if val.get("id").is_none() || val.get("method").is_some() {
        if let Ok(note) = serde_json::from_value::<JsonRpcNotification>(val) {
            handle_notification(note, subscriptions);
        }
        return None;
    }

    let Ok(resp) = serde_json::from_value::<JsonRpcResponse>(val) else {
        tracing::debug!("unrecognised WS message");
        return None;
    };
    let RpcId::Number(id) = resp.id else {
        return None;
    };
    let entry = pending.remove(&id)?;

    match entry {
        Pending::Call(tx) => {
            let _ = tx.send(resp.into_result().map_err(TransportError::from));
            None
        }
        Pending::Subscribe { kind, tx } => {
            let opened = resp
                .into_result()
                .map_err(TransportError::from)
                .and_then(|v| serde_json::from_value::<String>(v).map_err(TransportError::from))
                .map(|raw| {
                    let id = SubscriptionId(raw);
                    // registered before the next message is read, so no
                    // notification can slip past
                    let rx = subscriptions.register(id.clone(), kind);
                    (id, rx)
                });
            match tx.send(opened) {
                Err(Ok((id, _))) => {
                    subscriptions.close(&id);
                    Some(id)
                }
                _ => None,
            }
        }
    }
}

fn handle_notification(note: JsonRpcNotification, subscriptions: &SubscriptionManager) {
    let Some(sub) = note.params.get("subscription").and_then(Value::as_str) else {
        return;
    };
    let id = SubscriptionId(sub.to_string());
    match note.method.as_str() {
        NOTIFY_ITEM => {
            let result = note.params.get("result").cloned().unwrap_or(Value::Null);
            if !subscriptions.dispatch(&id, result) {
                tracing::debug!(subscription = %id, "notification for unknown subscription");
            }
        }
        NOTIFY_CLOSED => {
            subscriptions.close(&id);
            tracing::debug!(subscription = %id, "subscription closed by server");
        }
        other => tracing::debug!(method = other, "ignoring notification"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(v: Value) -> String {
        v.to_string()
    }

    #[test]
    fn call_response_resolves_pending() {
        let mut pending = HashMap::new();
        let subs = SubscriptionManager::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(3, Pending::Call(tx));

        handle_message(
            &text(json!({"jsonrpc": "2.0", "id": 3, "result": {"id": 1}})),
            &mut pending,
            &subs,
        );
        assert!(pending.is_empty());
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!({"id": 1}));
    }

    #[test]
    fn error_response_becomes_status() {
        let mut pending = HashMap::new();
        let subs = SubscriptionManager::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(4, Pending::Call(tx));

        handle_message(
            &text(json!({"jsonrpc": "2.0", "id": 4, "error": {"code": -32000, "message": "etherbase must be explicitly specified"}})),
            &mut pending,
            &subs,
        );
        let err = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(
            err.status().map(|s| s.message.as_str()),
            Some("etherbase must be explicitly specified")
        );
    }

    #[test]
    fn subscribe_response_registers_before_notifications() {
        let mut pending = HashMap::new();
        let subs = SubscriptionManager::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(5, Pending::Subscribe { kind: "events", tx });

        handle_message(
            &text(json!({"jsonrpc": "2.0", "id": 5, "result": "0xab"})),
            &mut pending,
            &subs,
        );
        handle_message(
            &text(json!({"jsonrpc": "2.0", "method": NOTIFY_ITEM, "params": {"subscription": "0xab", "result": {"type": "HEADER", "data": "0x01"}}})),
            &mut pending,
            &subs,
        );
        handle_message(
            &text(json!({"jsonrpc": "2.0", "method": NOTIFY_CLOSED, "params": {"subscription": "0xab"}})),
            &mut pending,
            &subs,
        );

        let (id, mut items) = rx.try_recv().unwrap().unwrap();
        assert_eq!(id, SubscriptionId("0xab".into()));
        let first = items.try_recv().unwrap().unwrap();
        assert_eq!(first["data"], "0x01");
        assert!(matches!(
            items.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert!(subs.is_empty());
    }

    #[test]
    fn subscribe_for_gone_caller_is_dropped() {
        let mut pending = HashMap::new();
        let subs = SubscriptionManager::new();
        let (tx, rx) = oneshot::channel();
        drop(rx);
        pending.insert(6, Pending::Subscribe { kind: "logs", tx });

        let orphan = handle_message(
            &text(json!({"jsonrpc": "2.0", "id": 6, "result": "0xcd"})),
            &mut pending,
            &subs,
        );
        assert!(subs.is_empty());
        let orphan = orphan.expect("server-side subscription must be cancelled");
        assert_eq!(orphan, SubscriptionId("0xcd".into()));

        let req = unsubscribe_request(orphan);
        assert_eq!(req.method, "ethbackend_unsubscribe");
        assert_eq!(req.params, vec![json!("0xcd")]);
        assert_eq!(req.id, RpcId::Number(0));
    }

    #[test]
    fn answered_subscribe_needs_no_cleanup() {
        let mut pending = HashMap::new();
        let subs = SubscriptionManager::new();
        let (tx, _rx) = oneshot::channel();
        pending.insert(8, Pending::Subscribe { kind: "events", tx });

        let orphan = handle_message(
            &text(json!({"jsonrpc": "2.0", "id": 8, "result": "0xef"})),
            &mut pending,
            &subs,
        );
        assert!(orphan.is_none());
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn forget_drops_calls_but_keeps_subscribes() {
        let mut pending = HashMap::new();
        let (call_tx, _call_rx) = oneshot::channel();
        let (sub_tx, _sub_rx) = oneshot::channel();
        pending.insert(1, Pending::Call(call_tx));
        pending.insert(2, Pending::Subscribe { kind: "logs", tx: sub_tx });

        forget(&mut pending, 1);
        forget(&mut pending, 2);
        forget(&mut pending, 99);
        assert!(!pending.contains_key(&1));
        assert!(pending.contains_key(&2));
    }

    fn connected(timeout: Duration) -> (Shared, mpsc::UnboundedReceiver<WsCommand>, watch::Sender<bool>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(true);
        let shared = Shared {
            cmd_tx,
            ready: ready_rx,
            next_id: AtomicU64::new(1),
            request_timeout: timeout,
        };
        (shared, cmd_rx, ready_tx)
    }

    #[tokio::test]
    async fn timed_out_call_is_forgotten() {
        let (shared, mut cmd_rx, _ready) = connected(Duration::from_millis(20));

        let err = shared
            .call::<Value>("ethbackend_netPeerCount", vec![], CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { ms: 20 }));

        // keep the reply sender alive so the call really timed out
        let (sent, _tx) = match cmd_rx.try_recv() {
            Ok(WsCommand::Call { req, tx }) => (req.id, tx),
            _ => panic!("expected a call"),
        };
        match cmd_rx.try_recv() {
            Ok(WsCommand::Forget(id)) => assert_eq!(RpcId::Number(id), sent),
            _ => panic!("expected forget"),
        }
    }

    #[tokio::test]
    async fn dropped_call_is_forgotten() {
        let (shared, mut cmd_rx, _ready) = connected(Duration::from_secs(5));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            shared.call::<Value>("ethbackend_netVersion", vec![], CallOptions::default()),
        )
        .await;
        assert!(abandoned.is_err());

        let (sent, _tx) = match cmd_rx.try_recv() {
            Ok(WsCommand::Call { req, tx }) => (req.id, tx),
            _ => panic!("expected a call"),
        };
        match cmd_rx.try_recv() {
            Ok(WsCommand::Forget(id)) => assert_eq!(RpcId::Number(id), sent),
            _ => panic!("expected forget"),
        }
    }

    #[test]
    fn fail_everything_closes_calls_and_streams() {
        let mut pending = HashMap::new();
        let subs = SubscriptionManager::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(7, Pending::Call(tx));
        let mut items = subs.register(SubscriptionId("0x1".into()), "events");

        fail_everything(&mut pending, &subs);
        assert!(matches!(rx.try_recv(), Ok(Err(TransportError::Closed))));
        assert!(matches!(items.try_recv(), Ok(Err(TransportError::Closed))));
    }

    #[tokio::test]
    async fn fail_fast_when_not_ready() {
        let (cmd_tx, _cmd_rx) = mpsc::unbounded_channel();
        let (_ready_tx, ready_rx) = watch::channel(false);
        let shared = Shared {
            cmd_tx,
            ready: ready_rx,
            next_id: AtomicU64::new(1),
            request_timeout: Duration::from_secs(1),
        };
        let err = shared
            .call::<Value>("ethbackend_netVersion", vec![], CallOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.status().map(|s| s.code),
            Some(ethbackend_core::Code::Unavailable)
        );
    }

    #[tokio::test]
    async fn wait_for_ready_blocks_until_connected() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            cmd_tx,
            ready: ready_rx,
            next_id: AtomicU64::new(1),
            request_timeout: Duration::from_secs(5),
        });

        let caller = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                shared
                    .call::<VersionReply>("ethbackend_version", vec![], CallOptions::wait_for_ready())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cmd_rx.try_recv().is_err(), "sent before the connection was ready");

        ready_tx.send(true).unwrap();
        match cmd_rx.recv().await {
            Some(WsCommand::Call { req, tx }) => {
                assert_eq!(req.method, "ethbackend_version");
                tx.send(Ok(json!({"major": 3, "minor": 1, "patch": 0}))).unwrap();
            }
            _ => panic!("expected a call"),
        }
        let reply = caller.await.unwrap().unwrap();
        assert_eq!(reply.major, 3);
        // answered calls leave nothing to forget
        assert!(cmd_rx.try_recv().is_err());
    }
}
