//! The `EthBackendClient` trait — the remote service contract a transport implements.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::proto::{
    ClientVersionReply, ClientVersionRequest, EtherbaseReply, EtherbaseRequest, LogsFilterRequest,
    NetPeerCountReply, NetPeerCountRequest, NetVersionReply, NetVersionRequest, NodesInfoReply,
    NodesInfoRequest, ProtocolVersionReply, ProtocolVersionRequest, SubscribeLogsReply,
    SubscribeReply, SubscribeRequest, VersionReply,
};

/// Replies of a server stream. The stream ending (`None`) is a clean close.
pub type ReplyStream<T> = BoxStream<'static, Result<T, TransportError>>;

/// Per-call transport options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Wait for the connection to become ready instead of failing fast.
    pub wait_for_ready: bool,
}

impl CallOptions {
    pub const fn wait_for_ready() -> Self {
        Self {
            wait_for_ready: true,
        }
    }
}

/// Sending half of the bidirectional logs stream.
///
/// `&mut self` keeps a single writer per stream.
#[async_trait]
pub trait LogsRequestSink: Send + 'static {
    async fn send(&mut self, req: LogsFilterRequest) -> Result<(), TransportError>;
}

/// Both halves of an open logs stream.
pub struct LogsStream {
    pub sink: Box<dyn LogsRequestSink>,
    pub replies: ReplyStream<SubscribeLogsReply>,
}

impl std::fmt::Debug for LogsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogsStream").finish_non_exhaustive()
    }
}

/// The remote ETHBACKEND service.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn EthBackendClient>`.
#[async_trait]
pub trait EthBackendClient: Send + Sync + 'static {
    /// Interface version implemented by the server.
    async fn version(&self, opts: CallOptions) -> Result<VersionReply, TransportError>;

    async fn etherbase(
        &self,
        req: EtherbaseRequest,
        opts: CallOptions,
    ) -> Result<EtherbaseReply, TransportError>;

    async fn net_version(
        &self,
        req: NetVersionRequest,
        opts: CallOptions,
    ) -> Result<NetVersionReply, TransportError>;

    async fn net_peer_count(
        &self,
        req: NetPeerCountRequest,
        opts: CallOptions,
    ) -> Result<NetPeerCountReply, TransportError>;

    async fn protocol_version(
        &self,
        req: ProtocolVersionRequest,
        opts: CallOptions,
    ) -> Result<ProtocolVersionReply, TransportError>;

    async fn client_version(
        &self,
        req: ClientVersionRequest,
        opts: CallOptions,
    ) -> Result<ClientVersionReply, TransportError>;

    async fn node_info(
        &self,
        req: NodesInfoRequest,
        opts: CallOptions,
    ) -> Result<NodesInfoReply, TransportError>;

    /// Open the server stream of chain events.
    async fn subscribe(
        &self,
        req: SubscribeRequest,
        opts: CallOptions,
    ) -> Result<ReplyStream<SubscribeReply>, TransportError>;

    /// Open the bidirectional logs stream.
    async fn subscribe_logs(&self, opts: CallOptions) -> Result<LogsStream, TransportError>;
}
