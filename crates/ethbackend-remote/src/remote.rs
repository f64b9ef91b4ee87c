//! `RemoteBackend` — forwards every [`ApiBackend`] call to the remote service.

use std::sync::Arc;

use async_trait::async_trait;

use ethbackend_core::proto::{
    ClientVersionRequest, EtherbaseRequest, NetPeerCountRequest, NetVersionRequest,
    NodesInfoRequest, ProtocolVersionRequest, SubscribeLogsReply, SubscribeReply,
};
use ethbackend_core::{
    normalize, Address, ApiBackend, BackendError, CallContext, CallOptions, EthBackendClient,
    LogsRequestSlot, NodeInfo, ServiceVersion, ETH_BACKEND_API_VERSION,
};

use crate::node_info::decode_nodes_info;

/// [`ApiBackend`] backed by a remote ETHBACKEND service.
///
/// Every event is emitted inside the span given at construction (by default
/// `remote_service = "eth_backend"`), so it carries that span's fields.
pub struct RemoteBackend {
    pub(crate) client: Arc<dyn EthBackendClient>,
    pub(crate) version: ServiceVersion,
    pub(crate) span: tracing::Span,
}

impl RemoteBackend {
    pub fn new(client: Arc<dyn EthBackendClient>) -> Self {
        Self {
            client,
            version: ETH_BACKEND_API_VERSION,
            span: tracing::info_span!("remote_service", remote_service = "eth_backend"),
        }
    }

    /// Emit events inside `span` instead of the default one.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Override the interface version this client claims to speak.
    pub fn with_version(mut self, version: ServiceVersion) -> Self {
        self.version = version;
        self
    }

    /// Interface version this client was built against.
    pub fn version(&self) -> ServiceVersion {
        self.version
    }

    /// Check that the server speaks a compatible interface version.
    ///
    /// Waits for the connection to become ready. Never fails: a transport
    /// error or a version mismatch is logged and reported as `false`, and
    /// the caller decides whether to carry on.
    pub async fn ensure_version_compatibility(&self) -> bool {
        self.ensure_version_compatibility_with(&CallContext::background())
            .await
    }

    /// [`ensure_version_compatibility`](Self::ensure_version_compatibility)
    /// bounded by `ctx`.
    pub async fn ensure_version_compatibility_with(&self, ctx: &CallContext) -> bool {
        let reply = match ctx
            .run(self.client.version(CallOptions::wait_for_ready()))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                self.span
                    .in_scope(|| tracing::error!(error = %e, "getting Version"));
                return false;
            }
        };

        let server = ServiceVersion::from(reply);
        if !self.version.is_compatible_with(&server) {
            self.span.in_scope(|| {
                tracing::error!(
                    client = %self.version,
                    server = %server,
                    "incompatible interface versions"
                )
            });
            return false;
        }
        self.span.in_scope(|| {
            tracing::info!(client = %self.version, server = %server, "interfaces compatible")
        });
        true
    }
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ApiBackend for RemoteBackend {
    async fn etherbase(&self, ctx: &CallContext) -> Result<Address, BackendError> {
        let reply = ctx
            .run(
                self.client
                    .etherbase(EtherbaseRequest {}, CallOptions::default()),
            )
            .await
            .map_err(normalize)?;
        Ok(Address::from(reply.address))
    }

    async fn net_version(&self, ctx: &CallContext) -> Result<u64, BackendError> {
        let reply = ctx
            .run(
                self.client
                    .net_version(NetVersionRequest {}, CallOptions::default()),
            )
            .await
            .map_err(normalize)?;
        Ok(reply.id)
    }

    async fn net_peer_count(&self, ctx: &CallContext) -> Result<u64, BackendError> {
        let reply = ctx
            .run(
                self.client
                    .net_peer_count(NetPeerCountRequest {}, CallOptions::default()),
            )
            .await
            .map_err(normalize)?;
        Ok(reply.count)
    }

    async fn protocol_version(&self, ctx: &CallContext) -> Result<u64, BackendError> {
        let reply = ctx
            .run(
                self.client
                    .protocol_version(ProtocolVersionRequest {}, CallOptions::default()),
            )
            .await
            .map_err(normalize)?;
        Ok(reply.id)
    }

    async fn client_version(&self, ctx: &CallContext) -> Result<String, BackendError> {
        let reply = ctx
            .run(
                self.client
                    .client_version(ClientVersionRequest {}, CallOptions::default()),
            )
            .await
            .map_err(normalize)?;
        Ok(reply.node_name)
    }

    async fn subscribe(
        &self,
        ctx: &CallContext,
        on_event: &mut (dyn FnMut(SubscribeReply) + Send),
    ) -> Result<(), BackendError> {
        self.subscribe_events(ctx, on_event).await
    }

    async fn subscribe_logs(
        &self,
        ctx: &CallContext,
        on_logs: &mut (dyn FnMut(SubscribeLogsReply) + Send),
        requestor: &LogsRequestSlot,
    ) -> Result<(), BackendError> {
        self.subscribe_log_events(ctx, on_logs, requestor).await
    }

    async fn node_info(&self, ctx: &CallContext, limit: u32) -> Result<Vec<NodeInfo>, BackendError> {
        let reply = ctx
            .run(
                self.client
                    .node_info(NodesInfoRequest { limit }, CallOptions::default()),
            )
            .await
            .map_err(BackendError::NodesInfoRequest)?;
        decode_nodes_info(reply)
    }
}
