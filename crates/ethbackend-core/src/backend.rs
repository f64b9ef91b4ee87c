//! The `ApiBackend` trait — what the API layer calls.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::BackendError;
use crate::proto::{SubscribeLogsReply, SubscribeReply};
use crate::requestor::LogsRequestSlot;
use crate::types::{Address, NodeInfo};

/// Interface used by the API layer.
///
/// An implementation may work with an in-process node or with a remote one,
/// which is why every method takes a [`CallContext`] and returns a `Result`.
#[async_trait]
pub trait ApiBackend: Send + Sync {
    async fn etherbase(&self, ctx: &CallContext) -> Result<Address, BackendError>;

    async fn net_version(&self, ctx: &CallContext) -> Result<u64, BackendError>;

    async fn net_peer_count(&self, ctx: &CallContext) -> Result<u64, BackendError>;

    async fn protocol_version(&self, ctx: &CallContext) -> Result<u64, BackendError>;

    async fn client_version(&self, ctx: &CallContext) -> Result<String, BackendError>;

    /// Deliver chain events to `on_event` until the stream ends.
    ///
    /// Runs for the lifetime of the stream; spawn it on its own task.
    async fn subscribe(
        &self,
        ctx: &CallContext,
        on_event: &mut (dyn FnMut(SubscribeReply) + Send),
    ) -> Result<(), BackendError>;

    /// Deliver logs to `on_logs` until the stream ends, publishing the
    /// stream's sender into `requestor` once it is open.
    async fn subscribe_logs(
        &self,
        ctx: &CallContext,
        on_logs: &mut (dyn FnMut(SubscribeLogsReply) + Send),
        requestor: &LogsRequestSlot,
    ) -> Result<(), BackendError>;

    async fn node_info(&self, ctx: &CallContext, limit: u32) -> Result<Vec<NodeInfo>, BackendError>;
}
