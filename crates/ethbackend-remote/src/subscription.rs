//! Chain-event and log subscriptions.
//!
//! Both block the calling task until the stream ends. A clean close by the
//! remote side returns `Ok(())`; any other receive error is returned as-is.

use std::sync::Arc;

use futures::StreamExt;

use ethbackend_core::proto::{Event, SubscribeLogsReply, SubscribeReply, SubscribeRequest};
use ethbackend_core::{
    normalize, BackendError, CallContext, CallOptions, LogsRequestSlot, LogsRequester, LogsStream,
    ReplyStream, TransportError,
};

use crate::remote::RemoteBackend;

impl RemoteBackend {
    pub(crate) async fn subscribe_events(
        &self,
        ctx: &CallContext,
        on_event: &mut (dyn FnMut(SubscribeReply) + Send),
    ) -> Result<(), BackendError> {
        let request = SubscribeRequest {
            kind: Event::Header,
        };
        let stream = ctx
            .run(self.client.subscribe(request, CallOptions::wait_for_ready()))
            .await
            .map_err(normalize)?;

        receive(ctx, stream, on_event)
            .await
            .map_err(BackendError::Transport)?;

        self.span
            .in_scope(|| tracing::info!("the subscription channel was closed"));
        Ok(())
    }

    pub(crate) async fn subscribe_log_events(
        &self,
        ctx: &CallContext,
        on_logs: &mut (dyn FnMut(SubscribeLogsReply) + Send),
        requestor: &LogsRequestSlot,
    ) -> Result<(), BackendError> {
        let LogsStream { sink, replies } = ctx
            .run(self.client.subscribe_logs(CallOptions::wait_for_ready()))
            .await
            .map_err(normalize)?;

        let published = Published {
            slot: requestor,
            requester: requestor.publish(sink),
        };
        let result = receive(ctx, replies, on_logs).await;
        drop(published);
        result.map_err(BackendError::Transport)?;

        self.span
            .in_scope(|| tracing::info!("the logs subscription channel was closed"));
        Ok(())
    }
}

/// Retires the published requester when the subscription ends, including
/// when its future is dropped before the stream finishes.
struct Published<'a> {
    slot: &'a LogsRequestSlot,
    requester: Arc<LogsRequester>,
}

impl Drop for Published<'_> {
    fn drop(&mut self) {
        self.slot.retire(&self.requester);
    }
}

/// Hand each reply to `on_item` in arrival order until the stream ends.
///
/// End of stream wins over a cancellation observed in the same poll.
async fn receive<T: Send>(
    ctx: &CallContext,
    mut stream: ReplyStream<T>,
    on_item: &mut (dyn FnMut(T) + Send),
) -> Result<(), TransportError> {
    loop {
        let next = tokio::select! {
            biased;
            next = stream.next() => next,
            err = ctx.done() => return Err(err),
        };
        match next {
            None => return Ok(()),
            Some(Err(e)) => return Err(e),
            Some(Ok(item)) => on_item(item),
        }
    }
}
