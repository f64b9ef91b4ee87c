//! Error types.
//!
//! Two layers:
//! - [`TransportError`] is what an [`EthBackendClient`](crate::EthBackendClient)
//!   returns: either a structured [`Status`] reported by the remote side or an
//!   unstructured connection/stream failure.
//! - [`BackendError`] is what callers of [`ApiBackend`](crate::ApiBackend) see.
//!   Remote statuses are flattened to their message by [`normalize`].

use thiserror::Error;

/// Status code attached to a remote-reported failure.
///
/// Numbering follows the gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// Map a JSON-RPC 2.0 error code onto a status code.
    pub fn from_jsonrpc(code: i64) -> Self {
        match code {
            -32700 | -32600 | -32602 => Self::InvalidArgument,
            -32601 => Self::Unimplemented,
            -32603 => Self::Internal,
            -32005 => Self::ResourceExhausted,
            _ => Self::Unknown,
        }
    }

    /// Numeric value of the code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Cancelled => "Canceled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::Aborted => "Aborted",
            Self::OutOfRange => "OutOfRange",
            Self::Unimplemented => "Unimplemented",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
            Self::DataLoss => "DataLoss",
            Self::Unauthenticated => "Unauthenticated",
        };
        f.write_str(name)
    }
}

/// A failure reported by the remote service: a code and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rpc error: code = {code} desc = {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

/// Errors produced by a transport while talking to the remote service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Structured failure reported by the remote side.
    #[error(transparent)]
    Status(#[from] Status),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The connection carrying the call or stream went away.
    #[error("connection closed")]
    Closed,

    /// The caller's context was cancelled.
    #[error("context canceled")]
    Cancelled,

    /// The caller's context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Request timed out at the transport level.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// A payload could not be (de)serialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// The remote status carried by this error, if any.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Status(s) => Some(s),
            _ => None,
        }
    }
}

/// Errors returned to callers of [`ApiBackend`](crate::ApiBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    /// A remote status, reduced to its message. The code is not kept.
    #[error("{0}")]
    Remote(String),

    /// Transport failure, passed through as-is.
    #[error(transparent)]
    Transport(TransportError),

    #[error("nodes info request error: {0}")]
    NodesInfoRequest(#[source] TransportError),

    #[error("empty nodesInfo response")]
    EmptyNodesInfo,

    #[error("cannot decode protocols metadata: {0}")]
    ProtocolsMetadata(#[source] serde_json::Error),

    #[error("cannot decode ports of node {id}: {kind} port {value} is out of range")]
    PortOutOfRange {
        id: String,
        kind: &'static str,
        value: u64,
    },

    /// The logs sender belongs to a stream that was superseded or has ended.
    #[error("logs request sender is stale")]
    StaleSender,

    #[error("no logs subscription is open")]
    NoLogsSubscription,
}

impl BackendError {
    /// Returns `true` if the error carries a message reported by the remote side.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Flatten a transport error for the caller.
///
/// A remote [`Status`] becomes [`BackendError::Remote`] holding only its
/// message; every other error is returned unchanged.
pub fn normalize(err: TransportError) -> BackendError {
    match err {
        TransportError::Status(status) => BackendError::Remote(status.message),
        other => BackendError::Transport(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_only_status_message() {
        let err = normalize(Status::new(Code::NotFound, "etherbase must be explicitly specified").into());
        assert!(err.is_remote());
        assert_eq!(err.to_string(), "etherbase must be explicitly specified");
    }

    #[test]
    fn normalize_passes_other_errors_through() {
        let err = normalize(TransportError::WebSocket("connection reset".into()));
        match err {
            BackendError::Transport(TransportError::WebSocket(msg)) => {
                assert_eq!(msg, "connection reset")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn normalize_keeps_empty_status_message() {
        let err = normalize(Status::new(Code::Unknown, "").into());
        assert_eq!(err.to_string(), "");
    }

    #[test]
    fn jsonrpc_code_mapping() {
        assert_eq!(Code::from_jsonrpc(-32601), Code::Unimplemented);
        assert_eq!(Code::from_jsonrpc(-32603), Code::Internal);
        assert_eq!(Code::from_jsonrpc(-32000), Code::Unknown);
        assert_eq!(Code::Unavailable.as_i32(), 14);
    }

    #[test]
    fn status_display() {
        let status = Status::unavailable("connection not ready");
        assert_eq!(
            status.to_string(),
            "rpc error: code = Unavailable desc = connection not ready"
        );
    }
}
