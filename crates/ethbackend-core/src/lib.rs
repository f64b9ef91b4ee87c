//! ethbackend-core — contract and types shared by every backend implementation.
//!
//! # Overview
//!
//! The API layer talks to the node through [`ApiBackend`]. An implementation
//! may live in-process or forward to a remote service; this crate holds what
//! both sides agree on:
//!
//! - [`ApiBackend`] — the local interface every backend exposes
//! - [`EthBackendClient`] — the remote service contract a transport implements
//! - [`proto`] module — request/reply wire types
//! - [`TransportError`] / [`BackendError`] — transport-facing and caller-facing errors
//! - [`CallContext`] — cancellation and deadlines for every call
//! - [`ServiceVersion`] — interface versioning and the compatibility rule
//! - [`LogsRequestSlot`] — the published sender of the open logs stream

pub mod backend;
pub mod client;
pub mod context;
pub mod error;
pub mod proto;
pub mod requestor;
pub mod types;
pub mod version;

pub use backend::ApiBackend;
pub use client::{CallOptions, EthBackendClient, LogsRequestSink, LogsStream, ReplyStream};
pub use context::CallContext;
pub use error::{normalize, BackendError, Code, Status, TransportError};
pub use requestor::{LogsRequestSlot, LogsRequester};
pub use types::{Address, NodeInfo, NodePorts};
pub use version::{ServiceVersion, ETH_BACKEND_API_VERSION};
