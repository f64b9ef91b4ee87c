//! ethbackend-remote — [`ApiBackend`](ethbackend_core::ApiBackend) over a remote service.
//!
//! [`RemoteBackend`] adapts an [`EthBackendClient`](ethbackend_core::EthBackendClient)
//! to the local backend interface:
//! - version gate run once at startup
//! - unary calls with status errors flattened to their message
//! - chain-event and log subscriptions driven by the caller's task
//! - node-info records decoded into [`NodeInfo`](ethbackend_core::NodeInfo)
//!
//! The backend never retries, never caches and never spawns tasks.

pub mod node_info;
pub mod remote;
mod subscription;

pub use remote::RemoteBackend;
