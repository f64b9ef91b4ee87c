//! ethbackend-ws — ETHBACKEND over JSON-RPC on a single WebSocket.
//!
//! # Features
//! - Auto-reconnect on disconnect (exponential backoff)
//! - Readiness tracking for wait-for-ready calls
//! - Server streams as `ethbackend_subscribe*` subscriptions
//! - Request multiplexing over a single connection
//!
//! # Wire convention
//! - unary: `ethbackend_<method>` with the request as the only param
//! - streams: `ethbackend_subscribe` / `ethbackend_subscribeLogs` return a
//!   subscription id; items arrive as `ethbackend_subscription` notifications,
//!   `ethbackend_subscriptionClosed` ends the stream
//! - log filters: `ethbackend_logsFilter [subscription, filter]`

pub mod client;
pub mod request;
pub mod subscriptions;

pub use client::{WsBackendClient, WsClientConfig};
pub use subscriptions::{SubscriptionId, SubscriptionManager};
