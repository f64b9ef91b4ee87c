//! Domain types returned to callers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::H160;

/// 20-byte account address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl From<H160> for Address {
    fn from(h: H160) -> Self {
        Self(h.into())
    }
}

impl From<Address> for H160 {
    fn from(a: Address) -> Self {
        H160::from(a.0)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| format!("invalid address {s}: {e}"))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("invalid address {s}: expected 20 bytes, got {}", b.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ports a node listens on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePorts {
    pub discovery: u16,
    pub listener: u16,
}

/// Information about the running node, as reported by its p2p server.
///
/// `protocols` maps a protocol name to whatever metadata that protocol
/// publishes; the shape is owned by the protocol and left undecoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub enode: String,
    pub id: String,
    pub ip: String,
    pub enr: String,
    pub listen_addr: String,
    pub name: String,
    pub ports: NodePorts,
    pub protocols: HashMap<String, Value>,
}
