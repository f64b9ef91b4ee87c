//! Wire types of the ETHBACKEND service.
//!
//! Field names serialize in camelCase; byte blobs travel as `0x`-prefixed hex.
//! Fixed-size hashes are split into big-endian 64-bit limbs ([`H128`],
//! [`H160`], [`H256`]) the way the service defines them.

use serde::{Deserialize, Serialize};

/// 128-bit value as two big-endian limbs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct H128 {
    pub hi: u64,
    pub lo: u64,
}

/// 160-bit value (an address).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct H160 {
    pub hi: H128,
    pub lo: u32,
}

/// 256-bit value (a hash or topic).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct H256 {
    pub hi: H128,
    pub lo: H128,
}

impl From<[u8; 20]> for H160 {
    fn from(b: [u8; 20]) -> Self {
        let mut hi_hi = [0u8; 8];
        let mut hi_lo = [0u8; 8];
        let mut lo = [0u8; 4];
        hi_hi.copy_from_slice(&b[0..8]);
        hi_lo.copy_from_slice(&b[8..16]);
        lo.copy_from_slice(&b[16..20]);
        Self {
            hi: H128 {
                hi: u64::from_be_bytes(hi_hi),
                lo: u64::from_be_bytes(hi_lo),
            },
            lo: u32::from_be_bytes(lo),
        }
    }
}

impl From<H160> for [u8; 20] {
    fn from(h: H160) -> Self {
        let mut out = [0u8; 20];
        out[0..8].copy_from_slice(&h.hi.hi.to_be_bytes());
        out[8..16].copy_from_slice(&h.hi.lo.to_be_bytes());
        out[16..20].copy_from_slice(&h.lo.to_be_bytes());
        out
    }
}

impl From<[u8; 32]> for H256 {
    fn from(b: [u8; 32]) -> Self {
        let limb = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&b[i * 8..(i + 1) * 8]);
            u64::from_be_bytes(buf)
        };
        Self {
            hi: H128 { hi: limb(0), lo: limb(1) },
            lo: H128 { hi: limb(2), lo: limb(3) },
        }
    }
}

impl From<H256> for [u8; 32] {
    fn from(h: H256) -> Self {
        let mut out = [0u8; 32];
        out[0..8].copy_from_slice(&h.hi.hi.to_be_bytes());
        out[8..16].copy_from_slice(&h.hi.lo.to_be_bytes());
        out[16..24].copy_from_slice(&h.lo.hi.to_be_bytes());
        out[24..32].copy_from_slice(&h.lo.lo.to_be_bytes());
        out
    }
}

// ─── Version ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

// ─── Unary calls ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtherbaseRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtherbaseReply {
    #[serde(default)]
    pub address: H160,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetVersionRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetVersionReply {
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPeerCountRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPeerCountReply {
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersionRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersionReply {
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientVersionRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientVersionReply {
    pub node_name: String,
}

// ─── Chain events ─────────────────────────────────────────────────────────────

/// Kind of chain event carried by the event subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    #[default]
    Header,
    PendingLogs,
    PendingBlock,
    NewSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub kind: Event,
}

/// One chain event. `data` is opaque to this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeReply {
    #[serde(rename = "type")]
    pub kind: Event,
    #[serde(with = "hex_bytes", default)]
    pub data: Vec<u8>,
}

// ─── Logs ─────────────────────────────────────────────────────────────────────

/// Filter update pushed on the open logs stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsFilterRequest {
    pub all_addresses: bool,
    #[serde(default)]
    pub addresses: Vec<H160>,
    pub all_topics: bool,
    #[serde(default)]
    pub topics: Vec<H256>,
}

impl LogsFilterRequest {
    /// A filter matching every log.
    pub fn all() -> Self {
        Self {
            all_addresses: true,
            addresses: vec![],
            all_topics: true,
            topics: vec![],
        }
    }
}

/// One log delivered by the logs stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeLogsReply {
    pub address: H160,
    pub block_hash: H256,
    pub block_number: u64,
    #[serde(with = "hex_bytes", default)]
    pub data: Vec<u8>,
    pub log_index: u64,
    #[serde(default)]
    pub topics: Vec<H256>,
    pub transaction_hash: H256,
    pub transaction_index: u64,
    #[serde(default)]
    pub removed: bool,
}

// ─── Node info ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesInfoRequest {
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodesInfoReply {
    #[serde(default)]
    pub nodes_info: Vec<NodeInfoReply>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfoPorts {
    pub discovery: u64,
    pub listener: u64,
}

/// Raw per-peer record. `protocols` is a JSON object encoded as bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfoReply {
    pub id: String,
    pub name: String,
    pub enode: String,
    pub enr: String,
    #[serde(default)]
    pub ports: NodeInfoPorts,
    pub listener_addr: String,
    #[serde(with = "hex_bytes", default)]
    pub protocols: Vec<u8>,
}

/// `0x`-prefixed hex encoding for byte blobs.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T: AsRef<[u8]>, S: Serializer>(bytes: T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes.as_ref())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
