//! Decoding of raw per-peer records into [`NodeInfo`].

use std::collections::HashMap;

use serde_json::Value;
use url::{Host, Url};

use ethbackend_core::proto::{NodeInfoReply, NodesInfoReply};
use ethbackend_core::{BackendError, NodeInfo, NodePorts};

/// Decode every record of `reply`.
///
/// A reply without records is an error. One bad record fails the whole batch.
pub fn decode_nodes_info(reply: NodesInfoReply) -> Result<Vec<NodeInfo>, BackendError> {
    if reply.nodes_info.is_empty() {
        return Err(BackendError::EmptyNodesInfo);
    }
    reply.nodes_info.into_iter().map(decode_node).collect()
}

fn decode_node(node: NodeInfoReply) -> Result<NodeInfo, BackendError> {
    let protocols = decode_protocols(&node.protocols)?;
    let ports = NodePorts {
        discovery: narrow_port(&node.id, "discovery", node.ports.discovery)?,
        listener: narrow_port(&node.id, "listener", node.ports.listener)?,
    };

    Ok(NodeInfo {
        ip: ip_from_enode(&node.enode),
        enode: node.enode,
        id: node.id,
        enr: node.enr,
        listen_addr: node.listener_addr,
        name: node.name,
        ports,
        protocols,
    })
}

/// Protocol name → that protocol's metadata, left as a generic JSON tree.
fn decode_protocols(raw: &[u8]) -> Result<HashMap<String, Value>, BackendError> {
    let protocols: Option<HashMap<String, Value>> =
        serde_json::from_slice(raw).map_err(BackendError::ProtocolsMetadata)?;
    Ok(protocols.unwrap_or_default())
}

fn narrow_port(id: &str, kind: &'static str, value: u64) -> Result<u16, BackendError> {
    u16::try_from(value).map_err(|_| BackendError::PortOutOfRange {
        id: id.to_string(),
        kind,
        value,
    })
}

/// Host part of an `enode://<id>@<host>:<port>` URL.
///
/// Falls back to the whole enode string when it cannot be parsed.
pub fn ip_from_enode(enode: &str) -> String {
    let Ok(url) = Url::parse(enode) else {
        return enode.to_string();
    };
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        Some(Host::Domain(host)) if !host.is_empty() => host.to_string(),
        _ => enode.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethbackend_core::proto::NodeInfoPorts;
    use serde_json::json;

    fn record(id: &str, protocols: &str) -> NodeInfoReply {
        NodeInfoReply {
            id: id.into(),
            name: "erigon/v2.40.0/linux-amd64/go1.19".into(),
            enode: format!("enode://{id}@10.0.0.7:30303?discport=30304"),
            enr: "enr:-J24QB".into(),
            ports: NodeInfoPorts {
                discovery: 30304,
                listener: 30303,
            },
            listener_addr: "[::]:30303".into(),
            protocols: protocols.as_bytes().to_vec(),
        }
    }

    #[test]
    fn empty_reply_is_an_error() {
        let err = decode_nodes_info(NodesInfoReply::default()).unwrap_err();
        assert!(matches!(err, BackendError::EmptyNodesInfo));
        assert_eq!(err.to_string(), "empty nodesInfo response");
    }

    #[test]
    fn decodes_every_record() {
        let reply = NodesInfoReply {
            nodes_info: vec![
                record("aa", r#"{"eth":{"version":66}}"#),
                record("bb", "{}"),
            ],
        };
        let nodes = decode_nodes_info(reply).unwrap();
        assert_eq!(nodes.len(), 2);

        let first = &nodes[0];
        assert_eq!(first.id, "aa");
        assert_eq!(first.ip, "10.0.0.7");
        assert_eq!(first.listen_addr, "[::]:30303");
        assert_eq!(first.ports.discovery, 30304);
        assert_eq!(first.ports.listener, 30303);
        assert_eq!(first.protocols["eth"], json!({"version": 66}));

        assert!(nodes[1].protocols.is_empty());
    }

    #[test]
    fn string_protocol_values_are_not_decoded_again() {
        let reply = NodesInfoReply {
            nodes_info: vec![record("aa", r#"{"eth":"{\"version\":66}"}"#), record("bb", "{}")],
        };
        let nodes = decode_nodes_info(reply).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[0].protocols["eth"],
            Value::String(r#"{"version":66}"#.into())
        );
        assert!(nodes[1].protocols.is_empty());
    }

    #[test]
    fn protocol_values_are_kept_untyped() {
        let reply = NodesInfoReply {
            nodes_info: vec![record("aa", r#"{"eth":"handshake","snap":null,"les":[1,2]}"#)],
        };
        let nodes = decode_nodes_info(reply).unwrap();
        let protocols = &nodes[0].protocols;
        assert_eq!(protocols["eth"], json!("handshake"));
        assert_eq!(protocols["snap"], Value::Null);
        assert_eq!(protocols["les"], json!([1, 2]));
    }

    #[test]
    fn null_protocols_decode_to_empty_map() {
        let reply = NodesInfoReply {
            nodes_info: vec![record("aa", "null")],
        };
        assert!(decode_nodes_info(reply).unwrap()[0].protocols.is_empty());
    }

    #[test]
    fn malformed_protocols_fail_the_batch() {
        let reply = NodesInfoReply {
            nodes_info: vec![
                record("aa", "{}"),
                record("bb", "{not json"),
                record("cc", "{}"),
            ],
        };
        let err = decode_nodes_info(reply).unwrap_err();
        assert!(matches!(err, BackendError::ProtocolsMetadata(_)));
        assert!(err.to_string().starts_with("cannot decode protocols metadata: "));
    }

    #[test]
    fn non_object_protocols_fail() {
        let reply = NodesInfoReply {
            nodes_info: vec![record("aa", "[1,2,3]")],
        };
        assert!(decode_nodes_info(reply).is_err());
    }

    #[test]
    fn oversized_port_is_rejected() {
        let mut node = record("aa", "{}");
        node.ports.listener = 70_000;
        let err = decode_nodes_info(NodesInfoReply {
            nodes_info: vec![node],
        })
        .unwrap_err();
        match err {
            BackendError::PortOutOfRange { id, kind, value } => {
                assert_eq!(id, "aa");
                assert_eq!(kind, "listener");
                assert_eq!(value, 70_000);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn largest_port_fits() {
        let mut node = record("aa", "{}");
        node.ports.discovery = u64::from(u16::MAX);
        let nodes = decode_nodes_info(NodesInfoReply {
            nodes_info: vec![node],
        })
        .unwrap();
        assert_eq!(nodes[0].ports.discovery, u16::MAX);
    }

    #[test]
    fn ip_from_enode_variants() {
        assert_eq!(ip_from_enode("enode://ab@127.0.0.1:30303"), "127.0.0.1");
        assert_eq!(ip_from_enode("enode://ab@[::1]:30303"), "::1");
        assert_eq!(ip_from_enode("enode://ab@node.example:30303"), "node.example");
        assert_eq!(ip_from_enode("not an enode"), "not an enode");
    }
}
