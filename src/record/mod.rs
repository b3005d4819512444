//! Packet record model
//!
//! A [`PacketRecord`] is the compact, serializable summary of one captured
//! frame. It is built once by the normalizer and then only read: the hub
//! serializes it a single time and every subscriber shares the resulting
//! [`Bytes`] buffer.

use std::fmt::Write as _;
use std::net::IpAddr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum number of payload bytes carried in `payload_preview`
pub const PAYLOAD_PREVIEW_BYTES: usize = 16;

/// Transport protocol reported for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportProtocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl TransportProtocol {
    /// Wire name of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Tcp => "TCP",
            TransportProtocol::Udp => "UDP",
            TransportProtocol::Icmp => "ICMP",
            TransportProtocol::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed packet, reduced to its metadata
///
/// Field names on the wire follow the dashboard schema (`srcIp`, `dstPort`, ...).
/// Absent optional fields are sent as explicit `null`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Best-effort unique identifier within a run
    pub id: String,

    /// Wall clock milliseconds at normalization time
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,

    #[serde(rename = "srcIp")]
    pub src_addr: Option<IpAddr>,

    #[serde(rename = "dstIp")]
    pub dst_addr: Option<IpAddr>,

    pub protocol: TransportProtocol,

    #[serde(rename = "srcPort")]
    pub src_port: Option<u16>,

    #[serde(rename = "dstPort")]
    pub dst_port: Option<u16>,

    /// Total captured frame length in bytes
    pub length: usize,

    /// Lowercase hex of at most the first 16 payload bytes
    #[serde(rename = "payloadPreview")]
    pub payload_preview: Option<String>,
}

impl PacketRecord {
    /// Serialize into a JSON buffer suitable for a single text frame
    pub fn to_json_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Hex-encode the first [`PAYLOAD_PREVIEW_BYTES`] of `payload`
///
/// Returns `None` for an empty payload.
pub fn payload_preview(payload: &[u8]) -> Option<String> {
    if payload.is_empty() {
        return None;
    }

    let head = &payload[..payload.len().min(PAYLOAD_PREVIEW_BYTES)];
    let mut out = String::with_capacity(head.len() * 2);
    for byte in head {
        // Writing into a String cannot fail
        let _ = write!(out, "{:02x}", byte);
    }
    Some(out)
}
