//! Frame to record normalization

use std::time::{SystemTime, UNIX_EPOCH};

use crate::record::{payload_preview, PacketRecord, TransportProtocol};

use super::frame::ParsedFrame;

/// Reduce a parsed frame to a [`PacketRecord`]
///
/// Never fails and never blocks. `captured_at` only feeds the record id; the
/// record timestamp is taken from the wall clock at the time of this call, so
/// under load it reflects processing order rather than wire order.
pub fn normalize(frame: &ParsedFrame<'_>, captured_at: SystemTime) -> PacketRecord {
    normalize_at(frame, captured_at, SystemTime::now())
}

/// [`normalize`] with an explicit normalization time
pub fn normalize_at(frame: &ParsedFrame<'_>, captured_at: SystemTime, now: SystemTime) -> PacketRecord {
    let timestamp_ms = unix_millis(now);

    let (src_addr, dst_addr) = match frame.ip {
        Some(ip) => (Some(ip.source), Some(ip.destination)),
        None => (None, None),
    };

    // First match wins: TCP, then UDP, then ICMP
    let (protocol, ports) = if let Some(tcp) = frame.tcp {
        (TransportProtocol::Tcp, Some((tcp.source, tcp.destination)))
    } else if let Some(udp) = frame.udp {
        (TransportProtocol::Udp, Some((udp.source, udp.destination)))
    } else if frame.icmp.is_some() {
        (TransportProtocol::Icmp, None)
    } else {
        (TransportProtocol::Other, None)
    };

    PacketRecord {
        id: record_id(timestamp_ms, captured_at),
        timestamp_ms,
        src_addr,
        dst_addr,
        protocol,
        src_port: ports.map(|(src, _)| src),
        dst_port: ports.map(|(_, dst)| dst),
        length: frame.length,
        payload_preview: frame.payload.and_then(payload_preview),
    }
}

/// Record id: normalization millis joined with the capture time in seconds
fn record_id(timestamp_ms: i64, captured_at: SystemTime) -> String {
    let capture = captured_at.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!(
        "{}-{}.{:06}",
        timestamp_ms,
        capture.as_secs(),
        capture.subsec_micros()
    )
}

fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
