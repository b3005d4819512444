//! Layer views over a raw captured frame
//!
//! [`ParsedFrame`] exposes the optional network, transport and payload layers
//! of one frame. Parsing never fails: a truncated or unrecognized header just
//! leaves the corresponding view unset, and parsing stops at that layer.
//!
//! ```text
//!  link header ─► IPv4 / IPv6 ─► TCP | UDP | ICMP | ICMPv6 ─► payload
//!  (Ethernet,      (ip)           (tcp / udp / icmp)          (payload)
//!   VLAN, SLL,
//!   null, raw)
//! ```

use std::net::IpAddr;

use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::icmpv6::Icmpv6Packet;
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const NULL_HEADER_LEN: usize = 4;
const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;
const TCP_MIN_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const ICMP_HEADER_LEN: usize = 8;

/// Link-layer framing of captured data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Ethernet II, optionally 802.1Q / 802.1ad tagged
    Ethernet,
    /// Bare IPv4 or IPv6 packet, version taken from the first nibble
    RawIp,
    /// BSD loopback: 4-byte address family in host byte order
    Null,
    /// Linux cooked capture (SLL v1)
    LinuxSll,
}

/// Network-layer view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpLayer {
    pub source: IpAddr,
    pub destination: IpAddr,
}

/// TCP or UDP header view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayer {
    pub source: u16,
    pub destination: u16,
}

/// ICMP or ICMPv6 header view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpLayer {
    pub icmp_type: u8,
    pub code: u8,
}

/// A captured frame with its recognized layers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFrame<'a> {
    /// Total captured length in bytes
    pub length: usize,
    pub ip: Option<IpLayer>,
    pub tcp: Option<PortLayer>,
    pub udp: Option<PortLayer>,
    pub icmp: Option<IcmpLayer>,
    /// Application-layer bytes, `None` when empty or not located
    pub payload: Option<&'a [u8]>,
}

impl<'a> ParsedFrame<'a> {
    /// Build the layer views for `data` framed as `link`
    pub fn parse(link: LinkType, data: &'a [u8]) -> Self {
        let mut frame = ParsedFrame {
            length: data.len(),
            ..Default::default()
        };

        match link {
            LinkType::Ethernet => frame.parse_ethernet(data),
            LinkType::RawIp => frame.parse_raw_ip(data),
            LinkType::Null => frame.parse_null(data),
            LinkType::LinuxSll => frame.parse_sll(data),
        }

        frame
    }

    fn parse_ethernet(&mut self, data: &'a [u8]) {
        let Some(ethernet) = EthernetPacket::new(data) else {
            return;
        };

        let mut ethertype = ethernet.get_ethertype();
        let mut offset = ETHERNET_HEADER_LEN;

        // Peel stacked VLAN tags
        while matches!(
            ethertype,
            EtherTypes::Vlan | EtherTypes::PBridge | EtherTypes::QinQ
        ) {
            let Some(vlan) = data.get(offset..).and_then(VlanPacket::new) else {
                return;
            };
            ethertype = vlan.get_ethertype();
            offset += VLAN_TAG_LEN;
        }

        self.parse_ethertype(ethertype, &data[offset..]);
    }

    fn parse_sll(&mut self, data: &'a [u8]) {
        if data.len() < SLL_HEADER_LEN {
            return;
        }
        let protocol = u16::from_be_bytes([data[14], data[15]]);
        self.parse_ethertype(EtherType(protocol), &data[SLL_HEADER_LEN..]);
    }

    fn parse_null(&mut self, data: &'a [u8]) {
        if data.len() < NULL_HEADER_LEN {
            return;
        }
        let raw = [data[0], data[1], data[2], data[3]];
        // The family is written in the capturing host's byte order
        let family = match u32::from_le_bytes(raw) {
            family @ (2 | 24 | 28 | 30) => family,
            _ => u32::from_be_bytes(raw),
        };

        let rest = &data[NULL_HEADER_LEN..];
        match family {
            2 => self.parse_ipv4(rest),
            24 | 28 | 30 => self.parse_ipv6(rest),
            _ => {}
        }
    }

    fn parse_raw_ip(&mut self, data: &'a [u8]) {
        match data.first().map(|b| b >> 4) {
            Some(4) => self.parse_ipv4(data),
            Some(6) => self.parse_ipv6(data),
            _ => {}
        }
    }

    fn parse_ethertype(&mut self, ethertype: EtherType, data: &'a [u8]) {
        match ethertype {
            EtherTypes::Ipv4 => self.parse_ipv4(data),
            EtherTypes::Ipv6 => self.parse_ipv6(data),
            _ => {}
        }
    }

    fn parse_ipv4(&mut self, data: &'a [u8]) {
        let Some(ip) = Ipv4Packet::new(data) else {
            return;
        };

        let header_len = usize::from(ip.get_header_length()) * 4;
        if header_len < IPV4_MIN_HEADER_LEN || header_len > data.len() {
            return;
        }

        self.ip = Some(IpLayer {
            source: IpAddr::V4(ip.get_source()),
            destination: IpAddr::V4(ip.get_destination()),
        });

        // Ethernet padding past total_length is not payload
        let end = usize::from(ip.get_total_length()).clamp(header_len, data.len());
        let body = &data[header_len..end];

        if ip.get_fragment_offset() != 0 {
            // Transport header lives in the first fragment only
            self.set_payload(body);
            return;
        }

        self.parse_transport(ip.get_next_level_protocol(), body);
    }

    fn parse_ipv6(&mut self, data: &'a [u8]) {
        let Some(ip) = Ipv6Packet::new(data) else {
            return;
        };

        self.ip = Some(IpLayer {
            source: IpAddr::V6(ip.get_source()),
            destination: IpAddr::V6(ip.get_destination()),
        });

        let end = (IPV6_HEADER_LEN + usize::from(ip.get_payload_length())).min(data.len());
        let mut body = &data[IPV6_HEADER_LEN..end];
        let mut next = ip.get_next_header();

        loop {
            match next {
                IpNextHeaderProtocols::Hopopt
                | IpNextHeaderProtocols::Ipv6Route
                | IpNextHeaderProtocols::Ipv6Opts => {
                    if body.len() < 2 {
                        return;
                    }
                    let len = (usize::from(body[1]) + 1) * 8;
                    if len > body.len() {
                        return;
                    }
                    next = IpNextHeaderProtocol(body[0]);
                    body = &body[len..];
                }
                IpNextHeaderProtocols::Ipv6Frag => {
                    if body.len() < 8 {
                        return;
                    }
                    let offset = u16::from_be_bytes([body[2], body[3]]) >> 3;
                    next = IpNextHeaderProtocol(body[0]);
                    body = &body[8..];
                    if offset != 0 {
                        self.set_payload(body);
                        return;
                    }
                }
                _ => break,
            }
        }

        self.parse_transport(next, body);
    }

    fn parse_transport(&mut self, protocol: IpNextHeaderProtocol, data: &'a [u8]) {
        match protocol {
            IpNextHeaderProtocols::Tcp => self.parse_tcp(data),
            IpNextHeaderProtocols::Udp => self.parse_udp(data),
            IpNextHeaderProtocols::Icmp => {
                if let Some(icmp) = IcmpPacket::new(data) {
                    self.icmp = Some(IcmpLayer {
                        icmp_type: icmp.get_icmp_type().0,
                        code: icmp.get_icmp_code().0,
                    });
                    self.set_payload(data.get(ICMP_HEADER_LEN..).unwrap_or_default());
                }
            }
            IpNextHeaderProtocols::Icmpv6 => {
                if let Some(icmp) = Icmpv6Packet::new(data) {
                    self.icmp = Some(IcmpLayer {
                        icmp_type: icmp.get_icmpv6_type().0,
                        code: icmp.get_icmpv6_code().0,
                    });
                    self.set_payload(data.get(ICMP_HEADER_LEN..).unwrap_or_default());
                }
            }
            // Unrecognized transport: everything after the IP header is payload
            _ => self.set_payload(data),
        }
    }

    fn parse_tcp(&mut self, data: &'a [u8]) {
        let Some(tcp) = TcpPacket::new(data) else {
            return;
        };

        self.tcp = Some(PortLayer {
            source: tcp.get_source(),
            destination: tcp.get_destination(),
        });

        let offset = usize::from(tcp.get_data_offset()) * 4;
        if (TCP_MIN_HEADER_LEN..=data.len()).contains(&offset) {
            self.set_payload(&data[offset..]);
        }
    }

    fn parse_udp(&mut self, data: &'a [u8]) {
        let Some(udp) = UdpPacket::new(data) else {
            return;
        };

        self.udp = Some(PortLayer {
            source: udp.get_source(),
            destination: udp.get_destination(),
        });

        let declared = usize::from(udp.get_length());
        let end = if declared >= UDP_HEADER_LEN {
            declared.min(data.len())
        } else {
            data.len()
        };
        self.set_payload(&data[UDP_HEADER_LEN..end]);
    }

    fn set_payload(&mut self, data: &'a [u8]) {
        self.payload = (!data.is_empty()).then_some(data);
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    const SRC: [u8; 4] = [10, 0, 0, 1];
    const DST: [u8; 4] = [10, 0, 0, 2];

    #[test]
    fn test_parse_tcp_over_ethernet() {
        let data = ipv4_ethernet(SRC, DST, 6, &tcp(443, 51000, b"GET /"));
        let frame = ParsedFrame::parse(LinkType::Ethernet, &data);

        assert_eq!(frame.length, data.len());
        let ip = frame.ip.unwrap();
        assert_eq!(ip.source, IpAddr::from(SRC));
        assert_eq!(ip.destination, IpAddr::from(DST));
        assert_eq!(frame.tcp, Some(PortLayer { source: 443, destination: 51000 }));
        assert!(frame.udp.is_none());
        assert_eq!(frame.payload, Some(&b"GET /"[..]));
    }

    #[test]
    fn test_parse_udp_ignores_ethernet_padding() {
        let mut data = ipv4_ethernet(SRC, DST, 17, &udp(53, 40000, b"\x12\x34"));
        data.extend([0u8; 12]);
        let frame = ParsedFrame::parse(LinkType::Ethernet, &data);

        assert_eq!(frame.udp, Some(PortLayer { source: 53, destination: 40000 }));
        assert_eq!(frame.payload, Some(&[0x12, 0x34][..]));
        assert_eq!(frame.length, data.len());
    }

    #[test]
    fn test_parse_icmp_without_body() {
        let data = ipv4_ethernet(SRC, DST, 1, &icmp_echo(&[]));
        let frame = ParsedFrame::parse(LinkType::Ethernet, &data);

        assert_eq!(frame.icmp, Some(IcmpLayer { icmp_type: 8, code: 0 }));
        assert!(frame.payload.is_none());
    }

    #[test]
    fn test_parse_vlan_tagged() {
        let mut data = vec![0u8; 12];
        data.extend([0x81, 0x00, 0x00, 0x64, 0x08, 0x00]);
        data.extend(ipv4(SRC, DST, 17, &udp(1000, 2000, b"x")));
        let frame = ParsedFrame::parse(LinkType::Ethernet, &data);

        assert!(frame.ip.is_some());
        assert_eq!(frame.udp, Some(PortLayer { source: 1000, destination: 2000 }));
    }

    #[test]
    fn test_parse_arp_has_no_layers() {
        let mut data = vec![0xffu8; 12];
        data.extend([0x08, 0x06]);
        data.extend([0u8; 28]);
        let frame = ParsedFrame::parse(LinkType::Ethernet, &data);

        assert_eq!(frame.length, 42);
        assert!(frame.ip.is_none());
        assert!(frame.tcp.is_none() && frame.udp.is_none() && frame.icmp.is_none());
        assert!(frame.payload.is_none());
    }

    #[test]
    fn test_parse_truncated_frames() {
        let data = ipv4_ethernet(SRC, DST, 6, &tcp(1, 2, b""));

        for cut in 0..data.len() {
            // Must never panic, whatever the cut point
            let _ = ParsedFrame::parse(LinkType::Ethernet, &data[..cut]);
        }

        // IP header intact, TCP header cut short
        let frame = ParsedFrame::parse(LinkType::Ethernet, &data[..14 + 20 + 10]);
        assert!(frame.ip.is_some());
        assert!(frame.tcp.is_none());
    }

    #[test]
    fn test_parse_raw_ipv6_udp() {
        let payload = udp(5353, 5353, b"mdns");
        let mut data = vec![0x60, 0, 0, 0];
        data.extend((payload.len() as u16).to_be_bytes());
        data.extend([17, 255]);
        data.extend("fe80::1".parse::<std::net::Ipv6Addr>().unwrap().octets());
        data.extend("ff02::fb".parse::<std::net::Ipv6Addr>().unwrap().octets());
        data.extend(&payload);

        let frame = ParsedFrame::parse(LinkType::RawIp, &data);
        let ip = frame.ip.unwrap();
        assert_eq!(ip.source, "fe80::1".parse::<IpAddr>().unwrap());
        assert_eq!(frame.udp, Some(PortLayer { source: 5353, destination: 5353 }));
        assert_eq!(frame.payload, Some(&b"mdns"[..]));
    }

    #[test]
    fn test_parse_null_loopback() {
        let mut data = 2u32.to_le_bytes().to_vec();
        data.extend(ipv4([127, 0, 0, 1], [127, 0, 0, 1], 6, &tcp(8765, 50000, b"")));
        let frame = ParsedFrame::parse(LinkType::Null, &data);

        assert!(frame.ip.is_some());
        assert_eq!(frame.tcp, Some(PortLayer { source: 8765, destination: 50000 }));
        assert!(frame.payload.is_none());
    }

    #[test]
    fn test_parse_linux_sll() {
        let mut data = vec![0u8; 14];
        data.extend([0x08, 0x00]);
        data.extend(ipv4(SRC, DST, 1, &icmp_echo(b"ping")));
        let frame = ParsedFrame::parse(LinkType::LinuxSll, &data);

        assert!(frame.icmp.is_some());
        assert_eq!(frame.payload, Some(&b"ping"[..]));
    }

    #[test]
    fn test_unknown_ip_protocol_keeps_payload() {
        // GRE
        let data = ipv4_ethernet(SRC, DST, 47, &[0x00, 0x00, 0x08, 0x00]);
        let frame = ParsedFrame::parse(LinkType::Ethernet, &data);

        assert!(frame.ip.is_some());
        assert!(frame.tcp.is_none() && frame.udp.is_none() && frame.icmp.is_none());
        assert_eq!(frame.payload, Some(&[0x00, 0x00, 0x08, 0x00][..]));
    }
}
