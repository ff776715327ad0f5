//! Packet decoding
//!
//! Turns raw frames into [`Packet`] values using `etherparse`. A frame that does
//! not decode to a valid IP header still yields a packet, with `layer3` left
//! empty, so the dispatcher can count and drop it.

use std::net::IpAddr;
use std::time::Instant;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};

use super::packet::{Direction, Layer3, Packet, PacketFlags};

/// Decode an Ethernet II frame
pub fn parse_ethernet_packet(data: &[u8], packet_id: u64) -> Packet {
    build_packet(SlicedPacket::from_ethernet(data).ok(), data.len(), packet_id)
}

/// Decode a raw IPv4/IPv6 datagram
pub fn parse_ip_packet(data: &[u8], packet_id: u64) -> Packet {
    build_packet(SlicedPacket::from_ip(data).ok(), data.len(), packet_id)
}

fn build_packet(sliced: Option<SlicedPacket<'_>>, raw_len: usize, packet_id: u64) -> Packet {
    let mut pkt = Packet {
        timestamp: Instant::now(),
        id: packet_id,
        layer3: None,
        src_port: 0,
        dst_port: 0,
        flags: PacketFlags::default(),
        direction: Direction::Unknown,
        payload: Vec::new(),
        raw_len: u32::try_from(raw_len).unwrap_or(u32::MAX),
    };

    let Some(sliced) = sliced else {
        return pkt;
    };

    match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            pkt.layer3 = Some(Layer3 {
                src_ip: IpAddr::from(header.source_addr()),
                dst_ip: IpAddr::from(header.destination_addr()),
                protocol: ipv4.payload().ip_number.0,
            });
            pkt.flags.fragment = header.more_fragments() || header.fragments_offset().value() != 0;
            pkt.flags.ip_checksum_error =
                header.header_checksum() != header.to_header().calc_header_checksum();
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            pkt.layer3 = Some(Layer3 {
                src_ip: IpAddr::from(header.source_addr()),
                dst_ip: IpAddr::from(header.destination_addr()),
                protocol: ipv6.payload().ip_number.0,
            });
            pkt.flags.fragment = ipv6.is_payload_fragmented();
        }
        _ => return pkt,
    }

    match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            pkt.src_port = tcp.source_port();
            pkt.dst_port = tcp.destination_port();
            pkt.payload = tcp.payload().to_vec();
        }
        Some(TransportSlice::Udp(udp)) => {
            pkt.src_port = udp.source_port();
            pkt.dst_port = udp.destination_port();
            pkt.payload = udp.payload().to_vec();
        }
        Some(TransportSlice::Icmpv4(icmp)) => pkt.payload = icmp.payload().to_vec(),
        Some(TransportSlice::Icmpv6(icmp)) => pkt.payload = icmp.payload().to_vec(),
        _ => {}
    }

    pkt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::IpProtocol;
    use etherparse::PacketBuilder;

    fn eth_tcp(payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([0; 6], [0; 6])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(40000, 80, 1, 65535);
        let mut buf = Vec::new();
        builder.write(&mut buf, payload).unwrap();
        buf
    }

    #[test]
    fn test_parse_ethernet_tcp() {
        let data = eth_tcp(b"GET / HTTP/1.1\r\n\r\n");
        let pkt = parse_ethernet_packet(&data, 7);

        assert_eq!(pkt.id, 7);
        assert_eq!(pkt.protocol(), Some(IpProtocol::Tcp));
        assert_eq!(pkt.src_port, 40000);
        assert_eq!(pkt.dst_port, 80);
        assert_eq!(pkt.payload, b"GET / HTTP/1.1\r\n\r\n");
        assert!(!pkt.flags.fragment);
        assert!(!pkt.flags.ip_checksum_error);
    }

    #[test]
    fn test_parse_raw_ip_udp() {
        let builder = PacketBuilder::ipv4([192, 168, 0, 1], [192, 168, 0, 2], 32).udp(5000, 53);
        let mut buf = Vec::new();
        builder.write(&mut buf, b"query").unwrap();

        let pkt = parse_ip_packet(&buf, 1);
        assert_eq!(pkt.protocol(), Some(IpProtocol::Udp));
        assert_eq!(pkt.payload, b"query");
    }

    #[test]
    fn test_corrupted_checksum_flagged() {
        let mut data = eth_tcp(b"x");
        // IPv4 header checksum lives at bytes 10..12 of the IP header
        data[14 + 10] ^= 0xff;
        let pkt = parse_ethernet_packet(&data, 0);
        assert!(pkt.layer3.is_some());
        assert!(pkt.flags.ip_checksum_error);
    }

    #[test]
    fn test_truncated_frame_has_no_layer3() {
        let pkt = parse_ethernet_packet(&[0, 1, 2], 0);
        assert!(pkt.layer3.is_none());
        assert_eq!(pkt.raw_len, 3);
    }
}
