//! Reassembled packet representation
//!
//! The unit handed to the flow dispatcher once reassembly has run. Carries the
//! decoded layer 3/4 headers plus the decoder flags the dispatcher filters on.

use std::net::IpAddr;
use std::time::Instant;
use serde::{Deserialize, Serialize};

/// IP protocol numbers the stream layer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpProtocol {
    /// Protocol 0, tracked by the generic IP session tracker
    Ip,
    Icmp,
    Tcp,
    Udp,
    Icmpv6,
    Other(u8),
}

impl From<u8> for IpProtocol {
    fn from(val: u8) -> Self {
        match val {
            0 => IpProtocol::Ip,
            1 => IpProtocol::Icmp,
            6 => IpProtocol::Tcp,
            17 => IpProtocol::Udp,
            58 => IpProtocol::Icmpv6,
            other => IpProtocol::Other(other),
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(val: IpProtocol) -> Self {
        match val {
            IpProtocol::Ip => 0,
            IpProtocol::Icmp => 1,
            IpProtocol::Tcp => 6,
            IpProtocol::Udp => 17,
            IpProtocol::Icmpv6 => 58,
            IpProtocol::Other(v) => v,
        }
    }
}

impl std::fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpProtocol::Ip => write!(f, "IP"),
            IpProtocol::Icmp => write!(f, "ICMP"),
            IpProtocol::Tcp => write!(f, "TCP"),
            IpProtocol::Udp => write!(f, "UDP"),
            IpProtocol::Icmpv6 => write!(f, "ICMPv6"),
            IpProtocol::Other(n) => write!(f, "Proto({})", n),
        }
    }
}

/// Packet direction relative to connection initiator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    /// From client to server (initiator -> responder)
    ToServer,
    /// From server to client (responder -> initiator)
    ToClient,
    #[default]
    Unknown,
}

/// Network layer header summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer3 {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    /// Next protocol number (IPv4 protocol / IPv6 next header)
    pub protocol: u8,
}

/// Decoder flags attached to a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketFlags {
    /// IP fragment (more-fragments set or non-zero offset)
    pub fragment: bool,
    /// IPv4 header checksum did not verify
    pub ip_checksum_error: bool,
    /// Pseudo-packet synthesized by stream reassembly
    pub rebuilt_stream: bool,
}

/// Unified packet representation for the stream layer
#[derive(Debug, Clone)]
pub struct Packet {
    /// Packet arrival timestamp
    pub timestamp: Instant,
    /// Unique packet ID
    pub id: u64,
    /// IP layer, `None` when no structurally valid header was decoded
    pub layer3: Option<Layer3>,
    pub src_port: u16,
    pub dst_port: u16,
    pub flags: PacketFlags,
    /// Packet direction, filled in by the session tracker
    pub direction: Direction,
    pub payload: Vec<u8>,
    /// Raw packet length (including headers)
    pub raw_len: u32,
}

impl Packet {
    /// Create a packet with a valid layer 3 header and no payload
    pub fn new(src_ip: IpAddr, dst_ip: IpAddr, protocol: IpProtocol) -> Self {
        Self {
            timestamp: Instant::now(),
            id: 0,
            layer3: Some(Layer3 {
                src_ip,
                dst_ip,
                protocol: protocol.into(),
            }),
            src_port: 0,
            dst_port: 0,
            flags: PacketFlags::default(),
            direction: Direction::Unknown,
            payload: Vec::new(),
            raw_len: 0,
        }
    }

    /// Set transport ports
    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> Self {
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    /// Get IP protocol, `None` without a layer 3 header
    pub fn protocol(&self) -> Option<IpProtocol> {
        self.layer3.as_ref().map(|l3| IpProtocol::from(l3.protocol))
    }

    pub fn src_ip(&self) -> Option<IpAddr> {
        self.layer3.as_ref().map(|l3| l3.src_ip)
    }

}
