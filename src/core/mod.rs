//! Core shared types for packet processing and detection
//!
//! - `Packet`: reassembled unit seen by the stream layer
//! - `parser`: frame decoding with `etherparse`
//! - `event`: severity and detection type for alerts

pub mod event;
pub mod packet;
pub mod parser;

pub use event::{DetectionType, Severity};
pub use packet::{Direction, IpProtocol, Layer3, Packet, PacketFlags};
pub use parser::{parse_ethernet_packet, parse_ip_packet};
