//! Stream session layer
//!
//! Filters reassembled packets, routes them to per-transport session
//! trackers and keeps the stream peg counters.
//!
//! # Example
//!
//! ```ignore
//! use framewatch::flow::{Dispatch, StreamDispatcher};
//!
//! let mut dispatcher = StreamDispatcher::new(&config.stream);
//! if let Dispatch::Http { flow, source } = dispatcher.eval(&mut packet) {
//!     inspector.process_header(flow, &section);
//! }
//! ```

pub mod dispatcher;
pub mod stats;
pub mod tracker;

pub use dispatcher::{Dispatch, DropReason, StreamDispatcher, Tracker};
pub use stats::{BaseStats, SessionStats, StatsRegistry, StreamStats};
pub use tracker::{DatagramSession, ReleaseReason, SessionData, SessionTracker};

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::core::Packet;

/// Direction-independent session key
///
/// Both directions of a conversation map to the same key: the endpoint that
/// sorts lower is always stored first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub lo_ip: IpAddr,
    pub lo_port: u16,
    pub hi_ip: IpAddr,
    pub hi_port: u16,
    pub protocol: u8,
}

impl FlowKey {
    pub fn new(a: (IpAddr, u16), b: (IpAddr, u16), protocol: u8) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self {
            lo_ip: lo.0,
            lo_port: lo.1,
            hi_ip: hi.0,
            hi_port: hi.1,
            protocol,
        }
    }

    /// Key for a packet, `None` without a layer 3 header
    pub fn from_packet(pkt: &Packet) -> Option<Self> {
        let l3 = pkt.layer3.as_ref()?;
        Some(Self::new(
            (l3.src_ip, pkt.src_port),
            (l3.dst_ip, pkt.dst_port),
            l3.protocol,
        ))
    }
}

impl std::fmt::Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} <-> {}:{} proto {}",
            self.lo_ip, self.lo_port, self.hi_ip, self.hi_port, self.protocol
        )
    }
}
