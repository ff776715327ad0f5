//! Stream dispatcher
//!
//! Entry point of the stream layer for one worker: drops packets that must
//! not create or update sessions, counts the rest per transport and hands
//! them to the matching session tracker.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::config::StreamConfig;
use crate::core::packet::{Direction, IpProtocol, Packet};
use crate::protocols::http::{HttpFlowData, SourceId};
use super::stats::{BaseStats, SessionStats, StreamStats};
use super::tracker::{DatagramSession, SessionTracker};

/// Why a packet was not eligible for stream processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Fragment,
    IpChecksum,
    RebuiltStream,
    NoLayer3,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            DropReason::Fragment => "ip fragment",
            DropReason::IpChecksum => "bad ip checksum",
            DropReason::RebuiltStream => "rebuilt stream packet",
            DropReason::NoLayer3 => "no valid ip header",
        };
        f.write_str(reason)
    }
}

/// A configured session tracker
pub enum Tracker {
    Tcp(SessionTracker<HttpFlowData>),
    Udp(SessionTracker<DatagramSession>),
    Icmp(SessionTracker<DatagramSession>),
    Ip(SessionTracker<DatagramSession>),
}

impl Tracker {
    pub fn protocol(&self) -> IpProtocol {
        match self {
            Tracker::Tcp(_) => IpProtocol::Tcp,
            Tracker::Udp(_) => IpProtocol::Udp,
            Tracker::Icmp(_) => IpProtocol::Icmp,
            Tracker::Ip(_) => IpProtocol::Ip,
        }
    }

    pub fn stats(&self) -> &SessionStats {
        match self {
            Tracker::Tcp(t) => t.stats(),
            Tracker::Udp(t) | Tracker::Icmp(t) | Tracker::Ip(t) => t.stats(),
        }
    }

    fn stats_mut(&mut self) -> &mut SessionStats {
        match self {
            Tracker::Tcp(t) => t.stats_mut(),
            Tracker::Udp(t) | Tracker::Icmp(t) | Tracker::Ip(t) => t.stats_mut(),
        }
    }

    fn prune_expired(&mut self, now: Instant) -> usize {
        match self {
            Tracker::Tcp(t) => t.prune_expired(now),
            Tracker::Udp(t) | Tracker::Icmp(t) | Tracker::Ip(t) => t.prune_expired(now),
        }
    }

    fn purge(&mut self) -> usize {
        match self {
            Tracker::Tcp(t) => t.purge(),
            Tracker::Udp(t) | Tracker::Icmp(t) | Tracker::Ip(t) => t.purge(),
        }
    }
}

/// Where a packet went
pub enum Dispatch<'a> {
    /// Not eligible; nothing was counted
    Dropped(DropReason),
    /// TCP session carrying HTTP framing state
    Http {
        flow: &'a mut HttpFlowData,
        source: SourceId,
    },
    /// Connectionless session updated
    Datagram(IpProtocol),
    /// Counted, but no tracker is configured for the transport
    Untracked(IpProtocol),
    /// Counted, but the session limit refused a new session
    Discarded(IpProtocol),
}

/// Transport of a packet that may reach the session trackers
fn admit(pkt: &Packet) -> Result<IpProtocol, DropReason> {
    if pkt.flags.fragment {
        Err(DropReason::Fragment)
    } else if pkt.flags.ip_checksum_error {
        Err(DropReason::IpChecksum)
    } else if pkt.flags.rebuilt_stream {
        Err(DropReason::RebuiltStream)
    } else {
        pkt.protocol().ok_or(DropReason::NoLayer3)
    }
}

/// Why a packet must not reach the session trackers, if any
pub fn drop_reason(pkt: &Packet) -> Option<DropReason> {
    admit(pkt).err()
}

pub fn is_eligible(pkt: &Packet) -> bool {
    drop_reason(pkt).is_none()
}

/// Per-worker stream dispatcher
pub struct StreamDispatcher {
    trackers: Vec<Tracker>,
    stats: BaseStats,
}

impl StreamDispatcher {
    /// Create trackers for every transport with a non-zero session limit
    pub fn new(config: &StreamConfig) -> Self {
        let mut trackers = Vec::with_capacity(4);
        if config.tcp.enabled() {
            trackers.push(Tracker::Tcp(SessionTracker::new(IpProtocol::Tcp, &config.tcp)));
        }
        if config.udp.enabled() {
            trackers.push(Tracker::Udp(SessionTracker::new(IpProtocol::Udp, &config.udp)));
        }
        if config.ip.enabled() {
            trackers.push(Tracker::Ip(SessionTracker::new(IpProtocol::Ip, &config.ip)));
        }
        if config.icmp.enabled() {
            trackers.push(Tracker::Icmp(SessionTracker::new(IpProtocol::Icmp, &config.icmp)));
        }

        info!("Stream dispatcher ready with {} session trackers", trackers.len());
        Self {
            trackers,
            stats: BaseStats::default(),
        }
    }

    fn tracker_mut(&mut self, protocol: IpProtocol) -> Option<&mut Tracker> {
        self.trackers.iter_mut().find(|t| t.protocol() == protocol)
    }

    pub fn tracker(&self, protocol: IpProtocol) -> Option<&Tracker> {
        self.trackers.iter().find(|t| t.protocol() == protocol)
    }

    /// Route one reassembled packet
    pub fn eval<'a>(&'a mut self, pkt: &mut Packet) -> Dispatch<'a> {
        let protocol = match admit(pkt) {
            Ok(protocol) => protocol,
            Err(reason) => {
                trace!("Dropping packet {}: {}", pkt.id, reason);
                return Dispatch::Dropped(reason);
            }
        };

        match protocol {
            IpProtocol::Tcp => self.stats.tcp_packets += 1,
            IpProtocol::Udp => self.stats.udp_packets += 1,
            IpProtocol::Icmp => self.stats.icmp_packets += 1,
            IpProtocol::Ip => self.stats.ip_packets += 1,
            IpProtocol::Icmpv6 | IpProtocol::Other(_) => {
                self.stats.other_packets += 1;
                return Dispatch::Untracked(protocol);
            }
        }

        let payload_len = pkt.payload.len() as u64;
        match self.tracker_mut(protocol) {
            None => Dispatch::Untracked(protocol),
            Some(Tracker::Tcp(tracker)) => match tracker.process(pkt) {
                Some(flow) => {
                    let source = match pkt.direction {
                        Direction::ToClient => SourceId::Server,
                        _ => SourceId::Client,
                    };
                    Dispatch::Http { flow, source }
                }
                None => Dispatch::Discarded(protocol),
            },
            Some(Tracker::Udp(tracker) | Tracker::Icmp(tracker) | Tracker::Ip(tracker)) => {
                match tracker.process(pkt) {
                    Some(session) => {
                        session.packets += 1;
                        session.bytes += payload_len;
                        Dispatch::Datagram(protocol)
                    }
                    None => Dispatch::Discarded(protocol),
                }
            }
        }
    }

    /// Count inspector events against a transport's tracker
    pub fn record_events(&mut self, protocol: IpProtocol, count: u64) {
        if let Some(tracker) = self.tracker_mut(protocol) {
            tracker.stats_mut().events += count;
        }
    }

    /// Expire idle sessions on every tracker
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        self.trackers.iter_mut().map(|t| t.prune_expired(now)).sum()
    }

    /// Release every session on every tracker
    pub fn shutdown(&mut self) -> usize {
        let purged: usize = self.trackers.iter_mut().map(Tracker::purge).sum();
        debug!("Stream dispatcher purged {} sessions", purged);
        purged
    }

    pub fn base_stats(&self) -> &BaseStats {
        &self.stats
    }

    /// Snapshot of this worker's counters
    pub fn stats(&self) -> StreamStats {
        let mut stats = StreamStats {
            base: self.stats,
            ..Default::default()
        };
        for tracker in &self.trackers {
            let slot = match tracker {
                Tracker::Tcp(_) => &mut stats.tcp,
                Tracker::Udp(_) => &mut stats.udp,
                Tracker::Icmp(_) => &mut stats.icmp,
                Tracker::Ip(_) => &mut stats.ip,
            };
            *slot = *tracker.stats();
        }
        stats
    }

    /// Add this worker's counters to `total`
    pub fn sum_into(&self, total: &mut StreamStats) {
        self.stats().sum_into(total);
    }

    /// Clear the counters after they have been summed
    pub fn reset_stats(&mut self) {
        self.stats.reset();
        for tracker in &mut self.trackers {
            tracker.stats_mut().reset();
        }
    }
}
