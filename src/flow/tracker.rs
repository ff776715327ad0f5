//! Per-transport session tracker
//!
//! Keeps one session per bidirectional flow, bounded by a session limit and
//! expired after an idle timeout.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::core::packet::{Direction, IpProtocol, Packet};
use crate::protocols::http::{ExpectedSection, HttpFlowData};
use super::stats::SessionStats;
use super::FlowKey;

/// Why a session left its tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// Idle past the session timeout
    Timeout,
    /// Expired and freed to make room at the session limit
    Pruned,
    /// Explicitly closed
    Closed,
    /// Tracker shut down
    Purged,
}

/// State a tracker keeps per session
pub trait SessionData: Default {
    /// Called once as the session leaves the tracker
    fn release(&mut self, _reason: ReleaseReason) {}
}

/// Session state for connectionless transports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatagramSession {
    pub packets: u64,
    pub bytes: u64,
}

impl SessionData for DatagramSession {}

impl SessionData for HttpFlowData {
    fn release(&mut self, reason: ReleaseReason) {
        debug!("Terminating HTTP framing state ({:?})", reason);
        self.terminate(ExpectedSection::Closed);
    }
}

struct SessionEntry<S> {
    data: S,
    /// Endpoint that sent the first packet
    initiator: (IpAddr, u16),
    last_seen: Instant,
}

/// Session table for one transport
pub struct SessionTracker<S> {
    protocol: IpProtocol,
    max_sessions: usize,
    timeout: Duration,
    sessions: HashMap<FlowKey, SessionEntry<S>>,
    stats: SessionStats,
}

impl<S: SessionData> SessionTracker<S> {
    pub fn new(protocol: IpProtocol, config: &TrackerConfig) -> Self {
        info!(
            "Initializing {} session tracker (max_sessions={}, timeout={}s)",
            protocol, config.max_sessions, config.session_timeout
        );

        Self {
            protocol,
            max_sessions: config.max_sessions,
            timeout: Duration::from_secs(config.session_timeout),
            sessions: HashMap::with_capacity(config.max_sessions.min(100_000)),
            stats: SessionStats::default(),
        }
    }

    /// Find or create the packet's session and set the packet direction
    ///
    /// Returns `None` when the packet has no layer 3 header or the session
    /// limit refuses a new session.
    pub fn process(&mut self, pkt: &mut Packet) -> Option<&mut S> {
        let key = FlowKey::from_packet(pkt)?;
        let src = (pkt.src_ip()?, pkt.src_port);
        let now = pkt.timestamp;

        if !self.sessions.contains_key(&key) {
            if self.sessions.len() >= self.max_sessions {
                let pruned = self.expire(now, ReleaseReason::Pruned);
                self.stats.prunes += pruned as u64;
            }
            if self.sessions.len() >= self.max_sessions {
                self.stats.discards += 1;
                warn!(
                    "{} session limit ({}) reached, discarding {}",
                    self.protocol, self.max_sessions, key
                );
                return None;
            }

            self.sessions.insert(
                key,
                SessionEntry {
                    data: S::default(),
                    initiator: src,
                    last_seen: now,
                },
            );
            self.stats.created += 1;
            self.stats.sessions = self.sessions.len() as u64;
            debug!("New {} session {}", self.protocol, key);
        }

        let entry = self.sessions.get_mut(&key)?;
        entry.last_seen = entry.last_seen.max(now);
        pkt.direction = if entry.initiator == src {
            Direction::ToServer
        } else {
            Direction::ToClient
        };
        Some(&mut entry.data)
    }

    /// Release sessions idle for at least the timeout
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let expired = self.expire(now, ReleaseReason::Timeout);
        self.stats.timeouts += expired as u64;
        if expired > 0 {
            debug!("Expired {} idle {} sessions", expired, self.protocol);
        }
        expired
    }

    fn expire(&mut self, now: Instant, reason: ReleaseReason) -> usize {
        let timeout = self.timeout;
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            if now.saturating_duration_since(entry.last_seen) >= timeout {
                entry.data.release(reason);
                false
            } else {
                true
            }
        });
        self.stats.sessions = self.sessions.len() as u64;
        before - self.sessions.len()
    }

    /// Close one session
    pub fn release(&mut self, key: &FlowKey) -> Option<S> {
        let mut entry = self.sessions.remove(key)?;
        entry.data.release(ReleaseReason::Closed);
        self.stats.released += 1;
        self.stats.sessions = self.sessions.len() as u64;
        Some(entry.data)
    }

    /// Release every session
    pub fn purge(&mut self) -> usize {
        let purged = self.sessions.len();
        for (_, mut entry) in self.sessions.drain() {
            entry.data.release(ReleaseReason::Purged);
        }
        self.stats.released += purged as u64;
        self.stats.sessions = 0;
        purged
    }

    pub fn get(&self, key: &FlowKey) -> Option<&S> {
        self.sessions.get(key).map(|e| &e.data)
    }

    pub fn get_mut(&mut self, key: &FlowKey) -> Option<&mut S> {
        self.sessions.get_mut(key).map(|e| &mut e.data)
    }

    pub fn protocol(&self) -> IpProtocol {
        self.protocol
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut SessionStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::http::SourceId;
    use std::net::Ipv4Addr;

    fn config(max_sessions: usize) -> TrackerConfig {
        TrackerConfig {
            max_sessions,
            session_timeout: 30,
        }
    }

    fn make_packet(src_port: u16, dst_port: u16, reply: bool) -> Packet {
        let client = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100));
        let server = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let (src, dst) = if reply { (server, client) } else { (client, server) };
        Packet::new(src, dst, IpProtocol::Tcp).with_ports(src_port, dst_port)
    }

    #[test]
    fn test_tracker_bidirectional() {
        let mut tracker: SessionTracker<DatagramSession> = SessionTracker::new(IpProtocol::Udp, &config(8));

        let mut fwd = make_packet(54321, 80, false);
        tracker.process(&mut fwd).unwrap().packets += 1;
        assert_eq!(fwd.direction, Direction::ToServer);

        let mut rev = make_packet(80, 54321, true);
        tracker.process(&mut rev).unwrap().packets += 1;
        assert_eq!(rev.direction, Direction::ToClient);

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.stats().created, 1);
        let key = FlowKey::from_packet(&fwd).unwrap();
        assert_eq!(tracker.get(&key).unwrap().packets, 2);
    }

    #[test]
    fn test_session_limit_discards() {
        let mut tracker: SessionTracker<DatagramSession> = SessionTracker::new(IpProtocol::Udp, &config(2));

        assert!(tracker.process(&mut make_packet(1000, 53, false)).is_some());
        assert!(tracker.process(&mut make_packet(1001, 53, false)).is_some());
        assert!(tracker.process(&mut make_packet(1002, 53, false)).is_none());

        // Existing sessions still pass at the limit
        assert!(tracker.process(&mut make_packet(1000, 53, false)).is_some());
        assert_eq!(tracker.stats().discards, 1);
        assert_eq!(tracker.stats().sessions, 2);
    }

    #[test]
    fn test_limit_prunes_expired_first() {
        let mut tracker: SessionTracker<DatagramSession> = SessionTracker::new(IpProtocol::Udp, &config(1));

        let mut old = make_packet(1000, 53, false);
        tracker.process(&mut old);

        let mut new = make_packet(1001, 53, false);
        new.timestamp = old.timestamp + Duration::from_secs(31);
        assert!(tracker.process(&mut new).is_some());
        assert_eq!(tracker.stats().prunes, 1);
        assert_eq!(tracker.stats().discards, 0);
    }

    #[test]
    fn test_prune_expired_terminates_http_state() {
        let mut tracker: SessionTracker<HttpFlowData> = SessionTracker::new(IpProtocol::Tcp, &config(16));

        let mut pkt = make_packet(40000, 80, false);
        let start = pkt.timestamp;
        tracker.process(&mut pkt).unwrap().direction_mut(SourceId::Client).declared_body_length = 9;

        assert_eq!(tracker.prune_expired(start + Duration::from_secs(29)), 0);
        assert_eq!(tracker.prune_expired(start + Duration::from_secs(30)), 1);
        assert!(tracker.is_empty());
        assert_eq!(tracker.stats().timeouts, 1);
    }

    #[test]
    fn test_release_runs_terminate() {
        let mut tracker: SessionTracker<HttpFlowData> = SessionTracker::new(IpProtocol::Tcp, &config(16));
        let mut pkt = make_packet(40000, 80, false);
        tracker.process(&mut pkt);

        let key = FlowKey::from_packet(&pkt).unwrap();
        let released = tracker.release(&key).unwrap();
        assert!(released.is_finished());
        assert_eq!(released.expected(SourceId::Server), ExpectedSection::Closed);
        assert_eq!(tracker.stats().released, 1);
    }

    #[test]
    fn test_purge() {
        let mut tracker: SessionTracker<DatagramSession> = SessionTracker::new(IpProtocol::Icmp, &config(16));
        tracker.process(&mut make_packet(1, 2, false));
        tracker.process(&mut make_packet(3, 4, false));
        tracker.stats_mut().events += 2;

        assert_eq!(tracker.purge(), 2);
        assert!(tracker.is_empty());
        assert_eq!(tracker.stats().released, 2);
        assert_eq!(tracker.stats().events, 2);
        assert_eq!(tracker.stats().sessions, 0);
    }
}
