//! Stream peg counters
//!
//! Each worker owns plain counters and folds them into the shared
//! [`StatsRegistry`] at report or shutdown boundaries.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// Packets seen by the dispatcher, per transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BaseStats {
    pub ip_packets: u64,
    pub icmp_packets: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
    pub other_packets: u64,
}

impl BaseStats {
    pub fn sum_into(&self, total: &mut BaseStats) {
        total.ip_packets += self.ip_packets;
        total.icmp_packets += self.icmp_packets;
        total.tcp_packets += self.tcp_packets;
        total.udp_packets += self.udp_packets;
        total.other_packets += self.other_packets;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total(&self) -> u64 {
        self.ip_packets + self.icmp_packets + self.tcp_packets + self.udp_packets + self.other_packets
    }

    /// Peg names and values in report order
    pub fn pegs(&self) -> [(&'static str, u64); 5] {
        [
            ("ip packets", self.ip_packets),
            ("icmp packets", self.icmp_packets),
            ("tcp packets", self.tcp_packets),
            ("udp packets", self.udp_packets),
            ("other packets", self.other_packets),
        ]
    }
}

/// Session tracker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Sessions currently tracked
    pub sessions: u64,
    /// Expired sessions freed to make room at the session limit
    pub prunes: u64,
    /// Sessions expired by idle timeout
    pub timeouts: u64,
    pub created: u64,
    /// Sessions released by close or purge
    pub released: u64,
    /// New sessions refused at the session limit
    pub discards: u64,
    /// Inspector events raised on tracked sessions
    pub events: u64,
}

impl SessionStats {
    pub fn sum_into(&self, total: &mut SessionStats) {
        total.sessions += self.sessions;
        total.prunes += self.prunes;
        total.timeouts += self.timeouts;
        total.created += self.created;
        total.released += self.released;
        total.discards += self.discards;
        total.events += self.events;
    }

    pub fn reset(&mut self) {
        // Live sessions survive a counter reset
        *self = Self {
            sessions: self.sessions,
            ..Self::default()
        };
    }

    pub fn pegs(&self) -> [(&'static str, u64); 7] {
        [
            ("sessions", self.sessions),
            ("prunes", self.prunes),
            ("timeouts", self.timeouts),
            ("created", self.created),
            ("released", self.released),
            ("discards", self.discards),
            ("events", self.events),
        ]
    }
}

/// All counters one worker's dispatcher produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub base: BaseStats,
    pub tcp: SessionStats,
    pub udp: SessionStats,
    pub icmp: SessionStats,
    pub ip: SessionStats,
}

impl StreamStats {
    pub fn sum_into(&self, total: &mut StreamStats) {
        self.base.sum_into(&mut total.base);
        self.tcp.sum_into(&mut total.tcp);
        self.udp.sum_into(&mut total.udp);
        self.icmp.sum_into(&mut total.icmp);
        self.ip.sum_into(&mut total.ip);
    }

    pub fn reset(&mut self) {
        self.base.reset();
        self.tcp.reset();
        self.udp.reset();
        self.icmp.reset();
        self.ip.reset();
    }

    pub fn sessions(&self) -> [(&'static str, &SessionStats); 4] {
        [
            ("tcp", &self.tcp),
            ("udp", &self.udp),
            ("icmp", &self.icmp),
            ("ip", &self.ip),
        ]
    }

    /// Log every non-zero counter
    pub fn show(&self) {
        for (name, count) in self.base.pegs() {
            if count > 0 {
                info!("stream: {}: {}", name, count);
            }
        }
        for (proto, stats) in self.sessions() {
            for (name, count) in stats.pegs() {
                if count > 0 {
                    info!("stream_{}: {}: {}", proto, name, count);
                }
            }
        }
    }
}

/// Process-wide totals merged from workers
#[derive(Debug, Default)]
pub struct StatsRegistry {
    totals: Mutex<StreamStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a worker's counters into the totals
    pub fn merge(&self, worker: &StreamStats) {
        let mut totals = self.totals.lock();
        worker.sum_into(&mut totals);
    }

    pub fn snapshot(&self) -> StreamStats {
        *self.totals.lock()
    }

    pub fn reset(&self) {
        *self.totals.lock() = StreamStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_base_sum_into() {
        let worker = BaseStats {
            tcp_packets: 3,
            other_packets: 1,
            ..Default::default()
        };
        let mut total = BaseStats {
            tcp_packets: 2,
            ..Default::default()
        };
        worker.sum_into(&mut total);
        assert_eq!(total.tcp_packets, 5);
        assert_eq!(total.other_packets, 1);
        assert_eq!(total.total(), 6);
    }

    #[test]
    fn test_session_reset_keeps_live_sessions() {
        let mut stats = SessionStats {
            sessions: 4,
            created: 10,
            released: 6,
            ..Default::default()
        };
        stats.reset();
        assert_eq!(stats.sessions, 4);
        assert_eq!(stats.created, 0);
    }

    #[test]
    fn test_registry_merges_workers() {
        let registry = Arc::new(StatsRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut local = StreamStats::default();
                    local.base.udp_packets = 5;
                    local.udp.created = 1;
                    registry.merge(&local);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let totals = registry.snapshot();
        assert_eq!(totals.base.udp_packets, 20);
        assert_eq!(totals.udp.created, 4);

        registry.reset();
        assert_eq!(registry.snapshot(), StreamStats::default());
    }
}
