//! Detection event classification shared by all analyzers

use serde::{Deserialize, Serialize};

/// Detection severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Severity {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// Detection type categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DetectionType {
    #[default]
    ProtocolAnomaly,
    MalformedPacket,
    /// Framing ambiguity that can desynchronize endpoints
    Evasion,
    Overflow,
}

impl std::fmt::Display for DetectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionType::ProtocolAnomaly => write!(f, "protocol_anomaly"),
            DetectionType::MalformedPacket => write!(f, "malformed_packet"),
            DetectionType::Evasion => write!(f, "evasion"),
            DetectionType::Overflow => write!(f, "overflow"),
        }
    }
}
