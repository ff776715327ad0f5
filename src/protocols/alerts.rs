//! Protocol alert types
//!
//! Alerts raised by protocol inspectors, handed to the alerting subsystem.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::{DetectionType, Severity};

/// Protocol-generated alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolAlert {
    /// Generator ID of the inspector that raised the alert
    pub gid: u32,

    /// Event ID within the generator
    pub sid: u32,

    /// Alert message
    pub msg: String,

    /// Detection type for correlation
    pub detection_type: DetectionType,

    /// Severity level
    pub severity: Severity,

    /// Rule classification
    pub classtype: Option<String>,

    /// Additional metadata
    pub metadata: BTreeMap<String, String>,
}

impl ProtocolAlert {
    /// Create new alert
    pub fn new(
        gid: u32,
        sid: u32,
        msg: impl Into<String>,
        detection_type: DetectionType,
        severity: Severity,
    ) -> Self {
        Self {
            gid,
            sid,
            msg: msg.into(),
            detection_type,
            severity,
            classtype: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set classtype
    pub fn with_classtype(mut self, classtype: impl Into<String>) -> Self {
        self.classtype = Some(classtype.into());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

impl std::fmt::Display for ProtocolAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {} ({})", self.gid, self.sid, self.msg, self.severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_alert() {
        let alert = ProtocolAlert::new(
            119,
            1,
            "Test alert",
            DetectionType::ProtocolAnomaly,
            Severity::Medium,
        )
        .with_metadata("transaction", 3)
        .with_classtype("protocol-command-decode");

        assert_eq!(alert.msg, "Test alert");
        assert_eq!(alert.metadata("transaction"), Some("3"));
        assert_eq!(alert.classtype.as_deref(), Some("protocol-command-decode"));
        assert_eq!(alert.to_string(), "[119:1] Test alert (MEDIUM)");
    }
}
