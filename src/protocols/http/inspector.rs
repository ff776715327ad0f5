//! HTTP header section pipeline
//!
//! Runs one header section through request/response pairing, event
//! generation, framing classification and the detection decision, in that
//! order, against the flow's HTTP state.

use serde::Serialize;
use tracing::{trace, warn};

use crate::config::InspectConfig;
use crate::protocols::alerts::ProtocolAlert;

use super::detection::decide;
use super::events::{gen_events, HttpEvent};
use super::framing::{classify, FramingContext, FramingRule};
use super::section::HeaderSection;
use super::state::HttpFlowData;
use super::types::{DetectionDisposition, ExpectedSection, HttpMethod, SourceId};

/// What happened to one header section
#[derive(Debug, Clone, Serialize)]
pub struct SectionOutcome {
    pub source: SourceId,
    /// Transaction the section belongs to, if one could be paired
    pub transaction: Option<u64>,
    pub rule: FramingRule,
    pub expected: ExpectedSection,
    pub disposition: DetectionDisposition,
    pub alerts: Vec<ProtocolAlert>,
}

/// HTTP inspector for header sections
#[derive(Debug, Clone, Default)]
pub struct HttpInspector {
    config: InspectConfig,
}

impl HttpInspector {
    pub fn new(config: InspectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InspectConfig {
        &self.config
    }

    /// Process one header section for its direction of the flow
    pub fn process_header(&self, flow: &mut HttpFlowData, section: &HeaderSection) -> SectionOutcome {
        let source = section.source();
        let mut alerts = Vec::new();

        let (transaction, request_method) = match source {
            SourceId::Client => {
                let method = section.method().unwrap_or(HttpMethod::Unknown);
                let first_refusal = !flow.transactions.overflowed();
                match flow.transactions.open(method) {
                    Some(id) => (Some(id), None),
                    None => {
                        if first_refusal {
                            warn!(
                                "HTTP pipeline full at {} requests, later responses go unpaired",
                                flow.transactions.len()
                            );
                        }
                        alerts.push(HttpEvent::PipelineOverflow.alert(source, None));
                        (None, None)
                    }
                }
            }
            SourceId::Server => match flow.transactions.awaiting_response() {
                Some(tx) => (Some(tx.id), Some(tx.method)),
                None => (None, None),
            },
        };

        let ctx = FramingContext {
            request_method,
            disaster_mask: self.config.disaster_mask,
        };
        alerts.extend(
            gen_events(section, &ctx)
                .into_iter()
                .map(|event| event.alert(source, transaction)),
        );

        let classification = classify(section, flow.direction_mut(source), &ctx);
        let disposition = decide(section, flow.direction(source), &self.config);

        if source == SourceId::Server {
            if let Some(retired) = flow.transactions.record_response(section.status_code()) {
                trace!("Retired HTTP transaction {}", retired.id);
            }
        }
        flow.sections_seen[source.index()] += 1;

        SectionOutcome {
            source,
            transaction,
            rule: classification.rule,
            expected: classification.expected,
            disposition,
            alerts,
        }
    }
}
