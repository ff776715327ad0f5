//! Framing anomaly events
//!
//! Inspects a header section for framing-relevant irregularities. Events are
//! reported only; they never change how the section is classified.

use serde::Serialize;

use crate::core::{DetectionType, Severity};
use crate::protocols::alerts::ProtocolAlert;

use super::framing::{is_bodiless_status, is_chunked, parse_content_length, FramingContext};
use super::section::HeaderSection;
use super::types::{HeaderId, HttpMethod, SourceId};

/// Generator ID for HTTP inspector events
pub const HTTP_GID: u32 = 119;

/// HTTP framing events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpEvent {
    MultipleContentLength,
    BadContentLength,
    ContentLengthWithChunked,
    FinalCodingNotChunked,
    BodyHeadersOnBodilessResponse,
    PipelineOverflow,
    ResponseWithoutLength,
}

/// Fields whose repetition is itself a framing hazard
const REPEAT_HAZARDS: &[(HeaderId, HttpEvent)] =
    &[(HeaderId::ContentLength, HttpEvent::MultipleContentLength)];

impl HttpEvent {
    pub fn sid(self) -> u32 {
        match self {
            HttpEvent::MultipleContentLength => 1,
            HttpEvent::BadContentLength => 2,
            HttpEvent::ContentLengthWithChunked => 3,
            HttpEvent::FinalCodingNotChunked => 4,
            HttpEvent::BodyHeadersOnBodilessResponse => 5,
            HttpEvent::PipelineOverflow => 6,
            HttpEvent::ResponseWithoutLength => 7,
        }
    }

    pub fn msg(self) -> &'static str {
        match self {
            HttpEvent::MultipleContentLength => "multiple Content-Length header fields",
            HttpEvent::BadContentLength => "Content-Length is not a non-negative integer",
            HttpEvent::ContentLengthWithChunked => "Content-Length present with chunked Transfer-Encoding",
            HttpEvent::FinalCodingNotChunked => "final Transfer-Encoding coding is not chunked",
            HttpEvent::BodyHeadersOnBodilessResponse => "body framing headers on a response that has no body",
            HttpEvent::PipelineOverflow => "too many pipelined requests",
            HttpEvent::ResponseWithoutLength => "response body delimited only by connection close",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            HttpEvent::MultipleContentLength | HttpEvent::ContentLengthWithChunked => Severity::High,
            HttpEvent::BadContentLength
            | HttpEvent::FinalCodingNotChunked
            | HttpEvent::PipelineOverflow => Severity::Medium,
            HttpEvent::BodyHeadersOnBodilessResponse | HttpEvent::ResponseWithoutLength => Severity::Low,
        }
    }

    pub fn detection_type(self) -> DetectionType {
        match self {
            HttpEvent::MultipleContentLength
            | HttpEvent::ContentLengthWithChunked
            | HttpEvent::FinalCodingNotChunked => DetectionType::Evasion,
            HttpEvent::BadContentLength => DetectionType::MalformedPacket,
            HttpEvent::BodyHeadersOnBodilessResponse | HttpEvent::ResponseWithoutLength => {
                DetectionType::ProtocolAnomaly
            }
            HttpEvent::PipelineOverflow => DetectionType::Overflow,
        }
    }

    /// Does this alert carry this event
    pub fn matches(self, alert: &ProtocolAlert) -> bool {
        alert.gid == HTTP_GID && alert.sid == self.sid()
    }

    /// Build the alert for this event
    pub fn alert(self, source: SourceId, transaction: Option<u64>) -> ProtocolAlert {
        let alert = ProtocolAlert::new(
            HTTP_GID,
            self.sid(),
            self.msg(),
            self.detection_type(),
            self.severity(),
        )
        .with_classtype("protocol-command-decode")
        .with_metadata("source", source);

        match transaction {
            Some(id) => alert.with_metadata("transaction", id),
            None => alert,
        }
    }
}

/// Collect the framing events a section raises, each at most once
pub fn gen_events(section: &HeaderSection, ctx: &FramingContext) -> Vec<HttpEvent> {
    let mut events = Vec::new();

    for (id, event) in REPEAT_HAZARDS {
        if section.count(*id) > 1 {
            events.push(*event);
        }
    }

    let content_length = section.normalized(HeaderId::ContentLength);
    if let Some(value) = &content_length {
        if parse_content_length(value).is_none() {
            events.push(HttpEvent::BadContentLength);
        }
    }

    if section.has_header(HeaderId::TransferEncoding) {
        if is_chunked(section) {
            if content_length.is_some() {
                events.push(HttpEvent::ContentLengthWithChunked);
            }
        } else {
            events.push(HttpEvent::FinalCodingNotChunked);
        }
    }

    if section.source() == SourceId::Server {
        let body_headers =
            section.has_header(HeaderId::ContentLength) || section.has_header(HeaderId::TransferEncoding);
        if is_bodiless_status(section.status_code()) {
            if body_headers {
                events.push(HttpEvent::BodyHeadersOnBodilessResponse);
            }
        } else if !body_headers && !section.tcp_close() && ctx.request_method != Some(HttpMethod::Head) {
            // Framed as bodiless here, but the body runs to connection close
            events.push(HttpEvent::ResponseWithoutLength);
        }
    }

    events
}
