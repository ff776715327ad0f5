//! Message framing classifier
//!
//! Decides what follows a header section on the wire for its direction. The
//! decision is an ordered list of guarded rules; the first rule whose guard
//! matches determines the new state. Order matters: transport and disaster
//! conditions beat protocol rules, and chunked framing beats Content-Length.

use serde::Serialize;
use tracing::debug;

use super::section::HeaderSection;
use super::state::DirectionState;
use super::types::{ExpectedSection, HeaderId, HttpMethod, Infractions, SourceId};

/// Context the classifier needs beyond the section itself
#[derive(Debug, Clone, Copy, Default)]
pub struct FramingContext {
    /// Method of the request a server section answers, if known
    pub request_method: Option<HttpMethod>,
    /// Infractions that abort framing for the flow
    pub disaster_mask: Infractions,
}

/// The rule that decided a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingRule {
    TransportClosed,
    DisasterInfraction,
    BodilessStatus,
    HeadResponse,
    ChunkedBody,
    ContentLength,
    NoBody,
}

/// Result of classifying one header section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub rule: FramingRule,
    pub expected: ExpectedSection,
}

enum Transition {
    /// Enter a no-body or terminal state and clear body bookkeeping
    Reset(ExpectedSection),
    Chunked,
    Fixed(u64),
}

type Guard = fn(&HeaderSection, &FramingContext) -> Option<Transition>;

const RULES: [(FramingRule, Guard); 7] = [
    (FramingRule::TransportClosed, transport_closed),
    (FramingRule::DisasterInfraction, disaster_infraction),
    (FramingRule::BodilessStatus, bodiless_status),
    (FramingRule::HeadResponse, head_response),
    (FramingRule::ChunkedBody, chunked_body),
    (FramingRule::ContentLength, content_length),
    (FramingRule::NoBody, no_body),
];

fn transport_closed(section: &HeaderSection, _: &FramingContext) -> Option<Transition> {
    section.tcp_close().then_some(Transition::Reset(ExpectedSection::Closed))
}

fn disaster_infraction(section: &HeaderSection, ctx: &FramingContext) -> Option<Transition> {
    section
        .infractions()
        .intersects(ctx.disaster_mask)
        .then_some(Transition::Reset(ExpectedSection::Aborted))
}

fn bodiless_status(section: &HeaderSection, _: &FramingContext) -> Option<Transition> {
    if section.source() != SourceId::Server {
        return None;
    }
    is_bodiless_status(section.status_code()).then_some(Transition::Reset(ExpectedSection::NewMessageServer))
}

fn head_response(section: &HeaderSection, ctx: &FramingContext) -> Option<Transition> {
    (section.source() == SourceId::Server && ctx.request_method == Some(HttpMethod::Head))
        .then_some(Transition::Reset(ExpectedSection::NewMessageServer))
}

fn chunked_body(section: &HeaderSection, _: &FramingContext) -> Option<Transition> {
    is_chunked(section).then_some(Transition::Chunked)
}

fn content_length(section: &HeaderSection, _: &FramingContext) -> Option<Transition> {
    let value = section.normalized(HeaderId::ContentLength)?;
    let length = parse_content_length(&value)?;
    // Positive i64, so the conversion cannot fail
    u64::try_from(length)
        .ok()
        .filter(|len| *len > 0)
        .map(Transition::Fixed)
}

fn no_body(section: &HeaderSection, _: &FramingContext) -> Option<Transition> {
    Some(Transition::Reset(section.source().new_message()))
}

/// Does this response status forbid a body
///
/// A missing status code counts as below 200.
pub fn is_bodiless_status(status_code: Option<u16>) -> bool {
    status_code.map_or(true, |code| code <= 199 || code == 204 || code == 304)
}

/// Is the final transfer coding `chunked`
pub fn is_chunked(section: &HeaderSection) -> bool {
    section
        .final_transfer_coding()
        .is_some_and(|coding| coding.eq_ignore_ascii_case("chunked"))
}

/// Parse a normalized Content-Length as a non-negative decimal integer
pub fn parse_content_length(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<i64>().ok()
}

/// Classify a header section and update the framing state for its direction
///
/// Never fails: the last rule matches every section.
pub fn classify(
    section: &HeaderSection,
    state: &mut DirectionState,
    ctx: &FramingContext,
) -> Classification {
    let (rule, transition) = RULES
        .iter()
        .find_map(|(rule, guard)| guard(section, ctx).map(|t| (*rule, t)))
        .unwrap_or_else(|| (FramingRule::NoBody, Transition::Reset(section.source().new_message())));

    match transition {
        Transition::Reset(expected) => {
            state.expected = expected;
            state.half_reset();
        }
        Transition::Chunked => {
            state.expected = ExpectedSection::ChunkedBody;
            state.body_octets_consumed = 0;
        }
        Transition::Fixed(length) => {
            state.expected = ExpectedSection::FixedBody;
            state.declared_body_length = length;
            state.body_octets_consumed = 0;
        }
    }

    debug!(
        "Classified {} header section: {:?} -> {}",
        section.source(),
        rule,
        state.expected
    );

    Classification {
        rule,
        expected: state.expected,
    }
}
