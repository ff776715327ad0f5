//! HTTP framing state
//!
//! Per-flow state tracking for HTTP message framing. One [`DirectionState`]
//! exists per side of the flow; only the classifier for that side mutates it.

use serde::Serialize;

use super::transaction::TransactionQueue;
use super::types::{ExpectedSection, SourceId};

/// Framing state for one direction of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionState {
    /// Section type the reassembler should cut next
    pub expected: ExpectedSection,
    /// Declared body length, meaningful only for `FixedBody`
    pub declared_body_length: u64,
    /// Body octets seen since the body started
    pub body_octets_consumed: u64,
    /// Octets of a partial section held by the reassembler
    pub buffered_section_length: u64,
    /// Octets already received but not yet cut into sections
    pub unconsumed_visible_octets: u64,
}

impl DirectionState {
    /// Fresh state expecting a new message from `source`
    pub fn new(source: SourceId) -> Self {
        Self {
            expected: source.new_message(),
            declared_body_length: 0,
            body_octets_consumed: 0,
            buffered_section_length: 0,
            unconsumed_visible_octets: 0,
        }
    }

    /// Clear body counters and partial-section bookkeeping
    pub fn half_reset(&mut self) {
        self.declared_body_length = 0;
        self.body_octets_consumed = 0;
        self.buffered_section_length = 0;
    }
}

/// Per-flow HTTP state
#[derive(Debug)]
pub struct HttpFlowData {
    directions: [DirectionState; 2],

    /// Requests waiting for their responses
    pub transactions: TransactionQueue,

    /// Header sections classified, per direction
    pub sections_seen: [u64; 2],
}

impl HttpFlowData {
    pub fn new() -> Self {
        Self {
            directions: [
                DirectionState::new(SourceId::Client),
                DirectionState::new(SourceId::Server),
            ],
            transactions: TransactionQueue::new(),
            sections_seen: [0; 2],
        }
    }

    pub fn direction(&self, source: SourceId) -> &DirectionState {
        &self.directions[source.index()]
    }

    pub fn direction_mut(&mut self, source: SourceId) -> &mut DirectionState {
        &mut self.directions[source.index()]
    }

    pub fn expected(&self, source: SourceId) -> ExpectedSection {
        self.direction(source).expected
    }

    /// Record the reassembler's byte counters for one direction
    pub fn set_buffered(&mut self, source: SourceId, buffered_section: u64, unconsumed_visible: u64) {
        let state = self.direction_mut(source);
        state.buffered_section_length = buffered_section;
        state.unconsumed_visible_octets = unconsumed_visible;
    }

    /// Administrative termination of both directions
    ///
    /// Goes through the same reset step the classifier uses for a transport
    /// close or a disaster infraction.
    pub fn terminate(&mut self, terminal: ExpectedSection) {
        debug_assert!(terminal.is_terminal());
        for state in &mut self.directions {
            state.expected = terminal;
            state.half_reset();
        }
        self.transactions.clear();
    }

    pub fn is_finished(&self) -> bool {
        self.directions.iter().all(|d| d.expected.is_terminal())
    }
}

impl Default for HttpFlowData {
    fn default() -> Self {
        Self::new()
    }
}
