//! Detection disposition for a classified header section

use crate::config::InspectConfig;

use super::section::HeaderSection;
use super::state::DirectionState;
use super::types::{DetectionDisposition, ExpectedSection};

/// Decide how a header section reaches detection
///
/// Must run after the section has been classified, so `state` already holds
/// the declared body length. A fixed-length body is merged with its header
/// only when all of it is already visible and the merged block stays within
/// both caps.
pub fn decide(
    section: &HeaderSection,
    state: &DirectionState,
    config: &InspectConfig,
) -> DetectionDisposition {
    if state.expected == ExpectedSection::FixedBody {
        let declared = state.declared_body_length;
        let merged = state
            .buffered_section_length
            .checked_add(section.text_length())
            .and_then(|n| n.checked_add(declared));

        if declared <= state.unconsumed_visible_octets
            && declared <= config.block_cap
            && merged.is_some_and(|n| n <= config.section_cap)
        {
            return DetectionDisposition::Aggregate {
                body_octets: declared,
            };
        }
    }

    if section.text_length() > 0 || state.buffered_section_length > 0 {
        DetectionDisposition::Inspect
    } else {
        DetectionDisposition::Ignore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::http::types::SourceId;

    fn fixed(declared: u64, visible: u64, buffered: u64) -> DirectionState {
        let mut state = DirectionState::new(SourceId::Client);
        state.expected = ExpectedSection::FixedBody;
        state.declared_body_length = declared;
        state.unconsumed_visible_octets = visible;
        state.buffered_section_length = buffered;
        state
    }

    fn config(block_cap: u64, section_cap: u64) -> InspectConfig {
        InspectConfig {
            block_cap,
            section_cap,
            ..Default::default()
        }
    }

    fn section(text_len: usize) -> HeaderSection {
        HeaderSection::request("POST").with_text(vec![b'x'; text_len])
    }

    #[test]
    fn test_aggregate_when_body_fits() {
        let disposition = decide(&section(200), &fixed(50, 50, 0), &config(1024, 4096));
        assert_eq!(disposition, DetectionDisposition::Aggregate { body_octets: 50 });
    }

    #[test]
    fn test_inspect_when_body_not_yet_visible() {
        let disposition = decide(&section(200), &fixed(50, 40, 0), &config(1024, 4096));
        assert_eq!(disposition, DetectionDisposition::Inspect);
    }

    #[test]
    fn test_inspect_when_body_exceeds_block_cap() {
        let disposition = decide(&section(10), &fixed(2000, 5000, 0), &config(1024, 8192));
        assert_eq!(disposition, DetectionDisposition::Inspect);
    }

    #[test]
    fn test_section_cap_is_inclusive() {
        let state = fixed(100, 100, 96);
        assert_eq!(
            decide(&section(4), &state, &config(1024, 200)),
            DetectionDisposition::Aggregate { body_octets: 100 }
        );
        assert_eq!(decide(&section(5), &state, &config(1024, 200)), DetectionDisposition::Inspect);
    }

    #[test]
    fn test_no_overflow_near_max() {
        let state = fixed(10, 10, u64::MAX - 5);
        let disposition = decide(&section(1), &state, &config(u64::MAX, u64::MAX));
        assert_eq!(disposition, DetectionDisposition::Inspect);
    }

    #[test]
    fn test_ignore_empty_section() {
        let state = DirectionState::new(SourceId::Client);
        let disposition = decide(&HeaderSection::request("GET"), &state, &InspectConfig::default());
        assert_eq!(disposition, DetectionDisposition::Ignore);
    }

    #[test]
    fn test_buffered_octets_force_inspect() {
        let mut state = DirectionState::new(SourceId::Server);
        state.buffered_section_length = 3;
        let disposition = decide(&HeaderSection::response(200), &state, &InspectConfig::default());
        assert_eq!(disposition, DetectionDisposition::Inspect);
    }

    #[test]
    fn test_chunked_never_aggregates() {
        let mut state = fixed(50, 50, 0);
        state.expected = ExpectedSection::ChunkedBody;
        let disposition = decide(&section(20), &state, &InspectConfig::default());
        assert_eq!(disposition, DetectionDisposition::Inspect);
    }
}
