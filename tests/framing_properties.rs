//! Property tests for the framing classifier and detection decision.

use framewatch::config::InspectConfig;
use framewatch::protocols::http::{
    classify, decide, gen_events, DetectionDisposition, DirectionState, ExpectedSection,
    FramingContext, FramingRule, HeaderId, HeaderSection, HttpEvent, HttpMethod, Infraction, Infractions,
    SourceId,
};
use proptest::prelude::*;

fn header_strategy() -> impl Strategy<Value = (String, String)> {
    prop_oneof![
        (Just("Content-Length".to_string()), "[0-9]{1,6}|-?[0-9a-f ]{0,4}"),
        (Just("Transfer-Encoding".to_string()), "(gzip|chunked|Chunked|identity)(, ?(gzip|chunked|CHUNKED))?"),
        (Just("Host".to_string()), "[a-z]{1,8}\\.com"),
        (Just("X-Other".to_string()), "[ -~]{0,12}"),
    ]
}

fn infraction_strategy() -> impl Strategy<Value = Infractions> {
    proptest::collection::vec(0usize..Infraction::ALL.len(), 0..3)
        .prop_map(|idx| idx.into_iter().map(|i| Infraction::ALL[i]).collect())
}

prop_compose! {
    fn section_strategy()
        (
            server in any::<bool>(),
            status in prop_oneof![Just(None), (100u16..600).prop_map(Some)],
            method in prop_oneof![Just("GET"), Just("HEAD"), Just("POST")],
            headers in proptest::collection::vec(header_strategy(), 0..5),
            infractions in infraction_strategy(),
            text_len in 0usize..256,
            tcp_close in any::<bool>(),
        )
        -> HeaderSection
    {
        let mut section = if server {
            match status {
                Some(code) => HeaderSection::response(code),
                None => HeaderSection::new(SourceId::Server),
            }
        } else {
            HeaderSection::request(method)
        };
        for (name, value) in headers {
            section = section.with_header(name, value);
        }
        for infraction in infractions.iter() {
            section = section.with_infraction(infraction);
        }
        if tcp_close {
            section = section.with_tcp_close();
        }
        section.with_text(vec![b'h'; text_len])
    }
}

fn context_strategy() -> impl Strategy<Value = FramingContext> {
    (
        prop_oneof![Just(None), Just(Some(HttpMethod::Head)), Just(Some(HttpMethod::Get))],
        infraction_strategy(),
    )
        .prop_map(|(request_method, disaster_mask)| FramingContext {
            request_method,
            disaster_mask,
        })
}

proptest! {
    #[test]
    fn test_transport_close_always_closes(section in section_strategy(), ctx in context_strategy()) {
        let section = section.with_tcp_close();
        let mut state = DirectionState::new(section.source());
        let result = classify(&section, &mut state, &ctx);
        prop_assert_eq!(result.expected, ExpectedSection::Closed);
        prop_assert_eq!(state.declared_body_length, 0);
        prop_assert_eq!(state.buffered_section_length, 0);
    }

    #[test]
    fn test_result_matches_state(section in section_strategy(), ctx in context_strategy()) {
        let mut state = DirectionState::new(section.source());
        state.body_octets_consumed = 17;
        state.buffered_section_length = 5;
        let result = classify(&section, &mut state, &ctx);

        prop_assert_eq!(result.expected, state.expected);
        if state.expected.is_body() {
            prop_assert_eq!(state.body_octets_consumed, 0);
        }
        if state.expected == ExpectedSection::FixedBody {
            prop_assert!(state.declared_body_length > 0);
        }
        if !state.expected.is_body() {
            prop_assert_eq!(state.declared_body_length, 0);
            prop_assert_eq!(state.buffered_section_length, 0);
        }
    }

    #[test]
    fn test_new_message_matches_source(section in section_strategy(), ctx in context_strategy()) {
        let mut state = DirectionState::new(section.source());
        let result = classify(&section, &mut state, &ctx);
        match result.expected {
            ExpectedSection::NewMessageClient => prop_assert_eq!(section.source(), SourceId::Client),
            ExpectedSection::NewMessageServer => prop_assert_eq!(section.source(), SourceId::Server),
            _ => {}
        }
    }

    #[test]
    fn test_bodiless_status_wins(
        status in prop_oneof![100u16..200, Just(204u16), Just(304u16)],
        length in 1u32..100_000,
    ) {
        let section = HeaderSection::response(status)
            .with_header("Content-Length", length.to_string())
            .with_header("Transfer-Encoding", "chunked");
        let mut state = DirectionState::new(SourceId::Server);
        let result = classify(&section, &mut state, &FramingContext::default());
        prop_assert_eq!(result.rule, FramingRule::BodilessStatus);
        prop_assert_eq!(result.expected, ExpectedSection::NewMessageServer);
    }

    #[test]
    fn test_chunked_beats_any_length(length in 1u64..(i64::MAX as u64), server in any::<bool>()) {
        let section = (if server { HeaderSection::response(200) } else { HeaderSection::request("POST") })
            .with_header("Content-Length", length.to_string())
            .with_header("Transfer-Encoding", "chunked");
        let mut state = DirectionState::new(section.source());
        let result = classify(&section, &mut state, &FramingContext::default());
        prop_assert_eq!(result.expected, ExpectedSection::ChunkedBody);
    }

    #[test]
    fn test_content_length_sets_declared(length in 1u64..(i64::MAX as u64)) {
        let section = HeaderSection::request("PUT").with_header("Content-Length", length.to_string());
        let mut state = DirectionState::new(SourceId::Client);
        classify(&section, &mut state, &FramingContext::default());
        prop_assert_eq!(state.expected, ExpectedSection::FixedBody);
        prop_assert_eq!(state.declared_body_length, length);
    }

    #[test]
    fn test_events_do_not_change_framing(section in section_strategy(), ctx in context_strategy()) {
        let duplicated = section.clone().with_header("Content-Length", "1");
        let events = gen_events(&duplicated, &ctx);
        if duplicated.count(HeaderId::ContentLength) > 1 {
            let raised = events.iter().filter(|e| **e == HttpEvent::MultipleContentLength).count();
            prop_assert_eq!(raised, 1);
        }

        // Emitting events twice leaves the classification alone
        let mut first = DirectionState::new(section.source());
        let mut second = DirectionState::new(section.source());
        let a = classify(&section, &mut first, &ctx);
        gen_events(&section, &ctx);
        let b = classify(&section, &mut second, &ctx);
        prop_assert_eq!(a, b);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_aggregate_respects_caps(
        declared in 0u64..10_000,
        visible in 0u64..10_000,
        buffered in 0u64..10_000,
        text_len in 0usize..2_000,
        block_cap in 1u64..10_000,
        section_cap in 1u64..30_000,
    ) {
        let section = HeaderSection::request("POST").with_text(vec![b'x'; text_len]);
        let mut state = DirectionState::new(SourceId::Client);
        state.expected = ExpectedSection::FixedBody;
        state.declared_body_length = declared;
        state.unconsumed_visible_octets = visible;
        state.buffered_section_length = buffered;
        let config = InspectConfig { block_cap, section_cap, ..Default::default() };

        match decide(&section, &state, &config) {
            DetectionDisposition::Aggregate { body_octets } => {
                prop_assert_eq!(body_octets, declared);
                prop_assert!(declared <= visible);
                prop_assert!(declared <= block_cap);
                prop_assert!(buffered + text_len as u64 + declared <= section_cap);
            }
            DetectionDisposition::Inspect => prop_assert!(text_len > 0 || buffered > 0),
            DetectionDisposition::Ignore => {
                prop_assert_eq!(text_len, 0);
                prop_assert_eq!(buffered, 0);
            }
        }
    }
}
