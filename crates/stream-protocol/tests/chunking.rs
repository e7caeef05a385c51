//! Chunk-boundary behavior of the parser.
//!
//! Every transcript is fed whole, split at every char boundary, and one char
//! at a time. The structural events and the concatenated prose must not
//! depend on where the chunks were cut.

use stream_protocol::{Event, EventOrder, ProgressState, StreamParser, StreamSession};

/// A transcript together with the prose it should produce.
struct Fixture {
    input: String,
    prose: &'static str,
}

fn fixtures() -> Vec<Fixture> {
    vec![
        Fixture {
            input: concat!(
                "Let me look into your funnel.\n\n",
                "<stream_block>",
                "<stream_item icon=\"🔍\">Scanning your site</stream_item>\n",
                "<stream_item icon=\"📈\"> Estimating conversion </stream_item>\n",
                "<stream_complete>Found 3 leaks</stream_complete>",
                "</stream_block>",
                "Here is what I found:\n",
                "<output type=\"funnel\">{\"stages\":[\"visit\",\"signup\"],\"rate\":0.12}</output>",
                "<progress step=\"2\" state=\"done\"/>",
                "<progress step=\"3\" state=\"active\"/>",
                "Next up: ",
                "<whats_next icon=\"✋\" title=\"Pick a channel\" desc=\"We will compare SEO > ads\"/>",
                "done.",
            )
            .to_string(),
            prose: "Let me look into your funnel.\n\nHere is what I found:\nNext up: done.",
        },
        Fixture {
            input: concat!(
                "a < b and <b>bold</b> stay as text. ",
                "<output type=\"plan\">{\"weeks\":4}</o>",
                "<whats_next clear=\"true\"/>",
                "  trailing  \n",
            )
            .to_string(),
            prose: "a < b and <b>bold</b> stay as text.   trailing  \n",
        },
        Fixture {
            input: concat!(
                "Broken card:",
                "<output type=\"x\">{not json}</output>",
                " continues. <outputs> is a word.",
            )
            .to_string(),
            prose: "Broken card: continues. <outputs> is a word.",
        },
        Fixture {
            input: concat!(
                "ünïcödé ",
                "<stream_block><stream_item icon=\"🧪\">тест</stream_item></stream_block>",
                "末尾",
            )
            .to_string(),
            prose: "ünïcödé 末尾",
        },
    ]
}

/// Feed `chunks` through a session and return `(structural events, prose)`.
fn run(parser: StreamParser, chunks: &[&str]) -> (Vec<Event>, String) {
    let mut session = StreamSession::new(parser);
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(session.feed(chunk).expect("feed"));
    }
    events.extend(session.finish().expect("finish"));

    let prose = events
        .iter()
        .filter_map(|e| match e {
            Event::ChatText { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let structural = events.into_iter().filter(|e| !e.is_chat_text()).collect();
    (structural, prose)
}

fn split_points(s: &str) -> Vec<usize> {
    s.char_indices().map(|(i, _)| i).chain([s.len()]).collect()
}

#[test]
fn prose_is_reconstructed_exactly() {
    for fixture in fixtures() {
        for order in [EventOrder::Document, EventOrder::Category] {
            let (_, prose) = run(StreamParser::new(order), &[fixture.input.as_str()]);
            assert_eq!(prose, fixture.prose, "order {order}");
        }
    }
}

#[test]
fn every_two_way_split_matches_single_call() {
    for fixture in fixtures() {
        for order in [EventOrder::Document, EventOrder::Category] {
            let parser = StreamParser::new(order);
            let expected = run(parser, &[fixture.input.as_str()]);

            for i in split_points(&fixture.input) {
                let (a, b) = fixture.input.split_at(i);
                let actual = run(parser, &[a, b]);
                assert_eq!(
                    actual, expected,
                    "order {order}, split at {i}: {a:?} | {b:?}"
                );
            }
        }
    }
}

#[test]
fn char_by_char_matches_single_call() {
    for fixture in fixtures() {
        let parser = StreamParser::default();
        let expected = run(parser, &[fixture.input.as_str()]);

        let chars: Vec<String> = fixture.input.chars().map(String::from).collect();
        let chunks: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(run(parser, &chunks), expected);
    }
}

#[test]
fn document_order_structural_sequence() {
    let fixtures = fixtures();
    let (structural, _) = run(StreamParser::default(), &[fixtures[0].input.as_str()]);
    let kinds: Vec<_> = structural.iter().map(Event::kind).collect();
    assert_eq!(
        kinds,
        [
            "stream_item",
            "stream_item",
            "stream_complete",
            "output",
            "progress",
            "progress",
            "whats_next",
            "done",
        ]
    );
    assert_eq!(
        structural[1],
        Event::StreamItem {
            icon: "📈".to_string(),
            text: "Estimating conversion".to_string(),
        }
    );
    assert_eq!(
        structural[5],
        Event::Progress {
            step: 3,
            state: ProgressState::Active,
        }
    );
    assert_eq!(
        structural[6],
        Event::WhatsNext {
            icon: "✋".to_string(),
            title: "Pick a channel".to_string(),
            desc: "We will compare SEO > ads".to_string(),
        }
    );
}

#[test]
fn remaining_buffer_never_contains_prose_before_a_tag() {
    let parser = StreamParser::default();
    let fixtures = fixtures();
    let input = &fixtures[0].input;

    for i in split_points(input) {
        let out = parser.parse("", &input[..i]);
        if let Some(first) = out.remaining_buffer.chars().next() {
            assert_eq!(first, '<', "split at {i}");
        }
    }
}
