//! Property-based tests using proptest
//!
//! Framing must not depend on how the byte stream is chunked, the tag parser
//! must accept anything, and station updates must never lose known values.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use n3fjp_relay::client::ClientState;
use n3fjp_relay::protocol::codec::encode_message;
use n3fjp_relay::protocol::messages::StationAnnouncement;
use n3fjp_relay::protocol::{Framer, parse_tags};
use proptest::prelude::*;

const LIMIT: usize = 1 << 20;

fn body() -> impl Strategy<Value = String> {
    "[A-Z0-9</> ]{1,40}".prop_filter("markers are reserved", |b| {
        !b.contains("<BOR>") && !b.contains("<EOR>")
    })
}

fn any_text_body() -> impl Strategy<Value = String> {
    "\\PC{1,20}".prop_filter("markers are reserved", |b| {
        !b.contains("<BOR>") && !b.contains("<EOR>")
    })
}

fn encode_all(bodies: &[String]) -> Vec<u8> {
    bodies.iter().flat_map(|b| encode_message(b)).collect()
}

fn feed_in_chunks(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<String> {
    cuts.retain(|&c| c < bytes.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut framer = Framer::new(LIMIT);
    let mut out = Vec::new();
    let mut start = 0;
    for cut in cuts {
        out.extend(framer.push(&bytes[start..cut]));
        start = cut;
    }
    out.extend(framer.push(&bytes[start..]));
    out
}

fn optional_field() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        Just(Some("  ".to_string())),
        "[A-Z0-9]{1,6}".prop_map(Some),
    ]
}

fn announcement() -> impl Strategy<Value = StationAnnouncement> {
    (optional_field(), optional_field(), optional_field()).prop_map(|(station, band, mode)| {
        StationAnnouncement {
            station,
            band,
            mode,
        }
    })
}

// Property: any chunking of an encoded stream yields the same bodies, in order
proptest! {
    #[test]
    fn prop_framing_is_chunk_invariant(
        bodies in prop::collection::vec(body(), 1..8),
        cuts in prop::collection::vec(0usize..2000, 0..20),
    ) {
        let bytes = encode_all(&bodies);
        prop_assert_eq!(feed_in_chunks(&bytes, cuts), bodies);
    }
}

// Property: arbitrary text, including bytes that read as markers off the code-unit grid
proptest! {
    #[test]
    fn prop_framing_any_text_is_chunk_invariant(
        bodies in prop::collection::vec(any_text_body(), 1..6),
        cuts in prop::collection::vec(0usize..1000, 0..20),
    ) {
        let bytes = encode_all(&bodies);
        prop_assert_eq!(feed_in_chunks(&bytes, cuts), bodies);
    }
}

// Property: byte-at-a-time delivery matches a single read
proptest! {
    #[test]
    fn prop_single_byte_reads(bodies in prop::collection::vec(body(), 1..4)) {
        let bytes = encode_all(&bodies);
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        prop_assert_eq!(feed_in_chunks(&bytes, cuts), bodies);
    }
}

// Property: the framer never panics on arbitrary bytes
proptest! {
    #[test]
    fn prop_framer_accepts_garbage(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..256), 0..8)) {
        let mut framer = Framer::new(LIMIT);
        for chunk in chunks {
            framer.push(&chunk);
        }
    }
}

// Property: the tag parser is total
proptest! {
    #[test]
    fn prop_parser_never_panics(text in any::<String>()) {
        let _ = parse_tags(&text);
    }
}

// Property: well-formed flat tags are recovered with their values
proptest! {
    #[test]
    fn prop_parser_recovers_flat_tags(
        fields in prop::collection::btree_map("[A-Z]{1,8}", "[a-z0-9 ]{0,12}", 0..6),
    ) {
        let text: String = fields
            .iter()
            .map(|(name, value)| format!("<{0}>{1}</{0}>", name, value))
            .collect();
        let tags = parse_tags(&text);

        prop_assert_eq!(tags.len(), fields.len());
        for (name, value) in &fields {
            prop_assert_eq!(tags.value(name), Some(value.as_str()));
        }
    }
}

// Property: an empty or missing field never erases a known value
proptest! {
    #[test]
    fn prop_update_is_non_destructive(updates in prop::collection::vec(announcement(), 1..10)) {
        let mut state = ClientState::default();
        for update in &updates {
            let before = state.clone();
            state.apply(update);

            let keeps = |old: Option<&str>, new: Option<&str>, incoming: &Option<String>| {
                let blank = incoming.as_deref().map(str::trim).is_none_or(str::is_empty);
                !blank || old == new
            };
            prop_assert!(keeps(before.station(), state.station(), &update.station));
            prop_assert!(keeps(before.band(), state.band(), &update.band));
            prop_assert!(keeps(before.mode(), state.mode(), &update.mode));

            if before.station().is_some() {
                prop_assert!(state.station().is_some());
            }
        }
    }
}

// Property: applying the same announcement twice changes nothing the second time
proptest! {
    #[test]
    fn prop_update_is_idempotent(start in announcement(), update in announcement()) {
        let mut state = ClientState::default();
        state.apply(&start);
        state.apply(&update);
        let once = state.clone();
        state.apply(&update);
        prop_assert_eq!(state, once);
    }
}
