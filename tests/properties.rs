//! Property-based tests for descriptors, endpoint lifetime and transfer.

mod common;

use common::{loopback, IO1, IO2};
use proptest::prelude::*;
use serialdev_harness::backend::LoopbackBackend;
use serialdev_harness::{ConnectionString, Endpoint, HarnessError, HarnessRunner};
use std::time::Duration;

/// Strategy for a framing field: a bare baud or baud plus parity, data and stop bits.
fn format_strategy() -> impl Strategy<Value = String> {
    let framing = (
        prop::sample::select(vec!['N', 'E', 'O', 'n', 'e', 'o']),
        5u8..=8,
        1u8..=2,
    )
        .prop_map(|(p, d, s)| format!("{p}{d}{s}"));
    (1u32..=4_000_000, prop::option::of(framing))
        .prop_map(|(baud, framing)| format!("{baud}{}", framing.unwrap_or_default()))
}

/// Strategy for the optional trailing modifiers.
fn modifiers_strategy() -> impl Strategy<Value = Vec<String>> {
    let rs485 = prop_oneof![
        Just("rs485=off".to_string()),
        (0u32..10_000, 0u32..10_000).prop_map(|(pre, post)| format!("rs485={pre}:{post}")),
    ];
    (
        any::<bool>(),
        prop::option::of(prop::sample::select(vec!["RTSCTS", "XONXOFF", "rtscts"])),
        prop::option::of(rs485),
    )
        .prop_map(|(local, flow, rs485)| {
            let mut out = Vec::new();
            if local {
                out.push("LOCAL".to_string());
            }
            out.extend(flow.map(str::to_string));
            out.extend(rs485);
            out
        })
}

/// Strategy for a valid descriptor on one end of the default loopback pair.
fn valid_connection_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["loop0a", "loop0b"]),
        format_strategy(),
        modifiers_strategy(),
    )
        .prop_map(|(path, format, modifiers)| {
            let mut parts = vec!["serialdev".to_string(), path.to_string(), format];
            parts.extend(modifiers);
            parts.join(",")
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every valid descriptor opens, closes twice without effect and leaves
    /// nothing allocated.
    #[test]
    fn prop_valid_descriptor_open_close(conn in valid_connection_strategy()) {
        let backend = LoopbackBackend::default();
        let mut endpoint = Endpoint::open(&backend, &conn).unwrap();
        prop_assert!(endpoint.is_open());
        prop_assert_eq!(backend.pipe().open_count(), 1);

        endpoint.close();
        endpoint.close();
        prop_assert!(!endpoint.is_open());
        prop_assert_eq!(backend.pipe().open_count(), 0);
    }

    /// The canonical form parses back to the same descriptor.
    #[test]
    fn prop_canonical_form_is_stable(conn in valid_connection_strategy()) {
        let parsed: ConnectionString = conn.parse().unwrap();
        let reparsed: ConnectionString = parsed.to_string().parse().unwrap();
        prop_assert_eq!(parsed, reparsed);
    }

    /// Anything outside the `serialdev` class is rejected before a channel exists.
    #[test]
    fn prop_foreign_class_rejected(class in "[a-z]{1,10}", rest in "[ -~]{0,30}") {
        prop_assume!(class != "serialdev");
        let backend = LoopbackBackend::default();
        let input = format!("{class},{rest}");

        let err = Endpoint::open(&backend, &input).unwrap_err();
        let is_invalid = matches!(err, HarnessError::InvalidConnectionString { .. });
        prop_assert!(is_invalid, "{}", err);
        prop_assert_eq!(backend.pipe().open_count(), 0);
    }

    /// A garbled framing field is rejected before a channel exists.
    #[test]
    fn prop_bad_format_rejected(format in "[0-9]{0,3}[A-Za-z][A-Za-z0-9]{0,4}") {
        prop_assume!(format.parse::<serialdev_harness::SerialFormat>().is_err());
        let backend = LoopbackBackend::default();

        let err = Endpoint::open(&backend, &format!("serialdev,loop0a,{format}")).unwrap_err();
        let is_invalid = matches!(err, HarnessError::InvalidConnectionString { .. });
        prop_assert!(is_invalid, "{}", err);
        prop_assert_eq!(backend.pipe().open_count(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Arbitrary payloads arrive byte-exact in both directions however the
    /// reads are chunked.
    #[test]
    fn prop_transfer_survives_chunking(
        payload in prop::collection::vec(any::<u8>(), 1..512),
        max_chunk in 1usize..64,
    ) {
        let backend = loopback(max_chunk);
        let runner = HarnessRunner::new(backend.clone());

        runner.exchange(IO1, IO2, &payload).unwrap();
        prop_assert_eq!(backend.pipe().open_count(), 0);
    }
}

#[test]
fn test_test_string_with_every_small_chunk_size() {
    for max_chunk in 1..=22 {
        let backend = loopback(max_chunk);
        let runner = HarnessRunner::new(backend.clone());
        runner
            .exchange(IO1, IO2, b"This is a test string!")
            .unwrap_or_else(|e| panic!("max_chunk {max_chunk}: {e}"));
    }
}

#[test]
fn test_closed_sender_fails_fast() {
    let backend = loopback(4);
    let runner = HarnessRunner::new(backend.clone());
    let started = std::time::Instant::now();

    let err = runner
        .run_scenario(IO1, IO2, |io1, io2| {
            io1.close();
            serialdev_harness::verify_transfer(io1, io2, b"gone", Duration::from_millis(50))
        })
        .unwrap_err();

    assert!(matches!(err, HarnessError::NotOpen { .. }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}
