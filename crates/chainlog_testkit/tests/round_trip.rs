//! Native records survive the trip through the writer, the log and the reader.

use chainlog_codec::{CodecError, FieldCodec, FieldKind, FieldValue, Timestamp, WireValue};
use chainlog_core::{CoreError, EntityId};
use chainlog_testkit::prelude::*;
use proptest::prelude::*;

fn probe(chain: &TestChain<chainlog_storage::InMemoryBackend>, id: EntityId) -> Probe {
    let stored = chain
        .reader
        .applier()
        .cache_set::<Probe>(PROBE)
        .and_then(|set| set.get(id))
        .expect("probe not materialized");
    (*stored).clone()
}

fn extremes() -> Vec<Probe> {
    let low = Probe {
        flag: false,
        tiny: i8::MIN,
        small: i16::MIN,
        medium: i32::MIN,
        large: i64::MIN,
        byte: 0,
        word: 0,
        dword: 0,
        qword: 0,
        single: f32::MIN,
        double: f64::MIN,
        stamp: Timestamp::from_ticks(i64::MIN + 1),
        text: String::new(),
        blob: Vec::new(),
        opt_flag: Some(false),
        opt_large: Some(i64::MIN + 1),
        opt_qword: Some(0),
        opt_double: Some(-0.0),
        opt_stamp: Some(Timestamp::from_ticks(i64::MIN + 1)),
        opt_text: Some(String::new()),
        opt_blob: Some(Vec::new()),
        ..Probe::default()
    };
    let high = Probe {
        flag: true,
        tiny: i8::MAX,
        small: i16::MAX,
        medium: i32::MAX,
        large: i64::MAX,
        byte: u8::MAX,
        word: u16::MAX,
        dword: u32::MAX,
        qword: u64::MAX,
        single: f32::MAX,
        double: f64::INFINITY,
        stamp: Timestamp::from_ticks(i64::MAX),
        text: "ünïcödé ✓".repeat(40),
        blob: (0..=255).collect(),
        opt_flag: Some(true),
        opt_large: Some(i64::MAX),
        opt_qword: Some(u64::MAX - 1),
        opt_double: Some(f64::MAX),
        opt_stamp: Some(Timestamp::from_ticks(i64::MAX)),
        opt_text: Some("x".repeat(70_000)),
        opt_blob: Some(vec![0x01; 300]),
        ..Probe::default()
    };
    vec![low, high, Probe::default()]
}

#[test]
fn extreme_values_round_trip() {
    init_tracing();
    let mut chain = TestChain::memory();
    let mut ids = Vec::new();
    for record in extremes() {
        ids.push((chain.writer.instantiate(PROBE, &record).unwrap(), record));
    }
    chain.writer.seal_block().unwrap();
    chain.poll();

    for (id, mut expected) in ids {
        let stored = probe(&chain, id);
        expected.meta = stored.meta;
        assert_eq!(stored, expected);
        assert_eq!(stored.meta.id, id);
    }
}

#[test]
fn set_fields_round_trip_each_column() {
    let mut chain = TestChain::memory();
    let id = chain.writer.instantiate(PROBE, &Probe::default()).unwrap();
    let high = extremes().swap_remove(1);

    for (name, _, _) in PROBE_FIELDS {
        chain.writer.set_fields(id, PROBE, &high, &[name]).unwrap();
    }
    chain.writer.seal_block().unwrap();
    chain.poll();

    let stored = probe(&chain, id);
    let mut expected = high;
    expected.meta = stored.meta;
    assert_eq!(stored, expected);
    assert!(stored.meta.edited > stored.meta.created);
}

#[test]
fn nulls_can_be_written_over_values() {
    let mut chain = TestChain::memory();
    let full = extremes().swap_remove(1);
    let id = chain.writer.instantiate(PROBE, &full).unwrap();
    let cleared = Probe::default();
    chain
        .writer
        .set_fields(
            id,
            PROBE,
            &cleared,
            &["OptFlag", "OptLarge", "OptQword", "OptDouble", "OptStamp", "OptText", "OptBlob"],
        )
        .unwrap();
    chain.poll();

    let stored = probe(&chain, id);
    assert_eq!(stored.opt_flag, None);
    assert_eq!(stored.opt_large, None);
    assert_eq!(stored.opt_qword, None);
    assert_eq!(stored.opt_double, None);
    assert_eq!(stored.opt_stamp, None);
    assert_eq!(stored.opt_text, None);
    assert_eq!(stored.opt_blob, None);
    assert_eq!(stored.text, full.text);
}

#[test]
fn values_without_a_nullable_form_are_refused() {
    let cases = [
        Probe {
            opt_qword: Some(u64::MAX),
            ..Probe::default()
        },
        Probe {
            opt_large: Some(i64::MIN),
            ..Probe::default()
        },
        Probe {
            opt_stamp: Some(Timestamp::from_ticks(i64::MIN)),
            ..Probe::default()
        },
        Probe {
            stamp: Timestamp::from_ticks(i64::MIN),
            ..Probe::default()
        },
    ];

    let mut chain = TestChain::memory();
    for record in cases {
        let before = chain.log_size();
        let err = chain.writer.instantiate(PROBE, &record).unwrap_err();
        assert!(
            matches!(err, CoreError::Codec(CodecError::NullableOverflow { .. })),
            "{err}"
        );
        assert_eq!(chain.log_size(), before);
    }
}

#[test]
fn codec_boundaries_per_kind() {
    let cases: Vec<(FieldKind, bool, FieldValue, WireValue)> = vec![
        (FieldKind::Bool, false, FieldValue::Bool(true), WireValue::Inline(1)),
        (FieldKind::Bool, true, FieldValue::Bool(false), WireValue::Inline(1)),
        (FieldKind::Bool, true, FieldValue::Null, WireValue::Inline(0)),
        (FieldKind::I8, false, FieldValue::Int(-128), WireValue::Inline(255)),
        (FieldKind::I32, false, FieldValue::Int(-5), WireValue::Inline(9)),
        (FieldKind::I64, false, FieldValue::Int(i64::MIN), WireValue::Inline(u64::MAX)),
        (FieldKind::I64, true, FieldValue::Int(i64::MAX), WireValue::Inline(u64::MAX - 1)),
        (FieldKind::I64, true, FieldValue::Int(0), WireValue::Inline(1)),
        (FieldKind::I16, true, FieldValue::Int(-2), WireValue::Inline(5)),
        (FieldKind::U8, false, FieldValue::UInt(255), WireValue::Inline(255)),
        (FieldKind::U64, false, FieldValue::UInt(u64::MAX), WireValue::Inline(u64::MAX)),
        (FieldKind::U64, true, FieldValue::UInt(u64::MAX - 1), WireValue::Inline(u64::MAX)),
        (FieldKind::U32, true, FieldValue::Null, WireValue::Inline(0)),
        (FieldKind::F32, false, FieldValue::F32(1.0), WireValue::Inline(0x3F80_0000)),
        (FieldKind::F64, true, FieldValue::F64(0.0), WireValue::Inline(1)),
        (
            FieldKind::Timestamp,
            false,
            FieldValue::Timestamp(Timestamp::from_ticks(0)),
            WireValue::Inline(1),
        ),
        (
            FieldKind::Timestamp,
            true,
            FieldValue::Timestamp(Timestamp::from_ticks(-1)),
            WireValue::Inline(3),
        ),
        (FieldKind::String, false, FieldValue::String(String::new()), WireValue::Bytes(vec![])),
        (
            FieldKind::String,
            true,
            FieldValue::String(String::new()),
            WireValue::Bytes(vec![0x01]),
        ),
        (FieldKind::Bytes, true, FieldValue::Null, WireValue::Bytes(vec![])),
    ];

    for (kind, nullable, value, wire) in cases {
        let codec = FieldCodec::resolve(kind, nullable);
        assert_eq!(codec.encode(&value).unwrap(), wire, "{kind} nullable={nullable}");
        assert_eq!(codec.decode(&wire).unwrap(), value, "{kind} nullable={nullable}");
    }
}

#[test]
fn nullable_overflow_per_kind() {
    let overflowing = [
        (FieldKind::U64, FieldValue::UInt(u64::MAX)),
        (FieldKind::I64, FieldValue::Int(i64::MIN)),
        (FieldKind::F64, FieldValue::F64(f64::from_bits(u64::MAX))),
        (FieldKind::Timestamp, FieldValue::Timestamp(Timestamp::from_ticks(i64::MIN))),
    ];
    for (kind, value) in overflowing {
        assert_eq!(
            FieldCodec::resolve(kind, true).encode(&value),
            Err(CodecError::NullableOverflow { kind })
        );
    }
    assert_eq!(
        FieldCodec::resolve(FieldKind::Timestamp, false).encode(&FieldValue::Timestamp(
            Timestamp::from_ticks(i64::MIN)
        )),
        Err(CodecError::NullableOverflow {
            kind: FieldKind::Timestamp
        })
    );
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn generated_probes_round_trip(records in prop::collection::vec(probe_strategy(), 1..8)) {
        let mut chain = TestChain::memory();
        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            ids.push(chain.writer.instantiate(PROBE, record).unwrap());
        }
        chain.writer.seal_block().unwrap();
        chain.poll();

        for (id, record) in ids.into_iter().zip(records) {
            let stored = probe(&chain, id);
            let mut expected = record;
            expected.meta = stored.meta;
            prop_assert_eq!(stored, expected);
        }
    }

    #[test]
    fn generated_values_round_trip_through_the_codec(
        (kind, nullable, value) in (0u64..14, any::<bool>()).prop_flat_map(|(code, nullable)| {
            let kind = FieldKind::from_code(code).unwrap();
            nullable_field_value_strategy(kind, nullable)
                .prop_map(move |value| (kind, nullable, value))
        })
    ) {
        let codec = FieldCodec::resolve(kind, nullable);
        let wire = codec.encode(&value).unwrap();
        prop_assert_eq!(codec.decode(&wire).unwrap(), value);
    }
}
