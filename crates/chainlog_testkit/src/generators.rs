//! Property-based test generators using proptest.
//!
//! Provides strategies for generating field values, entities and chain
//! operations that stay inside the wire format's representable ranges.

use crate::fixtures::{Probe, Widget};
use chainlog_codec::{FieldKind, FieldValue, Timestamp};
use proptest::prelude::*;

/// Strategy for non-negative timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0..i64::MAX).prop_map(Timestamp::from_ticks)
}

/// Strategy for timestamps a nullable field can carry: anything but `i64::MIN`.
pub fn wire_timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (i64::MIN + 1..=i64::MAX).prop_map(Timestamp::from_ticks)
}

/// Strategy for floats without NaN, so values compare equal after a round trip.
pub fn finite_f64_strategy() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
}

/// Strategy for 32-bit floats without NaN.
pub fn finite_f32_strategy() -> impl Strategy<Value = f32> {
    prop::num::f32::NORMAL | prop::num::f32::SUBNORMAL | prop::num::f32::ZERO
}

/// Strategy for non-null values of one kind, within the kind's range.
///
/// With `nullable` set, the few values whose nullable encoding would
/// overflow are excluded.
pub fn field_value_strategy(kind: FieldKind, nullable: bool) -> BoxedStrategy<FieldValue> {
    match kind {
        FieldKind::Bool => any::<bool>().prop_map(FieldValue::Bool).boxed(),
        FieldKind::I8 => any::<i8>().prop_map(|n| FieldValue::Int(n.into())).boxed(),
        FieldKind::I16 => any::<i16>().prop_map(|n| FieldValue::Int(n.into())).boxed(),
        FieldKind::I32 => any::<i32>().prop_map(|n| FieldValue::Int(n.into())).boxed(),
        FieldKind::I64 if nullable => (i64::MIN + 1..=i64::MAX).prop_map(FieldValue::Int).boxed(),
        FieldKind::I64 => any::<i64>().prop_map(FieldValue::Int).boxed(),
        FieldKind::U8 => any::<u8>().prop_map(|n| FieldValue::UInt(n.into())).boxed(),
        FieldKind::U16 => any::<u16>().prop_map(|n| FieldValue::UInt(n.into())).boxed(),
        FieldKind::U32 => any::<u32>().prop_map(|n| FieldValue::UInt(n.into())).boxed(),
        FieldKind::U64 if nullable => (0..u64::MAX).prop_map(FieldValue::UInt).boxed(),
        FieldKind::U64 => any::<u64>().prop_map(FieldValue::UInt).boxed(),
        FieldKind::F32 => finite_f32_strategy().prop_map(FieldValue::F32).boxed(),
        FieldKind::F64 => finite_f64_strategy().prop_map(FieldValue::F64).boxed(),
        FieldKind::Timestamp => wire_timestamp_strategy()
            .prop_map(FieldValue::Timestamp)
            .boxed(),
        FieldKind::String => ".{0,64}".prop_map(FieldValue::String).boxed(),
        FieldKind::Bytes => prop::collection::vec(any::<u8>(), 0..300)
            .prop_map(FieldValue::Bytes)
            .boxed(),
    }
}

/// Strategy for values of a field, including null when it is nullable.
pub fn nullable_field_value_strategy(kind: FieldKind, nullable: bool) -> BoxedStrategy<FieldValue> {
    if nullable {
        prop_oneof![
            1 => Just(FieldValue::Null),
            4 => field_value_strategy(kind, true),
        ]
        .boxed()
    } else {
        field_value_strategy(kind, false)
    }
}

/// Strategy for widget names, including multi-byte text and long names.
pub fn widget_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-zA-Z0-9 ]{0,32}",
        1 => "\\PC{0,8}",
        1 => "[a-z]{250,300}",
    ]
}

/// Strategy for widgets with default metadata.
pub fn widget_strategy() -> impl Strategy<Value = Widget> {
    (
        widget_name_strategy(),
        prop::option::of(any::<u32>()),
        any::<bool>(),
    )
        .prop_map(|(name, weight, active)| Widget {
            name,
            weight,
            active,
            ..Widget::default()
        })
}

/// Strategy for probes covering every field kind.
pub fn probe_strategy() -> impl Strategy<Value = Probe> {
    let fixed = (
        any::<bool>(),
        any::<i8>(),
        any::<i16>(),
        any::<i32>(),
        any::<i64>(),
        any::<u8>(),
        any::<u16>(),
        any::<u32>(),
        any::<u64>(),
        finite_f32_strategy(),
        finite_f64_strategy(),
        wire_timestamp_strategy(),
    );
    let variable = (".{0,32}", prop::collection::vec(any::<u8>(), 0..64));
    let nullable = (
        prop::option::of(any::<bool>()),
        prop::option::of(i64::MIN + 1..=i64::MAX),
        prop::option::of(0..u64::MAX),
        prop::option::of(finite_f64_strategy()),
        prop::option::of(wire_timestamp_strategy()),
        prop::option::of(".{0,32}"),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..64)),
    );
    (fixed, variable, nullable).prop_map(
        |(
            (flag, tiny, small, medium, large, byte, word, dword, qword, single, double, stamp),
            (text, blob),
            (opt_flag, opt_large, opt_qword, opt_double, opt_stamp, opt_text, opt_blob),
        )| Probe {
            meta: Default::default(),
            flag,
            tiny,
            small,
            medium,
            large,
            byte,
            word,
            dword,
            qword,
            single,
            double,
            stamp,
            text,
            blob,
            opt_flag,
            opt_large,
            opt_qword,
            opt_double,
            opt_stamp,
            opt_text,
            opt_blob,
        },
    )
}

/// One step applied to a chain of widgets.
#[derive(Debug, Clone)]
pub enum ChainOp {
    /// Instantiate a new widget.
    Create(Widget),
    /// Rename the widget at `target % live`.
    Rename {
        /// Index into the live widgets.
        target: usize,
        /// New name.
        name: String,
    },
    /// Toggle `Active` on the widget at `target % live`.
    Toggle {
        /// Index into the live widgets.
        target: usize,
    },
    /// Archive the widget at `target % live`.
    Archive {
        /// Index into the live widgets.
        target: usize,
    },
    /// Seal the current block.
    Seal,
}

/// Strategy for chain operations.
pub fn chain_op_strategy() -> impl Strategy<Value = ChainOp> {
    prop_oneof![
        4 => widget_strategy().prop_map(ChainOp::Create),
        2 => (any::<usize>(), widget_name_strategy())
            .prop_map(|(target, name)| ChainOp::Rename { target, name }),
        1 => any::<usize>().prop_map(|target| ChainOp::Toggle { target }),
        1 => any::<usize>().prop_map(|target| ChainOp::Archive { target }),
        1 => Just(ChainOp::Seal),
    ]
}

/// Strategy for a sequence of chain operations.
pub fn chain_op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<ChainOp>> {
    prop::collection::vec(chain_op_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlog_codec::FieldCodec;

    const KINDS: [FieldKind; 14] = [
        FieldKind::Bool,
        FieldKind::I8,
        FieldKind::I16,
        FieldKind::I32,
        FieldKind::I64,
        FieldKind::U8,
        FieldKind::U16,
        FieldKind::U32,
        FieldKind::U64,
        FieldKind::F32,
        FieldKind::F64,
        FieldKind::Timestamp,
        FieldKind::String,
        FieldKind::Bytes,
    ];

    fn kind_strategy() -> impl Strategy<Value = (FieldKind, bool)> {
        (prop::sample::select(KINDS.to_vec()), any::<bool>())
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_values_always_encode(
            (kind, nullable, value) in kind_strategy().prop_flat_map(|(kind, nullable)| {
                (Just(kind), Just(nullable), nullable_field_value_strategy(kind, nullable))
            })
        ) {
            let codec = FieldCodec::resolve(kind, nullable);
            let wire = codec.encode(&value);
            prop_assert!(wire.is_ok(), "{:?} rejected {:?}", codec, value);
            prop_assert_eq!(codec.decode(&wire.unwrap()).unwrap(), value);
        }

        #[test]
        fn timestamps_are_non_negative(ts in timestamp_strategy()) {
            prop_assert!(ts.ticks() >= 0);
        }

        #[test]
        fn sequences_respect_bounds(ops in chain_op_sequence_strategy(2, 10)) {
            prop_assert!((2..10).contains(&ops.len()));
        }
    }
}
