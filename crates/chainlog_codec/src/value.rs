//! Field kinds, decoded field values and native field mapping.

use crate::error::{CodecError, CodecResult};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The wire type of a field.
///
/// The numeric code is what field-definition records carry on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldKind {
    /// Boolean.
    Bool = 0,
    /// Signed 8-bit integer.
    I8 = 1,
    /// Signed 16-bit integer.
    I16 = 2,
    /// Signed 32-bit integer.
    I32 = 3,
    /// Signed 64-bit integer.
    I64 = 4,
    /// Unsigned 8-bit integer.
    U8 = 5,
    /// Unsigned 16-bit integer.
    U16 = 6,
    /// Unsigned 32-bit integer.
    U32 = 7,
    /// Unsigned 64-bit integer.
    U64 = 8,
    /// 32-bit float, carried as its bit pattern.
    F32 = 9,
    /// 64-bit float, carried as its bit pattern.
    F64 = 10,
    /// UTC timestamp in ticks.
    Timestamp = 11,
    /// UTF-8 string.
    String = 12,
    /// Opaque bytes.
    Bytes = 13,
}

/// How many bytes a field occupies natively, and whether the wire length
/// doubles as the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    /// Inline value of the given native byte width.
    Fixed(u8),
    /// Length-declared payload.
    Variable,
}

impl FieldKind {
    /// Converts a wire code to a kind.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            0 => Self::Bool,
            1 => Self::I8,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::I64,
            5 => Self::U8,
            6 => Self::U16,
            7 => Self::U32,
            8 => Self::U64,
            9 => Self::F32,
            10 => Self::F64,
            11 => Self::Timestamp,
            12 => Self::String,
            13 => Self::Bytes,
            _ => return None,
        })
    }

    /// Returns the wire code of this kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns the native width of this kind.
    #[must_use]
    pub const fn width(self) -> FieldWidth {
        match self {
            Self::Bool | Self::I8 | Self::U8 => FieldWidth::Fixed(1),
            Self::I16 | Self::U16 => FieldWidth::Fixed(2),
            Self::I32 | Self::U32 | Self::F32 => FieldWidth::Fixed(4),
            Self::I64 | Self::U64 | Self::F64 | Self::Timestamp => FieldWidth::Fixed(8),
            Self::String | Self::Bytes => FieldWidth::Variable,
        }
    }

    /// Returns true if the varint on the wire is the value itself.
    #[must_use]
    pub const fn is_inline(self) -> bool {
        matches!(self.width(), FieldWidth::Fixed(_))
    }

    /// Returns the lowercase name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Timestamp => "timestamp",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A UTC point in time, in 100-nanosecond ticks since the Unix epoch.
///
/// Transactions carry their timestamp in this form; record ids and
/// created/edited times are derived from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Ticks per second.
    pub const TICKS_PER_SECOND: i64 = 10_000_000;

    /// Creates a timestamp from raw ticks.
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Returns the raw tick count.
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let ticks = since_epoch.as_nanos() / 100;
        Self(i64::try_from(ticks).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

/// A decoded field value, normalized to the widest type of its family.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Null value of a nullable field.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any signed integer kind.
    Int(i64),
    /// Any unsigned integer kind.
    UInt(u64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Timestamp.
    Timestamp(Timestamp),
    /// UTF-8 string.
    String(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Returns true for [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the variant name, for diagnostics.
    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Timestamp(_) => "timestamp",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// A native Rust type that can back an entity field.
///
/// Implemented for `bool`, every fixed-size integer, `f32`, `f64`,
/// [`Timestamp`], `String`, `Vec<u8>`, and `Option` of each (the nullable
/// variants).
pub trait NativeField: Sized {
    /// Wire kind of the field.
    const KIND: FieldKind;
    /// Whether the native type can hold null.
    const NULLABLE: bool;

    /// Converts the native value into a field value.
    fn to_field_value(&self) -> FieldValue;

    /// Converts a decoded field value into the native type.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is null for a non-nullable type, belongs
    /// to another kind, or does not fit the native range.
    fn from_field_value(value: FieldValue) -> CodecResult<Self>;
}

fn mismatch<T>(kind: FieldKind, value: &FieldValue) -> CodecResult<T> {
    match value {
        FieldValue::Null => Err(CodecError::UnexpectedNull { kind }),
        other => Err(CodecError::KindMismatch {
            expected: kind,
            actual: other.variant_name(),
        }),
    }
}

macro_rules! impl_native_int {
    ($($ty:ty => $kind:ident, $variant:ident, $wide:ty;)*) => {
        $(
            impl NativeField for $ty {
                const KIND: FieldKind = FieldKind::$kind;
                const NULLABLE: bool = false;

                fn to_field_value(&self) -> FieldValue {
                    FieldValue::$variant(<$wide>::from(*self))
                }

                fn from_field_value(value: FieldValue) -> CodecResult<Self> {
                    match value {
                        FieldValue::$variant(n) => <$ty>::try_from(n)
                            .map_err(|_| CodecError::out_of_range(FieldKind::$kind, n)),
                        other => mismatch(FieldKind::$kind, &other),
                    }
                }
            }
        )*
    };
}

impl_native_int! {
    i8 => I8, Int, i64;
    i16 => I16, Int, i64;
    i32 => I32, Int, i64;
    i64 => I64, Int, i64;
    u8 => U8, UInt, u64;
    u16 => U16, UInt, u64;
    u32 => U32, UInt, u64;
    u64 => U64, UInt, u64;
}

macro_rules! impl_native_direct {
    ($($ty:ty => $kind:ident, $variant:ident;)*) => {
        $(
            impl NativeField for $ty {
                const KIND: FieldKind = FieldKind::$kind;
                const NULLABLE: bool = false;

                fn to_field_value(&self) -> FieldValue {
                    FieldValue::$variant(Clone::clone(self))
                }

                fn from_field_value(value: FieldValue) -> CodecResult<Self> {
                    match value {
                        FieldValue::$variant(v) => Ok(v),
                        other => mismatch(FieldKind::$kind, &other),
                    }
                }
            }
        )*
    };
}

impl_native_direct! {
    bool => Bool, Bool;
    f32 => F32, F32;
    f64 => F64, F64;
    Timestamp => Timestamp, Timestamp;
    String => String, String;
    Vec<u8> => Bytes, Bytes;
}

impl<V: NativeField> NativeField for Option<V> {
    const KIND: FieldKind = V::KIND;
    const NULLABLE: bool = true;

    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(v) => v.to_field_value(),
            None => FieldValue::Null,
        }
    }

    fn from_field_value(value: FieldValue) -> CodecResult<Self> {
        match value {
            FieldValue::Null => Ok(None),
            other => V::from_field_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_roundtrip() {
        for code in 0..=13 {
            let kind = FieldKind::from_code(code).unwrap();
            assert_eq!(u64::from(kind.code()), code);
        }
        assert_eq!(FieldKind::from_code(14), None);
    }

    #[test]
    fn kind_widths() {
        assert_eq!(FieldKind::Bool.width(), FieldWidth::Fixed(1));
        assert_eq!(FieldKind::I16.width(), FieldWidth::Fixed(2));
        assert_eq!(FieldKind::F32.width(), FieldWidth::Fixed(4));
        assert_eq!(FieldKind::Timestamp.width(), FieldWidth::Fixed(8));
        assert!(!FieldKind::String.is_inline());
        assert!(!FieldKind::Bytes.is_inline());
    }

    #[test]
    fn native_int_range_checked() {
        assert_eq!(i8::from_field_value(FieldValue::Int(-128)), Ok(-128));
        assert!(matches!(
            i8::from_field_value(FieldValue::Int(128)),
            Err(CodecError::ValueOutOfRange { kind: FieldKind::I8, .. })
        ));
        assert!(matches!(
            u16::from_field_value(FieldValue::UInt(70_000)),
            Err(CodecError::ValueOutOfRange { kind: FieldKind::U16, .. })
        ));
    }

    #[test]
    fn native_null_handling() {
        assert_eq!(
            String::from_field_value(FieldValue::Null),
            Err(CodecError::UnexpectedNull {
                kind: FieldKind::String
            })
        );
        assert_eq!(
            Option::<String>::from_field_value(FieldValue::Null),
            Ok(None)
        );
        assert_eq!(Some(5u32).to_field_value(), FieldValue::UInt(5));
        assert_eq!(None::<u32>.to_field_value(), FieldValue::Null);
        assert!(<Option<u32> as NativeField>::NULLABLE);
        assert!(!<u32 as NativeField>::NULLABLE);
    }

    #[test]
    fn native_kind_mismatch() {
        assert_eq!(
            bool::from_field_value(FieldValue::Int(1)),
            Err(CodecError::KindMismatch {
                expected: FieldKind::Bool,
                actual: "int"
            })
        );
    }

    #[test]
    fn timestamp_now_is_after_epoch() {
        assert!(Timestamp::now().ticks() > 0);
    }
}
