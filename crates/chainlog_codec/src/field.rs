//! Per-field wire codecs.
//!
//! A [`FieldCodec`] is resolved once from a field's kind and nullability and
//! then reused for every value of that field, in both directions. Each
//! variant covers one wire type × nullability combination.
//!
//! ## Wire rules
//!
//! | Kind | Non-nullable wire value | Nullable wire value |
//! |------|-------------------------|---------------------|
//! | bool | `0` / `1` | `0` null, `1` false, `2` true |
//! | signed int | zigzag | sign-magnitude fold, `0` null |
//! | unsigned int | value | value + 1, `0` null |
//! | f32 / f64 | bit pattern | bit pattern + 1, `0` null |
//! | timestamp | sign-magnitude fold of ticks | same, `0` null |
//! | string / bytes | payload | `[]` null, `[0x01] ++ payload` present |

use crate::error::{CodecError, CodecResult};
use crate::transform::{
    nullable_signed_decode, nullable_signed_encode, nullable_unsigned_decode,
    nullable_unsigned_encode, zigzag_decode, zigzag_encode,
};
use crate::value::{FieldKind, FieldValue, Timestamp};

/// Leading byte of a present value in a nullable variable-width field.
pub const PRESENCE_TAG: u8 = 0x01;

/// A field value as it travels on the wire, before kind interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    /// Inline value: the varint is the value.
    Inline(u64),
    /// Length-declared payload.
    Bytes(Vec<u8>),
}

impl WireValue {
    /// Returns the payload span this value occupies after its field id.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Inline(_) => 0,
            Self::Bytes(bytes) => bytes.len(),
        }
    }
}

/// Codec for one wire kind × nullability combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCodec {
    /// Non-nullable boolean.
    Bool,
    /// Nullable boolean.
    NullableBool,
    /// Non-nullable signed integer of the given kind.
    Signed(FieldKind),
    /// Nullable signed integer of the given kind.
    NullableSigned(FieldKind),
    /// Non-nullable unsigned integer of the given kind.
    Unsigned(FieldKind),
    /// Nullable unsigned integer of the given kind.
    NullableUnsigned(FieldKind),
    /// Non-nullable 32-bit float.
    Float32,
    /// Nullable 32-bit float.
    NullableFloat32,
    /// Non-nullable 64-bit float.
    Float64,
    /// Nullable 64-bit float.
    NullableFloat64,
    /// Non-nullable timestamp.
    Timestamp,
    /// Nullable timestamp.
    NullableTimestamp,
    /// Non-nullable UTF-8 string.
    Text,
    /// Nullable UTF-8 string.
    NullableText,
    /// Non-nullable byte array.
    Bytes,
    /// Nullable byte array.
    NullableBytes,
}

impl FieldCodec {
    /// Resolves the codec for a kind and nullability.
    #[must_use]
    pub const fn resolve(kind: FieldKind, nullable: bool) -> Self {
        match (kind, nullable) {
            (FieldKind::Bool, false) => Self::Bool,
            (FieldKind::Bool, true) => Self::NullableBool,
            (FieldKind::I8 | FieldKind::I16 | FieldKind::I32 | FieldKind::I64, false) => {
                Self::Signed(kind)
            }
            (FieldKind::I8 | FieldKind::I16 | FieldKind::I32 | FieldKind::I64, true) => {
                Self::NullableSigned(kind)
            }
            (FieldKind::U8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64, false) => {
                Self::Unsigned(kind)
            }
            (FieldKind::U8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64, true) => {
                Self::NullableUnsigned(kind)
            }
            (FieldKind::F32, false) => Self::Float32,
            (FieldKind::F32, true) => Self::NullableFloat32,
            (FieldKind::F64, false) => Self::Float64,
            (FieldKind::F64, true) => Self::NullableFloat64,
            (FieldKind::Timestamp, false) => Self::Timestamp,
            (FieldKind::Timestamp, true) => Self::NullableTimestamp,
            (FieldKind::String, false) => Self::Text,
            (FieldKind::String, true) => Self::NullableText,
            (FieldKind::Bytes, false) => Self::Bytes,
            (FieldKind::Bytes, true) => Self::NullableBytes,
        }
    }

    /// Returns the field kind this codec handles.
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Bool | Self::NullableBool => FieldKind::Bool,
            Self::Signed(kind)
            | Self::NullableSigned(kind)
            | Self::Unsigned(kind)
            | Self::NullableUnsigned(kind) => kind,
            Self::Float32 | Self::NullableFloat32 => FieldKind::F32,
            Self::Float64 | Self::NullableFloat64 => FieldKind::F64,
            Self::Timestamp | Self::NullableTimestamp => FieldKind::Timestamp,
            Self::Text | Self::NullableText => FieldKind::String,
            Self::Bytes | Self::NullableBytes => FieldKind::Bytes,
        }
    }

    /// Returns true if the codec accepts null.
    #[must_use]
    pub const fn is_nullable(self) -> bool {
        matches!(
            self,
            Self::NullableBool
                | Self::NullableSigned(_)
                | Self::NullableUnsigned(_)
                | Self::NullableFloat32
                | Self::NullableFloat64
                | Self::NullableTimestamp
                | Self::NullableText
                | Self::NullableBytes
        )
    }

    /// Returns true if values travel as inline varints.
    #[must_use]
    pub const fn is_inline(self) -> bool {
        self.kind().is_inline()
    }

    /// Encodes a field value to its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if the value belongs to another kind, is null for a
    /// non-nullable codec, exceeds the kind's range, or has no nullable
    /// representation.
    pub fn encode(self, value: &FieldValue) -> CodecResult<WireValue> {
        let kind = self.kind();
        if value.is_null() {
            return match self {
                _ if !self.is_nullable() => Err(CodecError::UnexpectedNull { kind }),
                Self::NullableText | Self::NullableBytes => Ok(WireValue::Bytes(Vec::new())),
                _ => Ok(WireValue::Inline(0)),
            };
        }

        let overflow = || CodecError::NullableOverflow { kind };
        let wire = match (self, value) {
            (Self::Bool, FieldValue::Bool(b)) => WireValue::Inline(u64::from(*b)),
            (Self::NullableBool, FieldValue::Bool(b)) => WireValue::Inline(u64::from(*b) + 1),
            (Self::Signed(_), FieldValue::Int(n)) => {
                check_signed(kind, *n)?;
                WireValue::Inline(zigzag_encode(*n))
            }
            (Self::NullableSigned(_), FieldValue::Int(n)) => {
                check_signed(kind, *n)?;
                WireValue::Inline(nullable_signed_encode(Some(*n)).ok_or_else(overflow)?)
            }
            (Self::Unsigned(_), FieldValue::UInt(n)) => {
                check_unsigned(kind, *n)?;
                WireValue::Inline(*n)
            }
            (Self::NullableUnsigned(_), FieldValue::UInt(n)) => {
                check_unsigned(kind, *n)?;
                WireValue::Inline(nullable_unsigned_encode(Some(*n)).ok_or_else(overflow)?)
            }
            (Self::Float32, FieldValue::F32(f)) => WireValue::Inline(u64::from(f.to_bits())),
            (Self::NullableFloat32, FieldValue::F32(f)) => {
                WireValue::Inline(u64::from(f.to_bits()) + 1)
            }
            (Self::Float64, FieldValue::F64(f)) => WireValue::Inline(f.to_bits()),
            (Self::NullableFloat64, FieldValue::F64(f)) => {
                WireValue::Inline(nullable_unsigned_encode(Some(f.to_bits())).ok_or_else(overflow)?)
            }
            (Self::Timestamp | Self::NullableTimestamp, FieldValue::Timestamp(ts)) => {
                WireValue::Inline(nullable_signed_encode(Some(ts.ticks())).ok_or_else(overflow)?)
            }
            (Self::Text, FieldValue::String(s)) => WireValue::Bytes(s.as_bytes().to_vec()),
            (Self::NullableText, FieldValue::String(s)) => WireValue::Bytes(tagged(s.as_bytes())),
            (Self::Bytes, FieldValue::Bytes(b)) => WireValue::Bytes(b.clone()),
            (Self::NullableBytes, FieldValue::Bytes(b)) => WireValue::Bytes(tagged(b)),
            (_, other) => {
                return Err(CodecError::KindMismatch {
                    expected: kind,
                    actual: other.variant_name(),
                })
            }
        };
        Ok(wire)
    }

    /// Decodes a wire value into a field value.
    ///
    /// # Errors
    ///
    /// Returns an error if the wire shape does not match the kind, a null
    /// arrives for a non-nullable codec, the value exceeds the kind's range,
    /// a string is not UTF-8, or a nullable payload lacks its presence tag.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(self, wire: &WireValue) -> CodecResult<FieldValue> {
        let kind = self.kind();
        match wire {
            WireValue::Inline(raw) => {
                if !self.is_inline() {
                    return Err(CodecError::ShapeMismatch {
                        kind,
                        expected: "variable",
                    });
                }
                self.decode_inline(*raw)
            }
            WireValue::Bytes(bytes) => {
                if self.is_inline() {
                    return Err(CodecError::ShapeMismatch {
                        kind,
                        expected: "inline",
                    });
                }
                self.decode_bytes(bytes)
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn decode_inline(self, raw: u64) -> CodecResult<FieldValue> {
        let kind = self.kind();
        let value = if self.is_nullable() || matches!(self, Self::Timestamp) {
            if raw == 0 {
                if self.is_nullable() {
                    return Ok(FieldValue::Null);
                }
                return Err(CodecError::UnexpectedNull { kind });
            }
            match self {
                Self::NullableSigned(_) | Self::Timestamp | Self::NullableTimestamp => {
                    let n = nullable_signed_decode(raw).unwrap_or_default();
                    if kind == FieldKind::Timestamp {
                        FieldValue::Timestamp(Timestamp::from_ticks(n))
                    } else {
                        check_signed(kind, n)?;
                        FieldValue::Int(n)
                    }
                }
                _ => {
                    let n = nullable_unsigned_decode(raw).unwrap_or_default();
                    self.decode_unsigned_family(n)?
                }
            }
        } else {
            match self {
                Self::Signed(_) => {
                    let n = zigzag_decode(raw);
                    check_signed(kind, n)?;
                    FieldValue::Int(n)
                }
                _ => self.decode_unsigned_family(raw)?,
            }
        };
        Ok(value)
    }

    /// Decodes the bool/unsigned/float families once null handling is done.
    #[allow(clippy::cast_possible_truncation)]
    fn decode_unsigned_family(self, n: u64) -> CodecResult<FieldValue> {
        let kind = self.kind();
        match kind {
            FieldKind::Bool => match n {
                0 => Ok(FieldValue::Bool(false)),
                1 => Ok(FieldValue::Bool(true)),
                _ => Err(CodecError::out_of_range(kind, n)),
            },
            FieldKind::F32 => {
                let bits = u32::try_from(n).map_err(|_| CodecError::out_of_range(kind, n))?;
                Ok(FieldValue::F32(f32::from_bits(bits)))
            }
            FieldKind::F64 => Ok(FieldValue::F64(f64::from_bits(n))),
            _ => {
                check_unsigned(kind, n)?;
                Ok(FieldValue::UInt(n))
            }
        }
    }

    fn decode_bytes(self, bytes: &[u8]) -> CodecResult<FieldValue> {
        let payload = if self.is_nullable() {
            match bytes.split_first() {
                None => return Ok(FieldValue::Null),
                Some((&PRESENCE_TAG, rest)) => rest,
                Some((&tag, _)) => return Err(CodecError::InvalidPresenceTag { tag }),
            }
        } else {
            bytes
        };

        match self.kind() {
            FieldKind::String => std::str::from_utf8(payload)
                .map(|s| FieldValue::String(s.to_owned()))
                .map_err(|_| CodecError::InvalidUtf8),
            _ => Ok(FieldValue::Bytes(payload.to_vec())),
        }
    }
}

fn tagged(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(PRESENCE_TAG);
    out.extend_from_slice(payload);
    out
}

fn check_signed(kind: FieldKind, n: i64) -> CodecResult<()> {
    let fits = match kind {
        FieldKind::I8 => i8::try_from(n).is_ok(),
        FieldKind::I16 => i16::try_from(n).is_ok(),
        FieldKind::I32 => i32::try_from(n).is_ok(),
        _ => true,
    };
    if fits {
        Ok(())
    } else {
        Err(CodecError::out_of_range(kind, n))
    }
}

fn check_unsigned(kind: FieldKind, n: u64) -> CodecResult<()> {
    let fits = match kind {
        FieldKind::U8 => u8::try_from(n).is_ok(),
        FieldKind::U16 => u16::try_from(n).is_ok(),
        FieldKind::U32 => u32::try_from(n).is_ok(),
        _ => true,
    };
    if fits {
        Ok(())
    } else {
        Err(CodecError::out_of_range(kind, n))
    }
}
