//! Error types for the codec crate.

use crate::value::FieldKind;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Marker byte 255 is never valid.
    #[error("invalid varint marker {marker}")]
    InvalidMarker {
        /// The offending marker byte.
        marker: u8,
    },

    /// The trailing varint marker disagrees with the leading one.
    #[error("varint trailer mismatch: leading marker {leading}, trailing byte {trailing}")]
    MarkerMismatch {
        /// Marker that opened the varint.
        leading: u8,
        /// Byte found where the mirrored marker was expected.
        trailing: u8,
    },

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The value has no representation once shifted for nullability.
    #[error("{kind} value cannot be represented as a nullable wire value")]
    NullableOverflow {
        /// Field kind being encoded.
        kind: FieldKind,
    },

    /// A decoded or supplied value does not fit the field kind.
    #[error("value {value} out of range for {kind}")]
    ValueOutOfRange {
        /// Field kind whose range was exceeded.
        kind: FieldKind,
        /// The offending value, rendered for diagnostics.
        value: String,
    },

    /// A null was found where the field is not nullable.
    #[error("unexpected null for non-nullable {kind}")]
    UnexpectedNull {
        /// Field kind that received the null.
        kind: FieldKind,
    },

    /// The value variant does not belong to the field kind.
    #[error("expected {expected} value, got {actual}")]
    KindMismatch {
        /// Field kind that was expected.
        expected: FieldKind,
        /// Name of the value variant actually supplied.
        actual: &'static str,
    },

    /// An inline value arrived for a variable-width field, or vice versa.
    #[error("wire shape mismatch for {kind}: expected {expected} value")]
    ShapeMismatch {
        /// Field kind being decoded.
        kind: FieldKind,
        /// Shape the kind requires ("inline" or "variable").
        expected: &'static str,
    },

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A nullable variable-width payload did not start with the presence tag.
    #[error("invalid presence tag {tag:#04x}")]
    InvalidPresenceTag {
        /// The byte found in the tag position.
        tag: u8,
    },
}

impl CodecError {
    /// Create an out-of-range error.
    pub fn out_of_range(kind: FieldKind, value: impl ToString) -> Self {
        Self::ValueOutOfRange {
            kind,
            value: value.to_string(),
        }
    }
}
