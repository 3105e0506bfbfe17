//! Error types for chainlog core.

use crate::types::{DefinitionId, FieldId};
use chainlog_codec::CodecError;
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while scanning, applying or writing a chain.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] chainlog_storage::StorageError),

    /// Value codec error outside of a scanned stream.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The stream is malformed. Fatal for the reader that saw it.
    #[error("structural corruption at offset {offset}: {reason}")]
    StructuralCorruption {
        /// Absolute stream offset at which the problem was detected.
        offset: u64,
        /// What was wrong.
        reason: CorruptionReason,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a structural corruption error.
    pub fn corruption(offset: u64, reason: CorruptionReason) -> Self {
        Self::StructuralCorruption { offset, reason }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this error poisons the reader.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::StructuralCorruption { .. })
    }
}

/// A structural scalar that is written on both sides of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirroredElement {
    /// Definition id around the whole transaction.
    DefinitionId,
    /// Field count around the field list.
    FieldCount,
    /// Field id around one field.
    FieldId,
    /// Declared length around a variable payload.
    FieldLength,
}

impl fmt::Display for MirroredElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DefinitionId => "definition id",
            Self::FieldCount => "field count",
            Self::FieldId => "field id",
            Self::FieldLength => "field length",
        })
    }
}

/// Cause of a [`CoreError::StructuralCorruption`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptionReason {
    /// Leading and trailing copies of a structural scalar differ.
    #[error("mirrored {element} mismatch: leading {leading}, trailing {trailing}")]
    MirrorMismatch {
        /// Which scalar disagreed.
        element: MirroredElement,
        /// Value before the payload.
        leading: u64,
        /// Value after the payload.
        trailing: u64,
    },

    /// Invalid varint framing.
    #[error("varint: {0}")]
    Varint(CodecError),

    /// The definition id is not known to the registry.
    #[error("unknown {0}")]
    UnknownDefinition(DefinitionId),

    /// An instantiate transaction carries a field that cannot be set there.
    #[error("{field} is not instanceable on {definition}")]
    NonInstanceableField {
        /// Entity definition being instantiated.
        definition: DefinitionId,
        /// Offending field.
        field: FieldId,
    },

    /// An instantiate transaction has no timestamp field.
    #[error("instantiate of {0} carries no timestamp")]
    MissingTimestamp(DefinitionId),

    /// Declared field count exceeds the configured maximum.
    #[error("field count {count} exceeds maximum {max}")]
    TooManyFields {
        /// Declared count.
        count: u64,
        /// Configured maximum.
        max: u64,
    },

    /// Declared field length exceeds the configured maximum.
    #[error("field length {len} exceeds maximum {max}")]
    FieldTooLong {
        /// Declared length.
        len: u64,
        /// Configured maximum.
        max: u64,
    },

    /// A field value does not decode under its descriptor.
    #[error("{field} does not decode: {source}")]
    UndecodableValue {
        /// Field being decoded.
        field: FieldId,
        /// Codec failure.
        source: CodecError,
    },

    /// A schema record is missing a required field or carries a bad one.
    #[error("malformed {definition} record: {detail}")]
    MalformedSchemaRecord {
        /// Schema definition of the record.
        definition: DefinitionId,
        /// What is wrong.
        detail: &'static str,
    },
}

impl From<CodecError> for CorruptionReason {
    fn from(err: CodecError) -> Self {
        Self::Varint(err)
    }
}
