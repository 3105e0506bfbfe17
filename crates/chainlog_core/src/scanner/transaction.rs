//! Decoded transactions as handed from the scanner to its sink.

use crate::schema::{Definition, FieldDescriptor};
use crate::types::{BlockId, FieldId};
use chainlog_codec::WireValue;
use std::ops::Range;
use std::sync::Arc;

/// One known field of a transaction, still in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionField {
    /// Descriptor the field resolved to when it was scanned.
    pub descriptor: Arc<FieldDescriptor>,
    /// Wire value.
    pub wire: WireValue,
}

impl TransactionField {
    /// Returns the field id.
    #[must_use]
    pub fn id(&self) -> FieldId {
        self.descriptor.id
    }
}

/// A fully validated transaction.
///
/// Fields unknown to the registry at scan time are not included; they are
/// counted in `skipped_fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Absolute offset of the first byte.
    pub offset: u64,
    /// Encoded length in bytes.
    pub len: u64,
    /// Resolved definition.
    pub definition: Arc<Definition>,
    /// Known fields in wire order.
    pub fields: Vec<TransactionField>,
    /// Number of unknown fields skipped.
    pub skipped_fields: u64,
}

impl Transaction {
    /// Returns the first field with the given id.
    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&TransactionField> {
        self.fields.iter().find(|f| f.id() == id)
    }

    /// Returns the byte range the transaction occupies.
    #[must_use]
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.len
    }
}

/// Identity of a block just completed by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMark {
    /// Block id, starting at 1.
    pub id: BlockId,
    /// Half-open byte range, boundary transaction included.
    pub range: Range<u64>,
}
