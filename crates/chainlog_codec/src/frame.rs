//! Transaction frame assembly.
//!
//! ```text
//! txn   := defId count field{count} count defId     (count > 0)
//!        | defId 0 defId                             (count == 0)
//! field := fieldId value fieldId                     (inline)
//!        | fieldId len payload[len] len fieldId      (variable)
//! ```

use crate::error::CodecResult;
use crate::field::{FieldCodec, WireValue};
use crate::value::FieldValue;
use crate::varint::{encode_varint, encoded_len};
use bytes::{BufMut, Bytes, BytesMut};

/// Builds a single mirrored transaction frame.
///
/// Fields are written in the order they are pushed.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    definition: u64,
    fields: BytesMut,
    count: u64,
}

impl FrameBuilder {
    /// Starts a frame for the given definition id.
    #[must_use]
    pub fn new(definition: u64) -> Self {
        Self {
            definition,
            fields: BytesMut::new(),
            count: 0,
        }
    }

    /// Returns the definition id of the frame.
    #[must_use]
    pub fn definition(&self) -> u64 {
        self.definition
    }

    /// Returns the number of fields pushed so far.
    #[must_use]
    pub fn field_count(&self) -> u64 {
        self.count
    }

    /// Appends an inline field whose varint is the value.
    pub fn inline(&mut self, field: u64, value: u64) -> &mut Self {
        encode_varint(field, &mut self.fields);
        encode_varint(value, &mut self.fields);
        encode_varint(field, &mut self.fields);
        self.count += 1;
        self
    }

    /// Appends a variable field with a length-declared payload.
    pub fn bytes(&mut self, field: u64, payload: &[u8]) -> &mut Self {
        let len = payload.len() as u64;
        encode_varint(field, &mut self.fields);
        encode_varint(len, &mut self.fields);
        self.fields.put_slice(payload);
        encode_varint(len, &mut self.fields);
        encode_varint(field, &mut self.fields);
        self.count += 1;
        self
    }

    /// Appends an already-encoded wire value.
    pub fn push(&mut self, field: u64, wire: &WireValue) -> &mut Self {
        match wire {
            WireValue::Inline(value) => self.inline(field, *value),
            WireValue::Bytes(payload) => self.bytes(field, payload),
        }
    }

    /// Encodes `value` with `codec` and appends it.
    ///
    /// # Errors
    ///
    /// Returns the codec's error if the value cannot be encoded; the frame
    /// is left unchanged.
    pub fn field(
        &mut self,
        field: u64,
        codec: FieldCodec,
        value: &FieldValue,
    ) -> CodecResult<&mut Self> {
        let wire = codec.encode(value)?;
        Ok(self.push(field, &wire))
    }

    /// Returns the total encoded size of the frame.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let header = 2 * encoded_len(self.definition) + encoded_len(self.count);
        if self.count == 0 {
            header
        } else {
            header + self.fields.len() + encoded_len(self.count)
        }
    }

    /// Writes the complete frame into `buf`.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        encode_varint(self.definition, buf);
        encode_varint(self.count, buf);
        if self.count > 0 {
            buf.put_slice(&self.fields);
            encode_varint(self.count, buf);
        }
        encode_varint(self.definition, buf);
    }

    /// Consumes the builder and returns the frame bytes.
    #[must_use]
    pub fn finish(self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut out);
        out.freeze()
    }
}
