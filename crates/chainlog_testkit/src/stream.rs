//! Raw chain streams with a known byte layout.
//!
//! [`StreamBuilder`] appends frames and records, for every transaction,
//! where each trailing mirrored scalar sits. Corruption tests use the
//! layout to damage exactly one trailer at a time.

use chainlog_codec::{encoded_len, FieldCodec, FieldValue, FrameBuilder, Timestamp, WireValue};
use chainlog_core::{DefinitionId, EntityId, FieldId, MirroredElement};
use std::ops::Range;

/// Position of one trailing mirrored scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Which scalar it mirrors.
    pub element: MirroredElement,
    /// Bytes of the trailing copy.
    pub range: Range<usize>,
}

/// Layout of one transaction in a built stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnLayout {
    /// Definition id of the transaction.
    pub definition: u64,
    /// Bytes of the whole transaction.
    pub range: Range<usize>,
    /// Trailing mirrored scalars in stream order.
    pub trailers: Vec<Trailer>,
}

/// Builds byte streams frame by frame.
#[derive(Debug, Clone, Default)]
pub struct StreamBuilder {
    bytes: Vec<u8>,
    layouts: Vec<TxnLayout>,
}

impl StreamBuilder {
    /// Creates an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame with the given fields in order.
    pub fn frame(&mut self, definition: u64, fields: &[(u64, WireValue)]) -> &mut Self {
        let start = self.bytes.len();
        let mut builder = FrameBuilder::new(definition);
        for (id, wire) in fields {
            builder.push(*id, wire);
        }
        let count = builder.field_count();
        let frame = builder.finish();

        let mut trailers = Vec::new();
        let mut pos = start + encoded_len(definition) + encoded_len(count);
        let mut mark = |element, pos: &mut usize, len: usize| {
            trailers.push(Trailer {
                element,
                range: *pos..*pos + len,
            });
            *pos += len;
        };
        for (id, wire) in fields {
            pos += encoded_len(*id);
            match wire {
                WireValue::Inline(value) => pos += encoded_len(*value),
                WireValue::Bytes(payload) => {
                    let len = encoded_len(payload.len() as u64);
                    pos += len + payload.len();
                    mark(MirroredElement::FieldLength, &mut pos, len);
                }
            }
            mark(MirroredElement::FieldId, &mut pos, encoded_len(*id));
        }
        if count > 0 {
            mark(MirroredElement::FieldCount, &mut pos, encoded_len(count));
        }
        mark(MirroredElement::DefinitionId, &mut pos, encoded_len(definition));
        debug_assert_eq!(pos, start + frame.len());

        self.bytes.extend_from_slice(&frame);
        self.layouts.push(TxnLayout {
            definition,
            range: start..self.bytes.len(),
            trailers,
        });
        self
    }

    /// Appends an instantiate transaction; `$timestamp` goes first.
    pub fn instantiate(
        &mut self,
        definition: DefinitionId,
        timestamp: Timestamp,
        fields: &[(FieldId, WireValue)],
    ) -> &mut Self {
        let mut all = vec![(FieldId::TIMESTAMP.as_u64(), timestamp_wire(timestamp))];
        all.extend(fields.iter().map(|(id, wire)| (id.as_u64(), wire.clone())));
        self.frame(definition.as_u64(), &all)
    }

    /// Appends a set-fields transaction.
    pub fn set_fields(
        &mut self,
        entity: EntityId,
        definition: DefinitionId,
        timestamp: Timestamp,
        fields: &[(FieldId, WireValue)],
    ) -> &mut Self {
        let mut all = header(entity, definition, timestamp);
        all.extend(fields.iter().map(|(id, wire)| (id.as_u64(), wire.clone())));
        self.frame(DefinitionId::SET_FIELDS.as_u64(), &all)
    }

    /// Appends an archive transaction.
    pub fn archive(
        &mut self,
        entity: EntityId,
        definition: DefinitionId,
        timestamp: Timestamp,
    ) -> &mut Self {
        let all = header(entity, definition, timestamp);
        self.frame(DefinitionId::ARCHIVE.as_u64(), &all)
    }

    /// Appends an empty block boundary.
    pub fn boundary(&mut self) -> &mut Self {
        self.frame(DefinitionId::BLOCK_BOUNDARY.as_u64(), &[])
    }

    /// Appends bytes with no recorded layout.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Returns the stream so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the layout of every framed transaction.
    pub fn layouts(&self) -> &[TxnLayout] {
        &self.layouts
    }

    /// Returns the stream length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a copy of the stream.
    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

fn header(entity: EntityId, definition: DefinitionId, timestamp: Timestamp) -> Vec<(u64, WireValue)> {
    vec![
        (FieldId::ENTITY.as_u64(), WireValue::Inline(entity.as_u64())),
        (FieldId::DEFINITION.as_u64(), WireValue::Inline(definition.as_u64())),
        (FieldId::TIMESTAMP.as_u64(), timestamp_wire(timestamp)),
    ]
}

/// Wire form of a `$timestamp` value.
pub fn timestamp_wire(timestamp: Timestamp) -> WireValue {
    FieldCodec::Timestamp
        .encode(&FieldValue::Timestamp(timestamp))
        .expect("Timestamp out of wire range")
}

/// Wire form of a non-nullable string.
pub fn text(value: &str) -> WireValue {
    WireValue::Bytes(value.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlog_codec::decode_varint;

    #[test]
    fn empty_frame_layout() {
        let mut stream = StreamBuilder::new();
        stream.boundary();
        assert_eq!(stream.bytes(), &[5, 0, 5]);
        let layout = &stream.layouts()[0];
        assert_eq!(layout.range, 0..3);
        assert_eq!(
            layout.trailers,
            vec![Trailer {
                element: MirroredElement::DefinitionId,
                range: 2..3
            }]
        );
    }

    #[test]
    fn trailers_decode_to_their_leading_values() {
        let mut stream = StreamBuilder::new();
        stream.boundary().instantiate(
            DefinitionId::new(300),
            Timestamp::from_ticks(70_000),
            &[(FieldId::new(16), text(&"x".repeat(260)))],
        );
        let layout = &stream.layouts()[1];
        let elements: Vec<_> = layout.trailers.iter().map(|t| t.element).collect();
        assert_eq!(
            elements,
            vec![
                MirroredElement::FieldId,
                MirroredElement::FieldLength,
                MirroredElement::FieldId,
                MirroredElement::FieldCount,
                MirroredElement::DefinitionId,
            ]
        );

        let bytes = stream.bytes();
        let value = |t: &Trailer| decode_varint(&bytes[t.range.clone()]).unwrap().0;
        assert_eq!(value(&layout.trailers[1]), 260);
        assert_eq!(value(&layout.trailers[2]), 16);
        assert_eq!(value(&layout.trailers[3]), 2);
        assert_eq!(value(&layout.trailers[4]), 300);
        assert_eq!(layout.range.end, stream.len());
    }
}
