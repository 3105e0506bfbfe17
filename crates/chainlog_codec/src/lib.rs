//! # Chainlog Codec
//!
//! Wire encoding for the chainlog transaction format.
//!
//! Every structural scalar in a chain is a *mirrored varint*: a marker byte,
//! optional little-endian data bytes, and a trailing copy of the marker. A
//! reader can therefore verify each value from both ends and resume decoding
//! at any byte.
//!
//! ## Layers
//!
//! - [`varint`]: the mirrored varint itself, one-shot and resumable.
//! - [`transform`]: zigzag and nullable re-encodings of integers.
//! - [`FieldKind`] / [`FieldValue`] / [`NativeField`]: the value model.
//! - [`FieldCodec`]: per-kind, per-nullability conversion to wire values.
//! - [`FrameBuilder`]: assembly of complete transaction frames.
//!
//! ## Usage
//!
//! ```
//! use chainlog_codec::{decode_varint, varint_bytes, FieldCodec, FieldKind, FieldValue, FrameBuilder};
//!
//! assert_eq!(varint_bytes(251), vec![251, 251, 0, 251]);
//! assert_eq!(decode_varint(&[251, 251, 0, 251]).unwrap(), (251, 4));
//!
//! let codec = FieldCodec::resolve(FieldKind::String, false);
//! let mut frame = FrameBuilder::new(9);
//! frame.field(16, codec, &FieldValue::String("A".into())).unwrap();
//! assert_eq!(&frame.finish()[..], &[9, 1, 16, 1, b'A', 1, 16, 1, 9]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod field;
mod frame;
pub mod transform;
mod value;
pub mod varint;

pub use error::{CodecError, CodecResult};
pub use field::{FieldCodec, WireValue, PRESENCE_TAG};
pub use frame::FrameBuilder;
pub use value::{FieldKind, FieldValue, FieldWidth, NativeField, Timestamp};
pub use varint::{
    decode_varint, encode_varint, encoded_len, varint_bytes, Varint, VarintDecoder, VarintPoll,
};
