//! Mirrored variable-length integer codec.
//!
//! Every integer in the chain log is written with a leading marker byte:
//!
//! ```text
//! value < 251     | value |
//! marker 251      | 251 | 2 bytes LE | 251 |
//! marker 252      | 252 | 3 bytes LE | 252 |
//! marker 253      | 253 | 4 bytes LE | 253 |
//! marker 254      | 254 | 8 bytes LE | 254 |
//! ```
//!
//! The trailing marker is a redundancy check: a decoder that finds any other
//! byte in that position reports [`CodecError::MarkerMismatch`]. Marker 255 is
//! never valid.
//!
//! [`VarintDecoder`] is resumable. A buffer may end anywhere inside a varint;
//! the decoder keeps the marker, the partially accumulated value and the
//! number of data bytes seen, and continues with the next buffer.

use crate::error::{CodecError, CodecResult};
use bytes::BufMut;

/// Largest value that encodes as a single literal byte.
pub const MAX_LITERAL: u8 = 250;

/// Marker for the 2-byte form.
pub const MARKER_U16: u8 = 251;

/// Marker for the 3-byte form.
pub const MARKER_U24: u8 = 252;

/// Marker for the 4-byte form.
pub const MARKER_U32: u8 = 253;

/// Marker for the 8-byte form.
pub const MARKER_U64: u8 = 254;

/// Maximum encoded size of a varint (marker + 8 data bytes + trailer).
pub const MAX_VARINT_LEN: usize = 10;

/// Number of data bytes following `marker`, or `None` for an invalid marker.
#[inline]
#[must_use]
pub const fn data_len(marker: u8) -> Option<u8> {
    match marker {
        MARKER_U16 => Some(2),
        MARKER_U24 => Some(3),
        MARKER_U32 => Some(4),
        MARKER_U64 => Some(8),
        _ => None,
    }
}

/// Returns the number of bytes `value` occupies on the wire.
#[inline]
#[must_use]
pub const fn encoded_len(value: u64) -> usize {
    if value <= MAX_LITERAL as u64 {
        1
    } else if value <= 0xFFFF {
        4
    } else if value <= 0xFF_FFFF {
        5
    } else if value <= 0xFFFF_FFFF {
        6
    } else {
        10
    }
}

/// Encodes `value` in its smallest mirrored form.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_varint<B: BufMut>(value: u64, buf: &mut B) {
    let (marker, width) = if value <= u64::from(MAX_LITERAL) {
        buf.put_u8(value as u8);
        return;
    } else if value <= 0xFFFF {
        (MARKER_U16, 2)
    } else if value <= 0xFF_FFFF {
        (MARKER_U24, 3)
    } else if value <= 0xFFFF_FFFF {
        (MARKER_U32, 4)
    } else {
        (MARKER_U64, 8)
    };

    buf.put_u8(marker);
    buf.put_slice(&value.to_le_bytes()[..width]);
    buf.put_u8(marker);
}

/// Encodes `value` into a fresh vector.
#[must_use]
pub fn varint_bytes(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(value));
    encode_varint(value, &mut out);
    out
}

/// Decodes one complete varint from the front of `bytes`.
///
/// Returns the value and the number of bytes it occupied.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if `bytes` ends inside the varint,
/// or a marker error if the framing is invalid.
pub fn decode_varint(bytes: &[u8]) -> CodecResult<(u64, usize)> {
    let mut decoder = VarintDecoder::new();
    match decoder.feed(bytes)? {
        VarintPoll::Ready(varint, _) => Ok((varint.value, varint.width as usize)),
        VarintPoll::Pending { .. } => Err(CodecError::UnexpectedEof),
    }
}

/// A fully decoded varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varint {
    /// Decoded value.
    pub value: u64,
    /// Total encoded width in bytes, markers included.
    pub width: u8,
}

/// Result of feeding bytes to a [`VarintDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintPoll {
    /// The input ran out before the varint completed. All `consumed` bytes
    /// (the whole input) were absorbed into the decoder state.
    Pending {
        /// Bytes consumed from this input.
        consumed: usize,
    },
    /// The varint completed after consuming `consumed` bytes of this input.
    Ready(Varint, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Marker,
    Data,
    Trailer,
}

/// Resumable decoder for a single mirrored varint.
///
/// # Example
///
/// ```
/// use chainlog_codec::{VarintDecoder, VarintPoll};
///
/// let mut decoder = VarintDecoder::new();
/// // 65536 encodes as [252, 0, 0, 1, 252]; feed it in two pieces.
/// assert!(matches!(decoder.feed(&[252, 0]).unwrap(), VarintPoll::Pending { consumed: 2 }));
/// match decoder.feed(&[0, 1, 252, 99]).unwrap() {
///     VarintPoll::Ready(v, consumed) => {
///         assert_eq!(v.value, 65536);
///         assert_eq!(consumed, 3);
///     }
///     VarintPoll::Pending { .. } => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct VarintDecoder {
    stage: Stage,
    marker: u8,
    value: u64,
    have: u8,
    need: u8,
}

impl VarintDecoder {
    /// Creates an idle decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stage: Stage::Marker,
            marker: 0,
            value: 0,
            have: 0,
            need: 0,
        }
    }

    /// Returns true if no varint is partially decoded.
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Marker
    }

    /// Discards any partial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feeds bytes into the decoder.
    ///
    /// Consumes at most one varint from `input`; bytes after it are left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidMarker`] for marker 255 and
    /// [`CodecError::MarkerMismatch`] if the trailer disagrees with the
    /// leading marker. The decoder is reset in both cases.
    pub fn feed(&mut self, input: &[u8]) -> CodecResult<VarintPoll> {
        let mut pos = 0;
        while pos < input.len() {
            let byte = input[pos];
            pos += 1;

            match self.stage {
                Stage::Marker => {
                    if byte <= MAX_LITERAL {
                        return Ok(VarintPoll::Ready(
                            Varint {
                                value: u64::from(byte),
                                width: 1,
                            },
                            pos,
                        ));
                    }
                    let Some(need) = data_len(byte) else {
                        return Err(CodecError::InvalidMarker { marker: byte });
                    };
                    self.stage = Stage::Data;
                    self.marker = byte;
                    self.value = 0;
                    self.have = 0;
                    self.need = need;
                }
                Stage::Data => {
                    self.value |= u64::from(byte) << (8 * u32::from(self.have));
                    self.have += 1;
                    if self.have == self.need {
                        self.stage = Stage::Trailer;
                    }
                }
                Stage::Trailer => {
                    let leading = self.marker;
                    let varint = Varint {
                        value: self.value,
                        width: self.need + 2,
                    };
                    self.reset();
                    if byte != leading {
                        return Err(CodecError::MarkerMismatch {
                            leading,
                            trailing: byte,
                        });
                    }
                    return Ok(VarintPoll::Ready(varint, pos));
                }
            }
        }
        Ok(VarintPoll::Pending { consumed: pos })
    }
}

impl Default for VarintDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundary_table() {
        assert_eq!(varint_bytes(0), vec![0]);
        assert_eq!(varint_bytes(250), vec![250]);
        assert_eq!(varint_bytes(251), vec![251, 251, 0, 251]);
        assert_eq!(varint_bytes(65535), vec![251, 255, 255, 251]);
        assert_eq!(varint_bytes(65536), vec![252, 0, 0, 1, 252]);
        assert_eq!(varint_bytes(0xFF_FFFF), vec![252, 255, 255, 255, 252]);
        assert_eq!(varint_bytes(0x100_0000), vec![253, 0, 0, 0, 1, 253]);
        assert_eq!(
            varint_bytes(0x1_0000_0000),
            vec![254, 0, 0, 0, 0, 1, 0, 0, 0, 254]
        );
        assert_eq!(
            varint_bytes(u64::MAX),
            vec![254, 255, 255, 255, 255, 255, 255, 255, 255, 254]
        );
    }

    #[test]
    fn encoded_len_matches_bytes() {
        for value in [0, 250, 251, 65535, 65536, 0xFF_FFFF, 0x100_0000, u64::MAX] {
            assert_eq!(encoded_len(value), varint_bytes(value).len());
        }
    }

    #[test]
    fn decode_literal() {
        assert_eq!(decode_varint(&[0]).unwrap(), (0, 1));
        assert_eq!(decode_varint(&[250, 7]).unwrap(), (250, 1));
    }

    #[test]
    fn decode_multi_byte_forms() {
        assert_eq!(decode_varint(&[251, 251, 0, 251]).unwrap(), (251, 4));
        assert_eq!(decode_varint(&[252, 0, 0, 1, 252, 9]).unwrap(), (65536, 5));
        assert_eq!(
            decode_varint(&[253, 0, 0, 0, 1, 253]).unwrap(),
            (0x100_0000, 6)
        );
        assert_eq!(
            decode_varint(&varint_bytes(u64::MAX)).unwrap(),
            (u64::MAX, 10)
        );
    }

    #[test]
    fn decode_rejects_trailer_mismatch() {
        assert_eq!(
            decode_varint(&[251, 1, 0, 252]),
            Err(CodecError::MarkerMismatch {
                leading: 251,
                trailing: 252
            })
        );
    }

    #[test]
    fn decode_rejects_marker_255() {
        assert_eq!(
            decode_varint(&[255]),
            Err(CodecError::InvalidMarker { marker: 255 })
        );
    }

    #[test]
    fn decode_truncated_is_eof() {
        assert_eq!(decode_varint(&[]), Err(CodecError::UnexpectedEof));
        assert_eq!(decode_varint(&[253, 1, 2]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn decoder_resumes_byte_by_byte() {
        let bytes = varint_bytes(0x0102_0304_0506_0708);
        let mut decoder = VarintDecoder::new();
        for (i, byte) in bytes.iter().enumerate() {
            let poll = decoder.feed(std::slice::from_ref(byte)).unwrap();
            if i + 1 < bytes.len() {
                assert_eq!(poll, VarintPoll::Pending { consumed: 1 });
                assert!(!decoder.is_idle());
            } else {
                assert_eq!(
                    poll,
                    VarintPoll::Ready(
                        Varint {
                            value: 0x0102_0304_0506_0708,
                            width: 10
                        },
                        1
                    )
                );
            }
        }
        assert!(decoder.is_idle());
    }

    #[test]
    fn decoder_stops_after_one_value() {
        let mut decoder = VarintDecoder::new();
        let poll = decoder.feed(&[251, 0, 1, 251, 42]).unwrap();
        assert_eq!(
            poll,
            VarintPoll::Ready(
                Varint {
                    value: 256,
                    width: 4
                },
                4
            )
        );
    }

    #[test]
    fn decoder_resets_after_error() {
        let mut decoder = VarintDecoder::new();
        assert!(decoder.feed(&[252, 0, 0, 0, 251]).is_err());
        assert!(decoder.is_idle());
    }

    proptest! {
        #[test]
        fn any_value_decodes_at_any_split(value in any::<u64>(), split in 0usize..10) {
            let bytes = varint_bytes(value);
            let split = split.min(bytes.len());
            let mut decoder = VarintDecoder::new();

            let first = decoder.feed(&bytes[..split]).unwrap();
            let result = match first {
                VarintPoll::Ready(v, consumed) => {
                    prop_assert_eq!(consumed, bytes.len());
                    v
                }
                VarintPoll::Pending { consumed } => {
                    prop_assert_eq!(consumed, split);
                    match decoder.feed(&bytes[split..]).unwrap() {
                        VarintPoll::Ready(v, consumed) => {
                            prop_assert_eq!(split + consumed, bytes.len());
                            v
                        }
                        VarintPoll::Pending { .. } => {
                            return Err(TestCaseError::fail("varint did not complete"));
                        }
                    }
                }
            };
            prop_assert_eq!(result.value, value);
            prop_assert_eq!(result.width as usize, bytes.len());
        }
    }
}
