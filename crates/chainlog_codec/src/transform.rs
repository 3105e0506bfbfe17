//! Integer re-encodings applied before values reach the varint codec.
//!
//! - Nullable unsigned values reserve wire value 0 for null and store
//!   `value + 1` otherwise.
//! - Signed values are zigzag-folded so that small magnitudes of either
//!   sign stay small on the wire: `0 → 0`, `-1 → 1`, `1 → 2`, `-2 → 3`,
//!   ..., `i64::MIN → u64::MAX`.
//! - Nullable signed values use a sign-magnitude fold keyed by the low bit,
//!   with `0` left for null: odd `v` is `-(v >> 1)`, even `v` is `v >> 1`.
//!   So `0 → 1`, `1 → 2`, `-1 → 3`, `2 → 4`, `-2 → 5`.
//!
//! A nullable 64-bit field gives up exactly one value to null:
//! `u64::MAX` (unsigned) and `i64::MIN` (signed) have no nullable encoding.

/// Sign-folds a signed value into an unsigned one.
#[inline]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Reverses [`zigzag_encode`].
#[inline]
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Shifts an optional unsigned value so that 0 means null.
///
/// Returns `None` when `value` is `Some(u64::MAX)`, which has no
/// representation.
#[inline]
#[must_use]
pub const fn nullable_unsigned_encode(value: Option<u64>) -> Option<u64> {
    match value {
        None => Some(0),
        Some(v) => v.checked_add(1),
    }
}

/// Reverses [`nullable_unsigned_encode`].
#[inline]
#[must_use]
pub const fn nullable_unsigned_decode(wire: u64) -> Option<u64> {
    match wire {
        0 => None,
        v => Some(v - 1),
    }
}

/// Folds an optional signed value into sign-magnitude form, 0 meaning null.
///
/// Positive values are stored as `n << 1`, zero and negative values as
/// `(|n| << 1) | 1`. Returns `None` when `value` is `Some(i64::MIN)`, whose
/// magnitude does not fit.
#[inline]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn nullable_signed_encode(value: Option<i64>) -> Option<u64> {
    match value {
        None => Some(0),
        Some(n) if n > 0 => Some((n as u64) << 1),
        Some(n) => {
            let magnitude = n.unsigned_abs();
            if magnitude > (u64::MAX >> 1) {
                None
            } else {
                Some((magnitude << 1) | 1)
            }
        }
    }
}

/// Reverses [`nullable_signed_encode`].
#[inline]
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn nullable_signed_decode(wire: u64) -> Option<i64> {
    let magnitude = (wire >> 1) as i64;
    match wire {
        0 => None,
        v if v & 1 == 1 => Some(-magnitude),
        _ => Some(magnitude),
    }
}
