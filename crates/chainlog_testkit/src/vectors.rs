//! Wire-format test vectors for chainlog.
//!
//! Vectors are plain hex so other implementations of the format can load
//! the JSON produced by [`all_vectors_json`] and check themselves against it.

use serde::{Deserialize, Serialize};

/// A test vector that can be shared across implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input data (hex-encoded).
    pub input_hex: String,
    /// Expected output data (hex-encoded).
    pub expected_hex: String,
    /// Expected error message (if this should fail).
    pub expected_error: Option<String>,
}

fn ok(id: &str, description: &str, input_hex: &str, expected_hex: &str) -> TestVector {
    TestVector {
        id: id.into(),
        description: description.into(),
        input_hex: input_hex.into(),
        expected_hex: expected_hex.into(),
        expected_error: None,
    }
}

fn err(id: &str, description: &str, input_hex: &str, error: &str) -> TestVector {
    TestVector {
        id: id.into(),
        description: description.into(),
        input_hex: input_hex.into(),
        expected_hex: String::new(),
        expected_error: Some(error.into()),
    }
}

/// Varint encoding vectors at every width boundary.
///
/// `input_hex` is the value as 8 big-endian bytes.
pub fn varint_vectors() -> Vec<TestVector> {
    vec![
        ok("varint_0", "Zero literal", "0000000000000000", "00"),
        ok("varint_250", "Largest literal", "00000000000000fa", "fa"),
        ok("varint_251", "Smallest 2-byte form", "00000000000000fb", "fbfb00fb"),
        ok("varint_65535", "Largest 2-byte form", "000000000000ffff", "fbfffffb"),
        ok("varint_65536", "Smallest 3-byte form", "0000000000010000", "fc000001fc"),
        ok("varint_16777215", "Largest 3-byte form", "0000000000ffffff", "fcfffffffc"),
        ok("varint_16777216", "Smallest 4-byte form", "0000000001000000", "fd00000001fd"),
        ok("varint_4294967295", "Largest 4-byte form", "00000000ffffffff", "fdfffffffffd"),
        ok(
            "varint_4294967296",
            "Smallest 8-byte form",
            "0000000100000000",
            "fe0000000001000000fe",
        ),
        ok("varint_max", "u64::MAX", "ffffffffffffffff", "fefffffffffffffffffe"),
    ]
}

/// Malformed varints and the error they must raise.
pub fn invalid_varint_vectors() -> Vec<TestVector> {
    vec![
        err("varint_marker_255", "Reserved marker", "ff", "marker 255"),
        err("varint_trailer_mismatch", "Trailer disagrees with marker", "fb0100fc", "mismatch"),
        err("varint_truncated", "Input ends inside the value", "fb01", "end of input"),
    ]
}

/// Transaction frames for the `Widget` fixture.
///
/// `input_hex` is empty; the frames are produced by the encoder.
pub fn frame_vectors() -> Vec<TestVector> {
    vec![
        ok("frame_boundary", "Empty block boundary", "", "050005"),
        ok(
            "frame_instantiate",
            "Widget 'A' with null weight at ts 10",
            "",
            "090301140110014101101100110309",
        ),
        ok(
            "frame_set_fields",
            "Set Active=true on entity 10 at ts 11",
            "",
            "0604020a020309030116011201120406",
        ),
        ok(
            "frame_archive",
            "Archive entity 10 at ts 12",
            "",
            "0703020a020309030118010307",
        ),
    ]
}

/// Generate all test vectors as JSON for cross-implementation use.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        varint: varint_vectors(),
        invalid_varint: invalid_varint_vectors(),
        frame: frame_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    varint: Vec<TestVector>,
    invalid_varint: Vec<TestVector>,
    frame: Vec<TestVector>,
}

/// Encodes bytes as hexadecimal string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes hexadecimal string to bytes. Whitespace is ignored.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    let hex = hex.replace([' ', '\n', '\r'], "");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}
