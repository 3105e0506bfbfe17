//! Fuzz testing harnesses for chainlog.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks, plus a structured operation model that
//! drives a [`TestChain`] and predicts its cache.

use crate::fixtures::{sample_registry, sample_types, TestChain, Widget, WIDGET};
use crate::generators::ChainOp;
use chainlog_codec::{
    decode_varint, FieldCodec, FieldKind, VarintDecoder, VarintPoll, WireValue,
};
use chainlog_core::{
    ChainReader, CoreResult, EntityId, ReaderConfig, ScanSink, ScanStatus, Scanner, Transaction,
};
use chainlog_storage::{InMemoryBackend, StorageBackend};
use parking_lot::RwLock;
use std::sync::Arc;

const ALL_KINDS: [FieldKind; 14] = [
    FieldKind::Bool,
    FieldKind::I8,
    FieldKind::I16,
    FieldKind::I32,
    FieldKind::I64,
    FieldKind::U8,
    FieldKind::U16,
    FieldKind::U32,
    FieldKind::U64,
    FieldKind::F32,
    FieldKind::F64,
    FieldKind::Timestamp,
    FieldKind::String,
    FieldKind::Bytes,
];

/// Fuzz target for varint decoding.
///
/// Decoding the whole input and feeding it one byte at a time must agree.
pub fn fuzz_varint_decode(data: &[u8]) {
    let whole = decode_varint(data);

    let mut decoder = VarintDecoder::new();
    let mut bytewise = None;
    for (i, byte) in data.iter().enumerate() {
        match decoder.feed(std::slice::from_ref(byte)) {
            Ok(VarintPoll::Ready(varint, _)) => {
                bytewise = Some(Ok((varint.value, i + 1)));
                break;
            }
            Ok(VarintPoll::Pending { .. }) => {}
            Err(err) => {
                bytewise = Some(Err(err));
                break;
            }
        }
    }

    match (whole, bytewise) {
        (Ok(a), Some(Ok(b))) => assert_eq!(a, b, "Byte-wise varint decode disagrees"),
        (Err(_), Some(Err(_)) | None) => {}
        (whole, bytewise) => panic!("Varint decoders disagree: {whole:?} vs {bytewise:?}"),
    }
}

/// Fuzz target for field value decoding.
///
/// Every codec must either reject the wire value or decode it to a value
/// that encodes back to the same wire value.
pub fn fuzz_field_decode(data: &[u8]) {
    let mut raw = [0u8; 8];
    let n = data.len().min(8);
    raw[..n].copy_from_slice(&data[..n]);
    let inline = WireValue::Inline(u64::from_le_bytes(raw));
    let bytes = WireValue::Bytes(data.to_vec());

    for kind in ALL_KINDS {
        for nullable in [false, true] {
            let codec = FieldCodec::resolve(kind, nullable);
            for wire in [&inline, &bytes] {
                if let Ok(value) = codec.decode(wire) {
                    let encoded = codec.encode(&value).expect("Decoded value must encode");
                    assert_eq!(&encoded, wire, "{codec:?} round trip of {value:?}");
                }
            }
        }
    }
}

#[derive(Default)]
struct Collect {
    blocks: usize,
    transactions: Vec<Transaction>,
}

impl ScanSink for Collect {
    fn extend_block(&mut self, _bytes: &[u8]) {}

    fn transaction(&mut self, transaction: Transaction) -> CoreResult<()> {
        self.transactions.push(transaction);
        Ok(())
    }
}

fn scan_chunks(data: &[u8], chunk: usize) -> (Collect, bool, u64) {
    let mut scanner = Scanner::new(sample_registry(), &ReaderConfig::default());
    let mut sink = Collect::default();
    for mut input in data.chunks(chunk.max(1)) {
        while !input.is_empty() {
            match scanner.scan(input, &mut sink) {
                Ok(step) => {
                    input = &input[step.consumed..];
                    match step.status {
                        ScanStatus::BoundaryFound(_) => sink.blocks += 1,
                        ScanStatus::Exhausted | ScanStatus::Halted => break,
                    }
                }
                Err(_) => return (sink, true, scanner.offset()),
            }
        }
    }
    (sink, false, scanner.offset())
}

/// Fuzz target for the boundary scanner.
///
/// Scanning the input whole and in `chunk`-sized pieces must produce the
/// same transactions, blocks and outcome.
pub fn fuzz_scanner(data: &[u8], chunk: usize) {
    let (whole, whole_failed, whole_offset) = scan_chunks(data, data.len());
    let (split, split_failed, split_offset) = scan_chunks(data, chunk);

    assert_eq!(whole_failed, split_failed, "Chunking changed the outcome");
    assert_eq!(whole.blocks, split.blocks, "Chunking changed block count");
    assert_eq!(whole.transactions, split.transactions);
    if !whole_failed {
        assert_eq!(whole_offset, split_offset);
    }
}

/// Fuzz target for a whole reader over arbitrary log bytes.
///
/// Polling must never panic, and once corruption is reported every later
/// poll must fail too.
pub fn fuzz_chain_bytes(data: &[u8]) {
    let log = Arc::new(RwLock::new(InMemoryBackend::with_data(data.to_vec())));
    let config = ReaderConfig::default().read_buffer_size(61);
    let mut reader = ChainReader::new(log, sample_registry(), sample_types(), &config);

    if reader.poll().is_err() {
        assert!(reader.poll().is_err(), "Poll succeeded after corruption");
    }
}

/// Fuzz target for damaged chains.
///
/// `mutations` is read as `(position, xor)` byte pairs applied to `stream`.
pub fn fuzz_mutated_stream(stream: &[u8], mutations: &[u8]) {
    let mut damaged = stream.to_vec();
    if !damaged.is_empty() {
        for pair in mutations.chunks_exact(2) {
            let pos = usize::from(pair[0]) * damaged.len() / 256;
            damaged[pos] ^= pair[1];
        }
    }
    fuzz_chain_bytes(&damaged);
}

impl ChainOp {
    /// Parse operations from fuzzer input.
    pub fn parse_sequence(data: &[u8]) -> Vec<ChainOp> {
        let mut ops = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let op_type = data[offset];
            offset += 1;

            let target = usize::from(data.get(offset).copied().unwrap_or(0));
            let op = match op_type % 5 {
                0 => {
                    let name_len = target % 16;
                    offset += 1;
                    if offset + name_len > data.len() {
                        break;
                    }
                    let name = String::from_utf8_lossy(&data[offset..offset + name_len]);
                    offset += name_len;
                    ChainOp::Create(Widget::named(&name))
                }
                1 => {
                    offset += 1;
                    ChainOp::Rename {
                        target,
                        name: format!("renamed-{target}"),
                    }
                }
                2 => {
                    offset += 1;
                    ChainOp::Toggle { target }
                }
                3 => {
                    offset += 1;
                    ChainOp::Archive { target }
                }
                _ => ChainOp::Seal,
            };

            ops.push(op);
        }

        ops
    }
}

/// Widgets a chain should hold after a sequence of operations.
#[derive(Debug, Clone, Default)]
pub struct ChainModel {
    /// Live widgets in creation order, as the cache should see them.
    pub live: Vec<(EntityId, Widget)>,
    /// Archived widget ids.
    pub archived: Vec<EntityId>,
    /// Block boundaries written.
    pub sealed: usize,
}

/// Writes operations through the chain's writer and returns the expected
/// cache contents. Targets index the live widgets modulo their count and
/// are skipped while none exist.
///
/// # Errors
///
/// Returns any writer error.
pub fn run_chain_ops<B: StorageBackend + 'static>(
    ops: &[ChainOp],
    chain: &mut TestChain<B>,
) -> CoreResult<ChainModel> {
    let mut model = ChainModel::default();
    for op in ops {
        match op {
            ChainOp::Create(widget) => {
                let id = chain.writer.instantiate(WIDGET, widget)?;
                // `Active` is not instanceable.
                let expected = Widget {
                    active: false,
                    ..widget.clone()
                };
                model.live.push((id, expected));
            }
            ChainOp::Rename { target, name } => {
                if let Some((id, widget)) = pick(&mut model.live, *target) {
                    widget.name = name.clone();
                    chain.writer.set_fields(id, WIDGET, widget, &["Name"])?;
                }
            }
            ChainOp::Toggle { target } => {
                if let Some((id, widget)) = pick(&mut model.live, *target) {
                    widget.active = !widget.active;
                    chain.writer.set_fields(id, WIDGET, widget, &["Active"])?;
                }
            }
            ChainOp::Archive { target } => {
                if !model.live.is_empty() {
                    let (id, _) = model.live.remove(*target % model.live.len());
                    chain.writer.archive(id, WIDGET)?;
                    model.archived.push(id);
                }
            }
            ChainOp::Seal => {
                chain.writer.seal_block()?;
                model.sealed += 1;
            }
        }
    }
    Ok(model)
}

fn pick(live: &mut [(EntityId, Widget)], target: usize) -> Option<(EntityId, &mut Widget)> {
    if live.is_empty() {
        return None;
    }
    let len = live.len();
    let (id, widget) = &mut live[target % len];
    Some((*id, widget))
}

/// Asserts that the chain's widget cache matches the model.
pub fn assert_matches_model<B: StorageBackend + 'static>(chain: &TestChain<B>, model: &ChainModel) {
    let live = chain.widgets().map_or(0, |set| set.len());
    assert_eq!(live, model.live.len(), "Live widget count");
    for (id, expected) in &model.live {
        let actual = chain.widget(*id).expect("Live widget missing from cache");
        assert_eq!(actual.meta.id, *id);
        assert_eq!(actual.name, expected.name);
        assert_eq!(actual.weight, expected.weight);
        assert_eq!(actual.active, expected.active);
    }
    for id in &model.archived {
        assert!(chain.widget(*id).is_none(), "Archived widget still live");
    }
}
