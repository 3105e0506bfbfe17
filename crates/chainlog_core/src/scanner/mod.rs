//! Boundary scanner.
//!
//! The scanner turns a byte stream into validated transactions and block
//! boundaries. It is an explicit state machine over [`ScanState`] and keeps
//! every piece of progress in the instance, so a buffer may end anywhere:
//! inside a varint, inside a payload, or between transactions.
//!
//! ## Contract
//!
//! [`Scanner::scan`] processes as much of its input as it can and returns a
//! [`ScanStep`]. Complete transactions go to [`ScanSink::transaction`]; every
//! consumed byte goes to [`ScanSink::extend_block`] before the call returns.
//! The call stops early when a block boundary completes, so callers loop
//! until the input is used up:
//!
//! ```text
//! while !input.is_empty() {
//!     let step = scanner.scan(input, &mut sink)?;
//!     input = &input[step.consumed..];
//!     match step.status { BoundaryFound(mark) => ..., Exhausted => break, Halted => return }
//! }
//! ```
//!
//! Any structural problem is fatal. The scanner is poisoned and every later
//! call fails with [`CoreError::InvalidOperation`].

mod transaction;

pub use transaction::{BlockMark, Transaction, TransactionField};

use crate::config::ReaderConfig;
use crate::error::{CoreError, CoreResult, CorruptionReason, MirroredElement};
use crate::schema::{Definition, FieldDescriptor, SchemaRegistry};
use crate::types::{BlockId, DefinitionId, FieldId};
use chainlog_codec::{Varint, VarintDecoder, VarintPoll, WireValue};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Upper bound on the buffer reserved up front for a declared payload.
const MAX_PREALLOCATED_FIELD: u64 = 64 * 1024;

/// Position of the scanner within the transaction grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Expecting the leading definition id of a transaction.
    DefinitionId,
    /// Expecting the leading field count.
    FieldCount,
    /// Expecting the leading id of the next field.
    FieldId,
    /// Expecting the value of an inline field.
    InlineValue,
    /// Expecting the declared length of a variable field.
    FieldLength,
    /// Inside a variable payload.
    FieldBytes {
        /// Payload bytes still to come.
        remaining: u64,
    },
    /// Expecting the mirrored length of a variable field.
    MirroredFieldLength,
    /// Expecting the mirrored field id.
    MirroredFieldId,
    /// Expecting the mirrored field count.
    MirroredFieldCount,
    /// Expecting the mirrored definition id.
    MirroredDefinitionId,
}

/// Receiver of scanner output.
pub trait ScanSink {
    /// Appends consumed bytes to the block under construction.
    fn extend_block(&mut self, bytes: &[u8]);

    /// Receives a fully validated transaction.
    ///
    /// # Errors
    ///
    /// An error stops the scan and poisons the scanner.
    fn transaction(&mut self, transaction: Transaction) -> CoreResult<()>;
}

/// Why a call to [`Scanner::scan`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// A block boundary transaction just completed.
    BoundaryFound(BlockMark),
    /// The input is used up.
    Exhausted,
    /// The halt flag was observed between transactions.
    Halted,
}

/// Result of one call to [`Scanner::scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStep {
    /// Bytes of the input consumed by this call.
    pub consumed: usize,
    /// Why the call returned.
    pub status: ScanStatus,
}

/// Cooperative stop signal, checked only between transactions.
#[derive(Debug, Clone, Default)]
pub struct HaltHandle {
    flag: Arc<AtomicBool>,
}

impl HaltHandle {
    /// Creates a handle that is not halted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a halt.
    pub fn halt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clears a halt request.
    pub fn resume(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Returns true if a halt is requested.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct PendingField {
    leading_id: Varint,
    /// `None` for ids the registry does not know; their bytes are skipped.
    descriptor: Option<Arc<FieldDescriptor>>,
    leading_len: Option<Varint>,
    bytes: Vec<u8>,
    wire: Option<WireValue>,
}

#[derive(Debug)]
struct PendingTransaction {
    offset: u64,
    definition: Arc<Definition>,
    leading_definition: Varint,
    leading_count: Option<Varint>,
    remaining: u64,
    fields: Vec<TransactionField>,
    skipped: u64,
    field: Option<PendingField>,
}

impl PendingTransaction {
    fn field_mut(&mut self) -> CoreResult<&mut PendingField> {
        self.field.as_mut().ok_or_else(lost_state)
    }
}

/// Resumable boundary scanner.
pub struct Scanner {
    registry: Arc<dyn SchemaRegistry>,
    max_field_count: u64,
    max_field_length: u64,
    halt: HaltHandle,
    state: ScanState,
    decoder: VarintDecoder,
    /// Offset of the first byte of the scalar being decoded.
    scalar_offset: u64,
    offset: u64,
    digested: u64,
    block_id: BlockId,
    pending: Option<PendingTransaction>,
    poisoned: bool,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("state", &self.state)
            .field("offset", &self.offset)
            .field("digested", &self.digested)
            .field("block_id", &self.block_id)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Creates a scanner positioned at offset 0.
    pub fn new(registry: Arc<dyn SchemaRegistry>, config: &ReaderConfig) -> Self {
        Self {
            registry,
            max_field_count: config.max_field_count,
            max_field_length: config.max_field_length,
            halt: HaltHandle::new(),
            state: ScanState::DefinitionId,
            decoder: VarintDecoder::new(),
            scalar_offset: 0,
            offset: 0,
            digested: 0,
            block_id: BlockId::default(),
            pending: None,
            poisoned: false,
        }
    }

    /// Returns a handle that can halt this scanner from another thread.
    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Returns the absolute offset of the next byte to scan.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the start offset of the block under construction.
    #[must_use]
    pub fn digested_offset(&self) -> u64 {
        self.digested
    }

    /// Returns the id of the last completed block, or 0 before the first.
    #[must_use]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Returns the current grammar position.
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Returns true once a structural error has stopped the scanner.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Returns true between transactions.
    #[must_use]
    pub fn at_transaction_boundary(&self) -> bool {
        self.state == ScanState::DefinitionId && self.decoder.is_idle()
    }

    /// Scans `input`, feeding `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StructuralCorruption`] for malformed input, any
    /// error raised by the sink, and [`CoreError::InvalidOperation`] once
    /// poisoned.
    pub fn scan<S: ScanSink + ?Sized>(
        &mut self,
        input: &[u8],
        sink: &mut S,
    ) -> CoreResult<ScanStep> {
        if self.poisoned {
            return Err(CoreError::invalid_operation(
                "scanner stopped after structural corruption",
            ));
        }
        let result = self.scan_inner(input, sink);
        if result.is_err() {
            self.poisoned = true;
            self.pending = None;
        }
        result
    }

    fn scan_inner<S: ScanSink + ?Sized>(
        &mut self,
        input: &[u8],
        sink: &mut S,
    ) -> CoreResult<ScanStep> {
        let mut pos = 0;
        let mut flushed = 0;

        let status = loop {
            if pos == input.len() {
                break ScanStatus::Exhausted;
            }
            if self.at_transaction_boundary() && self.halt.is_halted() {
                break ScanStatus::Halted;
            }

            if let ScanState::FieldBytes { remaining } = self.state {
                let available = input.len() - pos;
                let take = usize::try_from(remaining).map_or(available, |r| r.min(available));
                let field = self.pending.as_mut().and_then(|t| t.field.as_mut());
                if let Some(field) = field.filter(|f| f.descriptor.is_some()) {
                    field.bytes.extend_from_slice(&input[pos..pos + take]);
                }
                pos += take;
                self.offset += take as u64;
                let left = remaining - take as u64;
                self.state = if left == 0 {
                    ScanState::MirroredFieldLength
                } else {
                    ScanState::FieldBytes { remaining: left }
                };
                continue;
            }

            if self.decoder.is_idle() {
                self.scalar_offset = self.offset;
            }
            let poll = self
                .decoder
                .feed(&input[pos..])
                .map_err(|e| CoreError::corruption(self.scalar_offset, e.into()))?;
            let varint = match poll {
                VarintPoll::Pending { consumed } => {
                    pos += consumed;
                    self.offset += consumed as u64;
                    continue;
                }
                VarintPoll::Ready(varint, consumed) => {
                    pos += consumed;
                    self.offset += consumed as u64;
                    varint
                }
            };

            let Some(transaction) = self.advance(varint)? else {
                continue;
            };
            sink.extend_block(&input[flushed..pos]);
            flushed = pos;

            let boundary = transaction.definition.is_block_boundary();
            sink.transaction(transaction)?;
            if boundary {
                self.block_id = self.block_id.next();
                let mark = BlockMark {
                    id: self.block_id,
                    range: self.digested..self.offset,
                };
                self.digested = self.offset;
                debug!(
                    block_id = mark.id.as_u64(),
                    start = mark.range.start,
                    end = mark.range.end,
                    "block boundary found"
                );
                break ScanStatus::BoundaryFound(mark);
            }
        };

        if flushed < pos {
            sink.extend_block(&input[flushed..pos]);
        }
        Ok(ScanStep {
            consumed: pos,
            status,
        })
    }

    /// Applies one decoded scalar to the grammar. Returns the transaction
    /// when its mirrored definition id completes it.
    fn advance(&mut self, varint: Varint) -> CoreResult<Option<Transaction>> {
        let at = self.scalar_offset;

        if self.state == ScanState::DefinitionId {
            let id = DefinitionId::new(varint.value);
            let definition = self
                .registry
                .resolve_definition(id)
                .ok_or_else(|| CoreError::corruption(at, CorruptionReason::UnknownDefinition(id)))?;
            self.pending = Some(PendingTransaction {
                offset: at,
                definition,
                leading_definition: varint,
                leading_count: None,
                remaining: 0,
                fields: Vec::new(),
                skipped: 0,
                field: None,
            });
            self.state = ScanState::FieldCount;
            return Ok(None);
        }

        let txn = self.pending.as_mut().ok_or_else(lost_state)?;
        self.state = match self.state {
            ScanState::FieldCount => {
                if varint.value > self.max_field_count {
                    return Err(CoreError::corruption(
                        at,
                        CorruptionReason::TooManyFields {
                            count: varint.value,
                            max: self.max_field_count,
                        },
                    ));
                }
                txn.leading_count = Some(varint);
                txn.remaining = varint.value;
                if varint.value == 0 {
                    ScanState::MirroredDefinitionId
                } else {
                    txn.fields.reserve(usize::try_from(varint.value).unwrap_or(0));
                    ScanState::FieldId
                }
            }
            ScanState::FieldId => {
                let id = FieldId::new(varint.value);
                let descriptor = self.registry.resolve_field(id);
                let inline = descriptor.as_ref().is_some_and(|d| d.is_inline());
                if descriptor.is_none() {
                    trace!(field = id.as_u64(), offset = at, "skipping unknown field");
                }
                txn.field = Some(PendingField {
                    leading_id: varint,
                    descriptor,
                    leading_len: None,
                    bytes: Vec::new(),
                    wire: None,
                });
                if inline {
                    ScanState::InlineValue
                } else {
                    ScanState::FieldLength
                }
            }
            ScanState::InlineValue => {
                txn.field_mut()?.wire = Some(WireValue::Inline(varint.value));
                ScanState::MirroredFieldId
            }
            ScanState::FieldLength => {
                if varint.value > self.max_field_length {
                    return Err(CoreError::corruption(
                        at,
                        CorruptionReason::FieldTooLong {
                            len: varint.value,
                            max: self.max_field_length,
                        },
                    ));
                }
                let field = txn.field_mut()?;
                field.leading_len = Some(varint);
                if field.descriptor.is_some() {
                    let reserve = varint.value.min(MAX_PREALLOCATED_FIELD);
                    field.bytes = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
                }
                if varint.value == 0 {
                    ScanState::MirroredFieldLength
                } else {
                    ScanState::FieldBytes {
                        remaining: varint.value,
                    }
                }
            }
            ScanState::MirroredFieldLength => {
                let field = txn.field_mut()?;
                let leading = field.leading_len.ok_or_else(lost_state)?;
                check_mirror(at, MirroredElement::FieldLength, leading, varint)?;
                if field.descriptor.is_some() {
                    field.wire = Some(WireValue::Bytes(std::mem::take(&mut field.bytes)));
                }
                ScanState::MirroredFieldId
            }
            ScanState::MirroredFieldId => {
                let field = txn.field.take().ok_or_else(lost_state)?;
                check_mirror(at, MirroredElement::FieldId, field.leading_id, varint)?;
                match (field.descriptor, field.wire) {
                    (Some(descriptor), Some(wire)) => {
                        txn.fields.push(TransactionField { descriptor, wire });
                    }
                    _ => txn.skipped += 1,
                }
                txn.remaining -= 1;
                if txn.remaining == 0 {
                    ScanState::MirroredFieldCount
                } else {
                    ScanState::FieldId
                }
            }
            ScanState::MirroredFieldCount => {
                let leading = txn.leading_count.ok_or_else(lost_state)?;
                check_mirror(at, MirroredElement::FieldCount, leading, varint)?;
                ScanState::MirroredDefinitionId
            }
            ScanState::MirroredDefinitionId => {
                check_mirror(
                    at,
                    MirroredElement::DefinitionId,
                    txn.leading_definition,
                    varint,
                )?;
                ScanState::DefinitionId
            }
            ScanState::DefinitionId | ScanState::FieldBytes { .. } => return Err(lost_state()),
        };

        if self.state != ScanState::DefinitionId {
            return Ok(None);
        }
        let txn = self.pending.take().ok_or_else(lost_state)?;
        Ok(Some(Transaction {
            offset: txn.offset,
            len: self.offset - txn.offset,
            definition: txn.definition,
            fields: txn.fields,
            skipped_fields: txn.skipped,
        }))
    }
}

fn check_mirror(
    at: u64,
    element: MirroredElement,
    leading: Varint,
    trailing: Varint,
) -> CoreResult<()> {
    if leading == trailing {
        Ok(())
    } else {
        Err(CoreError::corruption(
            at,
            CorruptionReason::MirrorMismatch {
                element,
                leading: leading.value,
                trailing: trailing.value,
            },
        ))
    }
}

fn lost_state() -> CoreError {
    CoreError::invalid_operation("scanner state has no pending transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Definition, FieldDescriptor, InMemorySchemaRegistry};
    use chainlog_codec::{FieldKind, FrameBuilder};

    const WIDGET: u64 = 9;
    const NAME: u64 = 16;
    const COUNT: u64 = 17;

    fn registry() -> Arc<InMemorySchemaRegistry> {
        let registry = InMemorySchemaRegistry::with_builtins();
        registry.register_field(FieldDescriptor::new(FieldId::new(NAME), "Name", FieldKind::String));
        registry.register_field(FieldDescriptor::new(FieldId::new(COUNT), "Count", FieldKind::U32));
        registry.register_definition(Definition::entity(
            DefinitionId::new(WIDGET),
            "Widget",
            vec![FieldId::new(NAME), FieldId::new(COUNT)],
        ));
        Arc::new(registry)
    }

    fn scanner() -> Scanner {
        Scanner::new(registry(), &ReaderConfig::default())
    }

    #[derive(Default)]
    struct Collect {
        block: Vec<u8>,
        blocks: Vec<(BlockMark, Vec<u8>)>,
        transactions: Vec<Transaction>,
    }

    impl ScanSink for Collect {
        fn extend_block(&mut self, bytes: &[u8]) {
            self.block.extend_from_slice(bytes);
        }

        fn transaction(&mut self, transaction: Transaction) -> CoreResult<()> {
            self.transactions.push(transaction);
            Ok(())
        }
    }

    fn drive(scanner: &mut Scanner, mut input: &[u8], sink: &mut Collect) -> CoreResult<()> {
        while !input.is_empty() {
            let step = scanner.scan(input, sink)?;
            input = &input[step.consumed..];
            match step.status {
                ScanStatus::BoundaryFound(mark) => {
                    let bytes = std::mem::take(&mut sink.block);
                    sink.blocks.push((mark, bytes));
                }
                ScanStatus::Exhausted => break,
                ScanStatus::Halted => return Ok(()),
            }
        }
        Ok(())
    }

    fn widget(name: &str) -> Vec<u8> {
        let mut frame = FrameBuilder::new(WIDGET);
        frame.inline(1, 7).bytes(NAME, name.as_bytes());
        frame.finish().to_vec()
    }

    fn boundary() -> Vec<u8> {
        FrameBuilder::new(5).finish().to_vec()
    }

    #[test]
    fn single_block() {
        let mut stream = widget("A");
        stream.extend(boundary());

        let mut scanner = scanner();
        let mut sink = Collect::default();
        drive(&mut scanner, &stream, &mut sink).unwrap();

        assert_eq!(sink.transactions.len(), 2);
        assert_eq!(sink.blocks.len(), 1);
        let (mark, bytes) = &sink.blocks[0];
        assert_eq!(mark.id, BlockId::new(1));
        assert_eq!(mark.range, 0..stream.len() as u64);
        assert_eq!(bytes, &stream);
        assert_eq!(scanner.digested_offset(), stream.len() as u64);

        let txn = &sink.transactions[0];
        assert_eq!(txn.offset, 0);
        assert_eq!(txn.len, widget("A").len() as u64);
        assert_eq!(
            txn.field(FieldId::new(NAME)).unwrap().wire,
            WireValue::Bytes(b"A".to_vec())
        );
        assert_eq!(
            txn.field(FieldId::TIMESTAMP).unwrap().wire,
            WireValue::Inline(7)
        );
    }

    #[test]
    fn multiple_boundaries_in_one_buffer() {
        let mut stream = Vec::new();
        for name in ["A", "B", "C"] {
            stream.extend(widget(name));
            stream.extend(boundary());
        }
        let mut scanner = scanner();
        let mut sink = Collect::default();
        drive(&mut scanner, &stream, &mut sink).unwrap();

        let ids: Vec<u64> = sink.blocks.iter().map(|(m, _)| m.id.as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(sink.blocks[1].0.range.start, sink.blocks[0].0.range.end);
        assert!(sink.block.is_empty());
    }

    #[test]
    fn every_split_yields_identical_blocks() {
        let mut stream = widget("a longer name to split");
        stream.extend(boundary());
        let mut big = FrameBuilder::new(WIDGET);
        big.inline(1, 70_000).inline(COUNT, u64::from(u32::MAX));
        stream.extend(big.finish());
        stream.extend(boundary());

        let mut whole = Collect::default();
        drive(&mut scanner(), &stream, &mut whole).unwrap();

        for split in 1..stream.len() {
            let mut scanner = scanner();
            let mut sink = Collect::default();
            drive(&mut scanner, &stream[..split], &mut sink).unwrap();
            drive(&mut scanner, &stream[split..], &mut sink).unwrap();
            assert_eq!(sink.blocks, whole.blocks, "split at {split}");
            assert_eq!(sink.transactions, whole.transactions, "split at {split}");
        }
    }

    #[test]
    fn one_byte_chunks() {
        let mut stream = widget("A");
        stream.extend(boundary());
        let mut scanner = scanner();
        let mut sink = Collect::default();
        for byte in &stream {
            drive(&mut scanner, std::slice::from_ref(byte), &mut sink).unwrap();
        }
        assert_eq!(sink.blocks.len(), 1);
        assert_eq!(sink.blocks[0].1, stream);
    }

    #[test]
    fn unknown_field_is_skipped() {
        let mut frame = FrameBuilder::new(WIDGET);
        frame
            .inline(1, 7)
            .bytes(99, &[251, 0xff, 0])
            .bytes(NAME, b"A");
        let mut stream = frame.finish().to_vec();
        stream.extend(boundary());

        let mut sink = Collect::default();
        drive(&mut scanner(), &stream, &mut sink).unwrap();
        let txn = &sink.transactions[0];
        assert_eq!(txn.skipped_fields, 1);
        assert_eq!(txn.fields.len(), 2);
        assert!(txn.field(FieldId::new(NAME)).is_some());
        assert_eq!(sink.blocks.len(), 1);
    }

    #[test]
    fn empty_transaction() {
        let stream = [WIDGET as u8, 0, WIDGET as u8];
        let mut sink = Collect::default();
        drive(&mut scanner(), &stream, &mut sink).unwrap();
        assert_eq!(sink.transactions.len(), 1);
        assert!(sink.transactions[0].fields.is_empty());
    }

    #[test]
    fn mirrored_field_id_mismatch_poisons() {
        // [9, 1, 16, 1, 'A', 1, 16, 1, 9]
        let mut stream = FrameBuilder::new(WIDGET);
        stream.bytes(NAME, b"A");
        let mut stream = stream.finish().to_vec();
        stream[6] = 17;

        let mut scanner = scanner();
        let mut sink = Collect::default();
        let err = drive(&mut scanner, &stream, &mut sink).unwrap_err();
        match err {
            CoreError::StructuralCorruption { offset, reason } => {
                assert_eq!(offset, 6);
                assert_eq!(
                    reason,
                    CorruptionReason::MirrorMismatch {
                        element: MirroredElement::FieldId,
                        leading: NAME,
                        trailing: 17,
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(scanner.is_poisoned());
        assert!(sink.transactions.is_empty());
        assert!(matches!(
            scanner.scan(&boundary(), &mut sink),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn every_trailer_is_checked() {
        let mut frame = FrameBuilder::new(WIDGET);
        frame.bytes(NAME, b"A");
        let stream = frame.finish().to_vec();
        // mirrored length, mirrored field id, mirrored count, mirrored definition
        for index in [5, 6, 7, 8] {
            let mut corrupt = stream.clone();
            corrupt[index] = corrupt[index].wrapping_add(1);
            let err = drive(&mut scanner(), &corrupt, &mut Collect::default()).unwrap_err();
            assert!(err.is_corruption(), "byte {index}: {err}");
        }
    }

    #[test]
    fn unknown_definition_is_corruption() {
        let stream = FrameBuilder::new(42).finish();
        let err = drive(&mut scanner(), &stream, &mut Collect::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::StructuralCorruption {
                offset: 0,
                reason: CorruptionReason::UnknownDefinition(DefinitionId(42)),
            }
        ));
    }

    #[test]
    fn invalid_marker_is_corruption() {
        let err = drive(&mut scanner(), &[255], &mut Collect::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::StructuralCorruption {
                reason: CorruptionReason::Varint(_),
                ..
            }
        ));
    }

    #[test]
    fn limits_are_enforced() {
        let config = ReaderConfig::new().max_field_count(1).max_field_length(2);
        let mut two_fields = FrameBuilder::new(WIDGET);
        two_fields.inline(1, 7).inline(COUNT, 1);
        let err = drive(
            &mut Scanner::new(registry(), &config),
            &two_fields.finish(),
            &mut Collect::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::StructuralCorruption {
                reason: CorruptionReason::TooManyFields { count: 2, max: 1 },
                ..
            }
        ));

        let mut long = FrameBuilder::new(WIDGET);
        long.bytes(NAME, b"abc");
        let err = drive(
            &mut Scanner::new(registry(), &config),
            &long.finish(),
            &mut Collect::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::StructuralCorruption {
                reason: CorruptionReason::FieldTooLong { len: 3, max: 2 },
                ..
            }
        ));
    }

    #[test]
    fn halt_is_observed_between_transactions() {
        let mut stream = widget("A");
        let first = stream.len();
        stream.extend(widget("B"));

        let mut scanner = scanner();
        let halt = scanner.halt_handle();
        let mut sink = Collect::default();

        // Halt before anything is consumed.
        halt.halt();
        let step = scanner.scan(&stream, &mut sink).unwrap();
        assert_eq!(step, ScanStep { consumed: 0, status: ScanStatus::Halted });

        halt.resume();
        let step = scanner.scan(&stream[..first + 2], &mut sink).unwrap();
        assert_eq!(step.status, ScanStatus::Exhausted);
        assert!(!scanner.at_transaction_boundary());

        // Mid-transaction the flag is not observed.
        halt.halt();
        let step = scanner.scan(&stream[first + 2..], &mut sink).unwrap();
        assert_eq!(step.status, ScanStatus::Exhausted);
        assert_eq!(sink.transactions.len(), 2);
        assert_eq!(sink.block, stream);
    }

    #[test]
    fn halt_stops_after_completed_transaction() {
        struct HaltAfterFirst {
            halt: HaltHandle,
            seen: usize,
        }
        impl ScanSink for HaltAfterFirst {
            fn extend_block(&mut self, _bytes: &[u8]) {}
            fn transaction(&mut self, _transaction: Transaction) -> CoreResult<()> {
                self.seen += 1;
                self.halt.halt();
                Ok(())
            }
        }

        let mut stream = widget("A");
        let first = stream.len();
        stream.extend(widget("B"));
        let mut scanner = scanner();
        let mut sink = HaltAfterFirst {
            halt: scanner.halt_handle(),
            seen: 0,
        };
        let step = scanner.scan(&stream, &mut sink).unwrap();
        assert_eq!(step.consumed, first);
        assert_eq!(step.status, ScanStatus::Halted);
        assert_eq!(sink.seen, 1);
    }

    mod split_props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn chunking_never_changes_output(
                names in prop::collection::vec("[a-z]{0,300}", 1..6),
                chunk in 1usize..64,
            ) {
                let mut stream = Vec::new();
                for name in &names {
                    stream.extend(widget(name));
                    stream.extend(boundary());
                }

                let mut whole = Collect::default();
                drive(&mut scanner(), &stream, &mut whole).unwrap();

                let mut scanner = scanner();
                let mut chunked = Collect::default();
                for piece in stream.chunks(chunk) {
                    drive(&mut scanner, piece, &mut chunked).unwrap();
                }

                prop_assert_eq!(chunked.transactions, whole.transactions);
                prop_assert_eq!(chunked.blocks, whole.blocks);
                prop_assert_eq!(scanner.block_id(), BlockId::new(names.len() as u64));
            }
        }
    }
}
