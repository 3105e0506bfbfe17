//! Tailing chain reader.
//!
//! [`ChainReader`] drives the scanner over a [`LogSource`] that may still be
//! growing. Each [`poll`](ChainReader::poll) reads up to the current end of
//! the log, applies every complete transaction, and reports each completed
//! block to a [`BlockListener`]. Bytes of an unfinished block stay in the
//! reader until a later poll completes it.

use crate::applier::TransactionApplier;
use crate::bootstrap::SchemaHook;
use crate::cache::{CacheHooks, TypeMap};
use crate::config::ReaderConfig;
use crate::error::{CoreError, CoreResult};
use crate::scanner::{HaltHandle, ScanSink, ScanStatus, Scanner, Transaction};
use crate::schema::SchemaRegistry;
use crate::types::BlockId;
use bytes::Bytes;
use chainlog_storage::StorageBackend;
use parking_lot::RwLock;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Readable view of a growing log.
pub trait LogSource {
    /// Returns the offset up to which the log may be read.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn max_offset(&self) -> CoreResult<u64>;

    /// Reads up to `buf.len()` bytes at `offset`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is past the end or the read fails.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> CoreResult<usize>;
}

impl<B: StorageBackend> LogSource for RwLock<B> {
    fn max_offset(&self) -> CoreResult<u64> {
        Ok(self.read().size()?)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> CoreResult<usize> {
        Ok(self.read().read_into(offset, buf)?)
    }
}

impl<S: LogSource + ?Sized> LogSource for Arc<S> {
    fn max_offset(&self) -> CoreResult<u64> {
        (**self).max_offset()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> CoreResult<usize> {
        (**self).read_at(offset, buf)
    }
}

/// A completed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block id, starting at 1.
    pub id: BlockId,
    /// Half-open byte range, boundary transaction included.
    pub range: Range<u64>,
    /// Raw block bytes.
    pub bytes: Bytes,
}

/// Receives completed blocks.
pub trait BlockListener: Send {
    /// Called once per block, in order.
    fn on_block_found(&mut self, block: &Block);
}

impl<F: FnMut(&Block) + Send> BlockListener for F {
    fn on_block_found(&mut self, block: &Block) {
        self(block);
    }
}

/// Discards every block.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl BlockListener for NoopListener {
    fn on_block_found(&mut self, _block: &Block) {}
}

/// What one call to [`ChainReader::poll`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Blocks completed.
    pub blocks: u64,
    /// Transactions applied.
    pub transactions: u64,
    /// Scanner offset after the poll.
    pub offset: u64,
    /// True if the poll stopped on a halt request.
    pub halted: bool,
}

struct ApplySink<'a> {
    applier: &'a mut TransactionApplier,
    block: &'a mut Vec<u8>,
    transactions: u64,
}

impl ScanSink for ApplySink<'_> {
    fn extend_block(&mut self, bytes: &[u8]) {
        self.block.extend_from_slice(bytes);
    }

    fn transaction(&mut self, transaction: Transaction) -> CoreResult<()> {
        self.applier.apply(&transaction)?;
        self.transactions += 1;
        Ok(())
    }
}

/// Incremental reader that materializes a chain into the type cache.
pub struct ChainReader<S: LogSource> {
    source: S,
    scanner: Scanner,
    applier: TransactionApplier,
    listener: Box<dyn BlockListener>,
    partial: Vec<u8>,
    buffer: Vec<u8>,
    block_capacity: usize,
}

impl<S: LogSource> fmt::Debug for ChainReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainReader")
            .field("scanner", &self.scanner)
            .field("applier", &self.applier)
            .field("partial", &self.partial.len())
            .finish_non_exhaustive()
    }
}

impl<S: LogSource> ChainReader<S> {
    /// Creates a reader positioned at the start of `source`.
    pub fn new(
        source: S,
        registry: Arc<dyn SchemaRegistry>,
        types: TypeMap,
        config: &ReaderConfig,
    ) -> Self {
        Self {
            source,
            scanner: Scanner::new(Arc::clone(&registry), config),
            applier: TransactionApplier::new(registry, types),
            listener: Box::new(NoopListener),
            partial: Vec::with_capacity(config.initial_block_capacity),
            buffer: vec![0; config.read_buffer_size.max(1)],
            block_capacity: config.initial_block_capacity,
        }
    }

    /// Sets the cache hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl CacheHooks + 'static) -> Self {
        self.applier = self.applier.with_hooks(hooks);
        self
    }

    /// Sets the schema hook.
    #[must_use]
    pub fn with_schema_hook(mut self, hook: impl SchemaHook + 'static) -> Self {
        self.applier = self.applier.with_schema_hook(hook);
        self
    }

    /// Sets the block listener.
    #[must_use]
    pub fn with_listener(mut self, listener: impl BlockListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Returns the applier and, through it, the materialized caches.
    #[must_use]
    pub fn applier(&self) -> &TransactionApplier {
        &self.applier
    }

    /// Returns the scanner.
    #[must_use]
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Returns the log source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the bytes of the block under construction.
    #[must_use]
    pub fn partial_block(&self) -> &[u8] {
        &self.partial
    }

    /// Returns a handle that halts the reader between transactions.
    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        self.scanner.halt_handle()
    }

    /// Returns the absolute offset of the next byte to read.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.scanner.offset()
    }

    /// Returns the id of the last completed block.
    #[must_use]
    pub fn block_id(&self) -> BlockId {
        self.scanner.block_id()
    }

    /// Reads and applies everything up to the current end of the log.
    ///
    /// Returns once the log stops growing or a halt is requested. A block
    /// that is not complete yet is kept for the next poll.
    ///
    /// # Errors
    ///
    /// Returns the first storage error or structural corruption. After
    /// corruption every later poll fails.
    pub fn poll(&mut self) -> CoreResult<PollSummary> {
        if self.scanner.is_poisoned() {
            return Err(CoreError::invalid_operation(
                "reader stopped after structural corruption",
            ));
        }
        let mut summary = PollSummary::default();
        let mut max_offset = self.source.max_offset()?;

        loop {
            let offset = self.scanner.offset();
            if offset >= max_offset {
                let grown = self.source.max_offset()?;
                if grown <= max_offset {
                    break;
                }
                max_offset = grown;
                continue;
            }

            let want = usize::try_from(max_offset - offset)
                .map_or(self.buffer.len(), |n| n.min(self.buffer.len()));
            let read = self.source.read_at(offset, &mut self.buffer[..want])?;
            if read == 0 {
                break;
            }
            if self.scan_buffer(read, &mut summary)? {
                summary.halted = true;
                break;
            }
        }

        summary.offset = self.scanner.offset();
        debug!(
            blocks = summary.blocks,
            transactions = summary.transactions,
            offset = summary.offset,
            partial = self.partial.len(),
            halted = summary.halted,
            "poll finished"
        );
        Ok(summary)
    }

    /// Scans the first `len` bytes of the read buffer. Returns true on halt.
    fn scan_buffer(&mut self, len: usize, summary: &mut PollSummary) -> CoreResult<bool> {
        let Self {
            scanner,
            applier,
            listener,
            partial,
            buffer,
            block_capacity,
            ..
        } = self;
        let mut input = &buffer[..len];

        loop {
            let mut sink = ApplySink {
                applier: &mut *applier,
                block: &mut *partial,
                transactions: 0,
            };
            let step = scanner.scan(input, &mut sink);
            summary.transactions += sink.transactions;
            let step = step?;
            input = &input[step.consumed..];

            match step.status {
                ScanStatus::BoundaryFound(mark) => {
                    let bytes = std::mem::replace(partial, Vec::with_capacity(*block_capacity));
                    let block = Block {
                        id: mark.id,
                        range: mark.range,
                        bytes: Bytes::from(bytes),
                    };
                    debug!(
                        block_id = block.id.as_u64(),
                        start = block.range.start,
                        end = block.range.end,
                        "block found"
                    );
                    listener.on_block_found(&block);
                    summary.blocks += 1;
                }
                ScanStatus::Exhausted => return Ok(false),
                ScanStatus::Halted => return Ok(true),
            }
        }
    }
}
