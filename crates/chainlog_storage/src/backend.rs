//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level, append-only byte store holding a chain log.
///
/// Storage backends are **opaque byte stores**. They provide simple operations
/// for reading, appending, and flushing data; they do not understand
/// transactions, blocks, or varints.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` / `read_into` return exactly the bytes previously written
/// - `size` never shrinks; it is the maximum valid byte offset
/// - Backends must be `Send + Sync` for shared access
pub trait StorageBackend: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range extends past
    /// the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Reads up to `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied, which is smaller than `buf.len()`
    /// only when the log ends first. Reading at exactly `size()` returns 0.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if `offset` is beyond the
    /// current size, or an I/O error.
    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let size = self.size()?;
        if offset > size {
            return Err(crate::StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size,
            });
        }
        let available = usize::try_from(size - offset).unwrap_or(usize::MAX);
        let len = available.min(buf.len());
        if len == 0 {
            return Ok(0);
        }
        let data = self.read_at(offset, len)?;
        buf[..len].copy_from_slice(&data);
        Ok(len)
    }

    /// Appends data to the end of the log.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the log in bytes.
    ///
    /// This is the offset where the next `append` will write and the maximum
    /// valid offset a reader may consume up to.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;
}
