//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory append-only log.
///
/// Suitable for unit tests, integration tests and ephemeral logs that
/// don't need persistence.
///
/// # Example
///
/// ```rust
/// use chainlog_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend holding an existing log image.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of the whole log.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites a single byte in place.
    ///
    /// Logs are append-only; this exists so tests can simulate a damaged
    /// medium.
    pub fn corrupt_byte(&mut self, offset: u64, value: u8) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        let slot = usize::try_from(offset)
            .ok()
            .and_then(|i| data.get_mut(i))
            .ok_or(StorageError::ReadPastEnd {
                offset,
                len: 1,
                size,
            })?;
        *slot = value;
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let data = self.data.read();
        let size = data.len() as u64;
        if offset > size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size,
            });
        }
        let start = offset as usize;
        let len = (data.len() - start).min(buf.len());
        buf[..len].copy_from_slice(&data[start..start + len]);
        Ok(len)
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
