//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-backed append-only log.
///
/// `size()` asks the OS for the current file length on every call, so a
/// reader that opened the file with [`FileBackend::open_read_only`] observes
/// growth caused by a writer in another handle or process.
///
/// # Example
///
/// ```no_run
/// use chainlog_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("chain.log")).unwrap();
/// let offset = backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    writable: bool,
}

impl FileBackend {
    /// Opens or creates a log file for reading and appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            writable: true,
        })
    }

    /// Opens an existing log file for tailing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            writable: false,
        })
    }

    /// Opens or creates a log file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();
        let size = file.metadata()?.len();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let mut file = self.file.lock();
        let size = file.metadata()?.len();
        if offset > size {
            return Err(StorageError::ReadPastEnd {
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

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..len])?;
        Ok(len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if !self.writable {
            return Err(StorageError::Closed);
        }
        let mut file = self.file.lock();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.writable {
            self.file.lock().sync_all()?;
        }
        Ok(())
    }
}
