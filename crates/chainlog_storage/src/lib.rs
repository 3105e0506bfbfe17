//! # Chainlog Storage
//!
//! Append-only byte stores that hold a chain log.
//!
//! Backends are **opaque byte stores**: they never interpret the transaction
//! framing they hold. The scanner in `chainlog_core` owns all format
//! interpretation.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, flush)
//! - `size()` is the current maximum valid byte offset; it may grow between
//!   calls while a writer is appending, which is what tailing readers poll
//! - Must be `Send + Sync` so a writer and a tailing reader can share one log
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral logs
//! - [`FileBackend`] - For logs persisted through OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use chainlog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let mut buf = [0u8; 5];
//! let n = backend.read_into(offset, &mut buf).unwrap();
//! assert_eq!(&buf[..n], b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
