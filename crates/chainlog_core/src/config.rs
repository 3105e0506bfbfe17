//! Reader configuration.

/// Configuration for a [`ChainReader`](crate::ChainReader) and its scanner.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Bytes requested from the log per read.
    pub read_buffer_size: usize,

    /// Maximum declared field count of one transaction.
    pub max_field_count: u64,

    /// Maximum declared length of one variable field.
    pub max_field_length: u64,

    /// Initial capacity of the partial block buffer.
    pub initial_block_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 64 * 1024,         // 64 KB
            max_field_count: 1024,
            max_field_length: 256 * 1024 * 1024, // 256 MB
            initial_block_capacity: 4 * 1024,
        }
    }
}

impl ReaderConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read buffer size. Zero is treated as one byte.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = if size == 0 { 1 } else { size };
        self
    }

    /// Sets the maximum field count per transaction.
    #[must_use]
    pub const fn max_field_count(mut self, count: u64) -> Self {
        self.max_field_count = count;
        self
    }

    /// Sets the maximum declared field length.
    #[must_use]
    pub const fn max_field_length(mut self, len: u64) -> Self {
        self.max_field_length = len;
        self
    }

    /// Sets the initial partial block capacity.
    #[must_use]
    pub const fn initial_block_capacity(mut self, capacity: usize) -> Self {
        self.initial_block_capacity = capacity;
        self
    }
}
