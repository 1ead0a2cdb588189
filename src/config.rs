//! Reader and writer configuration

/// Smallest accepted I/O buffer size, in bytes
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Largest accepted I/O buffer size, in bytes
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Default I/O buffer size, in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

fn validate_buffer_size(buffer_size: usize) -> Result<(), String> {
    if buffer_size < MIN_BUFFER_SIZE {
        return Err(format!(
            "buffer size {} is smaller than {} bytes",
            buffer_size, MIN_BUFFER_SIZE
        ));
    }
    if buffer_size > MAX_BUFFER_SIZE {
        return Err(format!(
            "buffer size {} exceeds {} bytes",
            buffer_size, MAX_BUFFER_SIZE
        ));
    }
    Ok(())
}

/// Configuration of a [`PcapNGReader`](crate::PcapNGReader)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReaderConfig {
    /// Size of the input buffer, in bytes
    pub buffer_size: usize,
    /// Compare the trailing length of every block with its leading length
    pub validate_trailing_length: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
            validate_trailing_length: true,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_buffer_size(self.buffer_size)
    }
}

/// Configuration of a [`PcapNGWriter`](crate::PcapNGWriter)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriterConfig {
    /// Size of the output buffer, in bytes
    pub buffer_size: usize,
    /// Flush the output stream after every block
    pub auto_flush: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
            auto_flush: false,
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_buffer_size(self.buffer_size)
    }
}
