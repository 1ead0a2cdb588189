use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Kind of the last failure reported by a reader or a writer
///
/// This is the flat view of [`PcapError`]: it is `Copy`, can be stored as the
/// last error of a session, and `NoError` means no failure occurred.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ErrorType {
    #[default]
    NoError,
    FileNotFound,
    UnableToOpenFile,
    FileAlreadyExists,
    FileWasClosed,
    FirstBlockIsNotSectionHeader,
    InvalidBlockDetected,
    TruncatedFile,
    InvalidBlockSize,
    InvalidInterfaceForPacket,
    InvalidOptionSize,
    WriteError,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorType::NoError => "no error",
            ErrorType::FileNotFound => "file not found",
            ErrorType::UnableToOpenFile => "unable to open file",
            ErrorType::FileAlreadyExists => "file already exists",
            ErrorType::FileWasClosed => "file was closed",
            ErrorType::FirstBlockIsNotSectionHeader => "first block is not a section header",
            ErrorType::InvalidBlockDetected => "invalid block detected",
            ErrorType::TruncatedFile => "truncated file",
            ErrorType::InvalidBlockSize => "invalid block size",
            ErrorType::InvalidInterfaceForPacket => "invalid interface for packet",
            ErrorType::InvalidOptionSize => "invalid option size",
            ErrorType::WriteError => "write error",
        };
        f.write_str(s)
    }
}

/// Errors raised while decoding or encoding a PCAPNG stream
#[derive(Debug, Error)]
pub enum PcapError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("unable to open {}: {source}", path.display())]
    UnableToOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    #[error("file was closed")]
    FileWasClosed,

    #[error("first block is not a section header (block type {block_type:#010x})")]
    FirstBlockIsNotSectionHeader { block_type: u32 },

    #[error("invalid block detected: {0}")]
    InvalidBlockDetected(String),

    #[error("truncated file at offset {position}: expected {expected} more bytes")]
    TruncatedFile {
        expected: u64,
        position: u64,
        #[source]
        source: Option<io::Error>,
    },

    #[error("invalid block size: {message}, at offset {position}")]
    InvalidBlockSize { message: String, position: u64 },

    #[error("invalid interface {if_id} for packet (section declares {count} interfaces)")]
    InvalidInterfaceForPacket { if_id: u32, count: usize },

    #[error("invalid option size: {message}, at option offset {offset}")]
    InvalidOptionSize { message: &'static str, offset: usize },

    #[error("write error: {0}")]
    WriteError(#[source] io::Error),

    /// The stream already entered its terminal failure state
    #[error("stream is in failed state ({0})")]
    Failed(ErrorType),
}

impl PcapError {
    /// Return the flat error kind for this error
    pub fn error_type(&self) -> ErrorType {
        match self {
            PcapError::FileNotFound(_) => ErrorType::FileNotFound,
            PcapError::UnableToOpenFile { .. } => ErrorType::UnableToOpenFile,
            PcapError::InvalidConfig(_) => ErrorType::UnableToOpenFile,
            PcapError::FileAlreadyExists(_) => ErrorType::FileAlreadyExists,
            PcapError::FileWasClosed => ErrorType::FileWasClosed,
            PcapError::FirstBlockIsNotSectionHeader { .. } => {
                ErrorType::FirstBlockIsNotSectionHeader
            }
            PcapError::InvalidBlockDetected(_) => ErrorType::InvalidBlockDetected,
            PcapError::TruncatedFile { .. } => ErrorType::TruncatedFile,
            PcapError::InvalidBlockSize { .. } => ErrorType::InvalidBlockSize,
            PcapError::InvalidInterfaceForPacket { .. } => ErrorType::InvalidInterfaceForPacket,
            PcapError::InvalidOptionSize { .. } => ErrorType::InvalidOptionSize,
            PcapError::WriteError(_) => ErrorType::WriteError,
            PcapError::Failed(kind) => *kind,
        }
    }

    pub(crate) fn invalid_block_size<S: Into<String>>(message: S, position: u64) -> Self {
        PcapError::InvalidBlockSize {
            message: message.into(),
            position,
        }
    }
}

pub type PcapResult<T> = Result<T, PcapError>;
