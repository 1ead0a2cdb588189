use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use log::{debug, warn};
use nom::sequence::tuple;

use crate::config::ReaderConfig;
use crate::endianness::ne_u32;
use crate::error::{ErrorType, PcapError, PcapResult};
use crate::pcapng::{block_type_name, BLOCK_ALIGNMENT, BLOCK_ENVELOPE_SIZE};

// Upper bound for the initial allocation of a block body. Bodies larger than
// this grow while reading, so a corrupted length cannot reserve gigabytes.
const MAX_PREALLOC: u64 = 1 << 20;

/// Leading part of the generic block envelope
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BlockHeader {
    pub(crate) block_type: u32,
    pub(crate) total_length: u32,
}

impl BlockHeader {
    /// Length of the block body, excluding the envelope
    #[inline]
    pub(crate) fn body_length(&self) -> u32 {
        self.total_length - BLOCK_ENVELOPE_SIZE
    }
}

/// Forward-only reader of PCAPNG blocks
///
/// The block reader only knows about the generic envelope (type, leading length, body, trailing
/// length). Each call to [`read_block`](BlockReader::read_block) returns a [`ScopedBlock`] which
/// mutably borrows the reader, so at most one block can be in flight at any time.
///
/// Once an error was detected, the reader stays failed: all following calls to `read_block`
/// return [`PcapError::Failed`] with the kind of the original error.
pub struct BlockReader<R> {
    reader: R,
    offset: u64,
    block_position: u64,
    validate_trailing_length: bool,
    failure: Option<ErrorType>,
}

impl BlockReader<BufReader<File>> {
    /// Open the file at `path` with the default configuration
    pub fn open<P: AsRef<Path>>(path: P) -> PcapResult<Self> {
        Self::open_with_config(path, &ReaderConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> PcapResult<Self> {
        config.validate().map_err(PcapError::InvalidConfig)?;
        let path = path.as_ref();
        if !path.exists() {
            return Err(PcapError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| PcapError::UnableToOpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut blocks = BlockReader::new(BufReader::with_capacity(config.buffer_size, file));
        blocks.validate_trailing_length = config.validate_trailing_length;
        Ok(blocks)
    }
}

impl<R: BufRead> BlockReader<R> {
    /// Creates a new `BlockReader<R>` over a buffered input stream
    pub fn new(reader: R) -> Self {
        BlockReader {
            reader,
            offset: 0,
            block_position: 0,
            validate_trailing_length: true,
            failure: None,
        }
    }

    pub fn set_validate_trailing_length(&mut self, validate: bool) {
        self.validate_trailing_length = validate;
    }

    /// Number of bytes consumed from the input stream
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Index of the next block to be read
    #[inline]
    pub fn block_position(&self) -> u64 {
        self.block_position
    }

    /// Kind of the error that put this reader in failed state, if any
    #[inline]
    pub fn failure(&self) -> Option<ErrorType> {
        self.failure
    }

    /// Returns true if no byte is left in the input stream
    ///
    /// A failed reader, or an input stream returning an error, is not at end: the next call to
    /// `read_block` will report the problem.
    pub fn is_at_end(&mut self) -> bool {
        if self.failure.is_some() {
            return false;
        }
        match self.reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(_) => false,
        }
    }

    /// Read the header of the next block
    ///
    /// The returned view must be released (by reading its body, skipping it, or dropping it)
    /// before the next block can be read.
    pub fn read_block(&mut self) -> PcapResult<ScopedBlock<'_, R>> {
        if let Some(kind) = self.failure {
            return Err(PcapError::Failed(kind));
        }
        let offset = self.offset;
        let header = self.read_header().map_err(|e| self.fail(e))?;
        if header.total_length % BLOCK_ALIGNMENT != 0 || header.total_length < BLOCK_ENVELOPE_SIZE
        {
            let e = PcapError::invalid_block_size(
                format!(
                    "total length {} of {} block is not a multiple of {} of at least {} bytes",
                    header.total_length,
                    block_type_name(header.block_type),
                    BLOCK_ALIGNMENT,
                    BLOCK_ENVELOPE_SIZE
                ),
                offset,
            );
            return Err(self.fail(e));
        }
        let position = self.block_position;
        Ok(ScopedBlock {
            reader: self,
            header,
            offset,
            position,
            released: false,
        })
    }

    fn fail(&mut self, e: PcapError) -> PcapError {
        if self.failure.is_none() {
            self.failure = Some(e.error_type());
        }
        e
    }

    fn fill(&mut self, buf: &mut [u8]) -> PcapResult<()> {
        match self.reader.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) => Err(PcapError::TruncatedFile {
                expected: buf.len() as u64,
                position: self.offset,
                source: Some(e),
            }),
        }
    }

    fn read_header(&mut self) -> PcapResult<BlockHeader> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        let (_, (block_type, total_length)) =
            tuple((ne_u32, ne_u32))(&buf[..]).map_err(|_| PcapError::TruncatedFile {
                expected: buf.len() as u64,
                position: self.offset,
                source: None,
            })?;
        Ok(BlockHeader {
            block_type,
            total_length,
        })
    }

    fn read_trailer(&mut self, header: &BlockHeader, offset: u64) -> PcapResult<()> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        if !self.validate_trailing_length {
            return Ok(());
        }
        let trailing_length = u32::from_ne_bytes(buf);
        if trailing_length != header.total_length {
            return Err(PcapError::invalid_block_size(
                format!(
                    "trailing length {} differs from leading length {}",
                    trailing_length, header.total_length
                ),
                offset,
            ));
        }
        Ok(())
    }

    fn check_body_length(&self, header: &BlockHeader, read: u64) -> PcapResult<()> {
        let expected = u64::from(header.body_length());
        if read < expected {
            return Err(PcapError::TruncatedFile {
                expected: expected - read,
                position: self.offset,
                source: None,
            });
        }
        Ok(())
    }

    fn read_block_data(&mut self, header: &BlockHeader, offset: u64) -> PcapResult<Vec<u8>> {
        let length = u64::from(header.body_length());
        let mut data = Vec::with_capacity(length.min(MAX_PREALLOC) as usize);
        let position = self.offset;
        let read = self
            .reader
            .by_ref()
            .take(length)
            .read_to_end(&mut data)
            .map_err(|e| PcapError::TruncatedFile {
                expected: length,
                position,
                source: Some(e),
            })? as u64;
        self.offset += read;
        self.check_body_length(header, read)?;
        self.read_trailer(header, offset)?;
        self.block_position += 1;
        Ok(data)
    }

    fn skip_block_data(&mut self, header: &BlockHeader, offset: u64) -> PcapResult<()> {
        let length = u64::from(header.body_length());
        let position = self.offset;
        let skipped = io::copy(&mut self.reader.by_ref().take(length), &mut io::sink()).map_err(
            |e| PcapError::TruncatedFile {
                expected: length,
                position,
                source: Some(e),
            },
        )?;
        self.offset += skipped;
        self.check_body_length(header, skipped)?;
        self.read_trailer(header, offset)?;
        self.block_position += 1;
        Ok(())
    }

    fn consume_body(&mut self, header: &BlockHeader, offset: u64) -> PcapResult<Vec<u8>> {
        self.read_block_data(header, offset).map_err(|e| self.fail(e))
    }

    fn consume_skip(&mut self, header: &BlockHeader, offset: u64) -> PcapResult<()> {
        if let Some(kind) = self.failure {
            return Err(PcapError::Failed(kind));
        }
        self.skip_block_data(header, offset).map_err(|e| self.fail(e))
    }
}

/// A single in-flight block
///
/// The view is bound to the [`BlockReader`] which produced it. It is released exactly once,
/// either by [`read_body`](ScopedBlock::read_body), by [`skip`](ScopedBlock::skip), or when it
/// is dropped. In all cases the input stream ends positioned at the start of the next block
/// header, and the trailing length is checked.
///
/// Errors detected while skipping on drop cannot be returned: they put the block reader in
/// failed state, and are reported by the next call to `read_block`.
pub struct ScopedBlock<'r, R: BufRead> {
    reader: &'r mut BlockReader<R>,
    header: BlockHeader,
    offset: u64,
    position: u64,
    released: bool,
}

impl<'r, R: BufRead> ScopedBlock<'r, R> {
    #[inline]
    pub fn block_type(&self) -> u32 {
        self.header.block_type
    }

    #[inline]
    pub fn total_length(&self) -> u32 {
        self.header.total_length
    }

    #[inline]
    pub fn body_length(&self) -> u32 {
        self.header.body_length()
    }

    /// Offset of the block header in the input stream
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Index of this block in the input stream (0 is the first block)
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the block body and validate the trailing length
    pub fn read_body(mut self) -> PcapResult<Vec<u8>> {
        self.released = true;
        let header = self.header;
        self.reader.consume_body(&header, self.offset)
    }

    /// Skip the block body and validate the trailing length
    pub fn skip(mut self) -> PcapResult<()> {
        self.released = true;
        let header = self.header;
        debug!(
            "skipping {} block (type {:#010x}, {} bytes) at offset {}",
            block_type_name(header.block_type),
            header.block_type,
            header.total_length,
            self.offset
        );
        self.reader.consume_skip(&header, self.offset)
    }
}

impl<'r, R: BufRead> Drop for ScopedBlock<'r, R> {
    fn drop(&mut self) {
        if self.released || self.reader.failure.is_some() {
            return;
        }
        let header = self.header;
        if let Err(e) = self.reader.consume_skip(&header, self.offset) {
            warn!("error while skipping unread block: {}", e);
        }
    }
}
