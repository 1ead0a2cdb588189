use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};

use crate::config::ReaderConfig;
use crate::error::{ErrorType, PcapError, PcapResult};
use crate::pcapng::*;

enum State<R> {
    Closed,
    Open {
        blocks: BlockReader<R>,
        section: Section,
    },
    Failed,
}

/// Streaming reader of packets from a PCAPNG file
///
/// ## Pcap-NG Reader
///
/// The reader walks the input forward, one block at a time, and only keeps the current section
/// (with its interfaces) in memory. The first block must be a Section Header Block. After that,
/// calls to [`read_packet`](PcapNGReader::read_packet) decode blocks until a packet is found:
///
/// - a Section Header Block starts a new section, forgetting all interfaces of the previous one
/// - an Interface Description Block adds an interface to the current section
/// - Simple and Enhanced Packet Blocks are returned as [`Packet`]s
/// - all other blocks are skipped
///
/// Any error puts the reader in a terminal failed state: the input stream is released,
/// [`is_valid`](PcapNGReader::is_valid) returns false and [`last_error`](PcapNGReader::last_error)
/// reports the kind of the error. The reader never tries to resynchronize on a corrupted stream.
///
/// ## Example
///
/// ```rust,no_run
/// use pcapng_stream::PcapNGReader;
///
/// let mut reader = PcapNGReader::open("capture.pcapng").expect("PcapNGReader");
/// let mut num_packets = 0;
/// while let Some(packet) = reader.read_packet() {
///     println!("packet of {} bytes on interface {}", packet.data().len(), packet.interface_id());
///     num_packets += 1;
/// }
/// if !reader.is_valid() {
///     eprintln!("error while reading: {}", reader.last_error());
/// }
/// println!("num_packets: {}", num_packets);
/// ```
pub struct PcapNGReader<R = BufReader<File>> {
    state: State<R>,
    section_index: usize,
    last_error: ErrorType,
}

impl PcapNGReader<BufReader<File>> {
    /// Open the file at `path` and read its Section Header Block
    pub fn open<P: AsRef<Path>>(path: P) -> PcapResult<Self> {
        Self::open_with_config(path, &ReaderConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> PcapResult<Self> {
        let path = path.as_ref();
        let blocks = BlockReader::open_with_config(path, config)?;
        let reader = Self::start(blocks)?;
        info!("opened {} for reading", path.display());
        Ok(reader)
    }
}

impl<R: BufRead> PcapNGReader<R> {
    /// Creates a new `PcapNGReader<R>` over a buffered input stream, and read its Section Header
    /// Block
    pub fn from_reader(reader: R) -> PcapResult<Self> {
        Self::from_reader_with_config(reader, &ReaderConfig::default())
    }

    /// The input is already buffered: only `validate_trailing_length` is used from `config`.
    pub fn from_reader_with_config(reader: R, config: &ReaderConfig) -> PcapResult<Self> {
        let mut blocks = BlockReader::new(reader);
        blocks.set_validate_trailing_length(config.validate_trailing_length);
        Self::start(blocks)
    }

    fn start(mut blocks: BlockReader<R>) -> PcapResult<Self> {
        let block = blocks.read_block()?;
        if block.block_type() != SHB_MAGIC {
            return Err(PcapError::FirstBlockIsNotSectionHeader {
                block_type: block.block_type(),
            });
        }
        let (offset, position) = (block.offset(), block.position());
        let section = Section::parse(block.read_body()?, offset, position)?;
        Ok(PcapNGReader {
            state: State::Open { blocks, section },
            section_index: 0,
            last_error: ErrorType::NoError,
        })
    }

    /// Read the next packet
    ///
    /// Returns `None` at the end of the input, or if an error occurred. Use
    /// [`is_valid`](PcapNGReader::is_valid) to distinguish both cases.
    pub fn read_packet(&mut self) -> Option<Packet> {
        self.try_read_packet().ok().flatten()
    }

    /// Read the next packet, reporting errors
    ///
    /// Returns `Ok(None)` at the end of the input, or if the reader was closed. Once the reader
    /// failed, returns [`PcapError::Failed`] with the kind of the original error.
    pub fn try_read_packet(&mut self) -> PcapResult<Option<Packet>> {
        match self.next_packet() {
            Ok(packet) => Ok(packet),
            Err(e) => {
                self.enter_error_state(&e);
                Err(e)
            }
        }
    }

    fn next_packet(&mut self) -> PcapResult<Option<Packet>> {
        let (blocks, section) = match &mut self.state {
            State::Open { blocks, section } => (blocks, section),
            State::Closed => return Ok(None),
            State::Failed => return Err(PcapError::Failed(self.last_error)),
        };
        loop {
            if blocks.is_at_end() {
                return Ok(None);
            }
            let block = blocks.read_block()?;
            let (offset, position) = (block.offset(), block.position());
            match block.block_type() {
                SHB_MAGIC => {
                    *section = Section::parse(block.read_body()?, offset, position)?;
                    self.section_index += 1;
                }
                IDB_MAGIC => {
                    let interface = Interface::parse(block.read_body()?, offset, position)?;
                    section.add_interface(interface);
                }
                SPB_MAGIC => {
                    if section.interface_count() == 0 {
                        return Err(PcapError::InvalidInterfaceForPacket { if_id: 0, count: 0 });
                    }
                    let body = block.read_body()?;
                    let packet =
                        SimplePacket::parse(body, offset, position, section, self.section_index)?;
                    return Ok(Some(Packet::Simple(packet)));
                }
                EPB_MAGIC => {
                    let body = block.read_body()?;
                    let packet =
                        EnhancedPacket::parse(body, offset, position, section, self.section_index)?;
                    return Ok(Some(Packet::Enhanced(packet)));
                }
                _ => block.skip()?,
            }
        }
    }

    fn enter_error_state(&mut self, e: &PcapError) {
        if let PcapError::Failed(_) = e {
            return;
        }
        warn!("reader entering failed state: {}", e);
        self.state = State::Failed;
        self.last_error = e.error_type();
    }
}

impl<R> PcapNGReader<R> {
    /// Returns true if the reader is open and no error occurred
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    /// Kind of the last error, or `ErrorType::NoError`
    #[inline]
    pub fn last_error(&self) -> ErrorType {
        self.last_error
    }

    /// Release the input stream
    ///
    /// Closing a failed reader keeps its last error.
    pub fn close(&mut self) {
        if let State::Open { .. } = self.state {
            info!("closing reader");
            self.state = State::Closed;
        }
    }

    /// The current section, while the reader is open
    pub fn section(&self) -> Option<&Section> {
        match &self.state {
            State::Open { section, .. } => Some(section),
            _ => None,
        }
    }

    /// Sequence number of the current section (0 for the first section of the stream)
    #[inline]
    pub fn section_index(&self) -> usize {
        self.section_index
    }

    /// Resolve the interface of a packet
    ///
    /// Returns `None` if the packet was read from a section which is not current anymore.
    pub fn interface_of(&self, packet: &Packet) -> Option<&Interface> {
        if packet.section_index() != self.section_index {
            return None;
        }
        self.section()?.interface(packet.interface_id())
    }
}

impl<R: BufRead> Iterator for PcapNGReader<R> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        self.read_packet()
    }
}
