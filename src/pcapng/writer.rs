use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use cookie_factory::{gen, GenError};
use log::{info, warn};

use crate::config::WriterConfig;
use crate::error::{ErrorType, PcapError, PcapResult};
use crate::linktype::Linktype;
use crate::serialize::{
    idb_ne, shb_ne, spb_ne, InterfaceDescriptionBlock, SectionHeaderBlock, SimplePacketBlock,
    ToVec, MAX_SPB_DATA_LEN,
};

fn into_io_error(e: GenError) -> io::Error {
    match e {
        GenError::IoError(e) => e,
        e => io::Error::new(io::ErrorKind::Other, format!("{:?}", e)),
    }
}

/// Writer of packets to a new PCAPNG file
///
/// Opening the writer emits a Section Header Block and a single Interface Description Block
/// (Ethernet, unlimited snap length). Each packet is then written as a Simple Packet Block.
///
/// Any error puts the writer in a terminal failed state, and releases the output stream.
/// The output is flushed when the writer is closed or dropped.
///
/// ## Example
///
/// ```rust,no_run
/// use pcapng_stream::PcapNGWriter;
///
/// let mut writer = PcapNGWriter::open("capture.pcapng").expect("PcapNGWriter");
/// writer.write_packet(&[0xde, 0xad, 0xbe, 0xef]).expect("write packet");
/// writer.close().expect("close");
/// ```
pub struct PcapNGWriter<W: Write = BufWriter<File>> {
    out: Option<W>,
    auto_flush: bool,
    last_error: ErrorType,
    packets_written: u64,
    bytes_written: u64,
}

impl PcapNGWriter<BufWriter<File>> {
    /// Create the file at `path` and write the file headers
    ///
    /// The file must not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> PcapResult<Self> {
        Self::open_with_config(path, &WriterConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &WriterConfig) -> PcapResult<Self> {
        config.validate().map_err(PcapError::InvalidConfig)?;
        let path = path.as_ref();
        if path.exists() {
            return Err(PcapError::FileAlreadyExists(path.to_path_buf()));
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| {
                if source.kind() == io::ErrorKind::AlreadyExists {
                    PcapError::FileAlreadyExists(path.to_path_buf())
                } else {
                    PcapError::UnableToOpenFile {
                        path: path.to_path_buf(),
                        source,
                    }
                }
            })?;
        let out = BufWriter::with_capacity(config.buffer_size, file);
        let writer = Self::start(out, config.auto_flush)?;
        info!("opened {} for writing", path.display());
        Ok(writer)
    }
}

impl<W: Write> PcapNGWriter<W> {
    /// Creates a new `PcapNGWriter<W>` over an output stream, and write the file headers
    pub fn from_writer(out: W) -> PcapResult<Self> {
        Self::from_writer_with_config(out, &WriterConfig::default())
    }

    pub fn from_writer_with_config(out: W, config: &WriterConfig) -> PcapResult<Self> {
        Self::start(out, config.auto_flush)
    }

    fn start(out: W, auto_flush: bool) -> PcapResult<Self> {
        let mut writer = PcapNGWriter {
            out: Some(out),
            auto_flush,
            last_error: ErrorType::NoError,
            packets_written: 0,
            bytes_written: 0,
        };
        if let Err(e) = writer.write_headers() {
            writer.enter_error_state(&e);
            return Err(e);
        }
        Ok(writer)
    }

    fn write_headers(&mut self) -> PcapResult<()> {
        let mut shb = SectionHeaderBlock::default();
        shb.fix();
        let mut idb = InterfaceDescriptionBlock::new(Linktype::ETHERNET, 0);
        idb.fix();
        let auto_flush = self.auto_flush;
        let out = match self.out.as_mut() {
            Some(out) => out,
            None => return Err(PcapError::FileWasClosed),
        };
        let (out, shb_len) =
            gen(shb_ne(&shb), out).map_err(|e| PcapError::WriteError(into_io_error(e)))?;
        let (out, idb_len) =
            gen(idb_ne(&idb), out).map_err(|e| PcapError::WriteError(into_io_error(e)))?;
        if auto_flush {
            out.flush().map_err(PcapError::WriteError)?;
        }
        self.bytes_written += shb_len + idb_len;
        Ok(())
    }

    /// Write a packet, as a Simple Packet Block
    ///
    /// Writing to a closed writer fails with [`PcapError::FileWasClosed`]. Once the writer
    /// failed, returns [`PcapError::Failed`] with the kind of the original error.
    pub fn write_packet(&mut self, data: &[u8]) -> PcapResult<()> {
        let auto_flush = self.auto_flush;
        let out = match self.out.as_mut() {
            Some(out) => out,
            None => return Err(self.closed_error()),
        };
        let result = if data.len() > MAX_SPB_DATA_LEN {
            Err(PcapError::InvalidBlockDetected(format!(
                "packet of {} bytes does not fit in a block",
                data.len()
            )))
        } else {
            let mut block = SimplePacketBlock::new(data);
            block.fix();
            gen(spb_ne(&block), &mut *out)
                .map(|(_, len)| len)
                .map_err(|e| match e {
                    GenError::IoError(e) => PcapError::WriteError(e),
                    e => PcapError::InvalidBlockDetected(format!("{:?}", e)),
                })
        };
        let result = result.and_then(|len| {
            if auto_flush {
                out.flush().map_err(PcapError::WriteError)?;
            }
            Ok(len)
        });
        match result {
            Ok(len) => {
                self.packets_written += 1;
                self.bytes_written += len;
                Ok(())
            }
            Err(e) => {
                self.enter_error_state(&e);
                Err(e)
            }
        }
    }

    fn closed_error(&mut self) -> PcapError {
        match self.last_error {
            ErrorType::NoError | ErrorType::FileWasClosed => {
                self.last_error = ErrorType::FileWasClosed;
                PcapError::FileWasClosed
            }
            kind => PcapError::Failed(kind),
        }
    }

    fn enter_error_state(&mut self, e: &PcapError) {
        warn!("writer entering failed state: {}", e);
        self.last_error = e.error_type();
        self.out = None;
    }

    /// Flush the output stream
    pub fn flush(&mut self) -> PcapResult<()> {
        let result = match self.out.as_mut() {
            Some(out) => out.flush().map_err(PcapError::WriteError),
            None => return Err(self.closed_error()),
        };
        if let Err(ref e) = result {
            self.enter_error_state(e);
        }
        result
    }

    /// Flush and release the output stream
    ///
    /// Closing an already closed writer does nothing.
    pub fn close(&mut self) -> PcapResult<()> {
        if let Some(mut out) = self.out.take() {
            if let Err(e) = out.flush() {
                let e = PcapError::WriteError(e);
                self.enter_error_state(&e);
                return Err(e);
            }
            info!(
                "closed writer: {} packets, {} bytes",
                self.packets_written, self.bytes_written
            );
        }
        Ok(())
    }

    /// Flush the output stream and return it
    pub fn into_inner(mut self) -> PcapResult<W> {
        match self.out.take() {
            Some(mut out) => {
                out.flush().map_err(PcapError::WriteError)?;
                Ok(out)
            }
            None => Err(self.closed_error()),
        }
    }

    /// Returns true if the output stream is open and no error occurred
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.out.is_some() && self.last_error == ErrorType::NoError
    }

    /// Kind of the last error, or `ErrorType::NoError`
    #[inline]
    pub fn last_error(&self) -> ErrorType {
        self.last_error
    }

    #[inline]
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Number of bytes written, including file headers
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl<W: Write> Drop for PcapNGWriter<W> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
