//! # PCAPNG stream reader and writer
//!
//! This crate reads and writes capture files in the PCAPNG format, one block at a time.
//!
//! The [`PcapNGReader`] walks a file forward, validating the size and alignment of every block,
//! and tracks the current section and its interfaces to decode Simple and Enhanced Packet Blocks
//! into [`Packet`]s. Options of sections, interfaces and packets are decoded on demand.
//!
//! The [`PcapNGWriter`] creates a new file, with a Section Header Block and a single Ethernet
//! interface, and appends each packet as a Simple Packet Block.
//!
//! Only the byte order of the host is supported, for both reading and writing.
//!
//! Errors are reported as [`PcapError`]. Readers and writers enter a terminal failed state on
//! the first error: [`ErrorType`] gives the kind of the last error.
//!
//! # Example: reading a file
//!
//! ```rust,no_run
//! use pcapng_stream::*;
//!
//! # fn main() -> Result<(), PcapError> {
//! let mut reader = PcapNGReader::open("capture.pcapng")?;
//! while let Some(packet) = reader.read_packet() {
//!     let linktype = reader.interface_of(&packet).map(|i| i.link_type);
//!     println!(
//!         "{} bytes (original length {}), linktype {:?}",
//!         packet.data().len(),
//!         packet.original_length(),
//!         linktype
//!     );
//!     for comment in packet.options().comments() {
//!         println!("  comment: {}", comment);
//!     }
//! }
//! if reader.last_error() != ErrorType::NoError {
//!     eprintln!("error while reading: {}", reader.last_error());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example: writing a file
//!
//! ```rust,no_run
//! use pcapng_stream::*;
//!
//! # fn main() -> Result<(), PcapError> {
//! let mut writer = PcapNGWriter::open("capture.pcapng")?;
//! for i in 0..10u8 {
//!     writer.write_packet(&[i; 64])?;
//! }
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod endianness;
mod error;
mod linktype;
pub use config::*;
pub use error::*;
pub use linktype::*;

pub mod pcapng;
pub use pcapng::*;

pub mod serialize;
pub mod traits;
