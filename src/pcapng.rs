//! PCAPNG file format
//!
//! See <https://github.com/pcapng/pcapng> for details.
//!
//! ## File format and parsing
//!
//! A capture file is organized in blocks. Every block shares the same envelope:
//!
//! ```text
//!                         1                   2                   3
//!     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  0 |                          Block Type                           |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  4 |                      Block Total Length                       |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  8 /                          Block Body                           /
//!    /              variable length, padded to 32 bits               /
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!    |                      Block Total Length                       |
//!    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Blocks are organized in sections, each section starting with a Section Header Block (SHB),
//! and followed by blocks (interface description, packets, etc.). When a SHB is encountered,
//! a new section starts and all interfaces of the previous section are forgotten.
//!
//! Only the byte order of the host is supported.

use rusticata_macros::newtype_enum;

pub mod block;
pub mod option;
pub mod packet;
pub mod reader;
pub mod section;
pub mod writer;

pub use block::*;
pub use option::*;
pub use packet::*;
pub use reader::*;
pub use section::*;
pub use writer::*;

/// Section Header Block magic
pub const SHB_MAGIC: u32 = 0x0A0D_0D0A;
/// Interface Description Block magic
pub const IDB_MAGIC: u32 = 0x0000_0001;
/// Simple Packet Block magic
pub const SPB_MAGIC: u32 = 0x0000_0003;
/// Name Resolution Block magic
pub const NRB_MAGIC: u32 = 0x0000_0004;
/// Interface Statistic Block magic
pub const ISB_MAGIC: u32 = 0x0000_0005;
/// Enhanced Packet Block magic
pub const EPB_MAGIC: u32 = 0x0000_0006;

/// Decryption Secrets Block magic
pub const DSB_MAGIC: u32 = 0x0000_000A;

/// Custom Block magic
pub const CB_MAGIC: u32 = 0x0000_0BAD;

/// Do-not-copy Custom Block magic
pub const DCB_MAGIC: u32 = 0x4000_0BAD;

/// Byte Order magic
pub const BOM_MAGIC: u32 = 0x1A2B_3C4D;

/// Section length value meaning "unknown"
pub const SECTION_LENGTH_UNKNOWN: u64 = u64::MAX;

/// Size of the block envelope: block type, leading and trailing total length
pub const BLOCK_ENVELOPE_SIZE: u32 = 12;

/// Blocks are aligned on this many bytes
pub const BLOCK_ALIGNMENT: u32 = 4;

#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct OptionCode(pub u16);

newtype_enum! {
impl debug OptionCode {
    EndOfOpt = 0,
    Comment = 1,
    ShbHardware = 2,
    ShbOs = 3,
    ShbUserAppl = 4,
    IfTsresol = 9,
    IfTsoffset = 14,
    Custom2988 = 2988,
    Custom2989 = 2989,
    Custom19372 = 19372,
    Custom19373 = 19373,
}
}

/// Option codes carrying a Private Enterprise Number before their value
pub const CUSTOM_OPTION_CODES: [OptionCode; 4] = [
    OptionCode::Custom2988,
    OptionCode::Custom2989,
    OptionCode::Custom19372,
    OptionCode::Custom19373,
];

impl OptionCode {
    /// Returns true if this code is one of the custom option codes
    #[inline]
    pub fn is_custom(self) -> bool {
        CUSTOM_OPTION_CODES.contains(&self)
    }
}

/// Return a readable name for a block type, for diagnostics
pub fn block_type_name(block_type: u32) -> &'static str {
    match block_type {
        SHB_MAGIC => "section header",
        IDB_MAGIC => "interface description",
        SPB_MAGIC => "simple packet",
        NRB_MAGIC => "name resolution",
        ISB_MAGIC => "interface statistics",
        EPB_MAGIC => "enhanced packet",
        DSB_MAGIC => "decryption secrets",
        CB_MAGIC | DCB_MAGIC => "custom",
        _ => "unknown",
    }
}
