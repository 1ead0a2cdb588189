use log::{debug, warn};
use nom::sequence::tuple;

use crate::endianness::{ne_u16, ne_u32, ne_u64};
use crate::error::{PcapError, PcapResult};
use crate::linktype::Linktype;
use crate::pcapng::{Options, BOM_MAGIC, SECTION_LENGTH_UNKNOWN};

/// Size of the fixed fields of a Section Header Block body
pub const SHB_FIXED_SIZE: usize = 16;

/// Size of the fixed fields of an Interface Description Block body
pub const IDB_FIXED_SIZE: usize = 8;

/// A capture section, started by a Section Header Block
///
/// The section owns the interfaces declared after its header. Interfaces are
/// addressed by their index in declaration order.
#[derive(Clone, Debug)]
pub struct Section {
    pub version_major: u16,
    pub version_minor: u16,
    /// Declared length of the section, in bytes. Informational only.
    pub section_length: u64,
    /// Index of the Section Header Block in the stream
    pub block_position: u64,
    interfaces: Vec<Interface>,
    data: Vec<u8>,
}

impl Section {
    /// Decode a Section Header Block body
    ///
    /// `offset` is the position of the block in the stream, used for error reporting.
    pub fn parse(data: Vec<u8>, offset: u64, block_position: u64) -> PcapResult<Section> {
        if data.len() < SHB_FIXED_SIZE {
            return Err(PcapError::invalid_block_size(
                format!(
                    "section header body is {} bytes, expected at least {}",
                    data.len(),
                    SHB_FIXED_SIZE
                ),
                offset,
            ));
        }
        let (_, (bom, version_major, version_minor, section_length)) =
            tuple((ne_u32, ne_u16, ne_u16, ne_u64))(&data[..]).map_err(|_| {
                PcapError::invalid_block_size("unable to read section header fields", offset)
            })?;
        if bom != BOM_MAGIC {
            warn!(
                "section header at offset {} has unexpected byte-order magic {:#010x}",
                offset, bom
            );
        }
        debug!(
            "section {}.{} at block {} (length {})",
            version_major,
            version_minor,
            block_position,
            if section_length == SECTION_LENGTH_UNKNOWN {
                "unknown".to_string()
            } else {
                section_length.to_string()
            }
        );
        Ok(Section {
            version_major,
            version_minor,
            section_length,
            block_position,
            interfaces: Vec::new(),
            data,
        })
    }

    /// Returns true if the section declares its length
    #[inline]
    pub fn is_length_known(&self) -> bool {
        self.section_length != SECTION_LENGTH_UNKNOWN
    }

    /// Parse the options of the section header
    pub fn options(&self) -> Options {
        Options::parse(&self.data[SHB_FIXED_SIZE..])
    }

    /// Return the interface declared with this index, if any
    #[inline]
    pub fn interface(&self, if_id: u32) -> Option<&Interface> {
        self.interfaces.get(if_id as usize)
    }

    #[inline]
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    #[inline]
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub(crate) fn add_interface(&mut self, interface: Interface) {
        debug!(
            "interface {}: linktype {}, snaplen {}",
            self.interfaces.len(),
            interface.link_type,
            interface.snap_len
        );
        self.interfaces.push(interface);
    }
}

/// A capture interface, declared by an Interface Description Block
#[derive(Clone, Debug)]
pub struct Interface {
    pub link_type: Linktype,
    /// Maximum number of captured bytes per packet. 0 means unlimited.
    pub snap_len: u32,
    /// Index of the Interface Description Block in the stream
    pub block_position: u64,
    data: Vec<u8>,
}

impl Interface {
    /// Decode an Interface Description Block body
    pub fn parse(data: Vec<u8>, offset: u64, block_position: u64) -> PcapResult<Interface> {
        if data.len() < IDB_FIXED_SIZE {
            return Err(PcapError::invalid_block_size(
                format!(
                    "interface description body is {} bytes, expected at least {}",
                    data.len(),
                    IDB_FIXED_SIZE
                ),
                offset,
            ));
        }
        let (_, (link_type, _reserved, snap_len)) = tuple((ne_u16, ne_u16, ne_u32))(&data[..])
            .map_err(|_| {
                PcapError::invalid_block_size("unable to read interface description fields", offset)
            })?;
        Ok(Interface {
            link_type: Linktype(link_type),
            snap_len,
            block_position,
            data,
        })
    }

    /// Parse the options of the interface description
    pub fn options(&self) -> Options {
        Options::parse(&self.data[IDB_FIXED_SIZE..])
    }

    /// Clamp a captured length to the snap length of this interface
    #[inline]
    pub fn clamp(&self, len: usize) -> usize {
        if self.snap_len == 0 {
            len
        } else {
            len.min(self.snap_len as usize)
        }
    }
}
