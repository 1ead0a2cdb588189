use std::ops::Range;

use nom::sequence::tuple;
use rusticata_macros::align32;

use crate::endianness::ne_u32;
use crate::error::{PcapError, PcapResult};
use crate::pcapng::{Options, Section};
use crate::traits::PacketBlock;

/// Size of the fixed fields of a Simple Packet Block body
pub const SPB_FIXED_SIZE: usize = 4;

/// Size of the fixed fields of an Enhanced Packet Block body
pub const EPB_FIXED_SIZE: usize = 20;

fn interface_error(section: &Section, if_id: u32) -> PcapError {
    PcapError::InvalidInterfaceForPacket {
        if_id,
        count: section.interface_count(),
    }
}

/// A packet from a Simple Packet Block
///
/// Simple packets are always bound to the first interface of their section,
/// and have neither timestamp nor options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimplePacket {
    /// Sequence number of the section this packet belongs to
    pub section_index: usize,
    /// Index of the block in the stream
    pub block_position: u64,
    pub original_length: u32,
    data: Vec<u8>,
    payload: Range<usize>,
}

impl SimplePacket {
    /// Decode a Simple Packet Block body, in the context of the current section
    pub fn parse(
        data: Vec<u8>,
        offset: u64,
        block_position: u64,
        section: &Section,
        section_index: usize,
    ) -> PcapResult<SimplePacket> {
        let interface = section
            .interface(0)
            .ok_or_else(|| interface_error(section, 0))?;
        if data.len() < SPB_FIXED_SIZE {
            return Err(PcapError::invalid_block_size(
                format!("simple packet body is {} bytes", data.len()),
                offset,
            ));
        }
        let (_, original_length) = ne_u32(&data).map_err(|_| {
            PcapError::invalid_block_size("unable to read simple packet length", offset)
        })?;
        let available = data.len() - SPB_FIXED_SIZE;
        let len = interface.clamp(available.min(original_length as usize));
        Ok(SimplePacket {
            section_index,
            block_position,
            original_length,
            payload: SPB_FIXED_SIZE..SPB_FIXED_SIZE + len,
            data,
        })
    }
}

impl PacketBlock for SimplePacket {
    #[inline]
    fn interface_id(&self) -> u32 {
        0
    }
    #[inline]
    fn packet_data(&self) -> &[u8] {
        &self.data[self.payload.clone()]
    }
    #[inline]
    fn orig_len(&self) -> u32 {
        self.original_length
    }
    #[inline]
    fn timestamp(&self) -> u64 {
        0
    }
    fn options(&self) -> Options {
        Options::default()
    }
}

/// A packet from an Enhanced Packet Block
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnhancedPacket {
    /// Sequence number of the section this packet belongs to
    pub section_index: usize,
    /// Index of the block in the stream
    pub block_position: u64,
    pub interface_id: u32,
    pub ts_high: u32,
    pub ts_low: u32,
    /// Captured packet length, as declared in the block
    pub captured_length: u32,
    pub original_length: u32,
    data: Vec<u8>,
    payload: Range<usize>,
    options: Range<usize>,
}

impl EnhancedPacket {
    /// Decode an Enhanced Packet Block body, in the context of the current section
    pub fn parse(
        data: Vec<u8>,
        offset: u64,
        block_position: u64,
        section: &Section,
        section_index: usize,
    ) -> PcapResult<EnhancedPacket> {
        if data.len() < EPB_FIXED_SIZE {
            return Err(PcapError::invalid_block_size(
                format!(
                    "enhanced packet body is {} bytes, expected at least {}",
                    data.len(),
                    EPB_FIXED_SIZE
                ),
                offset,
            ));
        }
        let (_, (interface_id, ts_high, ts_low, captured_length, original_length)) =
            tuple((ne_u32, ne_u32, ne_u32, ne_u32, ne_u32))(&data[..]).map_err(|_| {
                PcapError::invalid_block_size("unable to read enhanced packet fields", offset)
            })?;
        let interface = section
            .interface(interface_id)
            .ok_or_else(|| interface_error(section, interface_id))?;
        let available = data.len() - EPB_FIXED_SIZE;
        let stored = available.min(captured_length as usize);
        let len = interface.clamp(stored);
        // options follow the padded packet data, once clamped to the snap length
        let options_start = (EPB_FIXED_SIZE + align32!(len)).min(data.len());
        Ok(EnhancedPacket {
            section_index,
            block_position,
            interface_id,
            ts_high,
            ts_low,
            captured_length,
            original_length,
            payload: EPB_FIXED_SIZE..EPB_FIXED_SIZE + len,
            options: options_start..data.len(),
            data,
        })
    }

    /// Raw bytes of the options region
    #[inline]
    pub fn raw_options(&self) -> &[u8] {
        &self.data[self.options.clone()]
    }
}

impl PacketBlock for EnhancedPacket {
    #[inline]
    fn interface_id(&self) -> u32 {
        self.interface_id
    }
    #[inline]
    fn packet_data(&self) -> &[u8] {
        &self.data[self.payload.clone()]
    }
    #[inline]
    fn orig_len(&self) -> u32 {
        self.original_length
    }
    #[inline]
    fn timestamp(&self) -> u64 {
        (u64::from(self.ts_high) << 32) | u64::from(self.ts_low)
    }
    fn options(&self) -> Options {
        Options::parse(self.raw_options())
    }
}

/// A decoded packet
///
/// Packets do not hold their interface: they store its index, to be resolved
/// against the section they were read from
/// (see [`PcapNGReader::interface_of`](crate::PcapNGReader::interface_of)).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Packet {
    Simple(SimplePacket),
    Enhanced(EnhancedPacket),
}

impl Packet {
    /// Index of the interface of this packet, in its section
    #[inline]
    pub fn interface_id(&self) -> u32 {
        PacketBlock::interface_id(self)
    }

    /// Packet data, clamped to the snap length of the interface
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.packet_data()
    }

    #[inline]
    pub fn original_length(&self) -> u32 {
        self.orig_len()
    }

    /// Packet timestamp. Simple packets have no timestamp and return 0.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        PacketBlock::timestamp(self)
    }

    /// Parse the packet options. Simple packets have no options.
    #[inline]
    pub fn options(&self) -> Options {
        PacketBlock::options(self)
    }

    /// Sequence number of the section this packet was read from
    pub fn section_index(&self) -> usize {
        match self {
            Packet::Simple(p) => p.section_index,
            Packet::Enhanced(p) => p.section_index,
        }
    }

    /// Index of the packet block in the stream
    pub fn block_position(&self) -> u64 {
        match self {
            Packet::Simple(p) => p.block_position,
            Packet::Enhanced(p) => p.block_position,
        }
    }
}

impl PacketBlock for Packet {
    fn interface_id(&self) -> u32 {
        match self {
            Packet::Simple(p) => p.interface_id(),
            Packet::Enhanced(p) => p.interface_id(),
        }
    }
    fn packet_data(&self) -> &[u8] {
        match self {
            Packet::Simple(p) => p.packet_data(),
            Packet::Enhanced(p) => p.packet_data(),
        }
    }
    fn orig_len(&self) -> u32 {
        match self {
            Packet::Simple(p) => p.orig_len(),
            Packet::Enhanced(p) => p.orig_len(),
        }
    }
    fn timestamp(&self) -> u64 {
        match self {
            Packet::Simple(p) => p.timestamp(),
            Packet::Enhanced(p) => p.timestamp(),
        }
    }
    fn options(&self) -> Options {
        match self {
            Packet::Simple(p) => p.options(),
            Packet::Enhanced(p) => p.options(),
        }
    }
}

impl From<SimplePacket> for Packet {
    fn from(p: SimplePacket) -> Self {
        Packet::Simple(p)
    }
}

impl From<EnhancedPacket> for Packet {
    fn from(p: EnhancedPacket) -> Self {
        Packet::Enhanced(p)
    }
}
