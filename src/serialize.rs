//! Encoding of PCAPNG blocks
//!
//! All structures implement the [`ToVec`] trait, which serializes them using the native byte
//! order. Block lengths, magic values and option terminators are recomputed by
//! [`ToVec::fix`] before serialization.

use crate::linktype::Linktype;
use crate::pcapng::*;
use cookie_factory::bytes::{ne_u16, ne_u32, ne_u64};
use cookie_factory::combinator::{cond, slice};
use cookie_factory::multi::many_ref;
use cookie_factory::sequence::tuple;
use cookie_factory::{gen, GenError, SerializeFn, WriteContext};
use rusticata_macros::align32;
use std::convert::TryFrom;
use std::io::Write;

/// Largest packet which fits in a Simple Packet Block
pub const MAX_SPB_DATA_LEN: usize = (u32::MAX - 19) as usize;

/// Common trait for all serialization functions
pub trait ToVec {
    /// Serialize to bytes representation (native byte order).
    /// Check values and fix all fields before serializing.
    fn to_vec(&mut self) -> Result<Vec<u8>, GenError> {
        self.fix();
        self.to_vec_raw()
    }

    /// Check and correct all fields: use magic, fix lengths fields and other values if possible.
    fn fix(&mut self) {}

    /// Serialize to bytes representation (native byte order). Do not check values
    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError>;
}

fn padding_for<'a, W: Write + 'a>(unaligned_length: u32) -> impl SerializeFn<W> + 'a {
    let length = align32!(unaligned_length) - unaligned_length;
    slice(if length > 0 {
        &[0, 0, 0, 0][..length as usize]
    } else {
        b""
    })
}

impl ToVec for PcapNGOption {
    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError> {
        let mut v = Vec::new();
        gen(pcapngoption_ne(self), &mut v).map(|res| res.0.to_vec())
    }
}

/// Error code of [`GenError::CustomError`] for an option value longer than 65535 bytes
pub const OPTION_VALUE_TOO_LONG: u32 = 1;

fn option_value_length<W: Write>(len: usize) -> impl SerializeFn<W> {
    move |out: WriteContext<W>| match u16::try_from(len) {
        Ok(len) => ne_u16(len)(out),
        Err(_) => Err(GenError::CustomError(OPTION_VALUE_TOO_LONG)),
    }
}

fn pcapngoption_ne<'a, 'b: 'a, W: Write + 'a>(i: &'b PcapNGOption) -> impl SerializeFn<W> + 'a {
    tuple((
        ne_u16(i.code.0),
        option_value_length(i.value.len()),
        cond(
            i.enterprise_number.is_some(),
            ne_u32(i.enterprise_number.unwrap_or(0)),
        ),
        slice(&i.value),
        padding_for(i.value.len() as u32),
    ))
}

fn end_of_options() -> PcapNGOption {
    PcapNGOption::new(OptionCode::EndOfOpt, Vec::new())
}

fn option_length(o: &PcapNGOption) -> usize {
    let pen_length = if o.enterprise_number.is_some() { 4 } else { 0 };
    4 + pen_length + align32!(o.value.len())
}

fn options_length(options: &[PcapNGOption]) -> usize {
    options.iter().map(option_length).sum()
}

fn fix_options(options: &mut Vec<PcapNGOption>) {
    options.retain(|e| e.code != OptionCode::EndOfOpt);
    if !options.is_empty() {
        options.push(end_of_options())
    }
}

/// Serialize a list of options, followed by the end-of-options marker
///
/// An empty list serializes to nothing. This is the inverse of [`parse_options`].
pub fn options_to_vec(options: &[PcapNGOption]) -> Result<Vec<u8>, GenError> {
    let mut options = options.to_vec();
    fix_options(&mut options);
    let mut v = Vec::with_capacity(options_length(&options));
    gen(many_ref(&options, pcapngoption_ne), &mut v).map(|res| res.0.to_vec())
}

/// Section Header Block, encode side
#[derive(Clone, Debug)]
pub struct SectionHeaderBlock {
    pub block_type: u32,
    pub block_len1: u32,
    pub bom: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub section_len: u64,
    pub options: Vec<PcapNGOption>,
    pub block_len2: u32,
}

impl Default for SectionHeaderBlock {
    fn default() -> Self {
        SectionHeaderBlock {
            block_type: SHB_MAGIC,
            block_len1: 0,
            bom: BOM_MAGIC,
            major_version: 1,
            minor_version: 0,
            section_len: SECTION_LENGTH_UNKNOWN,
            options: Vec::new(),
            block_len2: 0,
        }
    }
}

impl ToVec for SectionHeaderBlock {
    /// Check and correct all fields: use magic, version and fix lengths fields
    fn fix(&mut self) {
        self.block_type = SHB_MAGIC;
        self.bom = BOM_MAGIC;
        self.major_version = 1;
        self.minor_version = 0;
        fix_options(&mut self.options);
        // the section header always carries an options terminator
        if self.options.is_empty() {
            self.options.push(end_of_options());
        }
        // fix length
        let length = (28 + options_length(&self.options)) as u32;
        self.block_len1 = length;
        self.block_len2 = length;
    }

    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError> {
        let mut v = Vec::with_capacity(64);
        gen(shb_ne(self), &mut v).map(|res| res.0.to_vec())
    }
}

pub(crate) fn shb_ne<'a, W: Write + 'a>(i: &'a SectionHeaderBlock) -> impl SerializeFn<W> + 'a {
    tuple((
        ne_u32(i.block_type),
        ne_u32(i.block_len1),
        ne_u32(i.bom),
        ne_u16(i.major_version),
        ne_u16(i.minor_version),
        ne_u64(i.section_len),
        many_ref(&i.options, pcapngoption_ne),
        ne_u32(i.block_len2),
    ))
}

/// Interface Description Block, encode side
#[derive(Clone, Debug)]
pub struct InterfaceDescriptionBlock {
    pub block_type: u32,
    pub block_len1: u32,
    pub linktype: Linktype,
    pub reserved: u16,
    pub snaplen: u32,
    pub options: Vec<PcapNGOption>,
    pub block_len2: u32,
}

impl InterfaceDescriptionBlock {
    pub fn new(linktype: Linktype, snaplen: u32) -> Self {
        InterfaceDescriptionBlock {
            block_type: IDB_MAGIC,
            block_len1: 0,
            linktype,
            reserved: 0,
            snaplen,
            options: Vec::new(),
            block_len2: 0,
        }
    }
}

impl ToVec for InterfaceDescriptionBlock {
    /// Check and correct all fields: use magic and fix lengths fields
    fn fix(&mut self) {
        self.block_type = IDB_MAGIC;
        self.reserved = 0;
        fix_options(&mut self.options);
        // fix length
        let length = (20 + options_length(&self.options)) as u32;
        self.block_len1 = length;
        self.block_len2 = length;
    }

    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError> {
        let mut v = Vec::with_capacity(64);
        gen(idb_ne(self), &mut v).map(|res| res.0.to_vec())
    }
}

pub(crate) fn idb_ne<'a, W: Write + 'a>(
    i: &'a InterfaceDescriptionBlock,
) -> impl SerializeFn<W> + 'a {
    tuple((
        ne_u32(i.block_type),
        ne_u32(i.block_len1),
        ne_u16(i.linktype.0),
        ne_u16(i.reserved),
        ne_u32(i.snaplen),
        many_ref(&i.options, pcapngoption_ne),
        ne_u32(i.block_len2),
    ))
}

/// Simple Packet Block, encode side
#[derive(Clone, Debug)]
pub struct SimplePacketBlock<'a> {
    pub block_type: u32,
    pub block_len1: u32,
    /// Original packet length
    pub origlen: u32,
    pub data: &'a [u8],
    pub block_len2: u32,
}

impl<'a> SimplePacketBlock<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SimplePacketBlock {
            block_type: SPB_MAGIC,
            block_len1: 0,
            origlen: data.len() as u32,
            data,
            block_len2: 0,
        }
    }
}

impl<'a> ToVec for SimplePacketBlock<'a> {
    fn fix(&mut self) {
        self.block_type = SPB_MAGIC;
        // fix length
        self.block_len1 = (16 + align32!(self.data.len())) as u32;
        self.block_len2 = self.block_len1;
    }

    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError> {
        let mut v = Vec::with_capacity(16 + self.data.len() + 3);
        gen(spb_ne(self), &mut v).map(|res| res.0.to_vec())
    }
}

pub(crate) fn spb_ne<'a, 'b: 'a, W: Write + 'a>(
    i: &'b SimplePacketBlock<'a>,
) -> impl SerializeFn<W> + 'a {
    tuple((
        ne_u32(i.block_type),
        ne_u32(i.block_len1),
        ne_u32(i.origlen),
        slice(i.data),
        padding_for(i.data.len() as u32),
        ne_u32(i.block_len2),
    ))
}

/// Enhanced Packet Block, encode side
#[derive(Clone, Debug)]
pub struct EnhancedPacketBlock<'a> {
    pub block_type: u32,
    pub block_len1: u32,
    pub if_id: u32,
    pub ts_high: u32,
    pub ts_low: u32,
    /// Captured packet length
    pub caplen: u32,
    /// Original packet length
    pub origlen: u32,
    pub data: &'a [u8],
    pub options: Vec<PcapNGOption>,
    pub block_len2: u32,
}

impl<'a> EnhancedPacketBlock<'a> {
    pub fn new(if_id: u32, timestamp: u64, data: &'a [u8]) -> Self {
        EnhancedPacketBlock {
            block_type: EPB_MAGIC,
            block_len1: 0,
            if_id,
            ts_high: (timestamp >> 32) as u32,
            ts_low: timestamp as u32,
            caplen: data.len() as u32,
            origlen: data.len() as u32,
            data,
            options: Vec::new(),
            block_len2: 0,
        }
    }
}

impl<'a> ToVec for EnhancedPacketBlock<'a> {
    /// Check and correct all fields: use magic, captured length and fix lengths fields
    fn fix(&mut self) {
        self.block_type = EPB_MAGIC;
        self.caplen = self.data.len() as u32;
        fix_options(&mut self.options);
        // fix length
        let length = 32 + align32!(self.data.len()) + options_length(&self.options);
        self.block_len1 = length as u32;
        self.block_len2 = self.block_len1;
    }

    fn to_vec_raw(&self) -> Result<Vec<u8>, GenError> {
        let mut v = Vec::with_capacity(64 + self.data.len());
        gen(
            tuple((
                ne_u32(self.block_type),
                ne_u32(self.block_len1),
                ne_u32(self.if_id),
                ne_u32(self.ts_high),
                ne_u32(self.ts_low),
                ne_u32(self.caplen),
                ne_u32(self.origlen),
                slice(self.data),
                padding_for(self.data.len() as u32),
                many_ref(&self.options, pcapngoption_ne),
                ne_u32(self.block_len2),
            )),
            &mut v,
        )
        .map(|res| res.0.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(target_endian = "little")]
    use hex_literal::hex;

    fn body_of(block: &[u8]) -> Vec<u8> {
        block[8..block.len() - 4].to_vec()
    }

    #[test]
    fn test_shb_is_32_bytes() {
        let v = SectionHeaderBlock::default().to_vec().expect("serialize");
        assert_eq!(v.len(), 32);
        assert_eq!(&v[..4], &SHB_MAGIC.to_ne_bytes());
        assert_eq!(&v[4..8], &32u32.to_ne_bytes());
        assert_eq!(&v[28..], &32u32.to_ne_bytes());
        let section = Section::parse(body_of(&v), 0, 0).expect("section");
        assert_eq!(section.version_major, 1);
        assert_eq!(section.version_minor, 0);
        assert!(!section.is_length_known());
        assert!(section.options().is_empty());
    }

    #[test]
    fn test_shb_with_options() {
        let mut shb = SectionHeaderBlock::default();
        shb.options.push(PcapNGOption::new(
            OptionCode::ShbUserAppl,
            b"pcapng-stream".to_vec(),
        ));
        let v = shb.to_vec().expect("serialize");
        // 28 + (4 + 16) + 4
        assert_eq!(v.len(), 52);
        let section = Section::parse(body_of(&v), 0, 0).expect("section");
        let options = section.options();
        assert_eq!(
            options.get(OptionCode::ShbUserAppl).map(|o| o.value()),
            Some(&b"pcapng-stream"[..])
        );
    }

    #[test]
    fn test_idb_is_20_bytes() {
        let v = InterfaceDescriptionBlock::new(Linktype::ETHERNET, 0)
            .to_vec()
            .expect("serialize");
        assert_eq!(v.len(), 20);
        let interface = Interface::parse(body_of(&v), 32, 1).expect("interface");
        assert_eq!(interface.link_type, Linktype::ETHERNET);
        assert_eq!(interface.snap_len, 0);
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn test_spb_layout() {
        let data = [0xaa, 0xbb, 0xcc, 0xdd, 0xee];
        let v = SimplePacketBlock::new(&data).to_vec().expect("serialize");
        assert_eq!(
            v,
            hex!(
                "03 00 00 00 18 00 00 00 05 00 00 00"
                "aa bb cc dd ee 00 00 00"
                "18 00 00 00"
            )
            .to_vec()
        );
    }

    #[test]
    fn test_empty_spb() {
        let v = SimplePacketBlock::new(&[]).to_vec().expect("serialize");
        assert_eq!(v.len(), 16);
        assert_eq!(&v[8..12], &0u32.to_ne_bytes());
    }

    #[test]
    fn test_epb_with_options() {
        let data = [1u8, 2, 3, 4, 5, 6, 7];
        let mut epb = EnhancedPacketBlock::new(0, 0x0000_0002_0000_0010, &data);
        epb.origlen = 1500;
        epb.options.push(PcapNGOption::comment("abcdefghijklmnopqrstuvwxyz"));
        epb.options.push(PcapNGOption::custom(
            OptionCode::Custom2989,
            32473,
            vec![0xfe, 0xed],
        ));
        let v = epb.to_vec().expect("serialize");
        assert_eq!(v.len(), epb.block_len1 as usize);
        assert_eq!(v.len() % 4, 0);

        let mut section = Section::parse(
            body_of(&SectionHeaderBlock::default().to_vec().expect("shb")),
            0,
            0,
        )
        .expect("section");
        let idb = InterfaceDescriptionBlock::new(Linktype::ETHERNET, 0)
            .to_vec()
            .expect("idb");
        section.add_interface(Interface::parse(body_of(&idb), 32, 1).expect("interface"));

        let packet = EnhancedPacket::parse(body_of(&v), 52, 2, &section, 0).expect("epb");
        let packet = Packet::from(packet);
        assert_eq!(packet.data(), &data);
        assert_eq!(packet.original_length(), 1500);
        assert_eq!(packet.timestamp(), 0x0000_0002_0000_0010);
        let options = packet.options();
        assert_eq!(options.len(), 2);
        assert_eq!(
            options.comments().next(),
            Some("abcdefghijklmnopqrstuvwxyz")
        );
        let custom = options.get(OptionCode::Custom2989).expect("custom option");
        assert_eq!(custom.enterprise_number(), Some(32473));
        assert_eq!(custom.value(), &[0xfe, 0xed]);
    }

    #[test]
    fn test_options_to_vec_is_inverse_of_parse() {
        let options = vec![
            PcapNGOption::comment("a comment"),
            PcapNGOption::custom(OptionCode::Custom19372, 1234, b"custom".to_vec()),
            PcapNGOption::new(OptionCode::IfTsresol, vec![6]),
        ];
        let v = options_to_vec(&options).expect("serialize");
        // 4 + 12, 8 + 8, 4 + 4, terminator
        assert_eq!(v.len(), 16 + 16 + 8 + 4);
        assert_eq!(parse_options(&v).expect("parse"), options);
        assert!(options_to_vec(&[]).expect("serialize").is_empty());
    }

    #[test]
    fn test_option_value_too_long() {
        let long = PcapNGOption::new(OptionCode::Comment, vec![b'x'; 70_000]);
        let err = options_to_vec(&[long.clone()]).expect_err("value too long");
        assert!(matches!(err, GenError::CustomError(OPTION_VALUE_TOO_LONG)));
        assert!(long.to_vec_raw().is_err());

        let mut epb = EnhancedPacketBlock::new(0, 0, &[1, 2, 3, 4]);
        epb.options.push(long);
        assert!(epb.to_vec().is_err());

        let largest = vec![PcapNGOption::new(OptionCode::Comment, vec![b'x'; 65_535])];
        let v = options_to_vec(&largest).expect("serialize");
        assert_eq!(v.len(), 4 + 65_536 + 4);
        assert_eq!(parse_options(&v).expect("parse"), largest);
    }
}
