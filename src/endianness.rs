//! Field parsers for the native byte order
//!
//! Only the byte order of the host is supported: every multi-byte field of a
//! block is read and written with the native layout.

use nom::number::complete::{u16 as parse_u16, u32 as parse_u32, u64 as parse_u64};
use nom::number::Endianness;
use nom::IResult;

#[inline]
pub(crate) fn ne_u16(i: &[u8]) -> IResult<&[u8], u16> {
    parse_u16(Endianness::Native)(i)
}

#[inline]
pub(crate) fn ne_u32(i: &[u8]) -> IResult<&[u8], u32> {
    parse_u32(Endianness::Native)(i)
}

#[inline]
pub(crate) fn ne_u64(i: &[u8]) -> IResult<&[u8], u64> {
    parse_u64(Endianness::Native)(i)
}
