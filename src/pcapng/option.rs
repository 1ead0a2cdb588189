use std::slice;
use std::str;

use log::warn;
use nom::bytes::complete::take;
use nom::sequence::tuple;
use nom::IResult;
use rusticata_macros::align32;

use crate::endianness::{ne_u16, ne_u32};
use crate::error::{PcapError, PcapResult};
use crate::pcapng::OptionCode;

/// A single option (TLV) of a block
///
/// The end-of-options marker is never materialized as an option.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PcapNGOption {
    pub code: OptionCode,
    pub value: Vec<u8>,
    /// Private Enterprise Number, only for custom option codes
    pub enterprise_number: Option<u32>,
}

impl PcapNGOption {
    pub fn new(code: OptionCode, value: Vec<u8>) -> Self {
        PcapNGOption {
            code,
            value,
            enterprise_number: None,
        }
    }

    /// Build a comment option
    pub fn comment<S: Into<String>>(text: S) -> Self {
        PcapNGOption::new(OptionCode::Comment, text.into().into_bytes())
    }

    /// Build a custom option, carrying a Private Enterprise Number
    ///
    /// `code` should be one of the custom option codes.
    pub fn custom(code: OptionCode, enterprise_number: u32, value: Vec<u8>) -> Self {
        PcapNGOption {
            code,
            value,
            enterprise_number: Some(enterprise_number),
        }
    }

    #[inline]
    pub fn code(&self) -> OptionCode {
        self.code
    }

    /// Return a reference to the option value, as raw bytes
    ///
    /// For custom options, the enterprise number is not part of the value.
    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[inline]
    pub fn enterprise_number(&self) -> Option<u32> {
        self.enterprise_number
    }

    /// Returns true if the option value is text
    #[inline]
    pub fn is_string(&self) -> bool {
        self.code == OptionCode::Comment
    }

    /// Return the option value as text, or None if it is not valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        str::from_utf8(&self.value).ok()
    }
}

fn option_error(message: &'static str, offset: usize) -> PcapError {
    PcapError::InvalidOptionSize { message, offset }
}

fn take_bytes(i: &[u8], n: usize) -> IResult<&[u8], &[u8]> {
    take(n)(i)
}

/// Parse an options region (the bytes of a block body following its fixed fields)
///
/// Parsing stops at the end-of-options marker, or when the region is exhausted. Comment
/// options with an empty value are dropped.
pub fn parse_options(region: &[u8]) -> PcapResult<Vec<PcapNGOption>> {
    let mut options = Vec::new();
    let mut i = region;
    while !i.is_empty() {
        let offset = region.len() - i.len();
        let (rem, (code, len)) = tuple((ne_u16, ne_u16))(i)
            .map_err(|_| option_error("truncated option header", offset))?;
        let code = OptionCode(code);
        if code == OptionCode::EndOfOpt {
            break;
        }
        let (rem, enterprise_number) = if code.is_custom() {
            let (rem, pen) =
                ne_u32(rem).map_err(|_| option_error("truncated enterprise number", offset))?;
            (rem, Some(pen))
        } else {
            (rem, None)
        };
        let (rem, value) = take_bytes(rem, usize::from(len))
            .map_err(|_| option_error("option value exceeds options region", offset))?;
        // the last option may come without its padding
        let padding = (align32!(u32::from(len)) - u32::from(len)) as usize;
        i = &rem[padding.min(rem.len())..];
        if code == OptionCode::Comment && value.is_empty() {
            continue;
        }
        options.push(PcapNGOption {
            code,
            value: value.to_vec(),
            enterprise_number,
        });
    }
    Ok(options)
}

/// Decoded options of a block
///
/// Options are supplementary: a malformed options region is reported once
/// and treated as empty.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Options(Vec<PcapNGOption>);

impl Options {
    /// Parse an options region, degrading to no options on error
    pub fn parse(region: &[u8]) -> Options {
        match parse_options(region) {
            Ok(options) => Options(options),
            Err(e) => {
                warn!("ignoring malformed options: {}", e);
                Options::default()
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return the first option with this code
    pub fn get(&self, code: OptionCode) -> Option<&PcapNGOption> {
        self.0.iter().find(|o| o.code == code)
    }

    /// Iterate over the text of all comment options
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|o| o.is_string())
            .filter_map(PcapNGOption::as_str)
    }

    pub fn iter(&self) -> slice::Iter<'_, PcapNGOption> {
        self.0.iter()
    }
}

impl From<Vec<PcapNGOption>> for Options {
    fn from(options: Vec<PcapNGOption>) -> Self {
        Options(options)
    }
}

impl IntoIterator for Options {
    type Item = PcapNGOption;
    type IntoIter = std::vec::IntoIter<PcapNGOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Options {
    type Item = &'a PcapNGOption;
    type IntoIter = slice::Iter<'a, PcapNGOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;

    fn push_option(v: &mut Vec<u8>, code: u16, pen: Option<u32>, value: &[u8], pad: bool) {
        v.extend_from_slice(&code.to_ne_bytes());
        v.extend_from_slice(&(value.len() as u16).to_ne_bytes());
        if let Some(pen) = pen {
            v.extend_from_slice(&pen.to_ne_bytes());
        }
        v.extend_from_slice(value);
        if pad {
            v.resize(v.len() + (4 - value.len() % 4) % 4, 0);
        }
    }

    #[test]
    fn test_parse_comment() {
        let text = b"abcdefghijklmnopqrstuvwxyz";
        let mut region = Vec::new();
        push_option(&mut region, 1, None, text, true);
        push_option(&mut region, 0, None, &[], false);
        assert_eq!(region.len(), 4 + 28 + 4);
        let options = parse_options(&region).expect("options");
        assert_eq!(options.len(), 1);
        assert!(options[0].is_string());
        assert_eq!(options[0].as_str(), Some("abcdefghijklmnopqrstuvwxyz"));
        assert_eq!(options[0].enterprise_number(), None);
    }

    #[test]
    fn test_empty_comment_is_absent() {
        let mut region = Vec::new();
        push_option(&mut region, 1, None, &[], true);
        push_option(&mut region, 0, None, &[], false);
        assert!(parse_options(&region).expect("options").is_empty());
        assert!(parse_options(&[]).expect("empty region").is_empty());
    }

    #[test]
    fn test_parse_custom_option() {
        let mut region = Vec::new();
        push_option(&mut region, 2988, Some(32473), b"vendor", true);
        push_option(&mut region, 4, None, b"app", true);
        let options = parse_options(&region).expect("options");
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].code(), OptionCode::Custom2988);
        assert_eq!(options[0].enterprise_number(), Some(32473));
        assert_eq!(options[0].value(), b"vendor");
        assert!(!options[0].is_string());
        assert_eq!(options[1].code(), OptionCode::ShbUserAppl);
        assert_eq!(options[1].value(), b"app");
    }

    #[test]
    fn test_terminator_stops_parsing() {
        let mut region = Vec::new();
        push_option(&mut region, 0, None, &[], false);
        // garbage after the terminator is never looked at
        region.extend_from_slice(&[0xff; 6]);
        assert!(parse_options(&region).expect("options").is_empty());
    }

    #[test]
    fn test_missing_final_padding() {
        let mut region = Vec::new();
        push_option(&mut region, 1, None, b"abc", false);
        let options = parse_options(&region).expect("options");
        assert_eq!(options[0].value(), b"abc");
    }

    #[test]
    fn test_invalid_option_size() {
        let mut region = Vec::new();
        region.extend_from_slice(&1u16.to_ne_bytes());
        region.extend_from_slice(&40u16.to_ne_bytes());
        region.extend_from_slice(b"short");
        let err = parse_options(&region).expect_err("value too long");
        assert_eq!(err.error_type(), ErrorType::InvalidOptionSize);

        // truncated header
        let err = parse_options(&[1, 0]).expect_err("short header");
        assert_eq!(err.error_type(), ErrorType::InvalidOptionSize);

        // missing enterprise number
        let mut region = Vec::new();
        region.extend_from_slice(&19372u16.to_ne_bytes());
        region.extend_from_slice(&0u16.to_ne_bytes());
        let err = parse_options(&region).expect_err("no PEN");
        assert_eq!(err.error_type(), ErrorType::InvalidOptionSize);

        // the container degrades to no options
        assert!(Options::parse(&region).is_empty());
    }

    #[test]
    fn test_options_container() {
        let mut region = Vec::new();
        push_option(&mut region, 1, None, b"first", true);
        push_option(&mut region, 2, None, b"x86_64", true);
        push_option(&mut region, 1, None, b"second", true);
        let options = Options::parse(&region);
        assert_eq!(options.len(), 3);
        assert_eq!(
            options.get(OptionCode::ShbHardware).map(|o| o.value()),
            Some(&b"x86_64"[..])
        );
        assert_eq!(options.get(OptionCode::IfTsresol), None);
        let comments: Vec<_> = options.comments().collect();
        assert_eq!(comments, vec!["first", "second"]);
        assert_eq!((&options).into_iter().count(), 3);
    }
}
