use pcapng_stream::serialize::{
    EnhancedPacketBlock, InterfaceDescriptionBlock, SectionHeaderBlock, SimplePacketBlock, ToVec,
};
use pcapng_stream::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

fn shb(options: Vec<PcapNGOption>) -> Vec<u8> {
    let mut shb = SectionHeaderBlock::default();
    shb.options = options;
    shb.to_vec().expect("shb")
}

fn idb(linktype: Linktype, snaplen: u32) -> Vec<u8> {
    InterfaceDescriptionBlock::new(linktype, snaplen)
        .to_vec()
        .expect("idb")
}

fn epb(if_id: u32, ts: u64, data: &[u8], origlen: u32, options: Vec<PcapNGOption>) -> Vec<u8> {
    let mut epb = EnhancedPacketBlock::new(if_id, ts, data);
    epb.origlen = origlen;
    epb.options = options;
    epb.to_vec().expect("epb")
}

fn spb(data: &[u8]) -> Vec<u8> {
    SimplePacketBlock::new(data).to_vec().expect("spb")
}

fn raw_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_length = (body.len() + 12) as u32;
    let mut v = Vec::new();
    v.extend_from_slice(&block_type.to_ne_bytes());
    v.extend_from_slice(&total_length.to_ne_bytes());
    v.extend_from_slice(body);
    v.extend_from_slice(&total_length.to_ne_bytes());
    v
}

fn write_file(dir: &Path, name: &str, blocks: &[Vec<u8>]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, blocks.concat()).expect("write test file");
    path
}

/// 100 enhanced packets: packet `i` holds bytes `0..i`, has an original length of `i + 2` and
/// a comment made of the `i % 27` first letters of the alphabet
fn test_blocks() -> Vec<Vec<u8>> {
    let mut blocks = vec![
        shb(vec![PcapNGOption::comment("test section")]),
        idb(Linktype::ETHERNET, 0),
        raw_block(CB_MAGIC, &[0x4d, 0x3c, 0, 0, 1, 2, 3, 4]),
    ];
    for i in 0..100u32 {
        let data: Vec<u8> = (0..i).map(|b| b as u8).collect();
        let comment = &ALPHABET[..(i % 27) as usize];
        let options = vec![PcapNGOption::comment(comment)];
        blocks.push(epb(0, u64::from(i) << 20, &data, i + 2, options));
        if i % 10 == 0 {
            blocks.push(raw_block(ISB_MAGIC, &[0; 12]));
        }
    }
    blocks
}

#[test]
fn test_read_enhanced_packets() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(dir.path(), "test.pcapng", &test_blocks());

    let mut reader = PcapNGReader::open(&path).expect("reader");
    assert!(reader.is_valid());
    let section = reader.section().expect("section");
    assert_eq!(section.version_major, 1);
    assert_eq!(section.options().comments().next(), Some("test section"));

    for i in 0..100u32 {
        let packet = reader.read_packet().expect("packet");
        assert_eq!(packet.interface_id(), 0);
        let expected: Vec<u8> = (0..i).map(|b| b as u8).collect();
        assert_eq!(packet.data(), &expected[..]);
        assert_eq!(packet.original_length(), i + 2);
        assert_eq!(packet.timestamp(), u64::from(i) << 20);

        let options = packet.options();
        let comment_length = (i % 27) as usize;
        if comment_length == 0 {
            assert!(options.is_empty());
        } else {
            assert_eq!(options.len(), 1);
            let comment = options.get(OptionCode::Comment).expect("comment");
            assert!(comment.is_string());
            assert_eq!(comment.as_str(), Some(&ALPHABET[..comment_length]));
        }
        let interface = reader.interface_of(&packet).expect("interface");
        assert_eq!(interface.link_type, Linktype::ETHERNET);
    }
    assert!(reader.read_packet().is_none());
    assert!(reader.is_valid());
    assert_eq!(reader.last_error(), ErrorType::NoError);
}

#[test]
fn test_snap_len_truncates_data() {
    let dir = TempDir::new().expect("tempdir");
    let data: Vec<u8> = (0..100u8).collect();
    let blocks = vec![
        shb(vec![]),
        idb(Linktype::ETHERNET, 0),
        idb(Linktype::RAW, 64),
        epb(1, 0, &data, 100, vec![PcapNGOption::comment("after data")]),
        epb(0, 0, &data, 100, vec![]),
    ];
    let path = write_file(dir.path(), "snaplen.pcapng", &blocks);

    let mut reader = PcapNGReader::open(&path).expect("reader");
    let packet = reader.read_packet().expect("truncated packet");
    assert_eq!(packet.interface_id(), 1);
    assert_eq!(packet.data(), &data[..64]);
    assert_eq!(packet.original_length(), 100);
    // the options region starts right after the truncated data, inside the captured bytes
    assert!(packet.options().is_empty());
    assert_eq!(
        reader.interface_of(&packet).map(|i| i.snap_len),
        Some(64)
    );

    let packet = reader.read_packet().expect("full packet");
    assert_eq!(packet.data(), &data[..]);
}

#[test]
fn test_mixed_packet_blocks() {
    let dir = TempDir::new().expect("tempdir");
    let blocks = vec![
        shb(vec![]),
        idb(Linktype::ETHERNET, 0),
        spb(&[1, 2, 3]),
        epb(0, 7, &[4, 5, 6, 7], 4, vec![]),
        raw_block(NRB_MAGIC, &[0; 4]),
        spb(&[]),
    ];
    let path = write_file(dir.path(), "mixed.pcapng", &blocks);

    let reader = PcapNGReader::open(&path).expect("reader");
    let packets: Vec<Packet> = reader.collect();
    assert_eq!(packets.len(), 3);
    assert!(matches!(packets[0], Packet::Simple(_)));
    assert_eq!(packets[0].data(), &[1, 2, 3]);
    assert_eq!(packets[0].timestamp(), 0);
    assert!(matches!(packets[1], Packet::Enhanced(_)));
    assert_eq!(packets[1].timestamp(), 7);
    assert!(packets[2].data().is_empty());
    assert_eq!(packets[2].original_length(), 0);
}

#[test]
fn test_new_section_replaces_interfaces() {
    let dir = TempDir::new().expect("tempdir");
    let blocks = vec![
        shb(vec![]),
        idb(Linktype::ETHERNET, 0),
        idb(Linktype::RAW, 0),
        epb(1, 0, &[1], 1, vec![]),
        shb(vec![]),
        idb(Linktype::IPV4, 0),
        epb(0, 0, &[2], 1, vec![]),
        epb(1, 0, &[3], 1, vec![]),
    ];
    let path = write_file(dir.path(), "sections.pcapng", &blocks);

    let mut reader = PcapNGReader::open(&path).expect("reader");
    let first = reader.read_packet().expect("first packet");
    assert_eq!(reader.interface_of(&first).map(|i| i.link_type), Some(Linktype::RAW));

    let second = reader.read_packet().expect("second packet");
    assert_eq!(second.section_index(), 1);
    assert_eq!(reader.section().map(|s| s.interface_count()), Some(1));
    assert_eq!(reader.interface_of(&second).map(|i| i.link_type), Some(Linktype::IPV4));
    // interfaces of the first section are gone
    assert!(reader.interface_of(&first).is_none());

    assert!(reader.read_packet().is_none());
    assert!(!reader.is_valid());
    assert_eq!(reader.last_error(), ErrorType::InvalidInterfaceForPacket);
}

#[test]
fn test_simple_packet_before_interface() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(dir.path(), "no-idb.pcapng", &[shb(vec![]), spb(&[1, 2, 3, 4])]);
    let mut reader = PcapNGReader::open(&path).expect("reader");
    assert!(reader.read_packet().is_none());
    assert!(!reader.is_valid());
    assert_eq!(reader.last_error(), ErrorType::InvalidInterfaceForPacket);
}

#[test]
fn test_enhanced_packet_invalid_interface() {
    let dir = TempDir::new().expect("tempdir");
    let blocks = vec![
        shb(vec![]),
        idb(Linktype::ETHERNET, 0),
        epb(1, 0, &[1, 2], 2, vec![]),
    ];
    let path = write_file(dir.path(), "bad-idb.pcapng", &blocks);
    let mut reader = PcapNGReader::open(&path).expect("reader");
    let err = reader.try_read_packet().expect_err("invalid interface");
    assert!(matches!(
        err,
        PcapError::InvalidInterfaceForPacket { if_id: 1, count: 1 }
    ));
    assert_eq!(reader.last_error(), ErrorType::InvalidInterfaceForPacket);
    // no further packets once failed
    assert!(reader.read_packet().is_none());
    assert_eq!(reader.last_error(), ErrorType::InvalidInterfaceForPacket);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().expect("tempdir");
    let err = PcapNGReader::open(dir.path().join("missing.pcapng"))
        .err()
        .expect("missing file");
    assert_eq!(err.error_type(), ErrorType::FileNotFound);
}

#[test]
fn test_invalid_config() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(dir.path(), "test.pcapng", &[shb(vec![])]);
    let config = ReaderConfig {
        buffer_size: 10,
        ..ReaderConfig::default()
    };
    let err = PcapNGReader::open_with_config(&path, &config)
        .err()
        .expect("invalid config");
    assert!(matches!(err, PcapError::InvalidConfig(_)));
    assert_eq!(err.error_type(), ErrorType::UnableToOpenFile);
}

#[test]
fn test_first_block_is_not_section_header() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(
        dir.path(),
        "no-shb.pcapng",
        &[idb(Linktype::ETHERNET, 0), shb(vec![])],
    );
    let err = PcapNGReader::open(&path).err().expect("no section header");
    assert!(matches!(
        err,
        PcapError::FirstBlockIsNotSectionHeader { block_type: IDB_MAGIC }
    ));
    assert_eq!(err.error_type(), ErrorType::FirstBlockIsNotSectionHeader);
}

#[test]
fn test_short_section_header() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(dir.path(), "short-shb.pcapng", &[raw_block(SHB_MAGIC, &[0; 8])]);
    let err = PcapNGReader::open(&path).err().expect("short section header");
    assert_eq!(err.error_type(), ErrorType::InvalidBlockSize);
}

#[test]
fn test_invalid_block_sizes() {
    let dir = TempDir::new().expect("tempdir");

    // total length is not a multiple of 4
    let mut unaligned = raw_block(NRB_MAGIC, &[0; 4]);
    unaligned[4..8].copy_from_slice(&17u32.to_ne_bytes());
    // total length is smaller than the envelope
    let mut tiny = raw_block(NRB_MAGIC, &[0; 4]);
    tiny[4..8].copy_from_slice(&4u32.to_ne_bytes());
    // trailing length differs from leading length
    let mut mismatch = idb(Linktype::ETHERNET, 0);
    let n = mismatch.len();
    mismatch[n - 4..].copy_from_slice(&24u32.to_ne_bytes());
    // interface description body too short
    let short_idb = raw_block(IDB_MAGIC, &[1, 0, 0, 0]);
    // enhanced packet body too short
    let short_epb = raw_block(EPB_MAGIC, &[0; 16]);

    for (idx, bad_block) in [unaligned, tiny, mismatch, short_idb].iter().enumerate() {
        let path = write_file(
            dir.path(),
            &format!("bad-{}.pcapng", idx),
            &[shb(vec![]), bad_block.clone(), spb(&[1])],
        );
        let mut reader = PcapNGReader::open(&path).expect("reader");
        assert!(reader.read_packet().is_none(), "block {}", idx);
        assert!(!reader.is_valid());
        assert_eq!(reader.last_error(), ErrorType::InvalidBlockSize, "block {}", idx);
    }

    let path = write_file(
        dir.path(),
        "short-epb.pcapng",
        &[shb(vec![]), idb(Linktype::ETHERNET, 0), short_epb],
    );
    let mut reader = PcapNGReader::open(&path).expect("reader");
    assert!(reader.read_packet().is_none());
    assert_eq!(reader.last_error(), ErrorType::InvalidBlockSize);
}

#[test]
fn test_trailing_length_validation_can_be_disabled() {
    let dir = TempDir::new().expect("tempdir");
    let mut mismatch = spb(&[1, 2, 3, 4]);
    let n = mismatch.len();
    mismatch[n - 4..].copy_from_slice(&0u32.to_ne_bytes());
    let path = write_file(
        dir.path(),
        "mismatch.pcapng",
        &[shb(vec![]), idb(Linktype::ETHERNET, 0), mismatch],
    );
    let config = ReaderConfig {
        validate_trailing_length: false,
        ..ReaderConfig::default()
    };
    let mut reader = PcapNGReader::open_with_config(&path, &config).expect("reader");
    let packet = reader.read_packet().expect("packet");
    assert_eq!(packet.data(), &[1, 2, 3, 4]);
    assert!(reader.is_valid());
}

#[test]
fn test_truncated_file() {
    let dir = TempDir::new().expect("tempdir");
    let mut bytes = test_blocks().concat();
    let full_length = bytes.len();
    bytes.truncate(full_length - 10);
    let path = dir.path().join("truncated.pcapng");
    fs::write(&path, &bytes).expect("write test file");

    let mut reader = PcapNGReader::open(&path).expect("reader");
    let mut count = 0;
    while reader.read_packet().is_some() {
        count += 1;
    }
    assert_eq!(count, 99);
    assert!(!reader.is_valid());
    assert_eq!(reader.last_error(), ErrorType::TruncatedFile);
    assert!(matches!(
        reader.try_read_packet(),
        Err(PcapError::Failed(ErrorType::TruncatedFile))
    ));
}

#[test]
fn test_malformed_options_are_ignored() {
    let dir = TempDir::new().expect("tempdir");
    let mut block = epb(0, 0, &[1, 2, 3, 4], 4, vec![PcapNGOption::comment("abcd")]);
    // option length pointing past the end of the block
    block[34..36].copy_from_slice(&200u16.to_ne_bytes());
    let path = write_file(
        dir.path(),
        "bad-options.pcapng",
        &[shb(vec![]), idb(Linktype::ETHERNET, 0), block],
    );
    let mut reader = PcapNGReader::open(&path).expect("reader");
    let packet = reader.read_packet().expect("packet is still delivered");
    assert_eq!(packet.data(), &[1, 2, 3, 4]);
    assert!(packet.options().is_empty());
    assert!(reader.is_valid());
}
