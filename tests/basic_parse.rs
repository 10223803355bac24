use hex_literal::hex;
use isobox::parser::read_box_header_opt;
use isobox::{BoxReader, Error, FourCC, read_box_header};
use std::io::Cursor;

fn reader(data: &[u8]) -> BoxReader<Cursor<&[u8]>> {
    BoxReader::new(Cursor::new(data))
}

#[test]
fn read_compact_header() {
    let data = hex!("00000014" "66747970");
    let mut r = reader(&data);

    let hdr = read_box_header(&mut r).expect("read_box_header failed");

    assert_eq!(hdr.start, 0);
    assert_eq!(hdr.size, 20);
    assert_eq!(hdr.typ, FourCC(*b"ftyp"));
    assert!(!hdr.large_size);
    assert_eq!(hdr.header_size(), 8);
    assert_eq!(r.position(), 8);
}

#[test]
fn read_large_size_header() {
    let data = hex!("00000001" "6d646174" "0000000100000010");
    let hdr = read_box_header(&mut reader(&data)).unwrap();

    assert!(hdr.large_size);
    assert_eq!(hdr.size, 0x1_0000_0010);
    assert_eq!(hdr.header_size(), 16);
}

#[test]
fn read_uuid_header() {
    let data = hex!(
        "00000018" // size
        "75756964" // 'uuid'
        "6d1d9b0542d544e680e2141daff757b2" // extended type
    );
    let hdr = read_box_header(&mut reader(&data)).unwrap();

    assert_eq!(hdr.typ, FourCC::UUID);
    assert_eq!(hdr.uuid, Some(hex!("6d1d9b0542d544e680e2141daff757b2")));
    assert_eq!(hdr.header_size(), 24);
}

#[test]
fn size_zero_is_rejected() {
    let data = hex!("00000000" "6d646174");
    let err = read_box_header(&mut reader(&data)).unwrap_err();
    assert!(matches!(err, Error::InvalidSize { offset: 0, size: 0 }));
}

#[test]
fn size_below_header_is_rejected() {
    let data = hex!("00000004" "66726565");
    let err = read_box_header(&mut reader(&data)).unwrap_err();
    assert!(matches!(err, Error::InvalidSize { size: 4, .. }));

    // a large header needs at least 16 bytes
    let data = hex!("00000001" "66726565" "000000000000000c");
    let err = read_box_header(&mut reader(&data)).unwrap_err();
    assert!(matches!(err, Error::InvalidSize { size: 12, .. }));
}

#[test]
fn clean_end_of_stream_is_not_an_error() {
    assert!(read_box_header_opt(&mut reader(&[])).unwrap().is_none());

    let err = read_box_header_opt(&mut reader(&[0, 0, 0])).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn truncated_large_size_is_io_error() {
    let data = hex!("00000001" "6d646174" "00000000");
    let err = read_box_header(&mut reader(&data)).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
