use hex_literal::hex;
use isobox::util::read_slice;
use isobox::{BoxNode, BoxReader, DEFAULT_MAX_DEPTH, Error, FourCC, NodeKind, default_registry};
use std::io::Cursor;

const FILE: [u8; 52] = hex!(
    "00000014" "66747970" "69736f6d" "00000000" "69736f6d" // ftyp
    "00000018" "6d646174" "00112233445566778899aabbccddeeff" // mdat
    "00000008" "66726565" // free
);

fn read_all(data: &[u8], max_depth: usize) -> isobox::Result<Vec<BoxNode>> {
    BoxReader::seekable(Cursor::new(data))?
        .boxes(default_registry(), max_depth)
        .collect()
}

#[test]
fn media_payload_is_left_in_the_stream() {
    let mut boxes = read_all(&FILE, DEFAULT_MAX_DEPTH).unwrap();
    assert_eq!(boxes.len(), 3);
    assert!(boxes[0].fields().is_some());
    assert_eq!(boxes[1].kind, NodeKind::Skipped { offset: 28, len: 16 });
    assert_eq!(boxes[1].payload(), None);
    assert_eq!(boxes[2].payload(), Some(&[0u8; 0][..]));

    // the recorded span reads back the payload
    let mut cur = Cursor::new(&FILE[..]);
    assert_eq!(read_slice(&mut cur, 28, 16).unwrap(), &FILE[28..44]);

    let mdat = &mut boxes[1];
    assert_eq!(mdat.compute_size().unwrap(), 24);
    assert!(matches!(mdat.write(&mut Vec::new()), Err(Error::PayloadNotLoaded { offset: 28, .. })));
}

#[test]
fn forward_only_reader_still_buffers() {
    let boxes: Vec<BoxNode> = BoxReader::new(Cursor::new(&FILE[..]))
        .boxes(default_registry(), DEFAULT_MAX_DEPTH)
        .collect::<isobox::Result<_>>()
        .unwrap();
    assert_eq!(boxes[1].payload(), Some(&FILE[28..44]));
}

#[test]
fn skipping_past_the_end_is_an_error() {
    let data = hex!("00000040" "6d646174" "00010203");
    let err = read_all(&data, DEFAULT_MAX_DEPTH).unwrap_err();
    assert!(matches!(&err, Error::Box { typ, .. } if *typ == FourCC(*b"mdat")));
    assert!(matches!(err.root_cause(), Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
}

#[test]
fn container_past_depth_limit_is_skipped() {
    let data = hex!("00000010" "6d6f6f76" "00000008" "66726565");
    let mut r = BoxReader::seekable(Cursor::new(&data[..])).unwrap();
    let moov = BoxNode::parse(&mut r, default_registry(), 0).unwrap();
    assert_eq!(moov.kind, NodeKind::Skipped { offset: 8, len: 8 });
    assert_eq!(r.position(), 16);
}
