use hex_literal::hex;
use isobox::known_boxes::TFXD_UUID;
use isobox::{BoxNode, BoxReader, DEFAULT_MAX_DEPTH, FourCC, Value, default_registry};
use std::io::Cursor;

fn parse(data: &[u8]) -> BoxNode {
    let mut r = BoxReader::new(Cursor::new(data));
    let node = BoxNode::parse(&mut r, default_registry(), DEFAULT_MAX_DEPTH).expect("parse failed");
    assert_eq!(r.position(), data.len() as u64, "body not fully consumed");
    node
}

fn u(node: &BoxNode, name: &str) -> u64 {
    node.get(name).and_then(Value::as_u64).unwrap_or_else(|| panic!("no integer field {name}"))
}

#[test]
fn ftyp_brands() {
    let data = hex!(
        "00000018" "66747970"
        "69736f6d" // major_brand
        "00000200" // minor_version
        "69736f6d" "61766331" // compatible_brands
    );
    let mut ftyp = parse(&data);

    assert_eq!(ftyp.full_name(), "File Type Box");
    assert_eq!(ftyp.get("major_brand").and_then(Value::as_fourcc), Some(FourCC(*b"isom")));
    assert_eq!(u(&ftyp, "minor_version"), 512);
    let brands: Vec<_> = ftyp
        .get("compatible_brands")
        .and_then(Value::as_list)
        .unwrap()
        .iter()
        .filter_map(Value::as_fourcc)
        .map(|b| b.to_string())
        .collect();
    assert_eq!(brands, ["isom", "avc1"]);
    assert_eq!(ftyp.to_bytes().unwrap(), data);
}

#[test]
fn hdlr_name_and_padding() {
    let data = hex!(
        "0000002d" "68646c72" "00000000"
        "00000000" // pre_defined
        "76696465" // 'vide'
        "000000000000000000000000" // reserved
        "566964656f48616e646c657200" // "VideoHandler"
    );
    let mut hdlr = parse(&data);

    assert_eq!(hdlr.get("handler_type").and_then(Value::as_fourcc), Some(FourCC(*b"vide")));
    assert_eq!(hdlr.get("name").and_then(Value::as_str), Some("VideoHandler"));
    assert_eq!(hdlr.to_bytes().unwrap(), data);
}

#[test]
fn elst_v1_signed_media_time() {
    let data = hex!(
        "00000024" "656c7374" "01000000"
        "00000001" // entry_count
        "0000000000002710" // segment_duration
        "ffffffffffffffff" // media_time = -1 (empty edit)
        "0001" "0000" // rate 1.0
    );
    let mut elst = parse(&data);

    let entries = elst.get("entries").and_then(Value::as_list).unwrap();
    let entry = entries[0].as_record().unwrap();
    assert_eq!(entry.get("segment_duration"), Some(&Value::U64(10_000)));
    assert_eq!(entry.get("media_time"), Some(&Value::I64(-1)));
    assert_eq!(entry.get("media_rate_integer"), Some(&Value::I16(1)));
    assert_eq!(elst.to_bytes().unwrap(), data);
}

#[test]
fn sidx_references() {
    let data = hex!(
        "0000002c" "73696478" "00000000"
        "00000001" // reference_id
        "00003e80" // timescale
        "00000000" "00000000" // earliest_presentation_time, first_offset
        "0000" "0001" // reserved, reference_count
        "00001000" "00003e80" "90000000"
    );
    let mut sidx = parse(&data);

    assert_eq!(u(&sidx, "timescale"), 16_000);
    let refs = sidx.get("references").and_then(Value::as_list).unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].as_record().unwrap().get("sap"), Some(&Value::U32(0x9000_0000)));
    assert_eq!(sidx.to_bytes().unwrap(), data);
}

#[test]
fn trun_negative_data_offset() {
    let data = hex!("00000014" "7472756e" "00000001" "00000000" "fffffff8");
    let mut trun = parse(&data);

    assert_eq!(trun.get("data_offset"), Some(&Value::I32(-8)));
    assert_eq!(trun.get("samples"), Some(&Value::List(Vec::new())));
    assert_eq!(trun.to_bytes().unwrap(), data);
}

#[test]
fn tfxd_extended_box() {
    let data = hex!(
        "0000002c" "75756964"
        "6d1d9b0542d544e680e2141daff757b2"
        "01000000"
        "0000000000000064" // fragment_absolute_time
        "0000000000000032" // fragment_duration
    );
    let mut tfxd = parse(&data);

    assert_eq!(tfxd.hdr.uuid, Some(TFXD_UUID));
    assert_eq!(tfxd.full_name(), "Smooth Streaming Fragment Time Box");
    assert_eq!(u(&tfxd, "fragment_absolute_time"), 100);
    assert_eq!(u(&tfxd, "fragment_duration"), 50);
    assert_eq!(tfxd.to_bytes().unwrap(), data);
}

#[test]
fn default_mvhd_layout() {
    let mut mvhd = default_registry().create(b"mvhd");
    assert_eq!(mvhd.get("matrix").and_then(Value::as_list).map(|m| m.len()), Some(9));

    let bytes = mvhd.to_bytes().unwrap();
    assert_eq!(bytes.len(), 108);
    assert_eq!(parse(&bytes), mvhd);

    mvhd.set_version(1);
    assert_eq!(mvhd.compute_size().unwrap(), 120);
}

#[test]
fn nmhd_has_only_version_and_flags() {
    let data = hex!("0000000c" "6e6d6864" "00000000");
    let mut nmhd = parse(&data);
    assert!(nmhd.is_full_box());
    assert_eq!(nmhd.payload(), Some(&[0u8; 0][..]));
    assert_eq!(nmhd.to_bytes().unwrap(), data);
}
