use hex_literal::hex;
use isobox::{DEFAULT_MAX_DEPTH, default_registry, get_boxes};
use serde_json::{self, Value};
use std::io::Cursor;

/// [ftyp] [free] [moov [mvex [trex]]] [mdat]
fn minimal_file() -> Vec<u8> {
    hex!(
        "00000014" "66747970" "69736f6d" "00000200" "69736f6d" // ftyp
        "00000008" "66726565" // free
        "00000030" "6d6f6f76" // moov
            "00000028" "6d766578" // mvex
                "00000020" "74726578" "00000000" // trex
                "00000001" "00000001" "00000400" "00000000" "00010000"
        "00000010" "6d646174" "0000000000000000" // mdat
    )
    .to_vec()
}

#[test]
fn analyze_and_serialize_to_json() {
    let boxes = get_boxes(Cursor::new(minimal_file()), default_registry(), DEFAULT_MAX_DEPTH, false)
        .expect("get_boxes failed");

    assert_eq!(boxes.len(), 4);
    assert_eq!(boxes[0].typ, "ftyp");
    assert_eq!(boxes[0].size, 20);
    assert_eq!(boxes[0].header_size, 8);
    assert_eq!(boxes[0].payload_size, 12);
    assert_eq!(boxes[3].offset, 76);

    let v: Value = serde_json::from_str(&serde_json::to_string(&boxes).unwrap()).unwrap();
    let first = &v[0];
    assert_eq!(first["typ"], "ftyp");
    assert_eq!(first["kind"], "fields");
    assert_eq!(first["full_name"], "File Type Box");
    // fields are only emitted on request
    assert!(first.get("fields").is_none());
    assert!(first.get("children").is_none());

    let trex = &v[2]["children"][0]["children"][0];
    assert_eq!(trex["typ"], "trex");
    assert_eq!(trex["header_size"], 12);
    assert_eq!(trex["version"], 0);
    assert_eq!(trex["flags"], 0);
}

#[test]
fn decoded_fields_serialize_naturally() {
    let boxes = get_boxes(Cursor::new(minimal_file()), default_registry(), DEFAULT_MAX_DEPTH, true)
        .expect("get_boxes failed");
    let v = serde_json::to_value(&boxes).unwrap();

    assert_eq!(v[0]["fields"]["major_brand"], "isom");
    assert_eq!(v[0]["fields"]["minor_version"], 512);
    assert_eq!(v[0]["fields"]["compatible_brands"], serde_json::json!(["isom"]));

    let trex = &v[2]["children"][0]["children"][0]["fields"];
    assert_eq!(trex["default_sample_duration"], 1024);
    assert_eq!(trex["default_sample_flags"], 0x10000);

    // opaque payloads carry no fields
    assert_eq!(v[3]["kind"], "opaque");
    assert!(v[3].get("fields").is_none());
}

#[test]
fn extended_type_is_hex() {
    let data = hex!(
        "0000002c" "75756964" "6d1d9b0542d544e680e2141daff757b2" "00000000"
        "00000064" "00000032" "0000000000000000"
    );
    // v0 tfxd has 8 bytes of fields; the trailing 8 make it malformed
    let err = get_boxes(Cursor::new(&data[..]), default_registry(), DEFAULT_MAX_DEPTH, true).unwrap_err();
    assert!(err.to_string().contains("uuid"));

    let data = hex!("00000024" "75756964" "6d1d9b0542d544e680e2141daff757b2" "00000000" "00000064" "00000032");
    let v = serde_json::to_value(
        get_boxes(Cursor::new(&data[..]), default_registry(), DEFAULT_MAX_DEPTH, true).unwrap(),
    )
    .unwrap();
    assert_eq!(v[0]["uuid"], "6d1d9b0542d544e680e2141daff757b2");
    assert_eq!(v[0]["fields"]["fragment_duration"], 50);
}
