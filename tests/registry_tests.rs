use hex_literal::hex;
use isobox::field::{FieldDescriptor as F, FieldType, Primitive};
use isobox::known_boxes::{TFRF_UUID, TFXD_UUID};
use isobox::{
    BoxDef, BoxKey, BoxNode, BoxReader, DEFAULT_MAX_DEPTH, Diagnostic, DiagnosticKind, Error,
    FourCC, Registry, Value, default_registry,
};
use std::io::Cursor;

fn parse_with(reg: &Registry, data: &[u8]) -> BoxNode {
    BoxNode::parse(&mut BoxReader::new(Cursor::new(data)), reg, DEFAULT_MAX_DEPTH).unwrap()
}

#[test]
fn default_registry_knows_common_boxes() {
    let reg = default_registry();
    let mvhd = reg.get(&BoxKey::FourCC(FourCC(*b"mvhd"))).expect("mvhd registered");
    assert!(mvhd.full_box);
    assert!(mvhd.has_fields());
    assert!(reg.get(&BoxKey::FourCC(FourCC(*b"moov"))).unwrap().is_container());
    assert!(!reg.get(&BoxKey::FourCC(FourCC(*b"mdat"))).unwrap().has_fields());
}

#[test]
fn unknown_tags_resolve_to_opaque() {
    let v = default_registry().resolve(FourCC(*b"zzzz"), None);
    assert_eq!(v.name, "Unknown Box");
    assert!(!v.full_box);
    assert!(!v.is_container());
    assert!(!v.has_fields());
}

#[test]
fn uuid_boxes_match_on_extended_type() {
    let reg = default_registry();
    assert_eq!(reg.resolve(FourCC::UUID, Some(&TFXD_UUID)).name, "Smooth Streaming Fragment Time Box");
    assert_eq!(reg.resolve(FourCC::UUID, Some(&TFRF_UUID)).name, "Smooth Streaming Fragment Reference Box");
    assert_eq!(reg.resolve(FourCC::UUID, Some(&[0u8; 16])).name, "Unknown Box");
}

#[test]
fn remaining_bytes_must_be_last() {
    const BAD: &[F] = &[
        F::new("rest", 0, FieldType::list(Primitive::U8)).remaining_bytes(),
        F::new("tail", 1, FieldType::U32),
    ];
    let mut diags: Vec<Diagnostic> = Vec::new();
    let reg = Registry::builder()
        .with_box(BoxDef::leaf(b"bad!", "Broken Box").with_fields(BAD))
        .build_with_sink(&mut diags);

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].typ, FourCC(*b"bad!"));
    assert_eq!(diags[0].field.as_deref(), Some("rest"));
    assert_eq!(diags[0].kind, DiagnosticKind::RemainingBytesNotLast);

    // the variant stays registered, but its payload is not decoded
    let variant = reg.get(&BoxKey::FourCC(FourCC(*b"bad!"))).unwrap();
    assert!(!variant.has_fields());

    let data = hex!("0000000c" "62616421" "01020304");
    let mut node = parse_with(&reg, &data);
    assert_eq!(node.full_name(), "Broken Box");
    assert_eq!(node.payload(), Some(&data[8..]));
    assert_eq!(node.to_bytes().unwrap(), data);
}

#[test]
fn later_definition_replaces_earlier() {
    let mut diags: Vec<Diagnostic> = Vec::new();
    let reg = Registry::builder()
        .with_box(BoxDef::leaf(b"demo", "First"))
        .with_box(BoxDef::leaf(b"demo", "Second"))
        .build_with_sink(&mut diags);

    assert_eq!(reg.len(), 1);
    assert_eq!(reg.resolve(FourCC(*b"demo"), None).name, "Second");
    assert_eq!(diags.iter().map(|d| d.kind.clone()).collect::<Vec<_>>(), [DiagnosticKind::DuplicateVariant]);
}

#[test]
fn custom_layout_decodes() {
    const DEMO: &[F] = &[
        F::new("count", 0, FieldType::U16),
        F::new("ids", 1, FieldType::list(Primitive::U16)).count_from("count"),
        F::new("label", 2, FieldType::Str),
    ];
    let reg = Registry::builder()
        .with_box(BoxDef::full(b"demo", "Demo Box").with_fields(DEMO))
        .build();

    let data = hex!(
        "00000017" "64656d6f" // size, 'demo'
        "01000000" // version 1
        "0002" "000a" "000b" // count, ids
        "6869000000" // "hi\0" plus two bytes of padding
    );
    // "hi\0" leaves two stray bytes, so the box must be rejected
    let err = BoxNode::parse(&mut BoxReader::new(Cursor::new(&data[..])), &reg, DEFAULT_MAX_DEPTH).unwrap_err();
    assert!(matches!(err.root_cause(), Error::SizeMismatch { declared: 23, consumed: 21 }));

    let data = hex!("00000015" "64656d6f" "01000000" "0002" "000a" "000b" "686900");
    let node = parse_with(&reg, &data);
    assert_eq!(node.version(), 1);
    assert_eq!(node.get("ids"), Some(&Value::List(vec![Value::U16(10), Value::U16(11)])));
    assert_eq!(node.get("label").and_then(Value::as_str), Some("hi"));
}

#[test]
fn set_checks_name_and_type() {
    let mut mfhd = default_registry().create(b"mfhd");

    let err = mfhd.set("sequence", 1u32).unwrap_err();
    assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "sequence"));

    let err = mfhd.set("sequence_number", 1u64).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { field: "sequence_number", expected: "u32" }));

    let mut free = default_registry().create(b"free");
    assert!(matches!(free.set("anything", 0u8), Err(Error::UnknownField { .. })));
}

#[test]
fn flags_must_fit_24_bits() {
    let mut tfhd = default_registry().create(b"tfhd");
    assert!(matches!(tfhd.set_flags(0x0100_0000), Err(Error::FlagsOutOfRange(0x0100_0000))));
    tfhd.set_flags(0x00ff_ffff).unwrap();
    assert_eq!(tfhd.flags(), 0x00ff_ffff);
}

#[test]
fn created_uuid_box_carries_extended_type() {
    let mut tfxd = default_registry().create_extended(TFXD_UUID);
    assert!(tfxd.is_full_box());
    assert_eq!(tfxd.hdr.uuid, Some(TFXD_UUID));
    assert_eq!(tfxd.header_size(), 28);
    assert_eq!(tfxd.compute_size().unwrap(), 36);
}

#[test]
fn version_threshold_above_one() {
    const WIDE_AT_2: &[F] = &[F::new("t", 0, FieldType::U64).version_sized_from(2)];
    let reg = Registry::builder()
        .with_box(BoxDef::full(b"vsz2", "Threshold Box").with_fields(WIDE_AT_2))
        .build();

    let v1 = hex!("00000010" "76737a32" "01000000" "0000002a");
    let mut node = parse_with(&reg, &v1);
    assert_eq!(node.get("t"), Some(&Value::U64(42)));
    assert_eq!(node.to_bytes().unwrap(), v1);

    let v2 = hex!("00000014" "76737a32" "02000000" "000000010000002a");
    let mut node = parse_with(&reg, &v2);
    assert_eq!(node.get("t"), Some(&Value::U64(0x1_0000_002a)));
    assert_eq!(node.to_bytes().unwrap(), v2);

    node.set_version(1);
    assert!(matches!(node.to_bytes(), Err(Error::FieldOverflow { field: "t", bits: 32 })));
}
