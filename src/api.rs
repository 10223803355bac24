use crate::{
    boxes::{BoxNode, NodeKind},
    error::Result,
    parser::read_boxes,
    registry::Registry,
    util::{hex_dump, read_slice},
    value::Record,
};
use serde::Serialize;
use std::io::{Read, Seek};

/// A JSON-serializable view of a single box.
///
/// Built from a parsed [`BoxNode`], suitable for web UIs, CLIs, or APIs.
#[derive(Debug, Serialize)]
pub struct Box {
    /// Absolute byte offset of this box in the stream
    pub offset: u64,
    /// Total size of this box including header and payload
    pub size: u64,
    /// Header bytes, including the FullBox version/flags word
    pub header_size: u64,
    pub payload_size: u64,

    /// Four-character box type code (e.g., "ftyp", "moov")
    pub typ: String,
    /// Extended type of `uuid` boxes, as hex
    pub uuid: Option<String>,
    pub version: Option<u8>,
    pub flags: Option<u32>,
    /// Body classification: "container", "fields", or "opaque"
    pub kind: &'static str,
    /// Human-readable box type name (e.g., "File Type Box")
    pub full_name: &'static str,
    /// Decoded field values, when requested and the variant has a layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Record>,
    /// Child boxes for container types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Box>>,
}

impl Box {
    /// Build the view of `node` and its descendants.
    pub fn from_node(node: &BoxNode, decode: bool) -> Self {
        let hdr = &node.hdr;
        let header_size = node.header_size();
        let (kind, fields, children) = match &node.kind {
            NodeKind::Container(kids) => (
                "container",
                None,
                Some(kids.iter().map(|c| Box::from_node(c, decode)).collect()),
            ),
            NodeKind::Fields(record) => ("fields", decode.then(|| record.clone()), None),
            NodeKind::Opaque(_) | NodeKind::Skipped { .. } => ("opaque", None, None),
        };

        Box {
            offset: hdr.start,
            size: hdr.size,
            header_size,
            payload_size: hdr.size.saturating_sub(header_size),
            typ: hdr.typ.to_string(),
            uuid: hdr.uuid.map(hex::encode),
            version: node.full.map(|f| f.version()),
            flags: node.full.map(|f| f.flags()),
            kind,
            full_name: node.full_name(),
            fields,
            children,
        }
    }
}

/// Parse a stream and return its box tree as JSON-serializable structures.
///
/// # Example
/// ```no_run
/// use isobox::{default_registry, get_boxes, DEFAULT_MAX_DEPTH};
/// use std::fs::File;
///
/// let file = File::open("video.mp4")?;
/// let boxes = get_boxes(file, default_registry(), DEFAULT_MAX_DEPTH, true)?;
/// println!("{}", serde_json::to_string_pretty(&boxes)?);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_boxes<R: Read>(r: R, registry: &Registry, max_depth: usize, decode: bool) -> Result<Vec<Box>> {
    read_boxes(r, registry, max_depth)
        .map(|node| node.map(|n| Box::from_node(&n, decode)))
        .collect()
}

/// Result of a hex dump operation containing the formatted hex output.
#[derive(Debug, Serialize)]
pub struct HexDump {
    /// Starting offset of the dumped data
    pub offset: u64,
    /// Actual number of bytes that were read and dumped
    pub length: u64,
    /// Formatted hex dump string with addresses and ASCII representation
    pub hex: String,
}

/// Hex-dump up to `max_len` bytes at `offset`, never reading past `size`.
pub fn hex_range<R: Read + Seek>(r: &mut R, size: u64, offset: u64, max_len: u64) -> Result<HexDump> {
    let to_read = size.saturating_sub(offset).min(max_len);
    if to_read == 0 {
        return Ok(HexDump { offset, length: 0, hex: String::new() });
    }

    let data = read_slice(r, offset, to_read)?;
    Ok(HexDump { offset, length: to_read, hex: hex_dump(&data, offset) })
}
