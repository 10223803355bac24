use crate::error::{Error, Result};
use crate::field::{Element, FieldType, default_record};
use crate::registry::Variant;
use crate::value::{Record, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const UUID: FourCC = FourCC(*b"uuid");

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else { None }
    }
    pub fn as_str_lossy(&self) -> String {
        self.0.iter().map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}
impl fmt::Debug for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }
impl fmt::Display for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }

impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub size: u64,          // total size including header
    pub typ: FourCC,        // 4CC or b"uuid"
    pub uuid: Option<[u8; 16]>,
    pub large_size: bool,   // size was (or must be) written in the 64-bit form
    pub start: u64,         // stream offset of header start, 0 when constructed
}

impl BoxHeader {
    pub fn new(typ: FourCC, uuid: Option<[u8; 16]>) -> Self {
        // the extended type only travels with 'uuid' boxes
        let uuid = if typ == FourCC::UUID { Some(uuid.unwrap_or([0u8; 16])) } else { None };
        BoxHeader { size: 0, typ, uuid, large_size: false, start: 0 }
    }

    /// Bytes taken by this header on the wire: 8, 16, 24 or 32.
    pub fn header_size(&self) -> u64 {
        8 + if self.large_size { 8 } else { 0 } + if self.uuid.is_some() { 16 } else { 0 }
    }

    pub fn key(&self) -> BoxKey {
        match self.uuid {
            Some(u) if self.typ == FourCC::UUID => BoxKey::Uuid(u),
            _ => BoxKey::FourCC(self.typ),
        }
    }
}

/// Version and flags carried by a FullBox, packed as `version << 24 | flags`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullBoxHeader {
    version: u8,
    flags: u32,
}

impl FullBoxHeader {
    pub const SIZE: u64 = 4;
    pub const MAX_FLAGS: u32 = 0x00FF_FFFF;

    pub fn new(version: u8, flags: u32) -> Result<Self> {
        if flags > Self::MAX_FLAGS {
            return Err(Error::FlagsOutOfRange(flags));
        }
        Ok(FullBoxHeader { version, flags })
    }

    pub fn from_packed(word: u32) -> Self {
        FullBoxHeader { version: (word >> 24) as u8, flags: word & Self::MAX_FLAGS }
    }

    pub fn packed(&self) -> u32 {
        ((self.version as u32) << 24) | self.flags
    }

    pub fn version(&self) -> u8 { self.version }
    pub fn flags(&self) -> u32 { self.flags }

    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    pub fn set_flags(&mut self, flags: u32) -> Result<()> {
        if flags > Self::MAX_FLAGS {
            return Err(Error::FlagsOutOfRange(flags));
        }
        self.flags = flags;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Child boxes, for container variants.
    Container(Vec<BoxNode>),
    /// Decoded field values, for variants with a field layout.
    Fields(Record),
    /// Undecoded payload: unknown tags, fieldless variants, and containers
    /// past the depth limit.
    Opaque(Vec<u8>),
    /// Opaque payload left in the stream by a seekable reader: `len` bytes
    /// starting at stream offset `offset`.
    Skipped { offset: u64, len: u64 },
}

/// One box of a parsed or constructed tree.
///
/// A node exclusively owns its children. The variant handle is shared and
/// immutable; it carries the compiled field codecs used by
/// [`BoxNode::compute_size`] and [`BoxNode::write`].
#[derive(Debug, Clone)]
pub struct BoxNode {
    pub hdr: BoxHeader,
    pub full: Option<FullBoxHeader>,
    pub kind: NodeKind,
    pub(crate) variant: Arc<Variant>,
}

impl PartialEq for BoxNode {
    fn eq(&self, other: &Self) -> bool {
        self.hdr.typ == other.hdr.typ
            && self.hdr.uuid == other.hdr.uuid
            && self.hdr.size == other.hdr.size
            && self.hdr.large_size == other.hdr.large_size
            && self.full == other.full
            && self.kind == other.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxKey {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

impl fmt::Display for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxKey::FourCC(cc) => write!(f, "{cc}"),
            BoxKey::Uuid(u) => write!(f, "uuid:{}", hex::encode(u)),
        }
    }
}

impl BoxNode {
    /// A fresh node for `variant` with default field values and no children.
    pub(crate) fn from_variant(variant: Arc<Variant>) -> Self {
        let hdr = BoxHeader::new(variant.typ, variant.uuid);
        let full = variant.full_box.then(FullBoxHeader::default);
        let kind = variant.empty_body();
        BoxNode { hdr, full, kind, variant }
    }

    pub fn typ(&self) -> FourCC { self.hdr.typ }

    /// Human-readable name of the resolved variant, e.g. "Movie Fragment Header Box".
    pub fn full_name(&self) -> &'static str { self.variant.name }

    pub fn is_full_box(&self) -> bool { self.full.is_some() }

    /// Header bytes including the FullBox version/flags word.
    pub fn header_size(&self) -> u64 {
        self.hdr.header_size() + if self.full.is_some() { FullBoxHeader::SIZE } else { 0 }
    }

    pub fn version(&self) -> u8 {
        self.full.map(|f| f.version()).unwrap_or(0)
    }

    pub fn flags(&self) -> u32 {
        self.full.map(|f| f.flags()).unwrap_or(0)
    }

    /// Set the FullBox version, keeping the flags. No-op on plain boxes.
    pub fn set_version(&mut self, version: u8) {
        if let Some(full) = self.full.as_mut() {
            full.set_version(version);
        }
    }

    /// Set the FullBox flags, keeping the version. No-op on plain boxes.
    pub fn set_flags(&mut self, flags: u32) -> Result<()> {
        match self.full.as_mut() {
            Some(full) => full.set_flags(flags),
            None => Ok(()),
        }
    }

    pub fn children(&self) -> &[BoxNode] {
        match &self.kind {
            NodeKind::Container(kids) => kids,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<BoxNode>> {
        match &mut self.kind {
            NodeKind::Container(kids) => Some(kids),
            _ => None,
        }
    }

    /// Append a child; returns the child back if this node is not a container.
    pub fn push_child(&mut self, child: BoxNode) -> std::result::Result<(), BoxNode> {
        match &mut self.kind {
            NodeKind::Container(kids) => {
                kids.push(child);
                Ok(())
            }
            _ => Err(child),
        }
    }

    /// First direct child with the given type.
    pub fn child(&self, typ: &[u8; 4]) -> Option<&BoxNode> {
        self.children().iter().find(|c| &c.hdr.typ.0 == typ)
    }

    pub fn fields(&self) -> Option<&Record> {
        match &self.kind {
            NodeKind::Fields(r) => Some(r),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::Opaque(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields().and_then(|r| r.get(name))
    }

    /// A default-valued entry for the record-list field `name`, ready to be
    /// filled in and pushed onto that list.
    pub fn new_entry(&self, name: &str) -> Result<Record> {
        let field = self
            .variant
            .field(name)
            .ok_or_else(|| Error::UnknownField { typ: self.hdr.typ, field: name.to_string() })?;
        match field.ty {
            FieldType::List(Element::Entry(schema)) => Ok(default_record(schema)),
            _ => Err(Error::TypeMismatch { field: field.name, expected: "list of records" }),
        }
    }

    /// Assign a field, checking the name and the declared type.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let typ = self.hdr.typ;
        let unknown = || Error::UnknownField { typ, field: name.to_string() };
        let field = self.variant.field(name).ok_or_else(unknown)?;
        field.check(&value)?;
        match &mut self.kind {
            NodeKind::Fields(record) => {
                let slot = record.get_mut(name).ok_or_else(unknown)?;
                *slot = value;
                Ok(())
            }
            _ => Err(unknown()),
        }
    }
}
