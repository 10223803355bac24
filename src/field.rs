//! Declarative field schemas.
//!
//! A box variant's payload layout is a `&'static [FieldDescriptor]` table.
//! Descriptors only record attributes; [`crate::schema`] checks them and
//! compiles each one into a codec strategy.
//!
//! ```
//! use isobox::field::{FieldDescriptor as F, FieldType};
//!
//! const TFDT: &[F] = &[F::new("base_media_decode_time", 0, FieldType::U64).version_sized()];
//! assert_eq!(TFDT[0].version_threshold, Some(1));
//! ```

use crate::value::{Field, Record, Value};

/// Fixed-width wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    U8,
    U16,
    U32,
    U64,
    I16,
    I32,
    I64,
    Guid,
    FourCC,
}

impl Primitive {
    /// Bytes on the wire.
    pub const fn size(self) -> u64 {
        match self {
            Primitive::U8 => 1,
            Primitive::U16 | Primitive::I16 => 2,
            Primitive::U32 | Primitive::I32 | Primitive::FourCC => 4,
            Primitive::U64 | Primitive::I64 => 8,
            Primitive::Guid => 16,
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, Primitive::Guid | Primitive::FourCC)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Primitive::I16 | Primitive::I32 | Primitive::I64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::Guid => "guid",
            Primitive::FourCC => "fourcc",
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            Primitive::U8 => Value::U8(0),
            Primitive::U16 => Value::U16(0),
            Primitive::U32 => Value::U32(0),
            Primitive::U64 => Value::U64(0),
            Primitive::I16 => Value::I16(0),
            Primitive::I32 => Value::I32(0),
            Primitive::I64 => Value::I64(0),
            Primitive::Guid => Value::Guid([0u8; 16]),
            Primitive::FourCC => Value::FourCC(crate::boxes::FourCC(*b"    ")),
        }
    }

    pub fn matches(self, v: &Value) -> bool {
        matches!(
            (self, v),
            (Primitive::U8, Value::U8(_))
                | (Primitive::U16, Value::U16(_))
                | (Primitive::U32, Value::U32(_))
                | (Primitive::U64, Value::U64(_))
                | (Primitive::I16, Value::I16(_))
                | (Primitive::I32, Value::I32(_))
                | (Primitive::I64, Value::I64(_))
                | (Primitive::Guid, Value::Guid(_))
                | (Primitive::FourCC, Value::FourCC(_))
        )
    }
}

/// Element kind of a collection field.
#[derive(Debug, Clone, Copy)]
pub enum Element {
    Primitive(Primitive),
    /// Self-describing entry with its own field schema.
    Entry(&'static [FieldDescriptor]),
}

#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Primitive(Primitive),
    /// NUL-terminated UTF-8.
    Str,
    List(Element),
}

impl FieldType {
    pub const U8: FieldType = FieldType::Primitive(Primitive::U8);
    pub const U16: FieldType = FieldType::Primitive(Primitive::U16);
    pub const U32: FieldType = FieldType::Primitive(Primitive::U32);
    pub const U64: FieldType = FieldType::Primitive(Primitive::U64);
    pub const I16: FieldType = FieldType::Primitive(Primitive::I16);
    pub const I32: FieldType = FieldType::Primitive(Primitive::I32);
    pub const I64: FieldType = FieldType::Primitive(Primitive::I64);
    pub const GUID: FieldType = FieldType::Primitive(Primitive::Guid);
    pub const FOURCC: FieldType = FieldType::Primitive(Primitive::FourCC);

    pub const fn list(p: Primitive) -> FieldType {
        FieldType::List(Element::Primitive(p))
    }

    pub const fn entries(schema: &'static [FieldDescriptor]) -> FieldType {
        FieldType::List(Element::Entry(schema))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FieldType::Primitive(p) => p.name(),
            FieldType::Str => "string",
            FieldType::List(Element::Primitive(_)) => "list",
            FieldType::List(Element::Entry(_)) => "list of records",
        }
    }

    /// Whether `v` has the shape this type stores.
    pub fn matches(&self, v: &Value) -> bool {
        match (self, v) {
            (FieldType::Primitive(p), v) => p.matches(v),
            (FieldType::Str, Value::Str(_)) => true,
            (FieldType::List(Element::Primitive(p)), Value::List(items)) => {
                items.iter().all(|i| p.matches(i))
            }
            (FieldType::List(Element::Entry(_)), Value::List(items)) => {
                items.iter().all(|i| matches!(i, Value::Record(_)))
            }
            _ => false,
        }
    }
}

/// One declared field of a box (or entry) layout.
///
/// The attribute setters are `const` so layouts can live in static tables.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    /// Wire order; also the order in which `count_from` may look back.
    pub order: u16,
    pub ty: FieldType,
    /// 64-bit when the FullBox version is at least this, else 32-bit.
    pub version_threshold: Option<u8>,
    /// Present only when `flags & mask != 0`.
    pub flag_mask: Option<u32>,
    /// Padding of this many bytes; the value is never read or written.
    pub reserved_bytes: Option<u32>,
    /// Element count taken from an earlier integer field.
    pub count_from: Option<&'static str>,
    /// Element count written before the elements, in this many bytes.
    pub length_prefix: Option<u8>,
    /// Elements fill the rest of the box.
    pub remaining_bytes: bool,
    /// Fixed element count held by default values.
    pub presized: Option<u32>,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, order: u16, ty: FieldType) -> Self {
        FieldDescriptor {
            name,
            order,
            ty,
            version_threshold: None,
            flag_mask: None,
            reserved_bytes: None,
            count_from: None,
            length_prefix: None,
            remaining_bytes: false,
            presized: None,
        }
    }

    pub const fn version_sized(self) -> Self {
        self.version_sized_from(1)
    }

    pub const fn version_sized_from(self, threshold: u8) -> Self {
        FieldDescriptor { version_threshold: Some(threshold), ..self }
    }

    pub const fn when_flag(self, mask: u32) -> Self {
        FieldDescriptor { flag_mask: Some(mask), ..self }
    }

    pub const fn reserved(self, bytes: u32) -> Self {
        FieldDescriptor { reserved_bytes: Some(bytes), ..self }
    }

    pub const fn count_from(self, field: &'static str) -> Self {
        FieldDescriptor { count_from: Some(field), ..self }
    }

    pub const fn length_prefixed(self, width: u8) -> Self {
        FieldDescriptor { length_prefix: Some(width), ..self }
    }

    pub const fn remaining_bytes(self) -> Self {
        FieldDescriptor { remaining_bytes: true, ..self }
    }

    pub const fn presized(self, count: u32) -> Self {
        FieldDescriptor { presized: Some(count), ..self }
    }

    /// Whether any collection length attribute is set.
    pub const fn has_length_attr(&self) -> bool {
        self.count_from.is_some() || self.length_prefix.is_some() || self.remaining_bytes
    }

    pub fn default_value(&self) -> Value {
        match self.ty {
            FieldType::Primitive(p) => p.default_value(),
            FieldType::Str => Value::Str(String::new()),
            FieldType::List(element) => {
                let n = self.presized.unwrap_or(0) as usize;
                let item = match element {
                    Element::Primitive(p) => p.default_value(),
                    Element::Entry(schema) => Value::Record(default_record(schema)),
                };
                Value::List(vec![item; n])
            }
        }
    }
}

/// A record holding each field's default value, in wire order.
pub fn default_record(schema: &[FieldDescriptor]) -> Record {
    let mut fields: Vec<&FieldDescriptor> = schema.iter().collect();
    fields.sort_by_key(|f| f.order);
    Record::from_fields(
        fields
            .into_iter()
            .map(|f| Field { name: f.name, value: f.default_value() })
            .collect(),
    )
}
