//! Dynamically typed field values held by decoded boxes.

use crate::boxes::FourCC;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I16(i16),
    I32(i32),
    I64(i64),
    #[serde(serialize_with = "serialize_guid")]
    Guid([u8; 16]),
    FourCC(FourCC),
    Str(String),
    List(Vec<Value>),
    Record(Record),
}

fn serialize_guid<S: Serializer>(g: &[u8; 16], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(g))
}

impl Value {
    /// Integer value widened to `i128`, for any integer variant.
    pub fn as_int(&self) -> Option<i128> {
        Some(match *self {
            Value::U8(v) => v as i128,
            Value::U16(v) => v as i128,
            Value::U32(v) => v as i128,
            Value::U64(v) => v as i128,
            Value::I16(v) => v as i128,
            Value::I32(v) => v as i128,
            Value::I64(v) => v as i128,
            _ => return None,
        })
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_int().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fourcc(&self) -> Option<FourCC> {
        match self {
            Value::FourCC(cc) => Some(*cc),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self { Value::$variant(v) }
        })*
    };
}

value_from!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    [u8; 16] => Guid,
    FourCC => FourCC,
    String => Str,
    Vec<Value> => List,
    Record => Record,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_string()) }
}

/// A named field value inside a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub value: Value,
}

/// Field values in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_fields(fields: Vec<Field>) -> Self {
        Record { fields }
    }

    /// Append a field. Entry records must list their fields in wire order.
    pub fn push(&mut self, name: &'static str, value: impl Into<Value>) {
        self.fields.push(Field { name, value: value.into() });
    }

    /// Replace the value of an existing field, returning the old one.
    /// Returns `None` and changes nothing if there is no such field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.get_mut(name).map(|slot| std::mem::replace(slot, value.into()))
    }

    /// Builder form of [`Record::push`].
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|f| f.name == name).map(|f| &mut f.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub(crate) fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.fields.len()))?;
        for f in &self.fields {
            map.serialize_entry(f.name, &f.value)?;
        }
        map.end()
    }
}
