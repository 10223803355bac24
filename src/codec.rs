//! Field-codec strategies.
//!
//! Each compiled field owns one [`FieldStrategy`]. Strategies are produced by
//! [`crate::schema`] from validated descriptors and never see an inconsistent
//! layout.

use crate::error::{Error, Result};
use crate::field::{FieldDescriptor, FieldType, Primitive, default_record};
use crate::primitive::{
    cstring_size, read_cstring_bytes, read_primitive, read_uint, uint_max, write_cstring,
    write_primitive, write_uint,
};
use crate::value::{Field, Record, Value};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Cursor, Read, Write};

/// Box payload being decoded. Its length is the box's declared body size.
pub type Body<'a> = Cursor<&'a [u8]>;

/// Upper bound on entries decoded from a list whose entries occupy no bytes
/// on the wire (every field flag-gated off). Larger counts are `InvalidCount`.
pub const MAX_ZERO_WIDTH_ENTRIES: u64 = 1 << 16;

fn remaining(r: &Body<'_>) -> u64 {
    (r.get_ref().len() as u64).saturating_sub(r.position())
}

/// What a strategy may look at besides its own value.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub version: u8,
    pub flags: u32,
    /// Fields declared before the current one.
    pub siblings: &'a [Field],
}

impl<'a> FieldContext<'a> {
    pub fn new(version: u8, flags: u32, siblings: &'a [Field]) -> Self {
        FieldContext { version, flags, siblings }
    }
}

pub trait FieldStrategy: fmt::Debug + Send + Sync {
    /// Decode into `slot`, which holds the field's current (default) value.
    fn read(&self, r: &mut Body<'_>, ctx: &FieldContext<'_>, slot: &mut Value) -> Result<()>;
    fn write(&self, w: &mut dyn Write, ctx: &FieldContext<'_>, value: &Value) -> Result<()>;
    fn size_of(&self, ctx: &FieldContext<'_>, value: &Value) -> Result<u64>;

    /// Shape check beyond the declared type, run before a value is stored.
    fn validate(&self, _value: &Value) -> Result<()> {
        Ok(())
    }
}

/// A schema field bound to its strategy.
#[derive(Debug)]
pub struct CompiledField {
    pub name: &'static str,
    pub ty: FieldType,
    pub(crate) strategy: Box<dyn FieldStrategy>,
}

impl CompiledField {
    /// Type check for values assigned from outside the codec.
    pub fn check(&self, value: &Value) -> Result<()> {
        if !self.ty.matches(value) {
            return Err(Error::TypeMismatch { field: self.name, expected: self.ty.describe() });
        }
        self.strategy.validate(value)
    }
}

/// Run `fields` in order over `r`, filling `record` (which holds defaults).
///
/// On failure `r` is left at the start of the field that failed.
pub(crate) fn read_record(
    fields: &[CompiledField],
    r: &mut Body<'_>,
    version: u8,
    flags: u32,
    record: &mut Record,
) -> Result<()> {
    let values = record.fields_mut();
    for (i, field) in fields.iter().enumerate() {
        let (before, rest) = values.split_at_mut(i);
        let ctx = FieldContext::new(version, flags, before);
        let at = r.position();
        if let Err(e) = field.strategy.read(r, &ctx, &mut rest[0].value) {
            r.set_position(at);
            return Err(e);
        }
    }
    Ok(())
}

/// The value for `fields[i]`, which must sit at the same position in the record.
fn slot<'r>(field: &CompiledField, values: &'r [Field], i: usize) -> Result<&'r Value> {
    match values.get(i) {
        Some(v) if v.name == field.name => {
            field.check(&v.value)?;
            Ok(&v.value)
        }
        _ => Err(Error::MissingField { field: field.name }),
    }
}

pub(crate) fn write_record(
    fields: &[CompiledField],
    w: &mut dyn Write,
    version: u8,
    flags: u32,
    record: &Record,
) -> Result<()> {
    let values = record.fields();
    for (i, field) in fields.iter().enumerate() {
        let value = slot(field, values, i)?;
        let ctx = FieldContext::new(version, flags, &values[..i]);
        field.strategy.write(w, &ctx, value)?;
    }
    Ok(())
}

pub(crate) fn record_size(
    fields: &[CompiledField],
    version: u8,
    flags: u32,
    record: &Record,
) -> Result<u64> {
    let values = record.fields();
    let mut total = 0u64;
    for (i, field) in fields.iter().enumerate() {
        let value = slot(field, values, i)?;
        let ctx = FieldContext::new(version, flags, &values[..i]);
        total += field.strategy.size_of(&ctx, value)?;
    }
    Ok(total)
}

fn mismatch(name: &'static str, expected: &'static str) -> Error {
    Error::TypeMismatch { field: name, expected }
}

/// Fixed-width primitive.
#[derive(Debug)]
pub struct Scalar {
    pub name: &'static str,
    pub ty: Primitive,
}

impl FieldStrategy for Scalar {
    fn read(&self, r: &mut Body<'_>, _ctx: &FieldContext<'_>, slot: &mut Value) -> Result<()> {
        *slot = read_primitive(r, self.ty)?;
        Ok(())
    }

    fn write(&self, w: &mut dyn Write, _ctx: &FieldContext<'_>, value: &Value) -> Result<()> {
        if !write_primitive(w, self.ty, value)? {
            return Err(mismatch(self.name, self.ty.name()));
        }
        Ok(())
    }

    fn size_of(&self, _ctx: &FieldContext<'_>, _value: &Value) -> Result<u64> {
        Ok(self.ty.size())
    }
}

/// NUL-terminated UTF-8 string.
#[derive(Debug)]
pub struct NulString {
    pub name: &'static str,
}

impl FieldStrategy for NulString {
    fn read(&self, r: &mut Body<'_>, _ctx: &FieldContext<'_>, slot: &mut Value) -> Result<()> {
        let bytes = read_cstring_bytes(r)?;
        let s = String::from_utf8(bytes).map_err(|_| Error::InvalidString { field: self.name })?;
        *slot = Value::Str(s);
        Ok(())
    }

    fn write(&self, w: &mut dyn Write, _ctx: &FieldContext<'_>, value: &Value) -> Result<()> {
        let s = value.as_str().ok_or_else(|| mismatch(self.name, "string"))?;
        write_cstring(w, s)?;
        Ok(())
    }

    fn size_of(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<u64> {
        let s = value.as_str().ok_or_else(|| mismatch(self.name, "string"))?;
        Ok(cstring_size(s))
    }
}

/// 64-bit integer stored in 32 bits below a version threshold.
#[derive(Debug)]
pub struct VersionSized {
    pub name: &'static str,
    pub threshold: u8,
    pub signed: bool,
}

impl VersionSized {
    fn wide(&self, ctx: &FieldContext<'_>) -> bool {
        ctx.version >= self.threshold
    }
}

impl FieldStrategy for VersionSized {
    fn read(&self, r: &mut Body<'_>, ctx: &FieldContext<'_>, slot: &mut Value) -> Result<()> {
        *slot = match (self.signed, self.wide(ctx)) {
            (false, true) => Value::U64(r.read_u64::<BigEndian>()?),
            (false, false) => Value::U64(r.read_u32::<BigEndian>()? as u64),
            (true, true) => Value::I64(r.read_i64::<BigEndian>()?),
            (true, false) => Value::I64(r.read_i32::<BigEndian>()? as i64),
        };
        Ok(())
    }

    fn write(&self, w: &mut dyn Write, ctx: &FieldContext<'_>, value: &Value) -> Result<()> {
        let overflow = || Error::FieldOverflow { field: self.name, bits: 32 };
        match (value, self.wide(ctx)) {
            (Value::U64(v), true) => w.write_u64::<BigEndian>(*v)?,
            (Value::U64(v), false) => {
                w.write_u32::<BigEndian>(u32::try_from(*v).map_err(|_| overflow())?)?
            }
            (Value::I64(v), true) => w.write_i64::<BigEndian>(*v)?,
            (Value::I64(v), false) => {
                w.write_i32::<BigEndian>(i32::try_from(*v).map_err(|_| overflow())?)?
            }
            _ => return Err(mismatch(self.name, if self.signed { "i64" } else { "u64" })),
        }
        Ok(())
    }

    fn size_of(&self, ctx: &FieldContext<'_>, _value: &Value) -> Result<u64> {
        Ok(if self.wide(ctx) { 8 } else { 4 })
    }
}

/// Runs `inner` only when one of the mask's bits is set in the box flags.
#[derive(Debug)]
pub struct FlagGated {
    pub mask: u32,
    pub inner: Box<dyn FieldStrategy>,
}

impl FlagGated {
    fn present(&self, ctx: &FieldContext<'_>) -> bool {
        ctx.flags & self.mask != 0
    }
}

impl FieldStrategy for FlagGated {
    fn read(&self, r: &mut Body<'_>, ctx: &FieldContext<'_>, slot: &mut Value) -> Result<()> {
        if self.present(ctx) {
            self.inner.read(r, ctx, slot)?;
        }
        Ok(())
    }

    fn write(&self, w: &mut dyn Write, ctx: &FieldContext<'_>, value: &Value) -> Result<()> {
        if self.present(ctx) {
            self.inner.write(w, ctx, value)?;
        }
        Ok(())
    }

    fn size_of(&self, ctx: &FieldContext<'_>, value: &Value) -> Result<u64> {
        if self.present(ctx) { self.inner.size_of(ctx, value) } else { Ok(0) }
    }

    fn validate(&self, value: &Value) -> Result<()> {
        self.inner.validate(value)
    }
}

/// Padding: skipped on read, zero-filled on write.
#[derive(Debug)]
pub struct Reserved {
    pub bytes: u32,
}

impl FieldStrategy for Reserved {
    fn read(&self, r: &mut Body<'_>, _ctx: &FieldContext<'_>, _slot: &mut Value) -> Result<()> {
        let mut skip = vec![0u8; self.bytes as usize];
        r.read_exact(&mut skip)?;
        Ok(())
    }

    fn write(&self, w: &mut dyn Write, _ctx: &FieldContext<'_>, _value: &Value) -> Result<()> {
        w.write_all(&vec![0u8; self.bytes as usize])?;
        Ok(())
    }

    fn size_of(&self, _ctx: &FieldContext<'_>, _value: &Value) -> Result<u64> {
        Ok(self.bytes as u64)
    }
}

/// How a collection's element count is found on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthStrategy {
    /// Exactly this many elements, as given by the descriptor's `presized(n)`.
    /// Lists with no length attribute at all are fixed at zero.
    None(u32),
    /// Count is the value of the earlier field at `index`.
    FromProperty { name: &'static str, index: usize },
    /// Count of this many bytes precedes the elements.
    LengthPrefixed(u8),
    /// Elements fill the rest of the box.
    RemainingBytes,
}

/// A nested schema used as a collection element.
#[derive(Debug)]
pub struct EntryCodec {
    pub schema: &'static [FieldDescriptor],
    pub fields: Vec<CompiledField>,
    /// Entry schema contains version- or flag-dependent fields.
    pub uses_context: bool,
}

impl EntryCodec {
    fn context(&self, ctx: &FieldContext<'_>) -> (u8, u32) {
        if self.uses_context { (ctx.version, ctx.flags) } else { (0, 0) }
    }

    fn blank(&self) -> Record {
        default_record(self.schema)
    }

    pub fn read(&self, r: &mut Body<'_>, ctx: &FieldContext<'_>) -> Result<Record> {
        let (version, flags) = self.context(ctx);
        let mut record = self.blank();
        read_record(&self.fields, r, version, flags, &mut record)?;
        Ok(record)
    }

    pub fn write(&self, w: &mut dyn Write, ctx: &FieldContext<'_>, record: &Record) -> Result<()> {
        let (version, flags) = self.context(ctx);
        write_record(&self.fields, w, version, flags, record)
    }

    pub fn compute_size(&self, ctx: &FieldContext<'_>, record: &Record) -> Result<u64> {
        let (version, flags) = self.context(ctx);
        record_size(&self.fields, version, flags, record)
    }
}

#[derive(Debug)]
pub enum ElementCodec {
    Primitive(Primitive),
    Entry(EntryCodec),
}

impl ElementCodec {
    pub fn fixed_size(&self) -> Option<u64> {
        match self {
            ElementCodec::Primitive(p) => Some(p.size()),
            ElementCodec::Entry(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct Collection {
    pub name: &'static str,
    pub element: ElementCodec,
    pub length: LengthStrategy,
}

impl Collection {
    fn items<'v>(&self, value: &'v Value) -> Result<&'v [Value]> {
        value.as_list().ok_or_else(|| mismatch(self.name, "list"))
    }

    fn sibling_count(&self, ctx: &FieldContext<'_>, index: usize) -> Result<i128> {
        let source = &ctx.siblings[index];
        source
            .value
            .as_int()
            .ok_or_else(|| mismatch(source.name, "integer"))
    }

    /// Number of elements emitted for a list of `len`.
    fn emitted(&self, len: usize) -> usize {
        match self.length {
            LengthStrategy::LengthPrefixed(width) => {
                (len as u64).min(uint_max(width)) as usize
            }
            _ => len,
        }
    }

    /// Where a bad count came from, for error reports.
    fn count_source(&self) -> &'static str {
        match self.length {
            LengthStrategy::FromProperty { name, .. } => name,
            _ => self.name,
        }
    }

    /// Fewest bytes one element can occupy under `ctx`. Entries are measured
    /// with their default values, which hold every nested list at its minimum.
    fn min_element_size(&self, ctx: &FieldContext<'_>) -> Result<u64> {
        match &self.element {
            ElementCodec::Primitive(p) => Ok(p.size()),
            ElementCodec::Entry(entry) => entry.compute_size(ctx, &entry.blank()),
        }
    }

    fn check_fixed(&self, items: &[Value]) -> Result<()> {
        match self.length {
            LengthStrategy::None(expected) if items.len() != expected as usize => {
                Err(Error::FixedLength { field: self.name, len: items.len(), expected })
            }
            _ => Ok(()),
        }
    }

    fn read_element(&self, r: &mut Body<'_>, ctx: &FieldContext<'_>) -> Result<Value> {
        match &self.element {
            ElementCodec::Primitive(p) => Ok(read_primitive(r, *p)?),
            ElementCodec::Entry(entry) => Ok(Value::Record(entry.read(r, ctx)?)),
        }
    }
}

impl FieldStrategy for Collection {
    fn read(&self, r: &mut Body<'_>, ctx: &FieldContext<'_>, slot: &mut Value) -> Result<()> {
        let count = match self.length {
            LengthStrategy::None(n) => n as u64,
            LengthStrategy::FromProperty { name, index } => {
                let n = self.sibling_count(ctx, index)?;
                if !(0..=i32::MAX as i128).contains(&n) {
                    return Err(Error::InvalidCount { source_field: name, count: n });
                }
                n as u64
            }
            LengthStrategy::LengthPrefixed(width) => read_uint(r, width)?,
            LengthStrategy::RemainingBytes => {
                let size = self.element.fixed_size().ok_or_else(|| mismatch(self.name, "fixed-size elements"))?;
                remaining(r) / size
            }
        };

        let min = self.min_element_size(ctx)?;
        let fits = match min {
            0 => count <= MAX_ZERO_WIDTH_ENTRIES,
            min => count <= remaining(r) / min,
        };
        if !fits {
            return Err(Error::InvalidCount { source_field: self.count_source(), count: count as i128 });
        }

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(self.read_element(r, ctx)?);
        }
        *slot = Value::List(items);
        Ok(())
    }

    fn write(&self, w: &mut dyn Write, ctx: &FieldContext<'_>, value: &Value) -> Result<()> {
        let items = self.items(value)?;
        match self.length {
            LengthStrategy::FromProperty { name, index } => {
                let expected = self.sibling_count(ctx, index)?;
                if expected != items.len() as i128 {
                    return Err(Error::CountMismatch {
                        field: self.name,
                        source_field: name,
                        len: items.len(),
                        expected,
                    });
                }
            }
            LengthStrategy::LengthPrefixed(width) => {
                write_uint(w, width, self.emitted(items.len()) as u64)?;
            }
            LengthStrategy::None(_) => self.check_fixed(items)?,
            LengthStrategy::RemainingBytes => {}
        }

        for item in &items[..self.emitted(items.len())] {
            match &self.element {
                ElementCodec::Primitive(p) => {
                    if !write_primitive(w, *p, item)? {
                        return Err(mismatch(self.name, p.name()));
                    }
                }
                ElementCodec::Entry(entry) => {
                    let record = item.as_record().ok_or_else(|| mismatch(self.name, "record"))?;
                    entry.write(w, ctx, record)?;
                }
            }
        }
        Ok(())
    }

    fn size_of(&self, ctx: &FieldContext<'_>, value: &Value) -> Result<u64> {
        let items = self.items(value)?;
        let items = &items[..self.emitted(items.len())];
        let prefix = match self.length {
            LengthStrategy::LengthPrefixed(width) => width as u64,
            _ => 0,
        };
        let body = match &self.element {
            ElementCodec::Primitive(p) => items.len() as u64 * p.size(),
            ElementCodec::Entry(entry) => {
                let mut total = 0u64;
                for item in items {
                    let record = item.as_record().ok_or_else(|| mismatch(self.name, "record"))?;
                    total += entry.compute_size(ctx, record)?;
                }
                total
            }
        };
        Ok(prefix + body)
    }

    fn validate(&self, value: &Value) -> Result<()> {
        self.check_fixed(self.items(value)?)
    }
}
