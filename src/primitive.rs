//! Big-endian primitive codec shared by headers and field strategies.

use crate::boxes::FourCC;
use crate::field::Primitive;
use crate::value::Value;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub fn read_guid<R: Read + ?Sized>(r: &mut R) -> io::Result<[u8; 16]> {
    let mut g = [0u8; 16];
    r.read_exact(&mut g)?;
    Ok(g)
}

pub fn write_guid<W: Write + ?Sized>(w: &mut W, g: &[u8; 16]) -> io::Result<()> {
    w.write_all(g)
}

pub fn read_fourcc<R: Read + ?Sized>(r: &mut R) -> io::Result<FourCC> {
    let mut cc = [0u8; 4];
    r.read_exact(&mut cc)?;
    Ok(FourCC(cc))
}

/// Bytes up to (not including) the NUL terminator. The terminator is consumed.
pub fn read_cstring_bytes<R: Read + ?Sized>(r: &mut R) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        match r.read_u8()? {
            0 => return Ok(out),
            b => out.push(b),
        }
    }
}

pub fn write_cstring<W: Write + ?Sized>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_all(s.as_bytes())?;
    w.write_u8(0)
}

/// Wire size of a NUL-terminated string.
pub fn cstring_size(s: &str) -> u64 {
    s.len() as u64 + 1
}

/// Read one fixed-width value of the given type.
pub fn read_primitive<R: Read + ?Sized>(r: &mut R, p: Primitive) -> io::Result<Value> {
    Ok(match p {
        Primitive::U8 => Value::U8(r.read_u8()?),
        Primitive::U16 => Value::U16(r.read_u16::<BigEndian>()?),
        Primitive::U32 => Value::U32(r.read_u32::<BigEndian>()?),
        Primitive::U64 => Value::U64(r.read_u64::<BigEndian>()?),
        Primitive::I16 => Value::I16(r.read_i16::<BigEndian>()?),
        Primitive::I32 => Value::I32(r.read_i32::<BigEndian>()?),
        Primitive::I64 => Value::I64(r.read_i64::<BigEndian>()?),
        Primitive::Guid => Value::Guid(read_guid(r)?),
        Primitive::FourCC => Value::FourCC(read_fourcc(r)?),
    })
}

/// Write one fixed-width value. Returns `Ok(false)` if `v` is not of type `p`.
pub fn write_primitive<W: Write + ?Sized>(w: &mut W, p: Primitive, v: &Value) -> io::Result<bool> {
    match (p, v) {
        (Primitive::U8, Value::U8(x)) => w.write_u8(*x)?,
        (Primitive::U16, Value::U16(x)) => w.write_u16::<BigEndian>(*x)?,
        (Primitive::U32, Value::U32(x)) => w.write_u32::<BigEndian>(*x)?,
        (Primitive::U64, Value::U64(x)) => w.write_u64::<BigEndian>(*x)?,
        (Primitive::I16, Value::I16(x)) => w.write_i16::<BigEndian>(*x)?,
        (Primitive::I32, Value::I32(x)) => w.write_i32::<BigEndian>(*x)?,
        (Primitive::I64, Value::I64(x)) => w.write_i64::<BigEndian>(*x)?,
        (Primitive::Guid, Value::Guid(g)) => write_guid(w, g)?,
        (Primitive::FourCC, Value::FourCC(cc)) => w.write_all(&cc.0)?,
        _ => return Ok(false),
    }
    Ok(true)
}

/// Read an unsigned count of `width` bytes (1, 2, 4 or 8).
pub fn read_uint<R: Read + ?Sized>(r: &mut R, width: u8) -> io::Result<u64> {
    r.read_uint::<BigEndian>(width as usize)
}

pub fn write_uint<W: Write + ?Sized>(w: &mut W, width: u8, v: u64) -> io::Result<()> {
    w.write_uint::<BigEndian>(v, width as usize)
}

/// Largest count representable in `width` bytes.
pub fn uint_max(width: u8) -> u64 {
    if width >= 8 { u64::MAX } else { (1u64 << (width as u32 * 8)) - 1 }
}
