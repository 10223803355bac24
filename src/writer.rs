use crate::boxes::{BoxHeader, BoxNode, FullBoxHeader, NodeKind};
use crate::codec::{record_size, write_record};
use crate::error::{Error, Result};
use crate::primitive::write_guid;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

/// Write a box header with its current `size`. The 64-bit form is used when
/// `large_size` is set.
pub fn write_box_header<W: Write + ?Sized>(w: &mut W, hdr: &BoxHeader) -> Result<()> {
    if hdr.large_size {
        w.write_u32::<BigEndian>(1)?;
        w.write_all(&hdr.typ.0)?;
        w.write_u64::<BigEndian>(hdr.size)?;
    } else {
        let size = u32::try_from(hdr.size).map_err(|_| Error::FieldOverflow { field: "size", bits: 32 })?;
        w.write_u32::<BigEndian>(size)?;
        w.write_all(&hdr.typ.0)?;
    }
    if let Some(uuid) = &hdr.uuid {
        write_guid(w, uuid)?;
    }
    Ok(())
}

struct CountingWriter<'a> {
    inner: &'a mut dyn Write,
    count: u64,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl BoxNode {
    /// Recompute and store the size of this box and every descendant.
    ///
    /// Switches a header to the 64-bit size form when the total no longer
    /// fits in 32 bits; a header already in that form keeps it.
    pub fn compute_size(&mut self) -> Result<u64> {
        let (version, flags) = (self.version(), self.flags());
        let payload = match &mut self.kind {
            NodeKind::Container(kids) => {
                let mut total = 0u64;
                for kid in kids.iter_mut() {
                    total += kid.compute_size()?;
                }
                total
            }
            NodeKind::Fields(record) => {
                let fields = self.variant.codec().ok_or(Error::LayoutMismatch { typ: self.hdr.typ })?;
                record_size(fields, version, flags, record)?
            }
            NodeKind::Opaque(bytes) => bytes.len() as u64,
            NodeKind::Skipped { len, .. } => *len,
        };

        let full = if self.full.is_some() { FullBoxHeader::SIZE } else { 0 };
        let small = BoxHeader { large_size: false, ..self.hdr.clone() }.header_size();
        if small + full + payload > u32::MAX as u64 {
            self.hdr.large_size = true;
        }
        self.hdr.size = self.hdr.header_size() + full + payload;
        Ok(self.hdr.size)
    }

    /// Serialize using the sizes stored by [`BoxNode::compute_size`].
    ///
    /// Fails with [`Error::SizeDrift`] if any box writes a different number
    /// of bytes than its header declares.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut cw = CountingWriter { inner: w, count: 0 };
        self.write_counted(&mut cw)
    }

    /// [`BoxNode::compute_size`] followed by [`BoxNode::write`] into a buffer.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let size = self.compute_size()?;
        let mut out = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        self.write(&mut out)?;
        Ok(out)
    }

    fn write_counted(&self, w: &mut CountingWriter<'_>) -> Result<()> {
        let start = w.count;
        write_box_header(w, &self.hdr)?;
        if let Some(full) = &self.full {
            w.write_u32::<BigEndian>(full.packed())?;
        }
        match &self.kind {
            NodeKind::Container(kids) => {
                for kid in kids {
                    kid.write_counted(w)?;
                }
            }
            NodeKind::Fields(record) => {
                let fields = self.variant.codec().ok_or(Error::LayoutMismatch { typ: self.hdr.typ })?;
                write_record(fields, w, self.version(), self.flags(), record)?;
            }
            NodeKind::Opaque(bytes) => w.write_all(bytes)?,
            NodeKind::Skipped { offset, .. } => {
                return Err(Error::PayloadNotLoaded { typ: self.hdr.typ, offset: *offset });
            }
        }

        let written = w.count - start;
        if written != self.hdr.size {
            return Err(Error::SizeDrift { typ: self.hdr.typ, expected: self.hdr.size, written });
        }
        Ok(())
    }
}

/// Size and write a sequence of top-level boxes.
pub fn write_boxes<W: Write>(w: &mut W, boxes: &mut [BoxNode]) -> Result<()> {
    for b in boxes.iter_mut() {
        b.compute_size()?;
        b.write(w)?;
    }
    Ok(())
}
