use crate::boxes::{BoxHeader, BoxNode, FourCC, FullBoxHeader, NodeKind};
use crate::codec::{Body, read_record};
use crate::error::{Error, Result};
use crate::primitive::read_guid;
use crate::registry::{Layout, Registry};
use byteorder::{BigEndian, ReadBytesExt};
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// Nesting limit used by the dump tool and [`crate::api::get_boxes`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Byte source that tracks how far it has read.
///
/// Built with [`BoxReader::new`] it is forward-only and buffers every opaque
/// payload. Built with [`BoxReader::seekable`] it seeks past opaque payloads
/// instead, leaving [`NodeKind::Skipped`] in the tree.
#[derive(Debug)]
pub struct BoxReader<R> {
    inner: R,
    pos: u64,
    seek: Option<Seeker<R>>,
}

struct Seeker<R> {
    /// Bytes available from where the reader started.
    len: u64,
    skip: fn(&mut R, i64) -> io::Result<u64>,
}

impl<R> fmt::Debug for Seeker<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seeker").field("len", &self.len).finish_non_exhaustive()
    }
}

fn seek_forward<R: Seek>(r: &mut R, n: i64) -> io::Result<u64> {
    r.seek(SeekFrom::Current(n))
}

impl<R: Read + Seek> BoxReader<R> {
    /// Reader that skips opaque payloads (`mdat`, unknown tags, containers
    /// past the depth limit) by seeking. Offsets count from the stream's
    /// current position.
    pub fn seekable(mut inner: R) -> io::Result<Self> {
        let here = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(here))?;
        let seek = Seeker { len: end.saturating_sub(here), skip: seek_forward::<R> };
        Ok(BoxReader { inner, pos: 0, seek: Some(seek) })
    }
}

impl<R: Read> BoxReader<R> {
    pub fn new(inner: R) -> Self {
        BoxReader { inner, pos: 0, seek: None }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Iterate over the boxes that follow.
    pub fn boxes(self, registry: &Registry, max_depth: usize) -> BoxIter<'_, R> {
        BoxIter { reader: self, registry, max_depth, done: false }
    }

    /// Move past `len` bytes without reading them. `Ok(false)` when the
    /// stream cannot seek.
    fn try_skip(&mut self, len: u64) -> io::Result<bool> {
        let Some(seek) = &self.seek else {
            return Ok(false);
        };
        let (avail, skip) = (seek.len, seek.skip);
        if self.pos.saturating_add(len) > avail {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "box extends past end of stream"));
        }
        let n = i64::try_from(len).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        skip(&mut self.inner, n)?;
        self.pos += len;
        Ok(true)
    }

    /// Undecoded payload of `len` bytes: skipped when possible, else read.
    fn opaque(&mut self, len: u64) -> io::Result<NodeKind> {
        let offset = self.pos;
        if len > 0 && self.try_skip(len)? {
            return Ok(NodeKind::Skipped { offset, len });
        }
        Ok(NodeKind::Opaque(self.read_vec(len)?))
    }

    /// Read exactly `len` bytes without trusting `len` for the allocation.
    fn read_vec(&mut self, len: u64) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let got = self.by_ref().take(len).read_to_end(&mut buf)?;
        if (got as u64) < len {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "box extends past end of stream"));
        }
        Ok(buf)
    }

    /// Like `read_exact`, but a stream that ends before the first byte is `Ok(false)`.
    fn fill_or_eof(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Read for BoxReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

pub fn read_box_header<R: Read>(r: &mut BoxReader<R>) -> Result<BoxHeader> {
    read_box_header_opt(r)?.ok_or_else(|| Error::Io(io::ErrorKind::UnexpectedEof.into()))
}

/// Read a header, or `None` if the stream ends cleanly at a box boundary.
pub fn read_box_header_opt<R: Read>(r: &mut BoxReader<R>) -> Result<Option<BoxHeader>> {
    let start = r.position();
    let mut size32 = [0u8; 4];
    if !r.fill_or_eof(&mut size32)? {
        return Ok(None);
    }
    let size32 = u32::from_be_bytes(size32);
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ)?;

    if size32 == 0 {
        return Err(Error::InvalidSize { offset: start, size: 0 });
    }

    let large_size = size32 == 1;
    let size = if large_size { r.read_u64::<BigEndian>()? } else { size32 as u64 };

    let uuid = if &typ == b"uuid" { Some(read_guid(r)?) } else { None };

    let hdr = BoxHeader { size, typ: FourCC(typ), uuid, large_size, start };
    if size < hdr.header_size() {
        return Err(Error::InvalidSize { offset: start, size });
    }
    trace!(box_type = %hdr.typ, size, offset = start, "box header");
    Ok(Some(hdr))
}

impl BoxNode {
    /// Parse one box. Containers deeper than `max_depth` keep their payload
    /// as opaque bytes.
    pub fn parse<R: Read>(r: &mut BoxReader<R>, registry: &Registry, max_depth: usize) -> Result<BoxNode> {
        let at = r.position();
        let hdr = read_box_header(r).map_err(|e| e.at_header(at))?;
        parse_body(r, hdr, registry, max_depth)
    }
}

fn parse_body<R: Read>(
    r: &mut BoxReader<R>,
    hdr: BoxHeader,
    registry: &Registry,
    max_depth: usize,
) -> Result<BoxNode> {
    let variant = registry.resolve(hdr.typ, hdr.uuid.as_ref());
    let (typ, start, size) = (hdr.typ, hdr.start, hdr.size);
    let end = start.saturating_add(size);
    let fail = |e: Error, pos: u64| e.in_box(typ, start, size, pos - start);

    let full = if variant.full_box {
        if r.position() + FullBoxHeader::SIZE > end {
            let consumed = hdr.header_size() + FullBoxHeader::SIZE;
            return Err(fail(Error::SizeMismatch { declared: size, consumed }, r.position()));
        }
        let word = r.read_u32::<BigEndian>().map_err(|e| fail(e.into(), r.position()))?;
        Some(FullBoxHeader::from_packed(word))
    } else {
        None
    };
    let (version, flags) = full.map(|f| (f.version(), f.flags())).unwrap_or((0, 0));

    let kind = match &variant.layout {
        Layout::Container if max_depth > 0 => {
            let kids = parse_children(r, end, registry, max_depth - 1)
                .map_err(|e| fail(e, r.position()))?;
            NodeKind::Container(kids)
        }
        Layout::Container => {
            debug!(box_type = %typ, offset = start, "depth limit reached, keeping payload opaque");
            let len = end - r.position();
            r.opaque(len).map_err(|e| fail(e.into(), r.position()))?
        }
        Layout::Fields(fields) => {
            let len = end - r.position();
            let body = r.read_vec(len).map_err(|e| fail(e.into(), r.position()))?;
            let mut cur: Body<'_> = Cursor::new(&body[..]);
            let mut record = variant.blank_record();
            let body_start = end - len;
            read_record(fields, &mut cur, version, flags, &mut record)
                .map_err(|e| fail(e, body_start + cur.position()))?;
            if cur.position() != len {
                let consumed = end - start - (len - cur.position());
                return Err(fail(Error::SizeMismatch { declared: size, consumed }, start + consumed));
            }
            NodeKind::Fields(record)
        }
        Layout::Opaque => {
            let len = end - r.position();
            r.opaque(len).map_err(|e| fail(e.into(), r.position()))?
        }
    };

    let consumed = r.position() - start;
    if consumed != size {
        return Err(fail(Error::SizeMismatch { declared: size, consumed }, r.position()));
    }
    Ok(BoxNode { hdr, full, kind, variant })
}

/// Parse boxes until `parent_end`; a child overrunning the end is an error.
pub fn parse_children<R: Read>(
    r: &mut BoxReader<R>,
    parent_end: u64,
    registry: &Registry,
    max_depth: usize,
) -> Result<Vec<BoxNode>> {
    let mut kids = Vec::new();
    while r.position() < parent_end {
        let at = r.position();
        let h = read_box_header(r).map_err(|e| e.at_header(at))?;
        if h.size > parent_end - h.start {
            return Err(Error::SizeMismatch {
                declared: parent_end - h.start,
                consumed: h.size,
            }
            .in_box(h.typ, h.start, h.size, r.position() - h.start));
        }
        kids.push(parse_body(r, h, registry, max_depth)?);
    }
    Ok(kids)
}

/// Iterator over the top-level boxes of a stream.
///
/// Yields boxes until the stream ends at a box boundary. After the first
/// error it yields nothing more; boxes already yielded stay valid.
pub struct BoxIter<'a, R> {
    reader: BoxReader<R>,
    registry: &'a Registry,
    max_depth: usize,
    done: bool,
}

impl<R: Read> BoxIter<'_, R> {
    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }
}

impl<R: Read> Iterator for BoxIter<'_, R> {
    type Item = Result<BoxNode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let at = self.reader.position();
        let res = match read_box_header_opt(&mut self.reader) {
            Ok(None) => {
                self.done = true;
                return None;
            }
            Ok(Some(hdr)) => parse_body(&mut self.reader, hdr, self.registry, self.max_depth),
            Err(e) => Err(e.at_header(at)),
        };
        if res.is_err() {
            self.done = true;
        }
        Some(res)
    }
}

/// Iterate over the top-level boxes in `r`.
pub fn read_boxes<R: Read>(r: R, registry: &Registry, max_depth: usize) -> BoxIter<'_, R> {
    BoxReader::new(r).boxes(registry, max_depth)
}
