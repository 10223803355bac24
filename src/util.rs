use std::fmt::Write as _;
use std::io::{Read, Seek, SeekFrom};

pub fn read_slice<R: Read + Seek>(r: &mut R, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
    r.seek(SeekFrom::Start(offset))?;
    let mut v = Vec::new();
    r.take(len).read_to_end(&mut v)?;
    if (v.len() as u64) < len {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(v)
}

/// Hex dump, 16 bytes per row with an ASCII column; rows are labelled with
/// offsets counted from `start_offset`.
pub fn hex_dump(bytes: &[u8], start_offset: u64) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(16) * 78);
    for (row, chunk) in (start_offset..).step_by(16).zip(bytes.chunks(16)) {
        let _ = write!(out, "{row:08x} ");
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, " {b:02x}");
                }
                None => out.push_str("   "),
            }
        }
        out.push_str("   |");
        out.extend(chunk.iter().map(|&c| if c == b' ' || c.is_ascii_graphic() { c as char } else { '.' }));
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_row_is_padded_to_the_ascii_column() {
        let dump = hex_dump(b"ab\x01", 0x20);
        let expected = format!("00000020  61 62 01{}   |ab.|\n", "   ".repeat(13));
        assert_eq!(dump, expected);
    }

    #[test]
    fn rows_advance_by_sixteen() {
        let dump = hex_dump(&[0x41; 17], 0);
        let rows: Vec<&str> = dump.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("00000010  41 "));
        assert!(rows[0].ends_with(&format!("|{}|", "A".repeat(16))));
    }
}
