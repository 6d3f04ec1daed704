use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// A cursor over an in-memory box payload.
///
/// All of the sample tables are small enough to parse and rewrite
/// wholly in memory; only the `mdat` payload is ever treated as a lazy,
/// unread byte range (see `crate::model::MediaSource`).
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    pub fn left(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.left() < n {
            return Err(Error::TruncatedHeader);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        Ok(FourCC::from(self.take(4)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n)?;
        Ok(())
    }

    /// Remaining, unconsumed bytes.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

/// Push helpers mirroring `Cursor`'s reads, used by every box's `write_to`.
pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u24(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes()[1..]);
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_fourcc(out: &mut Vec<u8>, f: FourCC) {
    out.extend_from_slice(&f.to_be_bytes());
}

/// An 8-byte box header: 4-byte big-endian total size, 4-byte type.
pub struct BoxHeader {
    pub size: u64,
    pub fourcc: FourCC,
}

pub const BOX_HEADER_SIZE: u64 = 8;

impl BoxHeader {
    pub fn read(c: &mut Cursor<'_>) -> Result<BoxHeader> {
        let size = c.read_u32()? as u64;
        let fourcc = c.read_fourcc()?;
        Ok(BoxHeader { size, fourcc })
    }

    pub fn write(out: &mut Vec<u8>, size: u64, fourcc: FourCC) {
        // Only the 8-byte header form is supported; callers are
        // responsible for keeping box sizes under 4GiB.
        put_u32(out, size as u32);
        put_fourcc(out, fourcc);
    }
}
