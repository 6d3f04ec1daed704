//! Clip output (Component E): a byte source that concatenates the
//! rewritten header blob with the selected ranges of the original
//! `mdat` payload.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use crate::clip::{self, ChunkPlanEntry};
use crate::error::{Error, Result};
use crate::model::Mp4;

fn to_io_error(e: Error) -> io::Error {
    match e {
        Error::Io(io_err) => io_err,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

/// The output of a clip operation: constructed by `Mp4::clip`, must be
/// driven through `filter` before any bytes can be produced.
pub struct ClipStream {
    mp4: Mp4,
    begin: f64,
    duration: f64,
    header: Vec<u8>,
    plan: Vec<ChunkPlanEntry>,
    total_size: u64,
    pos: u64,
    filtered: bool,
}

impl std::fmt::Debug for ClipStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipStream")
            .field("begin", &self.begin)
            .field("duration", &self.duration)
            .field("total_size", &self.total_size)
            .field("pos", &self.pos)
            .field("filtered", &self.filtered)
            .finish()
    }
}

impl ClipStream {
    pub(crate) fn new(mp4: Mp4, begin: f64, duration: f64) -> Result<ClipStream> {
        if begin < 0.0 || begin > mp4.duration() {
            return Err(Error::ClipOutside);
        }
        if duration < 0.0 {
            return Err(Error::InvalidDuration);
        }
        Ok(ClipStream {
            mp4,
            begin,
            duration,
            header: Vec::new(),
            plan: Vec::new(),
            total_size: 0,
            pos: 0,
            filtered: false,
        })
    }

    /// Run the clip transform and materialize the header blob. Safe to
    /// call more than once; later calls are no-ops.
    pub fn filter(&mut self) -> Result<()> {
        if self.filtered {
            return Ok(());
        }
        let plan = clip::clip(&mut self.mp4, self.begin, self.duration)?;
        let mut header = Vec::with_capacity(self.mp4.header_len() as usize);
        self.mp4.encode_header_to(&mut header);
        let payload_size: u64 = plan.iter().map(|c| c.size).sum();
        self.total_size = header.len() as u64 + payload_size;
        debug!(
            "clip filtered: {} byte(s) header, {} byte(s) total",
            header.len(),
            self.total_size
        );
        self.header = header;
        self.plan = plan;
        self.filtered = true;
        Ok(())
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Write the whole clip to `writer`: the header once, then every
    /// planned range copied from the source in order.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> Result<u64> {
        self.filter()?;
        writer.write_all(&self.header)?;
        let mut written = self.header.len() as u64;

        let mut buf = [0u8; 64 * 1024];
        for c in &self.plan {
            trace!(
                "copying range: old offset {} -> new offset {}, {} byte(s)",
                c.old_offset, c.new_offset, c.size
            );
            let mut remaining = c.size;
            let mut offset = c.old_offset;
            while remaining > 0 {
                let n = remaining.min(buf.len() as u64) as usize;
                self.mp4.source.read_at(offset, &mut buf[..n])?;
                writer.write_all(&buf[..n])?;
                written += n as u64;
                offset += n as u64;
                remaining -= n as u64;
            }
        }
        debug!("wrote clip: {} byte(s)", written);
        Ok(written)
    }
}

impl Read for ClipStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.filtered {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "clip stream must be filtered before reading",
            ));
        }
        if buf.is_empty() || self.pos >= self.total_size {
            return Ok(0);
        }

        if self.pos < self.header.len() as u64 {
            let start = self.pos as usize;
            let n = buf.len().min(self.header.len() - start);
            buf[..n].copy_from_slice(&self.header[start..start + n]);
            self.pos += n as u64;
            return Ok(n);
        }

        let idx = self
            .plan
            .partition_point(|c| c.new_offset + c.size <= self.pos);
        if idx >= self.plan.len() {
            return Ok(0);
        }
        let c = self.plan[idx];
        let rel = self.pos - c.new_offset;
        let n = buf.len().min((c.size - rel) as usize);
        self.mp4
            .source
            .read_at(c.old_offset + rel, &mut buf[..n])
            .map_err(to_io_error)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Mp4 {
    /// Build a clip transform over `[begin, begin+duration)` seconds.
    /// Does not mutate `self` until `ClipStream::filter` is called.
    pub fn clip(self, begin: f64, duration: f64) -> Result<ClipStream> {
        ClipStream::new(self, begin, duration)
    }
}

impl Seek for ClipStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos: i64 = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.total_size as i64 + p,
            SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 || new_pos as u64 > self.total_size {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek out of range"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}
