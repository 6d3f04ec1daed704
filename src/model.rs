//! The parsed in-memory representation of an MP4 file (Component B),
//! and the `MediaSource` abstraction over its `mdat` payload.

use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, trace};

use crate::boxes::mdat::MediaDataBox;
use crate::boxes::moov::MovieBox;
use crate::boxes::opaque::OpaqueBox;
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// Lazy access to the bytes of an `mdat` payload.
///
/// The clip-output stage drives this by seeking (or, for a
/// non-seekable source, skipping forward past) to an absolute offset
/// within the payload and reading a run of bytes from there.
pub trait MediaSource {
    /// Total number of bytes in the payload.
    fn len(&self) -> u64;

    /// Whether `read_at` supports arbitrary (including backward) offsets.
    fn is_seekable(&self) -> bool;

    /// Read exactly `buf.len()` bytes starting at payload-relative `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

/// A `MediaSource` backed by a genuinely seekable reader (e.g. `File`,
/// `Cursor<Vec<u8>>`): supports true random access.
pub struct SeekMediaSource<R> {
    reader: R,
    base_offset: u64,
    len: u64,
}

impl<R: Read + Seek> SeekMediaSource<R> {
    pub fn new(reader: R, base_offset: u64, len: u64) -> SeekMediaSource<R> {
        SeekMediaSource {
            reader,
            base_offset,
            len,
        }
    }
}

impl<R: Read + Seek> MediaSource for SeekMediaSource<R> {
    fn len(&self) -> u64 {
        self.len
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(self.base_offset + offset))?;
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::TruncatedChunk {
                    written: 0,
                    expected: buf.len() as u64,
                }
            } else {
                Error::Io(e)
            }
        })
    }
}

/// A `MediaSource` backed by a forward-only reader. Requests for an
/// offset behind the current position fail; requests ahead of it are
/// served by reading and discarding the gap.
pub struct SequentialMediaSource<R> {
    reader: R,
    pos: u64,
    len: u64,
}

impl<R: Read> SequentialMediaSource<R> {
    pub fn new(reader: R, len: u64) -> SequentialMediaSource<R> {
        SequentialMediaSource { reader, pos: 0, len }
    }
}

impl<R: Read> MediaSource for SequentialMediaSource<R> {
    fn len(&self) -> u64 {
        self.len
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset < self.pos {
            log::warn!(
                "sequential source asked to seek backward from {} to {}",
                self.pos,
                offset
            );
            return Err(Error::InvalidArgument);
        }
        let mut gap = offset - self.pos;
        let mut sink = [0u8; 4096];
        while gap > 0 {
            let n = gap.min(sink.len() as u64) as usize;
            self.reader.read_exact(&mut sink[..n]).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    Error::TruncatedChunk {
                        written: 0,
                        expected: n as u64,
                    }
                } else {
                    Error::Io(e)
                }
            })?;
            gap -= n as u64;
            self.pos += n as u64;
        }
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::TruncatedChunk {
                    written: 0,
                    expected: buf.len() as u64,
                }
            } else {
                Error::Io(e)
            }
        })?;
        self.pos += buf.len() as u64;
        Ok(())
    }
}

/// A fully parsed MP4: the movie metadata tree plus a lazy handle on
/// the media payload.
pub struct Mp4 {
    pub moov: MovieBox,
    pub top_opaque: Vec<OpaqueBox>,
    pub mdat: MediaDataBox,
    pub source: Box<dyn MediaSource>,
}

impl Mp4 {
    /// Sum of every track's `mvhd.Duration / mvhd.Timescale`, i.e. the
    /// movie duration in seconds.
    pub fn duration(&self) -> f64 {
        let ts = self.moov.mvhd.timescale();
        if ts == 0 {
            0.0
        } else {
            self.moov.mvhd.duration() as f64 / ts as f64
        }
    }

    /// Total length of the header blob (`moov` + opaque top-level
    /// boxes + the `mdat` header) that precedes the media payload.
    pub fn header_len(&self) -> u64 {
        let mut len = self.moov.encoded_len();
        for b in &self.top_opaque {
            len += b.encoded_len();
        }
        len += 8; // mdat header
        len
    }

    pub fn encoded_len(&self) -> u64 {
        self.header_len() + self.mdat.content_size
    }

    pub fn encode_header_to(&self, out: &mut Vec<u8>) {
        self.moov.write_to(out);
        for b in &self.top_opaque {
            b.write_to(out);
        }
        self.mdat.write_header(out);
    }
}

struct ParsedHeader {
    moov: MovieBox,
    top_opaque: Vec<OpaqueBox>,
    mdat_content_size: u64,
    bytes_before_payload: u64,
}

fn read_header<R: Read>(reader: &mut R) -> Result<Option<(u64, FourCC)>> {
    let mut hdr = [0u8; 8];
    let mut read = 0;
    while read < 8 {
        let n = reader.read(&mut hdr[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    if read == 0 {
        return Ok(None);
    }
    if read < 8 {
        return Err(Error::TruncatedHeader);
    }
    let size = u32::from_be_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]) as u64;
    let fourcc = FourCC::from(&hdr[4..8]);
    trace!("box header {} size {}", fourcc, size);
    Ok(Some((size, fourcc)))
}

fn read_exact_vec<R: Read>(reader: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedHeader
        } else {
            Error::Io(e)
        }
    })?;
    Ok(buf)
}

/// Read top-level boxes up to and including the `mdat` header, leaving
/// `reader` positioned at the start of the `mdat` payload.
fn read_top_level<R: Read>(reader: &mut R) -> Result<ParsedHeader> {
    let mut moov = None;
    let mut top_opaque = Vec::new();
    let mut pos: u64 = 0;

    loop {
        let (size, fourcc) = match read_header(reader)? {
            Some(h) => h,
            None => break,
        };
        if size < 8 {
            return Err(Error::TruncatedHeader);
        }
        let body_len = (size - 8) as usize;
        pos += size;

        if fourcc == &b"moov"[..] {
            let body = read_exact_vec(reader, body_len)?;
            moov = Some(MovieBox::parse(&body)?);
            debug!("parsed moov, {} byte(s)", body_len);
        } else if fourcc == &b"mdat"[..] {
            debug!(
                "found mdat at offset {}, {} byte(s) payload",
                pos - size,
                body_len
            );
            return Ok(ParsedHeader {
                moov: moov.ok_or(Error::TruncatedHeader)?,
                top_opaque,
                mdat_content_size: body_len as u64,
                bytes_before_payload: pos,
            });
        } else {
            let body = read_exact_vec(reader, body_len)?;
            debug!("kept opaque top-level box {}, {} byte(s)", fourcc, body_len);
            top_opaque.push(OpaqueBox::new(fourcc, body));
        }
    }

    Err(Error::TruncatedHeader)
}

/// Decode a full MP4 from a seekable source, giving the resulting
/// `Mp4` genuine random access to its media payload.
pub fn decode<R: Read + Seek + 'static>(mut reader: R) -> Result<Mp4> {
    let parsed = read_top_level(&mut reader)?;
    debug!(
        "decoded header ({} byte(s)), {} track(s), seekable source",
        parsed.bytes_before_payload,
        parsed.moov.traks.len()
    );
    let source = SeekMediaSource::new(reader, parsed.bytes_before_payload, parsed.mdat_content_size);
    Ok(Mp4 {
        moov: parsed.moov,
        top_opaque: parsed.top_opaque,
        mdat: MediaDataBox {
            content_size: parsed.mdat_content_size,
        },
        source: Box::new(source),
    })
}

/// Decode a full MP4 from a forward-only source. Later chunk copies
/// against the resulting `Mp4` must proceed in ascending offset order;
/// the clip transform guarantees this by construction.
pub fn decode_sequential<R: Read + 'static>(mut reader: R) -> Result<Mp4> {
    let parsed = read_top_level(&mut reader)?;
    debug!(
        "decoded header ({} byte(s)), {} track(s), sequential source",
        parsed.bytes_before_payload,
        parsed.moov.traks.len()
    );
    let source = SequentialMediaSource::new(reader, parsed.mdat_content_size);
    Ok(Mp4 {
        moov: parsed.moov,
        top_opaque: parsed.top_opaque,
        mdat: MediaDataBox {
            content_size: parsed.mdat_content_size,
        },
        source: Box::new(source),
    })
}
