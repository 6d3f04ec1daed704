use crate::boxes::header::MovieHeaderBox;
use crate::boxes::opaque::OpaqueBox;
use crate::boxes::trak::TrackBox;
use crate::bytesio::{BoxHeader, Cursor};
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// `moov`: movie header plus every track.
#[derive(Debug, Clone)]
pub struct MovieBox {
    pub mvhd: MovieHeaderBox,
    pub traks: Vec<TrackBox>,
    pub opaque: Vec<OpaqueBox>,
}

impl MovieBox {
    pub fn parse(payload: &[u8]) -> Result<MovieBox> {
        let mut c = Cursor::new(payload);
        let mut mvhd = None;
        let mut traks = Vec::new();
        let mut opaque = Vec::new();

        while c.left() > 0 {
            let header = BoxHeader::read(&mut c)?;
            let body_len = header.size as usize - 8;
            let body = c.read_bytes(body_len)?;

            if header.fourcc == &b"mvhd"[..] {
                mvhd = Some(MovieHeaderBox::parse(body)?);
            } else if header.fourcc == &b"trak"[..] {
                traks.push(TrackBox::parse(body)?);
            } else {
                opaque.push(OpaqueBox::new(header.fourcc, body.to_vec()));
            }
        }

        if traks.is_empty() {
            return Err(Error::TruncatedHeader);
        }

        Ok(MovieBox {
            mvhd: mvhd.ok_or(Error::TruncatedHeader)?,
            traks,
            opaque,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        let mut len = 8;
        for t in &self.traks {
            len += t.encoded_len();
        }
        for b in &self.opaque {
            len += b.encoded_len();
        }
        len += self.mvhd.encoded_len();
        len
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        BoxHeader::write(out, self.encoded_len(), FourCC::new("moov"));
        for t in &self.traks {
            t.write_to(out);
        }
        for b in &self.opaque {
            b.write_to(out);
        }
        self.mvhd.write_to(out);
    }
}
