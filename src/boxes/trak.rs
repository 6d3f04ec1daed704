use crate::boxes::header::TrackHeaderBox;
use crate::boxes::mdia::MediaBox;
use crate::boxes::opaque::OpaqueBox;
use crate::bytesio::{BoxHeader, Cursor};
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// `trak`: one track's header plus its media.
#[derive(Debug, Clone)]
pub struct TrackBox {
    pub tkhd: TrackHeaderBox,
    pub mdia: MediaBox,
    pub opaque: Vec<OpaqueBox>,
}

impl TrackBox {
    pub fn parse(payload: &[u8]) -> Result<TrackBox> {
        let mut c = Cursor::new(payload);
        let mut tkhd = None;
        let mut mdia = None;
        let mut opaque = Vec::new();

        while c.left() > 0 {
            let header = BoxHeader::read(&mut c)?;
            let body_len = header.size as usize - 8;
            let body = c.read_bytes(body_len)?;

            if header.fourcc == &b"tkhd"[..] {
                tkhd = Some(TrackHeaderBox::parse(body)?);
            } else if header.fourcc == &b"mdia"[..] {
                mdia = Some(MediaBox::parse(body)?);
            } else {
                opaque.push(OpaqueBox::new(header.fourcc, body.to_vec()));
            }
        }

        Ok(TrackBox {
            tkhd: tkhd.ok_or(Error::TruncatedHeader)?,
            mdia: mdia.ok_or(Error::TruncatedHeader)?,
            opaque,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        let mut len = 8;
        len += self.tkhd.encoded_len();
        for b in &self.opaque {
            len += b.encoded_len();
        }
        len += self.mdia.encoded_len();
        len
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        BoxHeader::write(out, self.encoded_len(), FourCC::new("trak"));
        self.tkhd.write_to(out);
        for b in &self.opaque {
            b.write_to(out);
        }
        self.mdia.write_to(out);
    }
}
