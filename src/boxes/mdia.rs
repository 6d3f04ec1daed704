use crate::boxes::header::MediaHeaderBox;
use crate::boxes::minf::MediaInformationBox;
use crate::boxes::opaque::OpaqueBox;
use crate::bytesio::{BoxHeader, Cursor};
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// `mdia`: media header plus media information.
#[derive(Debug, Clone)]
pub struct MediaBox {
    pub mdhd: MediaHeaderBox,
    pub minf: MediaInformationBox,
    pub opaque: Vec<OpaqueBox>,
}

impl MediaBox {
    pub fn parse(payload: &[u8]) -> Result<MediaBox> {
        let mut c = Cursor::new(payload);
        let mut mdhd = None;
        let mut minf = None;
        let mut opaque = Vec::new();

        while c.left() > 0 {
            let header = BoxHeader::read(&mut c)?;
            let body_len = header.size as usize - 8;
            let body = c.read_bytes(body_len)?;

            if header.fourcc == &b"mdhd"[..] {
                mdhd = Some(MediaHeaderBox::parse(body)?);
            } else if header.fourcc == &b"minf"[..] {
                minf = Some(MediaInformationBox::parse(body)?);
            } else {
                opaque.push(OpaqueBox::new(header.fourcc, body.to_vec()));
            }
        }

        Ok(MediaBox {
            mdhd: mdhd.ok_or(Error::TruncatedHeader)?,
            minf: minf.ok_or(Error::TruncatedHeader)?,
            opaque,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        let mut len = 8;
        len += self.mdhd.encoded_len();
        for b in &self.opaque {
            len += b.encoded_len();
        }
        len += self.minf.encoded_len();
        len
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        BoxHeader::write(out, self.encoded_len(), FourCC::new("mdia"));
        self.mdhd.write_to(out);
        for b in &self.opaque {
            b.write_to(out);
        }
        self.minf.write_to(out);
    }
}
