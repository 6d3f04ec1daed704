use crate::boxes::opaque::OpaqueBox;
use crate::boxes::stbl::SampleTableBox;
use crate::bytesio::{BoxHeader, Cursor};
use crate::error::Result;
use crate::fourcc::FourCC;

/// `minf`: media information, holding the sample table plus siblings
/// (`dinf`, `vmhd`/`smhd`, ...) this crate never interprets.
#[derive(Debug, Clone, Default)]
pub struct MediaInformationBox {
    pub stbl: SampleTableBox,
    pub opaque: Vec<OpaqueBox>,
}

impl MediaInformationBox {
    pub fn parse(payload: &[u8]) -> Result<MediaInformationBox> {
        let mut c = Cursor::new(payload);
        let mut minf = MediaInformationBox::default();

        while c.left() > 0 {
            let header = BoxHeader::read(&mut c)?;
            let body_len = header.size as usize - 8;
            let body = c.read_bytes(body_len)?;

            if header.fourcc == &b"stbl"[..] {
                minf.stbl = SampleTableBox::parse(body)?;
            } else {
                minf.opaque.push(OpaqueBox::new(header.fourcc, body.to_vec()));
            }
        }

        Ok(minf)
    }

    pub fn encoded_len(&self) -> u64 {
        let mut len = 8;
        for b in &self.opaque {
            len += b.encoded_len();
        }
        len += self.stbl.encoded_len();
        len
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        BoxHeader::write(out, self.encoded_len(), FourCC::new("minf"));
        for b in &self.opaque {
            b.write_to(out);
        }
        self.stbl.write_to(out);
    }
}
