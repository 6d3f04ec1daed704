use crate::boxes::opaque::OpaqueBox;
use crate::bytesio::{BoxHeader, Cursor};
use crate::error::Result;
use crate::fourcc::FourCC;
use crate::sampletable::{
    ChunkOffsetBox, CompositionOffsetBox, SampleSizeBox, SampleToChunkBox, SyncSampleBox,
    TimeToSampleBox,
};

/// The sample table: every box the clip transform reads and rewrites.
#[derive(Debug, Clone, Default)]
pub struct SampleTableBox {
    pub stts: TimeToSampleBox,
    pub stss: Option<SyncSampleBox>,
    pub stsc: SampleToChunkBox,
    pub stsz: SampleSizeBox,
    pub stco: ChunkOffsetBox,
    pub ctts: Option<CompositionOffsetBox>,
    pub opaque: Vec<OpaqueBox>,
}

impl SampleTableBox {
    pub fn parse(payload: &[u8]) -> Result<SampleTableBox> {
        let mut c = Cursor::new(payload);
        let mut table = SampleTableBox::default();

        while c.left() > 0 {
            let header = BoxHeader::read(&mut c)?;
            let body_len = header.size as usize - 8;
            let body = c.read_bytes(body_len)?;

            if header.fourcc == &b"stts"[..] {
                table.stts = TimeToSampleBox::parse(body)?;
            } else if header.fourcc == &b"stss"[..] {
                table.stss = Some(SyncSampleBox::parse(body)?);
            } else if header.fourcc == &b"stsc"[..] {
                table.stsc = SampleToChunkBox::parse(body)?;
            } else if header.fourcc == &b"stsz"[..] {
                table.stsz = SampleSizeBox::parse(body)?;
            } else if header.fourcc == &b"stco"[..] {
                table.stco = ChunkOffsetBox::parse(body)?;
            } else if header.fourcc == &b"ctts"[..] {
                table.ctts = Some(CompositionOffsetBox::parse(body)?);
            } else {
                table.opaque.push(OpaqueBox::new(header.fourcc, body.to_vec()));
            }
        }

        Ok(table)
    }

    pub fn encoded_len(&self) -> u64 {
        let mut len = 8;
        len += self.stts.encoded_len();
        if let Some(stss) = &self.stss {
            len += stss.encoded_len();
        }
        len += self.stsc.encoded_len();
        len += self.stsz.encoded_len();
        len += self.stco.encoded_len();
        for b in &self.opaque {
            len += b.encoded_len();
        }
        if let Some(ctts) = &self.ctts {
            len += ctts.encoded_len();
        }
        len
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        BoxHeader::write(out, self.encoded_len(), FourCC::new("stbl"));
        self.stts.write_to(out);
        if let Some(stss) = &self.stss {
            stss.write_to(out);
        }
        self.stsc.write_to(out);
        self.stsz.write_to(out);
        self.stco.write_to(out);
        for b in &self.opaque {
            b.write_to(out);
        }
        if let Some(ctts) = &self.ctts {
            ctts.write_to(out);
        }
    }
}
