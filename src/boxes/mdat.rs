use crate::bytesio::BoxHeader;
use crate::fourcc::FourCC;

/// The `mdat` box header. The payload itself is never buffered here —
/// it lives behind a `crate::model::MediaSource` and is streamed out
/// separately by the clip output stage.
#[derive(Debug, Clone, Copy)]
pub struct MediaDataBox {
    pub content_size: u64,
}

impl MediaDataBox {
    pub fn encoded_len(&self) -> u64 {
        8 + self.content_size
    }

    pub fn write_header(&self, out: &mut Vec<u8>) {
        BoxHeader::write(out, self.encoded_len(), FourCC::new("mdat"));
    }
}
