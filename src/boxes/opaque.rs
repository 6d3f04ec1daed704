use crate::bytesio::BoxHeader;
use crate::fourcc::FourCC;

/// A box this crate does not interpret: kept verbatim so it can be
/// re-emitted byte-for-byte between the boxes it actually understands.
#[derive(Debug, Clone)]
pub struct OpaqueBox {
    pub fourcc: FourCC,
    pub payload: Vec<u8>,
}

impl OpaqueBox {
    pub fn new(fourcc: FourCC, payload: Vec<u8>) -> OpaqueBox {
        OpaqueBox { fourcc, payload }
    }

    pub fn encoded_len(&self) -> u64 {
        8 + self.payload.len() as u64
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        BoxHeader::write(out, self.encoded_len(), self.fourcc);
        out.extend_from_slice(&self.payload);
    }
}
