//! `mvhd`, `tkhd` and `mdhd` are kept as opaque payload blobs with a
//! pair of narrow accessors for the one or two fields the clip
//! transform actually needs: `Timescale` and `Duration`. Every other
//! field (creation/modification time, matrix, volume, track flags,
//! language, ...) passes through untouched, byte-identical to the
//! input, because this crate never interprets it.
//!
//! Layouts are ISO/IEC 14496-12's version 0 / version 1 full-box
//! shapes; version 1 widens the two time fields (and, for `mvhd` and
//! `mdhd`, `Duration`) from 32 to 64 bits.

use std::convert::TryInto;

use crate::bytesio::BoxHeader;
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

fn get_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(buf[at..at + 4].try_into().unwrap())
}

fn set_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

fn get_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_be_bytes(buf[at..at + 8].try_into().unwrap())
}

fn set_u64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_be_bytes());
}

macro_rules! def_header_box {
    ($name:ident, $fourcc:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            pub payload: Vec<u8>,
        }

        impl $name {
            pub fn parse(payload: &[u8]) -> Result<$name> {
                if payload.is_empty() {
                    return Err(Error::TruncatedHeader);
                }
                Ok($name {
                    payload: payload.to_vec(),
                })
            }

            pub fn version(&self) -> u8 {
                self.payload[0]
            }

            pub fn encoded_len(&self) -> u64 {
                8 + self.payload.len() as u64
            }

            pub fn write_to(&self, out: &mut Vec<u8>) {
                BoxHeader::write(out, self.encoded_len(), FourCC::new($fourcc));
                out.extend_from_slice(&self.payload);
            }
        }
    };
}

def_header_box!(MovieHeaderBox, "mvhd");
def_header_box!(TrackHeaderBox, "tkhd");
def_header_box!(MediaHeaderBox, "mdhd");

// mvhd: vf(4) [creation,modification](4 or 8 each) timescale(4) duration(4 or 8) ...
impl MovieHeaderBox {
    fn duration_offset(&self) -> usize {
        if self.version() == 1 {
            4 + 8 + 8 + 4
        } else {
            4 + 4 + 4 + 4
        }
    }

    fn timescale_offset(&self) -> usize {
        if self.version() == 1 {
            4 + 8 + 8
        } else {
            4 + 4 + 4
        }
    }

    pub fn timescale(&self) -> u32 {
        get_u32(&self.payload, self.timescale_offset())
    }

    pub fn duration(&self) -> u64 {
        let off = self.duration_offset();
        if self.version() == 1 {
            get_u64(&self.payload, off)
        } else {
            get_u32(&self.payload, off) as u64
        }
    }

    pub fn set_duration(&mut self, v: u64) {
        let off = self.duration_offset();
        if self.version() == 1 {
            set_u64(&mut self.payload, off, v);
        } else {
            set_u32(&mut self.payload, off, v as u32);
        }
    }
}

// tkhd: vf(4) [creation,modification](4 or 8) track_ID(4) reserved(4) duration(4 or 8) ...
impl TrackHeaderBox {
    fn duration_offset(&self) -> usize {
        if self.version() == 1 {
            4 + 8 + 8 + 4 + 4
        } else {
            4 + 4 + 4 + 4 + 4
        }
    }

    pub fn duration(&self) -> u64 {
        let off = self.duration_offset();
        if self.version() == 1 {
            get_u64(&self.payload, off)
        } else {
            get_u32(&self.payload, off) as u64
        }
    }

    pub fn set_duration(&mut self, v: u64) {
        let off = self.duration_offset();
        if self.version() == 1 {
            set_u64(&mut self.payload, off, v);
        } else {
            set_u32(&mut self.payload, off, v as u32);
        }
    }
}

// mdhd: vf(4) [creation,modification](4 or 8) timescale(4) duration(4 or 8) language(2) pre_defined(2)
impl MediaHeaderBox {
    fn timescale_offset(&self) -> usize {
        if self.version() == 1 {
            4 + 8 + 8
        } else {
            4 + 4 + 4
        }
    }

    fn duration_offset(&self) -> usize {
        self.timescale_offset() + 4
    }

    pub fn timescale(&self) -> u32 {
        get_u32(&self.payload, self.timescale_offset())
    }

    pub fn duration(&self) -> u64 {
        let off = self.duration_offset();
        if self.version() == 1 {
            get_u64(&self.payload, off)
        } else {
            get_u32(&self.payload, off) as u64
        }
    }

    pub fn set_duration(&mut self, v: u64) {
        let off = self.duration_offset();
        if self.version() == 1 {
            set_u64(&mut self.payload, off, v);
        } else {
            set_u32(&mut self.payload, off, v as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v0_mvhd() -> Vec<u8> {
        let mut p = vec![0u8; 4 + 4 + 4 + 4 + 4 + 4 + 2 + 2 + 8 + 36 + 24 + 4];
        p[0] = 0; // version
        set_u32(&mut p, 12, 90000); // timescale
        set_u32(&mut p, 16, 180000); // duration
        p
    }

    #[test]
    fn mvhd_v0_accessors() {
        let h = MovieHeaderBox::parse(&v0_mvhd()).unwrap();
        assert_eq!(h.timescale(), 90000);
        assert_eq!(h.duration(), 180000);
    }

    #[test]
    fn mvhd_v0_set_duration_roundtrip() {
        let mut h = MovieHeaderBox::parse(&v0_mvhd()).unwrap();
        h.set_duration(42);
        assert_eq!(h.duration(), 42);
        // every other byte must be untouched
        assert_eq!(h.timescale(), 90000);
    }
}
