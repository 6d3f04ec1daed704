//! The sample-table boxes (`stts`, `stss`, `stsc`, `stsz`, `stco`, `ctts`)
//! and the pure query functions the clip transform runs over them.

use crate::bytesio::{put_u24, put_u32, Cursor};
use crate::error::{Error, Result};
use crate::fourcc::FourCC;

fn read_version_flags(c: &mut Cursor<'_>) -> Result<(u8, u32)> {
    let version = c.read_u8()?;
    let flags = c.read_u24()?;
    Ok((version, flags))
}

fn write_version_flags(out: &mut Vec<u8>, version: u8, flags: u32) {
    out.push(version);
    put_u24(out, flags);
}

/// `stts`: runs of consecutive samples sharing one decode-time delta.
#[derive(Debug, Clone, Default)]
pub struct TimeToSampleBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<(u32, u32)>, // (count, delta)
}

impl TimeToSampleBox {
    pub fn parse(payload: &[u8]) -> Result<TimeToSampleBox> {
        let mut c = Cursor::new(payload);
        let (version, flags) = read_version_flags(&mut c)?;
        let count = c.read_u32()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push((c.read_u32()?, c.read_u32()?));
        }
        Ok(TimeToSampleBox {
            version,
            flags,
            entries,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        8 + 4 + 4 + 8 * self.entries.len() as u64
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        crate::bytesio::BoxHeader::write(out, self.encoded_len(), FourCC::new("stts"));
        write_version_flags(out, self.version, self.flags);
        put_u32(out, self.entries.len() as u32);
        for (count, delta) in &self.entries {
            put_u32(out, *count);
            put_u32(out, *delta);
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.entries.iter().map(|(c, _)| *c as u64).sum()
    }

    /// Largest 0-based sample number whose cumulative decode time is
    /// `<= units`. Clamped at zero; never wraps.
    pub fn sample_of(&self, units: u64) -> u32 {
        let mut accumulated: u64 = 0;
        let mut run_start: u64 = 0;
        for (count, delta) in &self.entries {
            let delta = *delta as u64;
            let run_len = *count as u64 * delta;
            if delta == 0 {
                accumulated += *count as u64;
                continue;
            }
            if units < run_start + run_len {
                let into = (units - run_start) / delta;
                let sample = accumulated + into;
                return sample.saturating_sub(1) as u32;
            }
            accumulated += *count as u64;
            run_start += run_len;
        }
        self.total_samples().saturating_sub(1) as u32
    }

    /// Cumulative decode time of the 0-based sample `sample`, in this
    /// track's media ticks.
    pub fn timecode_of(&self, sample: u32) -> u64 {
        let mut remaining = sample as u64;
        let mut total: u64 = 0;
        for (count, delta) in &self.entries {
            let count = *count as u64;
            let delta = *delta as u64;
            if remaining >= count {
                total += count * delta;
                remaining -= count;
            } else {
                total += remaining * delta;
                remaining = 0;
                break;
            }
        }
        total
    }

    /// Rebuild runs as the intersection of every original run with the
    /// half-open sample range `[first, last)`, renumbered from zero.
    pub fn rebuild(&self, first: u32, last: u32) -> TimeToSampleBox {
        let (entries, _) = intersect_runs(&self.entries, first, last);
        TimeToSampleBox {
            version: self.version,
            flags: self.flags,
            entries,
        }
    }
}

/// Shared run-intersection helper for `stts`/`ctts`: clip a list of
/// `(count, value)` runs to `[first, last)`, counting samples from zero.
fn intersect_runs(runs: &[(u32, u32)], first: u32, last: u32) -> (Vec<(u32, u32)>, u64) {
    let first = first as u64;
    let last = last as u64;
    let mut sample: u64 = 0;
    let mut out = Vec::new();
    for (count, value) in runs {
        let count = *count as u64;
        if sample >= last {
            break;
        }
        let run_end = sample + count;
        if run_end > first {
            let lo = sample.max(first);
            let hi = run_end.min(last);
            if hi > lo {
                out.push(((hi - lo) as u32, *value));
            }
        }
        sample = run_end;
    }
    (out, sample)
}

/// `stss`: sorted ascending list of 1-based key-sample numbers.
#[derive(Debug, Clone, Default)]
pub struct SyncSampleBox {
    pub version: u8,
    pub flags: u32,
    pub samples: Vec<u32>,
}

impl SyncSampleBox {
    pub fn parse(payload: &[u8]) -> Result<SyncSampleBox> {
        let mut c = Cursor::new(payload);
        let (version, flags) = read_version_flags(&mut c)?;
        let count = c.read_u32()?;
        let mut samples = Vec::with_capacity(count as usize);
        for _ in 0..count {
            samples.push(c.read_u32()?);
        }
        Ok(SyncSampleBox {
            version,
            flags,
            samples,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        8 + 4 + 4 + 4 * self.samples.len() as u64
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        crate::bytesio::BoxHeader::write(out, self.encoded_len(), FourCC::new("stss"));
        write_version_flags(out, self.version, self.flags);
        put_u32(out, self.samples.len() as u32);
        for s in &self.samples {
            put_u32(out, *s);
        }
    }

    /// Largest key-sample number `<= sample+1`; falls back to the first
    /// key sample if none precedes it.
    pub fn closest_key(&self, sample: u32) -> u32 {
        let bound = sample + 1;
        let mut best = self.samples.first().copied().unwrap_or(1);
        for &s in &self.samples {
            if s <= bound {
                best = s;
            } else {
                break;
            }
        }
        best
    }

    pub fn rebuild(&self, first: u32, last: u32) -> SyncSampleBox {
        let samples = self
            .samples
            .iter()
            .filter(|&&n| n > first && n <= last)
            .map(|&n| n - first)
            .collect();
        SyncSampleBox {
            version: self.version,
            flags: self.flags,
            samples,
        }
    }
}

/// `stsc`: runs of chunks sharing one `(samplesPerChunk, sampleDescriptionIndex)`.
#[derive(Debug, Clone, Default)]
pub struct SampleToChunkBox {
    pub version: u8,
    pub flags: u32,
    /// (first_chunk, samples_per_chunk, sample_description_index), all 1-based chunks.
    pub entries: Vec<(u32, u32, u32)>,
}

impl SampleToChunkBox {
    pub fn parse(payload: &[u8]) -> Result<SampleToChunkBox> {
        let mut c = Cursor::new(payload);
        let (version, flags) = read_version_flags(&mut c)?;
        let count = c.read_u32()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push((c.read_u32()?, c.read_u32()?, c.read_u32()?));
        }
        Ok(SampleToChunkBox {
            version,
            flags,
            entries,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        8 + 4 + 4 + 12 * self.entries.len() as u64
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        crate::bytesio::BoxHeader::write(out, self.encoded_len(), FourCC::new("stsc"));
        write_version_flags(out, self.version, self.flags);
        put_u32(out, self.entries.len() as u32);
        for (first_chunk, samples_per_chunk, desc) in &self.entries {
            put_u32(out, *first_chunk);
            put_u32(out, *samples_per_chunk);
            put_u32(out, *desc);
        }
    }

    /// `samples_per_chunk` and `sample_description_index` for 1-based chunk `chunk`.
    pub fn entry_for_chunk(&self, chunk: u32) -> Option<(u32, u32)> {
        let mut found = None;
        for &(first_chunk, samples_per_chunk, desc) in &self.entries {
            if first_chunk > chunk {
                break;
            }
            found = Some((samples_per_chunk, desc));
        }
        found
    }
}

/// `stsz`: either a uniform sample size, or a per-sample size array.
#[derive(Debug, Clone, Default)]
pub struct SampleSizeBox {
    pub version: u8,
    pub flags: u32,
    pub uniform_size: u32,
    pub sizes: Vec<u32>,
}

impl SampleSizeBox {
    pub fn parse(payload: &[u8]) -> Result<SampleSizeBox> {
        let mut c = Cursor::new(payload);
        let (version, flags) = read_version_flags(&mut c)?;
        let uniform_size = c.read_u32()?;
        let count = c.read_u32()?;
        let mut sizes = Vec::new();
        if uniform_size == 0 {
            sizes.reserve(count as usize);
            for _ in 0..count {
                sizes.push(c.read_u32()?);
            }
        }
        Ok(SampleSizeBox {
            version,
            flags,
            uniform_size,
            sizes,
        })
    }

    pub fn sample_count(&self) -> u32 {
        if self.uniform_size != 0 {
            // the on-disk sample count lives separately; callers that
            // need it for a uniform table track it via the track's
            // stts total instead.
            0
        } else {
            self.sizes.len() as u32
        }
    }

    pub fn encoded_len(&self) -> u64 {
        let array_len = if self.uniform_size == 0 {
            4 * self.sizes.len() as u64
        } else {
            0
        };
        8 + 4 + 4 + 4 + array_len
    }

    fn write_with_count(&self, out: &mut Vec<u8>, count: u32) {
        crate::bytesio::BoxHeader::write(out, self.encoded_len(), FourCC::new("stsz"));
        write_version_flags(out, self.version, self.flags);
        put_u32(out, self.uniform_size);
        put_u32(out, count);
        if self.uniform_size == 0 {
            for s in &self.sizes {
                put_u32(out, *s);
            }
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let count = self.sample_count();
        self.write_with_count(out, count);
    }

    pub fn size_of(&self, sample: u32) -> u32 {
        if self.uniform_size != 0 {
            self.uniform_size
        } else {
            self.sizes.get(sample as usize).copied().unwrap_or(0)
        }
    }

    /// Rebuild for the retained range `[first, last)`, carrying the
    /// original per-sample sizes forward as the narrowed slice.
    pub fn rebuild(&self, first: u32, last: u32) -> SampleSizeBox {
        if self.uniform_size != 0 {
            SampleSizeBox {
                version: self.version,
                flags: self.flags,
                uniform_size: self.uniform_size,
                sizes: Vec::new(),
            }
        } else {
            let lo = first as usize;
            let hi = (last as usize).min(self.sizes.len());
            let sizes = if lo < hi {
                self.sizes[lo..hi].to_vec()
            } else {
                Vec::new()
            };
            SampleSizeBox {
                version: self.version,
                flags: self.flags,
                uniform_size: 0,
                sizes,
            }
        }
    }
}

/// `stco`: absolute chunk byte offsets (32-bit only; `co64` is out of scope).
#[derive(Debug, Clone, Default)]
pub struct ChunkOffsetBox {
    pub version: u8,
    pub flags: u32,
    pub offsets: Vec<u32>,
}

impl ChunkOffsetBox {
    pub fn parse(payload: &[u8]) -> Result<ChunkOffsetBox> {
        let mut c = Cursor::new(payload);
        let (version, flags) = read_version_flags(&mut c)?;
        let count = c.read_u32()?;
        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            offsets.push(c.read_u32()?);
        }
        Ok(ChunkOffsetBox {
            version,
            flags,
            offsets,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        8 + 4 + 4 + 4 * self.offsets.len() as u64
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        crate::bytesio::BoxHeader::write(out, self.encoded_len(), FourCC::new("stco"));
        write_version_flags(out, self.version, self.flags);
        put_u32(out, self.offsets.len() as u32);
        for o in &self.offsets {
            put_u32(out, *o);
        }
    }
}

/// `ctts`: composition-time offsets, same run-length shape as `stts`.
#[derive(Debug, Clone, Default)]
pub struct CompositionOffsetBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<(u32, i32)>, // (count, offset); unsigned for version 0 but stored widened
}

impl CompositionOffsetBox {
    pub fn parse(payload: &[u8]) -> Result<CompositionOffsetBox> {
        let mut c = Cursor::new(payload);
        let (version, flags) = read_version_flags(&mut c)?;
        let count = c.read_u32()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let count = c.read_u32()?;
            let offset = c.read_u32()? as i32;
            entries.push((count, offset));
        }
        Ok(CompositionOffsetBox {
            version,
            flags,
            entries,
        })
    }

    pub fn encoded_len(&self) -> u64 {
        8 + 4 + 4 + 8 * self.entries.len() as u64
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        crate::bytesio::BoxHeader::write(out, self.encoded_len(), FourCC::new("ctts"));
        write_version_flags(out, self.version, self.flags);
        put_u32(out, self.entries.len() as u32);
        for (count, offset) in &self.entries {
            put_u32(out, *count);
            put_u32(out, *offset as u32);
        }
    }

    pub fn rebuild(&self, first: u32, last: u32) -> CompositionOffsetBox {
        let raw: Vec<(u32, u32)> = self
            .entries
            .iter()
            .map(|(c, o)| (*c, *o as u32))
            .collect();
        let (runs, _) = intersect_runs(&raw, first, last);
        let entries = runs.into_iter().map(|(c, o)| (c, o as i32)).collect();
        CompositionOffsetBox {
            version: self.version,
            flags: self.flags,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stts(runs: &[(u32, u32)]) -> TimeToSampleBox {
        TimeToSampleBox {
            version: 0,
            flags: 0,
            entries: runs.to_vec(),
        }
    }

    #[test]
    fn sample_of_and_timecode_of_roundtrip() {
        // 30000/1001 fps: stss = {1, 31, 61, 91}, begin = 1.5s.
        let t = stts(&[(120, 1001)]);
        let units = (1.5_f64 * 30000.0).floor() as u64; // 45000
        let fs = t.sample_of(units);
        assert_eq!(fs, 43);

        let stss = SyncSampleBox {
            version: 0,
            flags: 0,
            samples: vec![1, 31, 61, 91],
        };
        let ks = stss.closest_key(fs);
        assert_eq!(ks, 31);

        let tc = t.timecode_of(ks);
        assert_eq!(tc, 31 * 1001);
        let begin = tc as f64 / 30000.0;
        assert!((begin - 1.034366).abs() < 1e-5);
    }

    #[test]
    fn sample_of_zero_clamped() {
        let t = stts(&[(10, 1001)]);
        assert_eq!(t.sample_of(0), 0);
    }

    #[test]
    fn stts_rebuild_intersects_runs() {
        let t = stts(&[(10, 100), (10, 200), (10, 100)]);
        // retain samples [12, 22) -> spans end of first run, all of
        // second partially, none of third
        let r = t.rebuild(12, 22);
        assert_eq!(r.entries, vec![(8, 100), (2, 200)]);
    }

    #[test]
    fn stss_rebuild_renumbers() {
        let s = SyncSampleBox {
            version: 0,
            flags: 0,
            samples: vec![1, 31, 61, 91],
        };
        let r = s.rebuild(30, 90);
        assert_eq!(r.samples, vec![1, 31]);
    }

    #[test]
    fn stsc_entry_for_chunk_picks_latest_applicable_run() {
        let s = SampleToChunkBox {
            version: 0,
            flags: 0,
            entries: vec![(1, 5, 1), (3, 2, 1)],
        };
        assert_eq!(s.entry_for_chunk(1), Some((5, 1)));
        assert_eq!(s.entry_for_chunk(2), Some((5, 1)));
        assert_eq!(s.entry_for_chunk(3), Some((2, 1)));
        assert_eq!(s.entry_for_chunk(10), Some((2, 1)));
    }
}
