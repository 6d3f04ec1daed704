//! The clip transform (Component D): mutates a parsed `Mp4`'s sample
//! tables in place to retain only `[begin, begin+duration)` and builds
//! the list of source byte ranges the output stage needs to copy.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::model::Mp4;

/// One contiguous run of bytes to copy from the original `mdat`
/// payload into the clipped output, already translated to its new
/// absolute position in the output file.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanEntry {
    pub old_offset: u64,
    pub new_offset: u64,
    pub size: u64,
}

struct TrackState {
    current_chunk: usize,
    current_sample: u32,
    first_sample: u32,
    finished: bool,
}

fn seconds_to_units(seconds: f64, timescale: u32) -> u64 {
    (seconds * timescale as f64).floor().max(0.0) as u64
}

/// Run the clip transform described by this crate's design: snap
/// `begin` to a key sample, rewrite every track's sample tables to
/// cover only the retained window, and return the plan of source byte
/// ranges the output stage must copy, in final output order.
pub fn clip(mp4: &mut Mp4, begin: f64, duration: f64) -> Result<Vec<ChunkPlanEntry>> {
    if begin < 0.0 || begin > mp4.duration() {
        return Err(Error::ClipOutside);
    }
    if duration < 0.0 {
        return Err(Error::InvalidDuration);
    }
    let mut end = begin + duration;
    if end > mp4.duration() {
        end = mp4.duration();
    }
    if end < 0.0 {
        return Err(Error::ClipOutside);
    }
    let mut begin = begin;
    debug!("clip requested: begin {:.3}s end {:.3}s", begin, end);

    // Step 1: snap begin to a key sample, track by track.
    for trak in &mp4.moov.traks {
        let stbl = &trak.mdia.minf.stbl;
        if let Some(stss) = &stbl.stss {
            let timescale = trak.mdia.mdhd.timescale();
            let fs = stbl.stts.sample_of(seconds_to_units(begin, timescale));
            let ks = stss.closest_key(fs);
            let tc = stbl.stts.timecode_of(ks);
            let snapped = if timescale == 0 {
                0.0
            } else {
                tc as f64 / timescale as f64
            };
            trace!("snapped begin {:.3}s -> {:.3}s (key sample {})", begin, snapped, ks);
            begin = snapped;
        }
    }

    // Step 2: movie duration.
    let mvhd_timescale = mp4.moov.mvhd.timescale();
    let whole_seconds = (end - begin).floor().max(0.0) as u64;
    mp4.moov
        .mvhd
        .set_duration(whole_seconds * mvhd_timescale as u64);
    debug!("snapped begin {:.3}s, movie duration set to {}s", begin, whole_seconds);

    let n = mp4.moov.traks.len();

    // Step 3 + 4: per-track first/last sample and starting chunk.
    let mut states = Vec::with_capacity(n);
    for trak in &mp4.moov.traks {
        let stbl = &trak.mdia.minf.stbl;
        let timescale = trak.mdia.mdhd.timescale();
        let first_sample = stbl.stts.sample_of(seconds_to_units(begin, timescale));
        let last_sample = stbl.stts.sample_of(seconds_to_units(end, timescale));

        let total_chunks = stbl.stco.offsets.len();
        let mut current_sample: u32 = 0;
        let mut found: Option<(usize, u32)> = None;
        for i in 0..total_chunks {
            let chunk_num = (i + 1) as u32;
            let (samples_per_chunk, _desc) = stbl.stsc.entry_for_chunk(chunk_num).unwrap_or((0, 0));
            let chunk_first_sample = current_sample;
            current_sample += samples_per_chunk;
            let chunk_last_sample = current_sample.saturating_sub(1);
            if current_sample == 0 || chunk_last_sample < first_sample || chunk_first_sample > last_sample {
                continue;
            }
            found = Some((i, chunk_first_sample));
            break;
        }

        match found {
            Some((i, fs)) => {
                trace!(
                    "track: first_sample {} last_sample {} starting chunk {} of {}",
                    first_sample, last_sample, i, total_chunks
                );
                // If the starting chunk is already the track's last chunk,
                // it is marked finished here, before the merge loop (step
                // 5) ever runs for this track — so that chunk is never
                // copied and the track ends up with zero retained samples.
                // This is the literal behavior of the algorithm this is
                // grounded on (clip.go's identical pre-merge-loop
                // `cti.currentChunk == len(stco.ChunkOffset)-1` check) and
                // is not reconciled into copying the starting chunk itself.
                states.push(TrackState {
                    current_chunk: i,
                    current_sample: fs,
                    first_sample: fs,
                    finished: i + 1 >= total_chunks,
                });
            }
            None => {
                debug!(
                    "track: no chunk intersects [{}, {}], keeping it empty",
                    first_sample, last_sample
                );
                states.push(TrackState {
                    current_chunk: total_chunks,
                    current_sample: 0,
                    first_sample: 0,
                    finished: true,
                });
            }
        }
    }

    // Step 5: merge chunks across tracks in file-offset order.
    let mut new_stco: Vec<Vec<u64>> = vec![Vec::new(); n];
    let mut new_stsc: Vec<Vec<(u32, u32, u32)>> = vec![Vec::new(); n];
    let mut last_samples_per_chunk = vec![0u32; n];
    let mut last_desc = vec![0u32; n];
    let mut chunk_counter = vec![0u32; n];
    let mut current_output_offset: u64 = 0;
    let mut raw_plan: Vec<(u64, u64)> = Vec::new(); // (old_offset, size), in emit order

    loop {
        let mut best: Option<(usize, u64)> = None;
        for (t, st) in states.iter().enumerate() {
            if st.finished {
                continue;
            }
            let off = mp4.moov.traks[t].mdia.minf.stbl.stco.offsets[st.current_chunk] as u64;
            if best.map_or(true, |(_, bv)| off < bv) {
                best = Some((t, off));
            }
        }
        let (t, old_offset) = match best {
            Some(x) => x,
            None => break,
        };

        let stbl = &mp4.moov.traks[t].mdia.minf.stbl;
        let chunk_idx = states[t].current_chunk;
        let chunk_num = (chunk_idx + 1) as u32;
        let (samples_per_chunk, desc) = stbl.stsc.entry_for_chunk(chunk_num).unwrap_or((0, 0));

        let mut size: u64 = 0;
        for s in 0..samples_per_chunk {
            size += stbl.stsz.size_of(states[t].current_sample + s) as u64;
        }

        new_stco[t].push(current_output_offset);
        raw_plan.push((old_offset, size));
        current_output_offset += size;

        chunk_counter[t] += 1;
        if samples_per_chunk != last_samples_per_chunk[t] || desc != last_desc[t] {
            new_stsc[t].push((chunk_counter[t], samples_per_chunk, desc));
            last_samples_per_chunk[t] = samples_per_chunk;
            last_desc[t] = desc;
        }

        trace!(
            "merged track {} chunk {} ({} byte(s) at old offset {})",
            t, chunk_num, size, old_offset
        );

        let st = &mut states[t];
        st.current_sample += samples_per_chunk;
        st.current_chunk += 1;
        if st.current_chunk >= stbl.stco.offsets.len() {
            st.finished = true;
        }
    }

    // Step 6: rewrite per-track tables against the pre-mutation stts.
    for (t, trak) in mp4.moov.traks.iter_mut().enumerate() {
        let first_sample = states[t].first_sample;
        let current_sample = states[t].current_sample;
        let stbl = &mut trak.mdia.minf.stbl;
        let timescale = trak.mdia.mdhd.timescale();

        let start_tc = stbl.stts.timecode_of(first_sample);
        let end_tc = stbl.stts.timecode_of(current_sample);
        let media_duration = end_tc.saturating_sub(start_tc);

        trak.tkhd.set_duration(if timescale == 0 {
            0
        } else {
            (media_duration / timescale as u64) * mvhd_timescale as u64
        });
        trak.mdia.mdhd.set_duration(media_duration);

        stbl.stts = stbl.stts.rebuild(first_sample, current_sample);
        if let Some(stss) = &stbl.stss {
            stbl.stss = Some(stss.rebuild(first_sample, current_sample));
        }
        stbl.stsz = stbl.stsz.rebuild(first_sample, current_sample);
        if let Some(ctts) = &stbl.ctts {
            stbl.ctts = Some(ctts.rebuild(first_sample, current_sample));
        }
        debug!(
            "track {} rewritten: samples [{}, {}), media_duration {}",
            t, first_sample, current_sample, media_duration
        );
    }

    // Step 7: commit new stsc/stco (offsets still relative; +H happens in step 8).
    for (t, trak) in mp4.moov.traks.iter_mut().enumerate() {
        let stbl = &mut trak.mdia.minf.stbl;
        stbl.stsc.entries = std::mem::take(&mut new_stsc[t]);
        stbl.stco.offsets = new_stco[t].iter().map(|&o| o as u32).collect();
    }

    // Step 8: assign absolute offsets.
    let h = mp4.header_len();
    for trak in &mut mp4.moov.traks {
        for o in &mut trak.mdia.minf.stbl.stco.offsets {
            *o = (*o as u64 + h) as u32;
        }
    }

    // Step 9: coalesce adjacent plan entries and assign new_offset.
    let mut chunks = Vec::new();
    let mut i = 0;
    while i < raw_plan.len() {
        let (old_offset, mut size) = raw_plan[i];
        let mut j = i + 1;
        while j < raw_plan.len() && raw_plan[j - 1].0 + raw_plan[j - 1].1 == raw_plan[j].0 {
            size += raw_plan[j].1;
            j += 1;
        }
        chunks.push((old_offset, size));
        i = j;
    }

    let mut plan = Vec::with_capacity(chunks.len());
    let mut running = h;
    for (old_offset, size) in chunks {
        plan.push(ChunkPlanEntry {
            old_offset,
            new_offset: running,
            size,
        });
        running += size;
    }

    mp4.mdat.content_size = plan.iter().map(|c| c.size).sum();
    debug!(
        "chunk plan: {} range(s), {} byte(s) of payload retained",
        plan.len(),
        mp4.mdat.content_size
    );

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::header::{MediaHeaderBox, MovieHeaderBox, TrackHeaderBox};
    use crate::boxes::mdat::MediaDataBox;
    use crate::boxes::mdia::MediaBox;
    use crate::boxes::minf::MediaInformationBox;
    use crate::boxes::moov::MovieBox;
    use crate::boxes::stbl::SampleTableBox;
    use crate::boxes::trak::TrackBox;
    use crate::model::SeekMediaSource;
    use crate::sampletable::{ChunkOffsetBox, SampleSizeBox, SampleToChunkBox, TimeToSampleBox};
    use std::io::Cursor;

    fn mvhd(timescale: u32, duration: u32) -> MovieHeaderBox {
        let mut p = vec![0u8; 100];
        p[12..16].copy_from_slice(&timescale.to_be_bytes());
        p[16..20].copy_from_slice(&duration.to_be_bytes());
        MovieHeaderBox::parse(&p).unwrap()
    }

    fn tkhd(duration: u32) -> TrackHeaderBox {
        let mut p = vec![0u8; 84];
        p[20..24].copy_from_slice(&duration.to_be_bytes());
        TrackHeaderBox::parse(&p).unwrap()
    }

    fn mdhd(timescale: u32, duration: u32) -> MediaHeaderBox {
        let mut p = vec![0u8; 24];
        p[12..16].copy_from_slice(&timescale.to_be_bytes());
        p[16..20].copy_from_slice(&duration.to_be_bytes());
        MediaHeaderBox::parse(&p).unwrap()
    }

    /// A single-track, 5-chunk, uniform-size audio-like file: 1024
    /// samples per chunk, sample size 4, timescale 44100.
    fn audio_track_mp4() -> Mp4 {
        let stts = TimeToSampleBox {
            version: 0,
            flags: 0,
            entries: vec![(5120, 1)],
        };
        let stsc = SampleToChunkBox {
            version: 0,
            flags: 0,
            entries: vec![(1, 1024, 1)],
        };
        let stsz = SampleSizeBox {
            version: 0,
            flags: 0,
            uniform_size: 4,
            sizes: vec![],
        };
        let base = 1000u32;
        let stco = ChunkOffsetBox {
            version: 0,
            flags: 0,
            offsets: vec![base, base + 4096, base + 8192, base + 12288, base + 16384],
        };
        let stbl = SampleTableBox {
            stts,
            stss: None,
            stsc,
            stsz,
            stco,
            ctts: None,
            opaque: vec![],
        };
        let minf = MediaInformationBox {
            stbl,
            opaque: vec![],
        };
        let mdia = MediaBox {
            mdhd: mdhd(44100, 5120),
            minf,
            opaque: vec![],
        };
        let trak = TrackBox {
            tkhd: tkhd(5120),
            mdia,
            opaque: vec![],
        };
        let moov = MovieBox {
            mvhd: mvhd(44100, 5120),
            traks: vec![trak],
            opaque: vec![],
        };
        let data = vec![0xABu8; 20480];
        Mp4 {
            moov,
            top_opaque: vec![],
            mdat: MediaDataBox { content_size: 20480 },
            source: Box::new(SeekMediaSource::new(Cursor::new(data), base as u64, 20480)),
        }
    }

    /// A single-track, single-chunk audio-like file: every sample lives
    /// in the track's one and only chunk.
    fn single_chunk_audio_mp4() -> Mp4 {
        let stts = TimeToSampleBox {
            version: 0,
            flags: 0,
            entries: vec![(1024, 1)],
        };
        let stsc = SampleToChunkBox {
            version: 0,
            flags: 0,
            entries: vec![(1, 1024, 1)],
        };
        let stsz = SampleSizeBox {
            version: 0,
            flags: 0,
            uniform_size: 4,
            sizes: vec![],
        };
        let base = 1000u32;
        let stco = ChunkOffsetBox {
            version: 0,
            flags: 0,
            offsets: vec![base],
        };
        let stbl = SampleTableBox {
            stts,
            stss: None,
            stsc,
            stsz,
            stco,
            ctts: None,
            opaque: vec![],
        };
        let minf = MediaInformationBox {
            stbl,
            opaque: vec![],
        };
        let mdia = MediaBox {
            mdhd: mdhd(44100, 1024),
            minf,
            opaque: vec![],
        };
        let trak = TrackBox {
            tkhd: tkhd(1024),
            mdia,
            opaque: vec![],
        };
        let moov = MovieBox {
            mvhd: mvhd(44100, 1024),
            traks: vec![trak],
            opaque: vec![],
        };
        let data = vec![0xABu8; 4096];
        Mp4 {
            moov,
            top_opaque: vec![],
            mdat: MediaDataBox { content_size: 4096 },
            source: Box::new(SeekMediaSource::new(Cursor::new(data), base as u64, 4096)),
        }
    }

    #[test]
    fn clip_from_start_runs_to_track_end() {
        // The merge phase (step 5) only uses `lastSample` to pick a
        // starting chunk (step 4); once started it always runs to the
        // end of the track, so a short duration still retains every
        // chunk here.
        let mut mp4 = audio_track_mp4();
        let plan = clip(&mut mp4, 0.0, 0.046).unwrap();
        let stbl = &mp4.moov.traks[0].mdia.minf.stbl;
        assert_eq!(stbl.stco.offsets.len(), 5);
        assert_eq!(stbl.stts.entries, vec![(5120, 1)]);
        assert_eq!(plan.len(), 1); // all five source chunks are contiguous and coalesce
        assert_eq!(plan[0].size, 5120 * 4);
        assert_eq!(mp4.moov.mvhd.duration(), 0); // floor(0.046)*44100
    }

    #[test]
    fn clip_outside_rejected() {
        let mut mp4 = audio_track_mp4();
        assert!(matches!(clip(&mut mp4, -1.0, 1.0), Err(Error::ClipOutside)));
    }

    #[test]
    fn invalid_duration_rejected() {
        let mut mp4 = audio_track_mp4();
        assert!(matches!(
            clip(&mut mp4, 0.0, -1.0),
            Err(Error::InvalidDuration)
        ));
    }

    #[test]
    fn full_span_clip_is_idempotent_in_sample_count() {
        let mut mp4 = audio_track_mp4();
        let total = mp4.duration();
        clip(&mut mp4, 0.0, total).unwrap();
        let stbl = &mp4.moov.traks[0].mdia.minf.stbl;
        assert_eq!(stbl.stco.offsets.len(), 5);
        assert_eq!(stbl.stsz.sizes.len(), 0); // uniform size table unchanged
    }

    #[test]
    fn single_chunk_track_loses_its_samples_on_full_span_clip() {
        // A single-chunk track's one chunk is also its last chunk, so
        // step 4 marks it finished before the merge loop (step 5) ever
        // runs for it: the chunk is never copied, and the track ends up
        // with zero retained samples even on a full-span clip. This
        // mirrors clip.go exactly (see the comment in `clip` above) and
        // is not a bug introduced here.
        let mut mp4 = single_chunk_audio_mp4();
        let total = mp4.duration();
        let plan = clip(&mut mp4, 0.0, total).unwrap();
        let stbl = &mp4.moov.traks[0].mdia.minf.stbl;
        assert_eq!(plan.len(), 0);
        assert_eq!(stbl.stco.offsets.len(), 0);
        assert_eq!(stbl.stts.total_samples(), 0);
    }
}
