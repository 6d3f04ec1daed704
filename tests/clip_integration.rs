use std::io::Cursor;

use mp4clip::boxes::header::{MediaHeaderBox, MovieHeaderBox, TrackHeaderBox};
use mp4clip::boxes::mdat::MediaDataBox;
use mp4clip::boxes::mdia::MediaBox;
use mp4clip::boxes::minf::MediaInformationBox;
use mp4clip::boxes::moov::MovieBox;
use mp4clip::boxes::opaque::OpaqueBox;
use mp4clip::boxes::stbl::SampleTableBox;
use mp4clip::boxes::trak::TrackBox;
use mp4clip::fourcc::FourCC;
use mp4clip::sampletable::{ChunkOffsetBox, SampleSizeBox, SampleToChunkBox, SyncSampleBox, TimeToSampleBox};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mvhd_bytes(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = vec![0u8; 100];
    p[12..16].copy_from_slice(&timescale.to_be_bytes());
    p[16..20].copy_from_slice(&duration.to_be_bytes());
    p
}

fn tkhd_bytes(duration: u32) -> Vec<u8> {
    let mut p = vec![0u8; 84];
    p[20..24].copy_from_slice(&duration.to_be_bytes());
    p
}

fn mdhd_bytes(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = vec![0u8; 24];
    p[12..16].copy_from_slice(&timescale.to_be_bytes());
    p[16..20].copy_from_slice(&duration.to_be_bytes());
    p
}

/// One video track: 120 samples at 30000/1001 fps, one sample per
/// chunk, 10-byte uniform samples, key samples at {1, 31, 61, 91}.
fn build_video_file(sample_bytes: &[u8; 10]) -> (Vec<u8>, u64) {
    const SAMPLES: u32 = 120;
    const DELTA: u32 = 1001;
    const TIMESCALE: u32 = 30000;
    const SAMPLE_SIZE: u32 = 10;

    let total_ticks = SAMPLES as u64 * DELTA as u64;

    let stts = TimeToSampleBox {
        version: 0,
        flags: 0,
        entries: vec![(SAMPLES, DELTA)],
    };
    let stss = SyncSampleBox {
        version: 0,
        flags: 0,
        samples: vec![1, 31, 61, 91],
    };
    let stsc = SampleToChunkBox {
        version: 0,
        flags: 0,
        entries: vec![(1, 1, 1)],
    };
    let stsz = SampleSizeBox {
        version: 0,
        flags: 0,
        uniform_size: 0,
        sizes: vec![SAMPLE_SIZE; SAMPLES as usize],
    };

    // Chunk offsets are assigned once we know where mdat starts; build
    // the header with placeholder offsets first to learn its size.
    let stco_placeholder = ChunkOffsetBox {
        version: 0,
        flags: 0,
        offsets: vec![0; SAMPLES as usize],
    };

    let stbl = SampleTableBox {
        stts: stts.clone(),
        stss: Some(stss.clone()),
        stsc: stsc.clone(),
        stsz: stsz.clone(),
        stco: stco_placeholder,
        ctts: None,
        opaque: vec![],
    };
    let minf = MediaInformationBox {
        stbl,
        opaque: vec![],
    };
    let mdia = MediaBox {
        mdhd: MediaHeaderBox::parse(&mdhd_bytes(TIMESCALE, total_ticks as u32)).unwrap(),
        minf,
        opaque: vec![],
    };
    let trak = TrackBox {
        tkhd: TrackHeaderBox::parse(&tkhd_bytes(total_ticks as u32)).unwrap(),
        mdia,
        opaque: vec![],
    };
    let moov = MovieBox {
        mvhd: MovieHeaderBox::parse(&mvhd_bytes(TIMESCALE, total_ticks as u32)).unwrap(),
        traks: vec![trak],
        opaque: vec![],
    };

    let ftyp = OpaqueBox::new(FourCC::new("ftyp"), b"isom\0\0\x02\0isomiso2avc1mp41".to_vec());

    let header_len = ftyp.encoded_len() + moov.encoded_len() + 8; // + mdat header
    let mdat_content = SAMPLES as u64 * SAMPLE_SIZE as u64;

    // Now assign real chunk offsets and rebuild the moov with them.
    let offsets: Vec<u32> = (0..SAMPLES)
        .map(|i| header_len as u32 + i * SAMPLE_SIZE)
        .collect();
    let mut moov = moov;
    moov.traks[0].mdia.minf.stbl.stco = ChunkOffsetBox {
        version: 0,
        flags: 0,
        offsets,
    };

    let mut out = Vec::new();
    out.extend_from_slice(&(8u32 + ftyp.payload.len() as u32).to_be_bytes());
    out.extend_from_slice(b"ftyp");
    out.extend_from_slice(&ftyp.payload);

    moov.write_to(&mut out);

    let mdat = MediaDataBox {
        content_size: mdat_content,
    };
    mdat.write_header(&mut out);
    for i in 0..SAMPLES {
        let mut s = *sample_bytes;
        s[0] = (i % 256) as u8;
        out.extend_from_slice(&s);
    }

    assert_eq!(out.len() as u64, header_len + mdat_content);
    (out, header_len)
}

#[test]
fn decode_roundtrips_sizes() {
    init_logging();
    let (bytes, header_len) = build_video_file(&[0xAB; 10]);
    let mp4 = mp4clip::decode(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(mp4.header_len(), header_len);
    assert_eq!(mp4.encoded_len(), bytes.len() as u64);

    let mut out = Vec::new();
    mp4.encode_header_to(&mut out);
    assert_eq!(out, bytes[..header_len as usize]);
}

#[test]
fn clip_retains_key_sample_at_start_and_tail_of_track() {
    init_logging();
    let (bytes, _header_len) = build_video_file(&[0xCD; 10]);
    let mp4 = mp4clip::decode(Cursor::new(bytes)).unwrap();
    let total_duration = mp4.duration();

    let mut stream = mp4.clip(1.5, 1.0).unwrap();
    stream.filter().unwrap();

    let mut out = Vec::new();
    stream.write_to(&mut out).unwrap();

    let clipped = mp4clip::decode(Cursor::new(out)).unwrap();
    let stbl = &clipped.moov.traks[0].mdia.minf.stbl;

    // Key-sample preservation.
    assert_eq!(stbl.stss.as_ref().unwrap().samples.first(), Some(&1));

    // Sample-count consistency across tables.
    let sample_count = stbl.stsz.sizes.len() as u64;
    assert_eq!(stbl.stts.total_samples(), sample_count);
    assert!(sample_count > 0 && sample_count <= 120);

    // Chunk-offset monotonicity and containment.
    let mut prev = 0u64;
    for (i, &off) in stbl.stco.offsets.iter().enumerate() {
        assert!(off as u64 >= clipped.header_len());
        if i > 0 {
            assert!(off as u64 > prev);
        }
        prev = off as u64;
    }
    assert_eq!(stbl.stco.offsets.len() as u64, sample_count);

    // Merge never truncates the tail: clipping always reaches the
    // original track's last sample.
    assert!(total_duration > 2.5);
}

#[test]
fn full_span_clip_keeps_every_sample() {
    init_logging();
    let (bytes, _header_len) = build_video_file(&[0x11; 10]);
    let mp4 = mp4clip::decode(Cursor::new(bytes)).unwrap();
    let total = mp4.duration();

    let mut stream = mp4.clip(0.0, total).unwrap();
    let mut out = Vec::new();
    stream.write_to(&mut out).unwrap();

    let clipped = mp4clip::decode(Cursor::new(out)).unwrap();
    let stbl = &clipped.moov.traks[0].mdia.minf.stbl;
    assert_eq!(stbl.stsz.sizes.len(), 120);
    assert_eq!(stbl.stss.as_ref().unwrap().samples, vec![1, 31, 61, 91]);
}

#[test]
fn clip_outside_duration_is_rejected() {
    init_logging();
    let (bytes, _header_len) = build_video_file(&[0x22; 10]);
    let mp4 = mp4clip::decode(Cursor::new(bytes)).unwrap();
    let err = mp4.clip(-1.0, 1.0).unwrap_err();
    assert!(matches!(err, mp4clip::Error::ClipOutside));
}

#[test]
fn preserves_opaque_top_level_boxes() {
    init_logging();
    let (bytes, _header_len) = build_video_file(&[0x33; 10]);
    let mp4 = mp4clip::decode(Cursor::new(bytes)).unwrap();
    assert_eq!(mp4.top_opaque.len(), 1);
    assert_eq!(mp4.top_opaque[0].fourcc, FourCC::new("ftyp"));
}
