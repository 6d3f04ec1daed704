//! Read, re-encode, and temporally clip ISO Base Media (MP4)
//! containers without decoding samples.
//!
//! The entry points are [`decode`] / [`decode_sequential`] to parse an
//! input, [`Mp4::clip`] to build a clip transform over it, and
//! [`output::ClipStream`] to materialize the result either as a
//! one-shot write or as a `Read + Seek` stream.

pub mod boxes;
mod bytesio;
pub mod clip;
mod error;
pub mod fourcc;
pub mod model;
pub mod output;
pub mod sampletable;

pub use error::{Error, Result};
pub use model::{decode, decode_sequential, MediaSource, Mp4, SeekMediaSource, SequentialMediaSource};
pub use output::ClipStream;
