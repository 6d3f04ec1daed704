use std::io;

/// Errors produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A box header could not be read, or its declared size ran past
    /// the end of the input.
    #[error("truncated or invalid box header")]
    TruncatedHeader,

    /// The requested clip window starts outside the movie's duration.
    #[error("clip zone is outside video")]
    ClipOutside,

    /// The requested clip window has a negative or otherwise invalid
    /// duration.
    #[error("invalid duration")]
    InvalidDuration,

    /// Fewer bytes were copied from a chunk than its table said it held.
    #[error("chunk was truncated (wrote {written} of {expected} bytes)")]
    TruncatedChunk { written: u64, expected: u64 },

    /// A caller passed a seek position or argument outside the valid range.
    #[error("invalid argument")]
    InvalidArgument,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
