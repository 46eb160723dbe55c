//! Error types for demuxing and synthesizing mp4 data.

use crate::FourCC;
use thiserror::Error;

/// Errors that can occur while reading a fragmented container or writing a flat one.
#[derive(Debug, Error)]
pub enum Error {
    /// A box declares more bytes than the data holds.
    #[error("`{name}` box at offset {offset} declares {size} bytes but only {available} are available")]
    TruncatedBox {
        name: FourCC,
        offset: u64,
        size: u64,
        available: u64,
    },

    /// A required box is missing or repeated.
    #[error("expected {expected} `{name}` box, found {found}")]
    BoxCount {
        name: FourCC,
        expected: &'static str,
        found: usize,
    },

    /// No codec with this name was registered.
    #[error("codec `{0}` is not registered")]
    CodecNotRegistered(String),

    /// The protected sample entry does not carry the expected codec config box.
    #[error("sample entry does not carry a `{0}` codec config box")]
    CodecConfigMissing(FourCC),

    /// Number of `moof` and `mdat` boxes differ.
    #[error("found {fragments} fragment header(s) but {data} media data box(es)")]
    FragmentDataMismatch { fragments: usize, data: usize },

    /// A sample needs more bytes than are left in its fragment.
    #[error(
        "sample {sample} of fragment {fragment} needs {size} bytes but only {remaining} are left"
    )]
    SampleOverrun {
        fragment: usize,
        sample: usize,
        size: u32,
        remaining: usize,
    },

    /// Bytes are left in a fragment's media data after its last sample.
    #[error("offset mismatch: {remaining} byte(s) left in fragment {fragment} after its last sample")]
    OffsetMismatch { fragment: usize, remaining: usize },

    /// A version 0 header cannot hold the aggregate duration.
    #[error("duration {duration} does not fit the version 0 `{name}` box")]
    DurationOverflow { name: FourCC, duration: u64 },

    /// A chunk starts beyond what a 32-bit chunk offset table can address.
    #[error("chunk offset {0} does not fit a 32-bit chunk offset table")]
    ChunkOffsetOverflow(u64),

    /// A written box is larger than a 32-bit size field.
    #[error("`{name}` box of {size} bytes is too large")]
    BoxTooLarge { name: FourCC, size: u64 },

    /// A reserved region was patched with the wrong number of bytes.
    #[error("reservation of {reserved} bytes patched with {actual} bytes")]
    PatchLength { reserved: u64, actual: usize },

    /// The given data cannot be remuxed.
    #[error("invalid mp4 data: {0}")]
    InvalidData(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Boxes are missing or the codec is not what was asked for.
    Format,
    /// The data contradicts itself (truncation, offsets, counts).
    Structural,
    /// Reading or writing failed.
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BoxCount { .. }
            | Self::CodecNotRegistered(_)
            | Self::CodecConfigMissing(_)
            | Self::DurationOverflow { .. }
            | Self::ChunkOffsetOverflow(_)
            | Self::BoxTooLarge { .. }
            | Self::InvalidData(_) => ErrorKind::Format,
            Self::TruncatedBox { .. }
            | Self::FragmentDataMismatch { .. }
            | Self::SampleOverrun { .. }
            | Self::OffsetMismatch { .. }
            | Self::PatchLength { .. } => ErrorKind::Structural,
            Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                ErrorKind::Structural
            }
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for mp4 operations.
pub type Result<T> = std::result::Result<T, Error>;
