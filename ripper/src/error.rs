use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RipError>;

#[derive(Debug, Error)]
pub enum RipError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("couldn't fetch manifest {url} (status {status})")]
    ManifestFetch { url: String, status: u16 },

    #[error("couldn't parse manifest as a master playlist: {0}")]
    ManifestFormat(String),

    #[error("no `{0}` variant found in the master playlist")]
    CodecNotAvailable(String),

    #[error("couldn't deserialize catalog response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog returned no album for {0}")]
    AlbumNotFound(String),

    #[error("{0} is neither a catalog album url nor an album id")]
    InvalidAlbum(String),

    #[error(transparent)]
    Mp4(#[from] ripper_mp4::Error),

    #[error("no decryptor address given")]
    NoDecryptors,

    #[error("decryption connection failed: {0}")]
    DecryptionIo(#[source] io::Error),

    #[error("identifier of {0} bytes doesn't fit a length prefixed frame")]
    IdentifierTooLong(usize),

    #[error("sample references key {index} but only {keys} keys are known")]
    KeyIndexOutOfRange { index: u32, keys: usize },

    #[error("sample of {0} bytes doesn't fit a length prefixed frame")]
    SampleTooLarge(usize),

    #[error("couldn't access {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't start workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("cancelled")]
    Cancelled,
}

/// Broad class of a [`RipError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Format,
    Structural,
    Protocol,
    Filesystem,
    Cancelled,
}

impl RipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Status { .. } | Self::ManifestFetch { .. } => {
                ErrorKind::Transport
            }
            Self::ManifestFormat(_)
            | Self::CodecNotAvailable(_)
            | Self::Json(_)
            | Self::AlbumNotFound(_)
            | Self::InvalidAlbum(_) => ErrorKind::Format,
            Self::Mp4(e) => match e.kind() {
                ripper_mp4::ErrorKind::Format => ErrorKind::Format,
                ripper_mp4::ErrorKind::Structural => ErrorKind::Structural,
                ripper_mp4::ErrorKind::Io => ErrorKind::Filesystem,
            },
            Self::NoDecryptors
            | Self::DecryptionIo(_)
            | Self::IdentifierTooLong(_)
            | Self::KeyIndexOutOfRange { .. }
            | Self::SampleTooLarge(_) => ErrorKind::Protocol,
            Self::Filesystem { .. } | Self::ThreadPool(_) => ErrorKind::Filesystem,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Filesystem { path, source }
    }
}

/// Pipeline stage a track failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Asset,
    Manifest,
    Download,
    Demux,
    Decrypt,
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Asset => "asset lookup",
                Self::Manifest => "manifest",
                Self::Download => "download",
                Self::Demux => "demux",
                Self::Decrypt => "decryption",
                Self::Write => "write",
            }
        )
    }
}

/// Why a track was not ripped.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("no lossless asset is available")]
    AssetUnavailable,

    /// Samples reference a sample description the manifest holds no key for.
    #[error("samples need {required} keys but the manifest lists {available}")]
    KeysMissing { required: usize, available: usize },

    /// Samples reference more sample descriptions than the container declares.
    #[error("samples reference {required} sample descriptions but the container declares {entries}")]
    CodecMismatch { required: usize, entries: usize },

    #[error("{stage} failed: {source}")]
    Failed {
        stage: Stage,
        #[source]
        source: RipError,
    },
}

impl SkipReason {
    /// Whether ripping the track again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AssetUnavailable | Self::CodecMismatch { .. } => false,
            Self::KeysMissing { .. } => true,
            Self::Failed { source, .. } => !matches!(
                source.kind(),
                ErrorKind::Format | ErrorKind::Structural
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shortage_is_retryable() {
        assert!(
            SkipReason::KeysMissing {
                required: 3,
                available: 2
            }
            .is_retryable()
        );
        assert!(
            !SkipReason::CodecMismatch {
                required: 3,
                entries: 2
            }
            .is_retryable()
        );
    }

    #[test]
    fn structural_failures_are_permanent() {
        let reason = SkipReason::Failed {
            stage: Stage::Demux,
            source: RipError::Mp4(ripper_mp4::Error::OffsetMismatch {
                fragment: 0,
                remaining: 2,
            }),
        };
        assert!(!reason.is_retryable());

        let reason = SkipReason::Failed {
            stage: Stage::Decrypt,
            source: RipError::DecryptionIo(io::ErrorKind::ConnectionReset.into()),
        };
        assert!(reason.is_retryable());
    }
}
