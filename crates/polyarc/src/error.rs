use std::io;
use std::path::PathBuf;

use polyarc_codec::{CodecError, DecoderError};

use crate::catalog::Format;
use crate::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open archive stream '{path}': {source}")]
    Stream { path: PathBuf, source: io::Error },

    #[error("no known decoder can open '{path}'")]
    UnsupportedFormat { path: PathBuf },

    #[error("no decoder for {format}: {source}")]
    Instantiation { format: Format, source: CodecError },

    #[error("{format} decoder rejected the stream: {source}")]
    Open { format: Format, source: DecoderError },

    #[error("format {0} cannot be instantiated")]
    NotInstantiable(Format),

    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("no archive path set")]
    NoArchivePath,

    #[error("archive lists no entries")]
    Empty,

    #[error("failed to extract '{entry}': {source}")]
    Extraction { entry: PathBuf, source: io::Error },

    #[error("extraction cancelled")]
    Cancelled,

    #[error(transparent)]
    Decoder(DecoderError),

    #[error("zip-slip attack detected: entry '{entry}' resolves to '{resolved}'")]
    ZipSlip { entry: PathBuf, resolved: PathBuf },

    #[error("symlink target escapes base directory: '{target}' -> '{resolved}'")]
    SymlinkEscape { target: PathBuf, resolved: PathBuf },

    #[error("symlink target is absolute path: '{target}' in '{symlink}'")]
    AbsoluteSymlinkTarget { target: PathBuf, symlink: PathBuf },

    #[error("entry path is empty or contains a null byte: '{0}'")]
    InvalidPath(String),

    #[error("failed to create symlink: {source}")]
    SymlinkCreationFailed {
        target: PathBuf,
        link: PathBuf,
        source: io::Error,
    },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Errors the trial loop absorbs as a rejected candidate.
    pub fn is_candidate_rejection(&self) -> bool {
        matches!(
            self,
            Self::Instantiation { .. } | Self::Open { .. } | Self::NotInstantiable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
