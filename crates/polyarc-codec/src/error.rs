use std::io;

use crate::CodecKey;

/// Failure to produce a decoder for a codec key.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("no decoder registered for codec {0}")]
    Unavailable(CodecKey),

    #[error("decoder for codec {key} could not be constructed: {reason}")]
    Construction { key: CodecKey, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("stream is not a valid {decoder} archive: {reason}")]
    NotRecognized {
        decoder: &'static str,
        reason: String,
    },

    #[error("{decoder} archive requires a password")]
    PasswordRequired { decoder: &'static str },

    #[error("decoder has not been opened")]
    NotOpen,

    #[error("failed to decode entry #{index}: {source}")]
    Entry { index: usize, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DecoderError {
    pub(crate) fn not_recognized(decoder: &'static str, reason: impl ToString) -> Self {
        Self::NotRecognized {
            decoder,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn entry(index: usize, source: io::Error) -> Self {
        Self::Entry { index, source }
    }
}

pub type Result<T> = std::result::Result<T, DecoderError>;
