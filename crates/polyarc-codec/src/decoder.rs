use std::io::{self, Read};
use std::time::SystemTime;

use crate::Result;
use crate::stream::ArchiveStream;

/// Item properties a decoder can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Path,
    Size,
    PackedSize,
    IsDir,
    /// Windows-style attribute bits.
    Attributes,
    PosixMode,
    Modified,
    Created,
    Accessed,
    Encrypted,
    SymlinkTarget,
    /// Archive path of the item a hard link refers to.
    HardLinkTarget,
    /// Device nodes, FIFOs and other items without extractable content.
    IsSpecial,
}

/// A tagged property value. A value of the wrong variant for its kind is
/// treated as malformed by consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropValue {
    Str(String),
    U64(u64),
    U32(u32),
    Bool(bool),
    Time(SystemTime),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U64(v) => Some(v),
            Self::U32(v) => Some(u64::from(v)),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<SystemTime> {
        match *self {
            Self::Time(t) => Some(t),
            _ => None,
        }
    }
}

/// Whether a driven operation should keep going.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    Abort,
}

impl Flow {
    pub fn is_abort(self) -> bool {
        matches!(self, Self::Abort)
    }
}

/// Context handed to a password request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordPrompt {
    pub decoder: &'static str,
    /// The entry that needs the password; `None` for encrypted headers.
    pub entry: Option<String>,
}

/// Services a decoder may call back into while opening.
pub trait OpenCallback {
    fn password(&mut self, prompt: &PasswordPrompt) -> Option<String>;

    /// Name of the stream being opened, used by single-stream formats to
    /// name their only entry.
    fn stream_name(&self) -> Option<String>;
}

/// Receives decoded entries during `extract_all`.
pub trait ExtractSink {
    /// Consume one item's data. Directories and links arrive with an empty
    /// reader.
    fn entry(&mut self, index: usize, data: &mut dyn Read) -> io::Result<Flow>;

    fn password(&mut self, prompt: &PasswordPrompt) -> Option<String>;
}

/// One concrete archive decoder.
///
/// A decoder borrows the stream for each call instead of owning it, so the
/// caller keeps the stream across failed candidates and can rewind it.
pub trait DecoderInstance {
    fn name(&self) -> &'static str;

    /// Parse the stream's headers and build the item table. The stream is
    /// positioned at its start.
    fn open(&mut self, stream: &mut dyn ArchiveStream, callback: &mut dyn OpenCallback)
    -> Result<()>;

    fn item_count(&self) -> usize;

    fn property(&self, index: usize, kind: PropertyKind) -> Option<PropValue>;

    /// Decode every item, in item-table order, into `sink`. Returns
    /// `Flow::Abort` as soon as the sink asks to stop.
    fn extract_all(&mut self, stream: &mut dyn ArchiveStream, sink: &mut dyn ExtractSink)
    -> Result<Flow>;
}
