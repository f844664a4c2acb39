use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A readable, rewindable archive byte stream.
///
/// Trial resolution rewinds the same stream before every candidate decoder,
/// so seeking back to the start is a hard requirement.
pub trait ArchiveStream: Read + Seek {}

impl<T: Read + Seek + ?Sized> ArchiveStream for T {}

/// Acquires the backing byte stream for an archive path.
pub trait StreamSource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ArchiveStream>>;
}

/// Opens archives from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSource;

impl StreamSource for FileSource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ArchiveStream>> {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Serves archives from memory, keyed by path.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, Arc<[u8]>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), Arc::from(bytes.into()));
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl StreamSource for MemorySource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ArchiveStream>> {
        let bytes = self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no in-memory archive at '{}'", path.display()),
            )
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

/// Total length of a stream; leaves the cursor at the start.
pub fn stream_len(stream: &mut dyn ArchiveStream) -> io::Result<u64> {
    let len = stream.seek(io::SeekFrom::End(0))?;
    stream.rewind()?;
    Ok(len)
}
