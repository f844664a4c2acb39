use std::path::PathBuf;
use std::time::SystemTime;

use crate::catalog::Format;

/// Snapshot of one archive item. Independent of the session that listed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Index in the decoder's item table.
    pub index: usize,
    pub name: String,
    pub size: u64,
    pub packed_size: Option<u64>,
    pub is_directory: bool,
    /// Windows-style attribute bits.
    pub attributes: Option<u32>,
    pub mode: Option<u32>,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub encrypted: bool,
    pub link_target: Option<String>,
    /// Archive path of the entry this hard link shares content with.
    pub hard_link_target: Option<String>,
    /// Device node, FIFO or similar; never written to disk.
    pub is_special: bool,
}

impl ArchiveEntry {
    pub fn is_symlink(&self) -> bool {
        self.link_target.is_some()
    }

    pub fn is_hard_link(&self) -> bool {
        self.hard_link_target.is_some()
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory && !self.is_symlink() && !self.is_hard_link() && !self.is_special
    }

    pub fn is_executable(&self) -> bool {
        self.mode.is_some_and(|m| m & 0o111 != 0)
    }
}

/// Name and size, as returned by `Archive::list_files`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
}

impl From<&ArchiveEntry> for FileInfo {
    fn from(entry: &ArchiveEntry) -> Self {
        Self {
            name: entry.name.clone(),
            size: entry.size,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub name: String,
    pub target_path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractReport {
    pub format: Format,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub entries: Vec<ExtractedEntry>,
}
