//! Archive format resolution, enumeration and cancellable extraction.
//!
//! # Architecture
//!
//! - `catalog.rs` - Format table and trial order
//! - `resolve.rs` - Name-based and trial format resolution
//! - `session.rs` - Archive session lifecycle
//! - `enumerate.rs` - Entry listing
//! - `extract.rs` - Extraction to disk
//! - `sanitize.rs` - Path sanitization (zip-slip prevention)
//! - `progress.rs` - Progress, cancellation and password callbacks
//! - `archive.rs` - Configure-then-call facade

pub use archive::{Archive, DEFAULT_COMPRESSION_LEVEL};
pub use catalog::{Format, all_formats, codec_key_for_format, format_for_extension};
pub use entry::{ArchiveEntry, ExtractReport, ExtractedEntry, FileInfo};
pub use enumerate::list_entries;
pub use error::{Error, Result};
pub use extract::extract;
pub use options::{ExtractOptions, PermissionStrategy};
pub use progress::{Callbacks, NoProgress, Progress, ProgressPort};
pub use resolve::{resolve_by_name, resolve_by_trial, try_candidate};
pub use sanitize::{SanitizedPath, check_within, sanitize_entry_path, sanitize_symlink_target};
pub use session::{ArchiveSession, SessionState};

pub use polyarc_codec as codec;
pub use polyarc_codec::{Flow, PasswordPrompt};

mod archive;
pub mod catalog;
pub mod entry;
mod enumerate;
mod error;
mod extract;
pub mod options;
mod progress;
mod resolve;
mod sanitize;
mod session;
