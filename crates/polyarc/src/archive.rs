use std::fmt;
use std::path::{Path, PathBuf};

use polyarc_codec::{BuiltinRegistry, CodecRegistry, FileSource, Flow, StreamSource};
use tracing::debug;

use crate::catalog::Format;
use crate::entry::{ArchiveEntry, ExtractReport, FileInfo};
use crate::enumerate::list_entries;
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::options::ExtractOptions;
use crate::progress::{Callbacks, NoProgress, Progress, ProgressPort};
use crate::resolve::resolve_by_name;
use crate::session::ArchiveSession;

/// Default level for archive creation, matching 7-Zip's "normal".
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 5;

/// Configure-then-call facade over [`ArchiveSession`].
///
/// Every `list_files`/`entries`/`extract` call opens the archive, runs, and
/// closes it again.
pub struct Archive<R = BuiltinRegistry, S = FileSource> {
    session: ArchiveSession<R, S>,
    path: Option<PathBuf>,
    password: Option<String>,
    format: Format,
    compression_level: u32,
    options: ExtractOptions,
    port: Option<Box<dyn ProgressPort + Send>>,
}

impl Archive {
    pub fn new() -> Self {
        Self::with_session(ArchiveSession::new())
    }
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CodecRegistry, S: StreamSource> Archive<R, S> {
    pub fn with_parts(registry: R, source: S) -> Self {
        Self::with_session(ArchiveSession::with_parts(registry, source))
    }

    fn with_session(session: ArchiveSession<R, S>) -> Self {
        Self {
            session,
            path: None,
            password: None,
            format: Format::Unknown,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            options: ExtractOptions::default(),
            port: None,
        }
    }

    /// Set the archive to operate on. The format guess is re-derived from
    /// the new name.
    pub fn set_archive_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();
        self.format = resolve_by_name(&path);
        self.path = Some(path);
        self.session.close();
        self
    }

    pub fn set_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.password = Some(password.into());
        self
    }

    /// Override the format guess. The level only applies to archive
    /// creation.
    pub fn set_compression_format(&mut self, format: Format, level: u32) -> &mut Self {
        self.format = format;
        self.compression_level = level;
        self
    }

    pub fn set_progress_callback(
        &mut self,
        callback: impl FnMut(&Progress) -> Flow + Send + 'static,
    ) -> &mut Self {
        self.port = Some(Box::new(Callbacks::new().on_progress(callback)));
        self
    }

    /// Install a full port, including password prompts.
    pub fn set_progress_port(&mut self, port: impl ProgressPort + Send + 'static) -> &mut Self {
        self.port = Some(Box::new(port));
        self
    }

    pub fn set_extract_options(&mut self, options: ExtractOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn compression_format(&self) -> Format {
        self.format
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// The underlying session, for state and attempt inspection after a
    /// failed call.
    pub fn session(&self) -> &ArchiveSession<R, S> {
        &self.session
    }

    /// Names and sizes of every entry. An archive that lists nothing is an
    /// error here.
    pub fn list_files(&mut self) -> Result<Vec<FileInfo>> {
        let files: Vec<FileInfo> = self.entries()?.iter().map(FileInfo::from).collect();
        if files.is_empty() {
            debug!(path = ?self.path, "archive lists no entries");
            return Err(Error::Empty);
        }
        Ok(files)
    }

    /// Full entry metadata. Unlike [`list_files`](Self::list_files), an
    /// empty archive yields an empty list.
    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        self.with_open(|session, _, _| list_entries(session))
    }

    pub fn extract(&mut self, destination: impl AsRef<Path>) -> Result<ExtractReport> {
        let destination = destination.as_ref();
        self.with_open(|session, port, options| extract(session, destination, options, port))
    }

    fn with_open<T>(
        &mut self,
        op: impl FnOnce(
            &mut ArchiveSession<R, S>,
            &mut dyn ProgressPort,
            &ExtractOptions,
        ) -> Result<T>,
    ) -> Result<T> {
        let path = self.path.clone().ok_or(Error::NoArchivePath)?;
        let mut fallback = NoProgress;
        let port: &mut dyn ProgressPort = match self.port.as_deref_mut() {
            Some(port) => port,
            None => &mut fallback,
        };

        self.session
            .open_with(&path, self.password.as_deref(), self.format, &mut *port)?;
        let result = op(&mut self.session, port, &self.options);
        self.session.close();
        result
    }
}

impl<R, S> fmt::Debug for Archive<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("compression_level", &self.compression_level)
            .field("has_password", &self.password.is_some())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
