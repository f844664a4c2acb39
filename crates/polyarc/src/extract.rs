//! Extraction onto the filesystem.
//!
//! # Platform Behavior
//!
//! **Unix**: mode bits from the archive are applied according to the
//! selected `PermissionStrategy`.
//!
//! **Windows (non-Unix)**: permission handling is a no-op.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use polyarc_codec::{CodecRegistry, DecoderError, ExtractSink, Flow, PasswordPrompt, StreamSource};
use tracing::{debug, trace, warn};

use crate::entry::{ArchiveEntry, ExtractReport, ExtractedEntry};
use crate::enumerate::collect_entries;
use crate::error::{Error, Result};
use crate::options::ExtractOptions;
use crate::progress::{Progress, ProgressPort};
use crate::sanitize::{SanitizedPath, check_within, sanitize_entry_path, sanitize_symlink_target};
use crate::session::ArchiveSession;

const CHUNK: usize = 64 * 1024;

/// Extract every entry of an open session under `destination`.
///
/// Progress is reported to `port` after every written chunk and every
/// directory or link; an `Abort` from the port stops extraction, removes the
/// partially written file and returns [`Error::Cancelled`].
pub fn extract<R: CodecRegistry, S: StreamSource>(
    session: &mut ArchiveSession<R, S>,
    destination: impl AsRef<Path>,
    options: &ExtractOptions,
    port: &mut dyn ProgressPort,
) -> Result<ExtractReport> {
    let opened = session.opened("extract")?;
    let destination = destination.as_ref();

    let listed = collect_entries(&*opened.decoder);
    let total_bytes: u64 = listed.iter().filter(|e| e.is_file()).map(|e| e.size).sum();
    let mut table: Vec<Option<ArchiveEntry>> = vec![None; opened.decoder.item_count()];
    for entry in listed {
        let index = entry.index;
        if let Some(slot) = table.get_mut(index) {
            *slot = Some(entry);
        }
    }

    ensure_directory(destination)?;
    let root = destination.canonicalize()?;
    debug!(
        destination = %destination.display(),
        format = %opened.format,
        total_bytes,
        "extracting archive"
    );

    let mut sink = DiskSink {
        table,
        base: destination,
        root,
        options,
        port,
        password: opened.password.map(str::to_string),
        prompted: false,
        bytes_processed: 0,
        total_bytes,
        extracted: Vec::new(),
        directory_times: Vec::new(),
        failure: None,
        cancelled: false,
    };

    let outcome = opened.decoder.extract_all(&mut *opened.stream, &mut sink);

    if let Some(failure) = sink.failure.take() {
        warn!(error = %failure, "extraction failed");
        return Err(failure);
    }
    if sink.cancelled {
        debug!(bytes = sink.bytes_processed, "extraction cancelled");
        return Err(Error::Cancelled);
    }
    match outcome {
        Ok(_) => {}
        Err(DecoderError::Entry { index, source }) => {
            let entry = sink.entry_name(index);
            warn!(entry = %entry.display(), error = %source, "entry failed to decode");
            return Err(Error::Extraction { entry, source });
        }
        Err(e) => return Err(Error::Decoder(e)),
    }

    sink.finish_directories();
    debug!(
        entries = sink.extracted.len(),
        bytes = sink.bytes_processed,
        "extraction complete"
    );
    Ok(ExtractReport {
        format: opened.format,
        entry_count: sink.extracted.len(),
        total_bytes: sink.bytes_processed,
        entries: sink.extracted,
    })
}

/// Writes decoded entries under `base` and forwards progress to the port.
struct DiskSink<'a> {
    table: Vec<Option<ArchiveEntry>>,
    base: &'a Path,
    /// `base` canonicalized; every write must land under it.
    root: PathBuf,
    options: &'a ExtractOptions,
    port: &'a mut dyn ProgressPort,
    password: Option<String>,
    prompted: bool,
    bytes_processed: u64,
    total_bytes: u64,
    extracted: Vec<ExtractedEntry>,
    directory_times: Vec<(PathBuf, SystemTime)>,
    failure: Option<Error>,
    cancelled: bool,
}

impl ExtractSink for DiskSink<'_> {
    fn entry(&mut self, index: usize, data: &mut dyn Read) -> io::Result<Flow> {
        let Some(entry) = self.table.get(index).cloned().flatten() else {
            trace!(index, "skipping unlisted item");
            io::copy(data, &mut io::sink())?;
            return Ok(Flow::Continue);
        };

        match self.write_entry(&entry, data) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                self.failure = Some(e);
                Ok(Flow::Abort)
            }
        }
    }

    fn password(&mut self, prompt: &PasswordPrompt) -> Option<String> {
        if self.password.is_none() && !self.prompted {
            self.prompted = true;
            self.password = self.port.password(prompt);
        }
        self.password.clone()
    }
}

impl DiskSink<'_> {
    fn write_entry(&mut self, entry: &ArchiveEntry, data: &mut dyn Read) -> Result<Flow> {
        let strip = self.options.strip_components;
        let Some(target) = sanitize_entry_path(&entry.name, self.base, strip)? else {
            trace!(entry = %entry.name, "entry stripped away");
            io::copy(data, &mut io::sink())?;
            return Ok(Flow::Continue);
        };
        if entry.is_special {
            warn!(entry = %entry.name, "skipping special entry");
            io::copy(data, &mut io::sink())?;
            return Ok(Flow::Continue);
        }
        trace!(entry = %entry.name, target = %target.resolved.display(), "writing entry");

        let written = if entry.is_directory {
            check_within(&entry.name, &target.resolved, &self.root)?;
            ensure_directory(&target.resolved)?;
            if let Some(modified) = entry.modified.filter(|_| self.options.preserve_timestamps) {
                self.directory_times.push((target.resolved.clone(), modified));
            }
            0
        } else if let Some(link) = &entry.link_target {
            let parent = self.prepare_parent(entry, &target)?;
            let link_path = match target.relative.file_name() {
                Some(name) => parent.join(name),
                None => target.relative.clone(),
            };
            let link_target = sanitize_symlink_target(link, &link_path, self.base)?;
            write_symlink(&link_target, &target.resolved)?;
            0
        } else if let Some(source) = &entry.hard_link_target {
            let Some(source) = sanitize_entry_path(source, self.base, strip)? else {
                warn!(entry = %entry.name, "hard link target stripped away, skipping");
                io::copy(data, &mut io::sink())?;
                return Ok(Flow::Continue);
            };
            check_within(&entry.name, &source.resolved, &self.root)?;
            self.prepare_parent(entry, &target)?;
            replace_link(&target.resolved)?;
            std::fs::hard_link(&source.resolved, &target.resolved).map_err(|source| {
                Error::Extraction {
                    entry: PathBuf::from(&entry.name),
                    source,
                }
            })?;
            0
        } else {
            self.prepare_parent(entry, &target)?;
            replace_link(&target.resolved)?;
            match self.write_file(entry, data, &target.relative, &target.resolved)? {
                Some(written) => written,
                None => return Ok(Flow::Abort),
            }
        };

        self.extracted.push(ExtractedEntry {
            name: entry.name.clone(),
            target_path: target.resolved,
            size: written,
        });

        // Files report per chunk; everything else reports once.
        if entry.is_file() && written > 0 {
            return Ok(Flow::Continue);
        }
        Ok(self.report(&target.relative))
    }

    /// Create the entry's parent directory, refusing parents that resolve
    /// outside the destination through links already on disk. Returns the
    /// parent's path relative to the destination.
    fn prepare_parent(&self, entry: &ArchiveEntry, target: &SanitizedPath) -> Result<PathBuf> {
        let parent = target.resolved.parent().unwrap_or(self.base);
        check_within(&entry.name, parent, &self.root)?;
        ensure_directory(parent)?;
        let canonical = check_within(&entry.name, parent, &self.root)?;
        Ok(canonical
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_default())
    }

    /// Returns `None` if the port cancelled mid-file; the partial file is
    /// removed.
    fn write_file(
        &mut self,
        entry: &ArchiveEntry,
        data: &mut dyn Read,
        relative: &Path,
        path: &Path,
    ) -> Result<Option<u64>> {
        let mut file = File::create(path).map_err(|source| Error::Extraction {
            entry: PathBuf::from(&entry.name),
            source,
        })?;

        let mut buf = vec![0u8; CHUNK];
        let mut written = 0u64;
        loop {
            let n = match data.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    drop(file);
                    remove_partial(path);
                    return Err(Error::Extraction {
                        entry: PathBuf::from(&entry.name),
                        source,
                    });
                }
            };
            file.write_all(&buf[..n]).map_err(|source| Error::Extraction {
                entry: PathBuf::from(&entry.name),
                source,
            })?;
            written += n as u64;
            self.bytes_processed += n as u64;

            if self.report(relative).is_abort() {
                drop(file);
                remove_partial(path);
                return Ok(None);
            }
        }
        drop(file);

        self.options.perm_strategy.apply_to_path(path, entry.mode)?;
        if self.options.preserve_timestamps {
            apply_times(path, entry);
        }
        Ok(Some(written))
    }

    fn report(&mut self, current: &Path) -> Flow {
        let progress = Progress {
            bytes_processed: self.bytes_processed,
            total_bytes: Some(self.total_bytes),
            current_file: Some(current.to_path_buf()),
        };
        let flow = self.port.progress(&progress);
        if flow.is_abort() {
            self.cancelled = true;
        }
        flow
    }

    fn entry_name(&self, index: usize) -> PathBuf {
        self.table
            .get(index)
            .and_then(Option::as_ref)
            .map_or_else(|| PathBuf::from(format!("#{index}")), |e| PathBuf::from(&e.name))
    }

    /// Directory times are set last, once their contents stop changing them.
    fn finish_directories(&mut self) {
        for (path, modified) in self.directory_times.drain(..).rev() {
            if let Err(e) = filetime::set_file_mtime(&path, FileTime::from_system_time(modified)) {
                debug!(path = %path.display(), error = %e, "could not set directory time");
            }
        }
    }
}

fn apply_times(path: &Path, entry: &ArchiveEntry) {
    let Some(modified) = entry.modified else {
        return;
    };
    let mtime = FileTime::from_system_time(modified);
    let atime = entry.accessed.map_or(mtime, FileTime::from_system_time);
    if let Err(e) = filetime::set_file_times(path, atime, mtime) {
        debug!(path = %path.display(), error = %e, "could not set file times");
    }
}

fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "could not remove partial file");
    }
}

/// A link left at `path` by an earlier entry is replaced, not written
/// through.
fn replace_link(path: &Path) -> Result<()> {
    if std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::unix::fs::symlink;
    symlink(target, link).map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}

#[cfg(windows)]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::windows::fs;
    let is_dir_target = link
        .parent()
        .map(|p| p.join(target).is_dir())
        .unwrap_or(false);
    let created = if is_dir_target {
        fs::symlink_dir(target, link)
    } else {
        fs::symlink_file(target, link)
    };
    created.map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}

#[cfg(not(any(unix, windows)))]
fn write_symlink(target: &Path, link: &Path) -> Result<()> {
    Err(Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Unsupported, "symlinks unsupported"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::progress::{Callbacks, NoProgress};

    fn file_entry(index: usize, name: &str, size: u64) -> ArchiveEntry {
        ArchiveEntry {
            index,
            name: name.into(),
            size,
            packed_size: None,
            is_directory: false,
            attributes: None,
            mode: Some(0o644),
            modified: None,
            created: None,
            accessed: None,
            encrypted: false,
            link_target: None,
            hard_link_target: None,
            is_special: false,
        }
    }

    fn sink<'a>(
        base: &'a Path,
        options: &'a ExtractOptions,
        port: &'a mut dyn ProgressPort,
        table: Vec<Option<ArchiveEntry>>,
    ) -> DiskSink<'a> {
        DiskSink {
            table,
            base,
            root: base.canonicalize().unwrap(),
            options,
            port,
            password: None,
            prompted: false,
            bytes_processed: 0,
            total_bytes: 0,
            extracted: Vec::new(),
            directory_times: Vec::new(),
            failure: None,
            cancelled: false,
        }
    }

    #[test]
    fn writes_files_under_base() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let options = ExtractOptions::default();
        let mut port = NoProgress;
        let table = vec![Some(file_entry(0, "dir/b.txt", 3))];
        let mut sink = sink(dir.path(), &options, &mut port, table);

        let flow = sink.entry(0, &mut Cursor::new(b"abc".to_vec())).unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(std::fs::read(dir.path().join("dir/b.txt")).unwrap(), b"abc");
        assert_eq!(sink.extracted.len(), 1);
        assert_eq!(sink.bytes_processed, 3);
    }

    #[test]
    fn abort_mid_file_removes_partial_output() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let options = ExtractOptions::default();
        let mut port = Callbacks::new().on_progress(|_| Flow::Abort);
        let table = vec![Some(file_entry(0, "big.bin", 10))];
        let mut sink = sink(dir.path(), &options, &mut port, table);

        let flow = sink.entry(0, &mut Cursor::new(vec![1u8; 10])).unwrap();
        assert_eq!(flow, Flow::Abort);
        assert!(sink.cancelled);
        assert!(sink.failure.is_none());
        assert!(!dir.path().join("big.bin").exists());
    }

    #[test]
    fn escaping_entry_is_recorded_as_failure() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let options = ExtractOptions::default();
        let mut port = NoProgress;
        let table = vec![Some(file_entry(0, "../evil.txt", 1))];
        let mut sink = sink(dir.path(), &options, &mut port, table);

        let flow = sink.entry(0, &mut Cursor::new(vec![0u8])).unwrap();
        assert_eq!(flow, Flow::Abort);
        assert!(matches!(sink.failure, Some(Error::ZipSlip { .. })));
        assert!(!sink.cancelled);
    }

    #[test]
    fn unlisted_items_are_drained() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let options = ExtractOptions::default();
        let mut port = NoProgress;
        let mut sink = sink(dir.path(), &options, &mut port, vec![None]);

        let flow = sink.entry(0, &mut Cursor::new(vec![0u8; 4])).unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(sink.extracted.is_empty());
        assert_eq!(sink.entry_name(0), PathBuf::from("#0"));
    }

    #[test]
    fn password_is_requested_once() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let options = ExtractOptions::default();
        let asked = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let asked_clone = asked.clone();
        let mut port = Callbacks::new().on_password(move |_| {
            asked_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Some("pw".into())
        });
        let mut sink = sink(dir.path(), &options, &mut port, Vec::new());
        let prompt = PasswordPrompt {
            decoder: "zip",
            entry: Some("a.txt".into()),
        };

        assert_eq!(sink.password(&prompt).as_deref(), Some("pw"));
        assert_eq!(sink.password(&prompt).as_deref(), Some("pw"));
        assert_eq!(asked.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn hard_links_share_content_and_special_entries_are_skipped() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let options = ExtractOptions::default();
        let mut port = NoProgress;
        let table = vec![
            Some(file_entry(0, "data.txt", 3)),
            Some(ArchiveEntry {
                hard_link_target: Some("data.txt".into()),
                ..file_entry(1, "alias.txt", 0)
            }),
            Some(ArchiveEntry {
                is_special: true,
                ..file_entry(2, "pipe", 0)
            }),
        ];
        let mut sink = sink(dir.path(), &options, &mut port, table);

        sink.entry(0, &mut Cursor::new(b"abc".to_vec())).unwrap();
        sink.entry(1, &mut io::empty()).unwrap();
        sink.entry(2, &mut io::empty()).unwrap();

        assert_eq!(std::fs::read(dir.path().join("alias.txt")).unwrap(), b"abc");
        assert!(!dir.path().join("pipe").exists());
        assert_eq!(sink.extracted.len(), 2);
        assert!(sink.failure.is_none());
    }

    #[test]
    fn hard_link_outside_destination_is_rejected() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let options = ExtractOptions::default();
        let mut port = NoProgress;
        let table = vec![Some(ArchiveEntry {
            hard_link_target: Some("../../etc/passwd".into()),
            ..file_entry(0, "passwd", 0)
        })];
        let mut sink = sink(dir.path(), &options, &mut port, table);

        let flow = sink.entry(0, &mut io::empty()).unwrap();
        assert_eq!(flow, Flow::Abort);
        assert!(matches!(sink.failure, Some(Error::ZipSlip { .. })));
        assert!(!dir.path().join("passwd").exists());
    }

    #[cfg(unix)]
    #[test]
    fn files_are_not_written_through_links_already_extracted() {
        let dir = tempfile::Builder::new().prefix("polyarc-sink-").tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(dir.path().join("victim.txt"), b"keep").unwrap();
        std::os::unix::fs::symlink("../victim.txt", out.join("victim.txt")).unwrap();

        let options = ExtractOptions::default();
        let mut port = NoProgress;
        let table = vec![Some(file_entry(0, "victim.txt", 3))];
        let mut sink = sink(&out, &options, &mut port, table);

        sink.entry(0, &mut Cursor::new(b"new".to_vec())).unwrap();
        assert!(sink.failure.is_none());
        assert_eq!(std::fs::read(dir.path().join("victim.txt")).unwrap(), b"keep");
        assert_eq!(std::fs::read(out.join("victim.txt")).unwrap(), b"new");
    }
}
