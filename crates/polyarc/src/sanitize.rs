use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Result of sanitizing an archive entry path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    /// Path relative to the destination.
    pub relative: PathBuf,
    /// `relative` joined onto the destination.
    pub resolved: PathBuf,
}

/// Map an entry name onto `base`.
///
/// Backslashes are treated as separators. Absolute names, and names whose
/// `..` components climb above the archive root, are rejected. Returns
/// `None` when `strip` removes every component.
pub fn sanitize_entry_path(
    entry: &str,
    base: &Path,
    strip: usize,
) -> Result<Option<SanitizedPath>> {
    if entry.contains('\0') {
        return Err(Error::InvalidPath(entry.to_string()));
    }
    let unified = entry.replace('\\', "/");
    let path = Path::new(&unified);

    if path.has_root() || path.components().any(|c| matches!(c, Component::Prefix(_))) {
        return Err(Error::ZipSlip {
            entry: PathBuf::from(entry),
            resolved: path.to_path_buf(),
        });
    }

    let normalized = normalize_relative(path).ok_or_else(|| Error::ZipSlip {
        entry: PathBuf::from(entry),
        resolved: base.join(path),
    })?;

    let relative: PathBuf = normalized.components().skip(strip).collect();
    if relative.as_os_str().is_empty() {
        return Ok(None);
    }

    Ok(Some(SanitizedPath {
        resolved: base.join(&relative),
        relative,
    }))
}

/// Check that a symlink at `link` (relative to the destination) pointing at
/// `target` stays inside the destination.
pub fn sanitize_symlink_target(target: &str, link: &Path, base: &Path) -> Result<PathBuf> {
    let unified = target.replace('\\', "/");
    let target_path = Path::new(&unified);

    if target_path.has_root()
        || target_path
            .components()
            .any(|c| matches!(c, Component::Prefix(_)))
    {
        return Err(Error::AbsoluteSymlinkTarget {
            target: target_path.to_path_buf(),
            symlink: base.join(link),
        });
    }

    let joined = link
        .parent()
        .map_or_else(|| target_path.to_path_buf(), |p| p.join(target_path));
    if normalize_relative(&joined).is_none() {
        return Err(Error::SymlinkEscape {
            target: target_path.to_path_buf(),
            resolved: base.join(joined),
        });
    }

    Ok(target_path.to_path_buf())
}

/// Check that `path` really lies under `root` once symlinks on disk are
/// followed. `root` must be canonical. Components of `path` that do not
/// exist yet are judged by their deepest existing ancestor. Returns that
/// ancestor, canonicalized.
pub fn check_within(entry: &str, path: &Path, root: &Path) -> Result<PathBuf> {
    let mut existing = path;
    while std::fs::symlink_metadata(existing).is_err() {
        match existing.parent() {
            Some(parent) => existing = parent,
            None => break,
        }
    }
    let canonical = existing
        .canonicalize()
        .map_err(|source| Error::Extraction {
            entry: PathBuf::from(entry),
            source,
        })?;
    if !canonical.starts_with(root) {
        return Err(Error::ZipSlip {
            entry: PathBuf::from(entry),
            resolved: canonical,
        });
    }
    Ok(canonical)
}

/// Resolve `.` and `..` lexically; `None` if the path climbs above its
/// starting point.
fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(result)
}
