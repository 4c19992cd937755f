//! Destination path safety for filesystem extraction.
//!
//! Archive entry names are attacker-controlled. Before any entry is
//! materialized on disk, its name is resolved against the output root and
//! rejected if the resolution would land outside it ("zip-slip"). The check
//! runs once per entry, immediately before the filesystem write; it is not
//! involved in archive-to-archive copies, where no filesystem path ever
//! materializes.
//!
//! Resolution is purely lexical: absolute names, Windows drive prefixes,
//! NUL bytes, and any `..` segment are rejected outright, so the surviving
//! segments can only descend below the root.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Resolves an archive entry name to a path under `root`.
///
/// Empty segments and `.` segments are skipped; backslashes are treated as
/// separators since hostile archives use them to smuggle Windows paths past
/// naive checks.
///
/// # Errors
///
/// Returns [`Error::PathEscapesRoot`] when the name is absolute, contains a
/// `..` segment, a NUL byte, or a drive prefix, or when nothing remains of
/// the name after normalization. The error is never silently downgraded to
/// a truncated path.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use zipwright::resolve_under_root;
///
/// let root = Path::new("/tmp/out");
/// let ok = resolve_under_root(root, "docs/readme.txt").unwrap();
/// assert_eq!(ok, root.join("docs").join("readme.txt"));
///
/// assert!(resolve_under_root(root, "../escape").is_err());
/// assert!(resolve_under_root(root, "/etc/passwd").is_err());
/// ```
pub fn resolve_under_root(root: &Path, entry_name: &str) -> Result<PathBuf> {
    let escape = || Error::PathEscapesRoot {
        entry: entry_name.to_string(),
        root: root.to_path_buf(),
    };

    if entry_name.is_empty() || entry_name.contains('\0') {
        return Err(escape());
    }

    let normalized = entry_name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(escape());
    }

    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for segment in normalized.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(escape());
        }
        // Windows drive prefix ("C:"), meaningful even when extracting on
        // another platform and re-reading the tree on Windows.
        if segment.as_bytes().get(1) == Some(&b':') {
            return Err(escape());
        }
        resolved.push(segment);
        depth += 1;
    }

    if depth == 0 {
        return Err(escape());
    }

    Ok(resolved)
}
