//! Directory packing and archive unpacking conveniences.
//!
//! Both operations are thin wrappers over the rewrite pipeline: packing is
//! a pure creation (no source archive, one directory tree of additions),
//! unpacking is a rewrite with no mutations and an exploded-directory
//! destination. They share the pipeline's ordering, path safety, and
//! commit behavior.

use std::path::Path;

use crate::rewrite::{Rewrite, RewriteResult, RootHandling};
use crate::{Error, Result};

/// Options for [`pack_directory`].
///
/// # Examples
///
/// ```
/// use zipwright::{PackOptions, RootHandling};
///
/// let options = PackOptions::new()
///     .root(RootHandling::Preserve)
///     .compression_level(9);
/// assert_eq!(options.compression_level, Some(9));
/// ```
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// How the packed tree's root directory name is handled.
    pub root: RootHandling,
    /// Whether entries keep the source files' modification times
    /// (default) or are stamped with the pack time.
    pub preserve_timestamps: bool,
    /// DEFLATE level for file content, `None` for the codec default.
    pub compression_level: Option<i64>,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PackOptions {
    /// Creates the default options: flattened root, preserved timestamps,
    /// default compression.
    pub fn new() -> Self {
        Self {
            root: RootHandling::Flatten,
            preserve_timestamps: true,
            compression_level: None,
        }
    }

    /// Sets the root-name handling.
    pub fn root(mut self, root: RootHandling) -> Self {
        self.root = root;
        self
    }

    /// Sets whether source file timestamps are preserved.
    pub fn preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = preserve;
        self
    }

    /// Sets the DEFLATE level.
    pub fn compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }
}

/// Packs a directory tree into a new archive file.
///
/// Entries are written in sorted walk order, so packing the same tree
/// twice produces archives the
/// [comparator][crate::archives_equivalent] reports as equal.
///
/// # Errors
///
/// Returns an error if `dir` is not a directory, or on any I/O or codec
/// failure while walking and writing.
///
/// # Examples
///
/// ```rust,no_run
/// use zipwright::{PackOptions, pack_directory};
///
/// # fn main() -> zipwright::Result<()> {
/// let result = pack_directory("site/", "site.zip", &PackOptions::new())?;
/// println!("packed {} entries", result.total_entries());
/// # Ok(())
/// # }
/// ```
pub fn pack_directory(
    dir: impl AsRef<Path>,
    archive: impl AsRef<Path>,
    options: &PackOptions,
) -> Result<RewriteResult> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::invalid_request(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut rewrite = Rewrite::create()
        .add_directory_tree(dir, options.root)
        .preserve_timestamps(options.preserve_timestamps)
        .destination(archive.as_ref());
    if let Some(level) = options.compression_level {
        rewrite = rewrite.compression_level(level);
    }
    rewrite.execute()
}

/// Unpacks an archive into a directory, which is created if needed.
///
/// Every destination path passes the safety guard; a malicious entry name
/// aborts the whole extraction with
/// [`Error::PathEscapesRoot`][crate::Error::PathEscapesRoot].
///
/// # Examples
///
/// ```rust,no_run
/// use zipwright::unpack;
///
/// # fn main() -> zipwright::Result<()> {
/// unpack("release.zip", "release/")?;
/// # Ok(())
/// # }
/// ```
pub fn unpack(archive: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<RewriteResult> {
    Rewrite::source(archive)
        .destination(dir.as_ref())
        .unpack(true)
        .execute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_rejects_non_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();
        let archive = dir.path().join("out.zip");

        let err = pack_directory(&file, &archive, &PackOptions::new()).unwrap_err();
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_options_builder() {
        let options = PackOptions::new()
            .root(RootHandling::Preserve)
            .preserve_timestamps(false)
            .compression_level(1);
        assert_eq!(options.root, RootHandling::Preserve);
        assert!(!options.preserve_timestamps);
        assert_eq!(options.compression_level, Some(1));
    }
}
