//! Archive entry metadata records.
//!
//! An [`EntryRecord`] captures everything the rewrite pipeline needs to know
//! about one logical archive entry: its archive-relative path, whether it is
//! a directory, and the optional size/CRC/compression/timestamp/permission
//! attributes. Records are immutable once built; renaming produces a new
//! record with every other field preserved.

use std::fs;
use std::path::Path;

use zip::DateTime;
use zip::read::ZipFile;

use crate::timestamp;

/// How an entry's content is (or should be) encoded in the archive.
///
/// `Unspecified` lets the writer choose; in practice that means DEFLATE for
/// file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionKind {
    /// Content stored without compression.
    Stored,
    /// Content compressed with DEFLATE.
    Deflated,
    /// No preference recorded; the writer decides.
    #[default]
    Unspecified,
}

/// Metadata for one archive entry.
///
/// Created when an entry is read from a source archive or synthesized for a
/// new entry. The `unix_mode` field carries the POSIX permission encoding
/// opaquely; this crate passes it through to the codec or the filesystem
/// without interpreting it.
///
/// # Examples
///
/// ```
/// use zipwright::EntryRecord;
///
/// let record = EntryRecord::file("docs/readme.txt", 42);
/// assert!(!record.is_directory());
/// assert_eq!(record.size(), Some(42));
///
/// let renamed = record.renamed("docs/README.txt");
/// assert_eq!(renamed.path(), "docs/README.txt");
/// assert_eq!(renamed.size(), Some(42));
/// ```
#[derive(Debug, Clone)]
pub struct EntryRecord {
    path: String,
    is_directory: bool,
    size: Option<u64>,
    crc32: Option<u32>,
    compression: CompressionKind,
    timestamp: Option<DateTime>,
    unix_mode: Option<u32>,
}

impl EntryRecord {
    /// Creates a record for a file entry of known size.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            size: Some(size),
            crc32: None,
            compression: CompressionKind::Unspecified,
            timestamp: None,
            unix_mode: None,
        }
    }

    /// Creates a record for a file entry of unknown size.
    pub fn file_unsized(path: impl Into<String>) -> Self {
        Self {
            size: None,
            ..Self::file(path, 0)
        }
    }

    /// Creates a record for a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            size: None,
            crc32: None,
            compression: CompressionKind::Stored,
            timestamp: None,
            unix_mode: None,
        }
    }

    /// Creates a record for a filesystem file or directory, capturing its
    /// size, modification time, and (on Unix) permission bits.
    pub fn from_metadata(path: impl Into<String>, meta: &fs::Metadata) -> Self {
        let is_directory = meta.is_dir();
        let timestamp = meta.modified().ok().and_then(timestamp::from_system_time);

        #[cfg(unix)]
        let unix_mode = {
            use std::os::unix::fs::MetadataExt;
            Some(meta.mode())
        };
        #[cfg(not(unix))]
        let unix_mode = None;

        Self {
            path: path.into(),
            is_directory,
            size: if is_directory { None } else { Some(meta.len()) },
            crc32: None,
            compression: if is_directory {
                CompressionKind::Stored
            } else {
                CompressionKind::Unspecified
            },
            timestamp,
            unix_mode,
        }
    }

    /// Builds a record from an open codec entry.
    pub(crate) fn from_zip_entry(entry: &ZipFile<'_>) -> Self {
        let compression = match entry.compression() {
            zip::CompressionMethod::Stored => CompressionKind::Stored,
            zip::CompressionMethod::Deflated => CompressionKind::Deflated,
            _ => CompressionKind::Unspecified,
        };
        Self {
            path: entry.name().to_string(),
            is_directory: entry.is_dir(),
            size: if entry.is_dir() {
                None
            } else {
                Some(entry.size())
            },
            crc32: Some(entry.crc32()),
            compression,
            timestamp: entry.last_modified(),
            unix_mode: entry.unix_mode(),
        }
    }

    /// Returns a copy of this record with a different path and all other
    /// fields preserved.
    pub fn renamed(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    /// Returns a copy of this record with the given timestamp.
    pub fn with_timestamp(&self, timestamp: DateTime) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self.clone()
        }
    }

    /// Returns a copy of this record with the given compression kind.
    pub fn with_compression(&self, compression: CompressionKind) -> Self {
        Self {
            compression,
            ..self.clone()
        }
    }

    /// Returns a copy of this record with the given Unix permission bits.
    pub fn with_unix_mode(&self, mode: u32) -> Self {
        Self {
            unix_mode: Some(mode),
            ..self.clone()
        }
    }

    /// The archive-relative, forward-slash separated entry path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Uncompressed size in bytes, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// CRC-32 of the uncompressed content, if known.
    pub fn crc32(&self) -> Option<u32> {
        self.crc32
    }

    /// The recorded compression kind.
    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    /// Last-modified timestamp, if known.
    pub fn timestamp(&self) -> Option<DateTime> {
        self.timestamp
    }

    /// Opaque POSIX permission bits, if known. Never interpreted by this
    /// crate.
    pub fn unix_mode(&self) -> Option<u32> {
        self.unix_mode
    }
}

/// Reads a filesystem path's metadata and builds a record from it.
///
/// Convenience wrapper over [`EntryRecord::from_metadata`].
pub(crate) fn record_for_disk_path(
    archive_path: impl Into<String>,
    disk_path: &Path,
) -> std::io::Result<EntryRecord> {
    let meta = fs::metadata(disk_path)?;
    Ok(EntryRecord::from_metadata(archive_path, &meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record() {
        let record = EntryRecord::file("a/b.txt", 10);
        assert_eq!(record.path(), "a/b.txt");
        assert!(!record.is_directory());
        assert_eq!(record.size(), Some(10));
        assert_eq!(record.crc32(), None);
        assert_eq!(record.compression(), CompressionKind::Unspecified);
    }

    #[test]
    fn test_directory_record() {
        let record = EntryRecord::directory("a/b");
        assert!(record.is_directory());
        assert_eq!(record.size(), None);
        assert_eq!(record.compression(), CompressionKind::Stored);
    }

    #[test]
    fn test_renamed_preserves_fields() {
        let record = EntryRecord::file("old.txt", 7).with_unix_mode(0o644);
        let renamed = record.renamed("new.txt");
        assert_eq!(renamed.path(), "new.txt");
        assert_eq!(renamed.size(), Some(7));
        assert_eq!(renamed.unix_mode(), Some(0o644));
        // The original is unchanged
        assert_eq!(record.path(), "old.txt");
    }

    #[test]
    fn test_with_timestamp() {
        let ts = DateTime::default();
        let record = EntryRecord::file("x", 0).with_timestamp(ts);
        assert_eq!(record.timestamp(), Some(ts));
    }

    #[test]
    fn test_from_metadata_for_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("sample.bin");
        std::fs::write(&file_path, b"12345").unwrap();

        let record = record_for_disk_path("sample.bin", &file_path).unwrap();
        assert_eq!(record.path(), "sample.bin");
        assert_eq!(record.size(), Some(5));
        assert!(!record.is_directory());
        #[cfg(unix)]
        assert!(record.unix_mode().is_some());
    }
}
