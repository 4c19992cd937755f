//! Entry sources for the rewrite pipeline.
//!
//! An [`EntrySource`] produces one logical entry: its path, its metadata
//! record, and a lazily opened content stream (`None` for directories).
//! Sources are owned by a mutation set until the pipeline consumes each of
//! them exactly once; content streams are plain readers and close on drop,
//! so they are released on every exit path.
//!
//! Built-in sources cover the common cases:
//!
//! - [`BytesSource`] wraps an in-memory buffer,
//! - [`FileSource`] wraps a filesystem file (metadata captured up front),
//! - [`DirSource`] yields a directory entry with no content.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::entry::{EntryRecord, record_for_disk_path};
use crate::{Error, Result};

/// One logical entry to be written into a rewrite destination.
///
/// Implementations must return `None` from [`open`][Self::open] for
/// directory entries; directory content must never be read.
pub trait EntrySource {
    /// The archive-relative destination path of this entry.
    fn path(&self) -> &str;

    /// The entry's metadata record.
    fn record(&self) -> &EntryRecord;

    /// Opens the content stream, or `None` for a directory entry.
    ///
    /// Called at most once per pipeline run.
    fn open(&self) -> Result<Option<Box<dyn Read + '_>>>;
}

/// An entry backed by an in-memory byte buffer.
///
/// # Examples
///
/// ```
/// use zipwright::{BytesSource, EntrySource};
///
/// let source = BytesSource::new("hello.txt", b"hi".to_vec());
/// assert_eq!(source.path(), "hello.txt");
/// assert_eq!(source.record().size(), Some(2));
/// ```
pub struct BytesSource {
    record: EntryRecord,
    data: Vec<u8>,
}

impl BytesSource {
    /// Creates a source for `path` with the given content.
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            record: EntryRecord::file(path, data.len() as u64),
            data,
        }
    }

    /// Replaces the metadata record, keeping the content.
    ///
    /// Useful for carrying a timestamp or permission bits with in-memory
    /// content.
    pub fn with_record(mut self, record: EntryRecord) -> Self {
        self.record = record;
        self
    }
}

impl EntrySource for BytesSource {
    fn path(&self) -> &str {
        self.record.path()
    }

    fn record(&self) -> &EntryRecord {
        &self.record
    }

    fn open(&self) -> Result<Option<Box<dyn Read + '_>>> {
        Ok(Some(Box::new(Cursor::new(&self.data))))
    }
}

/// An entry backed by a file on disk.
///
/// Size, modification time, and (on Unix) permission bits are captured when
/// the source is constructed; the file itself is opened lazily when the
/// pipeline consumes the entry.
#[derive(Debug)]
pub struct FileSource {
    record: EntryRecord,
    disk_path: PathBuf,
}

impl FileSource {
    /// Creates a source mapping `disk_path` to `archive_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read, or if
    /// `disk_path` refers to a directory (use [`DirSource`] for those).
    pub fn new(archive_path: impl Into<String>, disk_path: impl AsRef<Path>) -> Result<Self> {
        let disk_path = disk_path.as_ref().to_path_buf();
        let record = record_for_disk_path(archive_path, &disk_path)?;
        if record.is_directory() {
            return Err(Error::invalid_request(format!(
                "'{}' is a directory, not a file",
                disk_path.display()
            )));
        }
        Ok(Self { record, disk_path })
    }
}

impl EntrySource for FileSource {
    fn path(&self) -> &str {
        self.record.path()
    }

    fn record(&self) -> &EntryRecord {
        &self.record
    }

    fn open(&self) -> Result<Option<Box<dyn Read + '_>>> {
        let file = File::open(&self.disk_path)?;
        Ok(Some(Box::new(BufReader::new(file))))
    }
}

/// A directory entry with no content.
pub struct DirSource {
    record: EntryRecord,
}

impl DirSource {
    /// Creates a directory entry for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            record: EntryRecord::directory(path),
        }
    }

    /// Replaces the metadata record, keeping the path's directory nature.
    pub fn with_record(mut self, record: EntryRecord) -> Self {
        self.record = record;
        self
    }
}

impl EntrySource for DirSource {
    fn path(&self) -> &str {
        self.record.path()
    }

    fn record(&self) -> &EntryRecord {
        &self.record
    }

    fn open(&self) -> Result<Option<Box<dyn Read + '_>>> {
        Ok(None)
    }
}
