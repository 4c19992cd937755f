//! Archive rewriting: add, remove, replace, and transform entries in one
//! streamed pass with an atomic commit.
//!
//! A [`Rewrite`] gathers pending mutations fluently, then [`execute`]
//! merges them against the source archive (if any) and commits the result:
//! in place over the source, or to an explicit destination, as a packed
//! archive file or an exploded directory.
//!
//! # Examples
//!
//! Patch an archive in place:
//!
//! ```rust,no_run
//! use zipwright::Rewrite;
//!
//! # fn main() -> zipwright::Result<()> {
//! let result = Rewrite::source("app.zip")
//!     .add_entry("VERSION", b"2.0.0".to_vec())
//!     .remove("legacy/")
//!     .execute()?;
//! println!("{} entries written", result.total_entries());
//! # Ok(())
//! # }
//! ```
//!
//! Create a fresh archive from scratch:
//!
//! ```rust,no_run
//! use zipwright::Rewrite;
//!
//! # fn main() -> zipwright::Result<()> {
//! Rewrite::create()
//!     .add_entry("hello.txt", b"Hello, World!".to_vec())
//!     .destination("hello.zip")
//!     .execute()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`execute`]: Rewrite::execute

mod commit;
mod pipeline;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::Result;
use crate::source::{BytesSource, DirSource, EntrySource};
use crate::transform::ContentTransformer;

use pipeline::PipelineStats;

/// How a packed directory tree's root name is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootHandling {
    /// Entries are named relative to the tree root; the root's own name
    /// does not appear in the archive.
    #[default]
    Flatten,
    /// Entries are placed under the tree root's directory name.
    Preserve,
}

/// A pending addition, expanded when the rewrite executes.
pub(crate) enum PendingAdd {
    /// A ready entry source.
    Source(Box<dyn EntrySource>),
    /// A filesystem file, stat'ed at execution time.
    File {
        path: String,
        disk_path: PathBuf,
    },
    /// A whole directory tree, walked at execution time.
    Tree {
        dir: PathBuf,
        root: RootHandling,
    },
}

/// Outcome of a completed rewrite.
///
/// Counts follow the pipeline's decisions: `entries_suppressed` are
/// duplicate names dropped by first-wins resolution, `entries_skipped` are
/// entries the name mapper dropped.
#[must_use = "rewrite results carry the entry counts and destination"]
#[derive(Debug, Clone)]
pub struct RewriteResult {
    /// Entries written from the changed-or-added list.
    pub entries_added: usize,
    /// Source entries copied through unchanged (and not renamed).
    pub entries_copied: usize,
    /// Source entries copied under a mapped name.
    pub entries_renamed: usize,
    /// Source entries rewritten by a content transformer.
    pub entries_transformed: usize,
    /// Source entries dropped by removal.
    pub entries_removed: usize,
    /// Entries dropped by first-wins duplicate suppression.
    pub entries_suppressed: usize,
    /// Entries dropped by the name mapper.
    pub entries_skipped: usize,
    /// Where the result was committed.
    pub destination: PathBuf,
}

impl RewriteResult {
    pub(crate) fn new(stats: PipelineStats, destination: PathBuf) -> Self {
        Self {
            entries_added: stats.added,
            entries_copied: stats.copied,
            entries_renamed: stats.renamed,
            entries_transformed: stats.transformed,
            entries_removed: stats.removed,
            entries_suppressed: stats.suppressed,
            entries_skipped: stats.skipped,
            destination,
        }
    }

    /// Total number of entries written to the destination.
    pub fn total_entries(&self) -> usize {
        self.entries_added + self.entries_copied + self.entries_renamed + self.entries_transformed
    }
}

/// A pending archive rewrite, built fluently and executed once.
///
/// The caller assembles a mutation set (added entries, removed paths,
/// per-path transformers), an optional name mapper, and a destination;
/// [`execute`][Self::execute] runs the whole operation with an atomic
/// commit. Inconsistent requests (no source and no destination) are
/// rejected before any I/O.
pub struct Rewrite {
    pub(crate) source: Option<PathBuf>,
    pub(crate) destination: Option<PathBuf>,
    pub(crate) unpack: bool,
    pub(crate) preserve_timestamps: bool,
    pub(crate) compression_level: Option<i64>,
    pub(crate) pending: Vec<PendingAdd>,
    pub(crate) removed: BTreeSet<String>,
    pub(crate) transformers: HashMap<String, Box<dyn ContentTransformer>>,
    pub(crate) mapper: Option<Box<dyn Fn(&str) -> Option<String>>>,
}

impl Rewrite {
    fn empty() -> Self {
        Self {
            source: None,
            destination: None,
            unpack: false,
            preserve_timestamps: true,
            compression_level: None,
            pending: Vec::new(),
            removed: BTreeSet::new(),
            transformers: HashMap::new(),
            mapper: None,
        }
    }

    /// Starts a rewrite of an existing archive.
    ///
    /// Without an explicit [`destination`][Self::destination], the source
    /// is overwritten in place once the rewrite completes.
    pub fn source(path: impl AsRef<Path>) -> Self {
        Self {
            source: Some(path.as_ref().to_path_buf()),
            ..Self::empty()
        }
    }

    /// Starts a pure creation with no source archive.
    ///
    /// A [`destination`][Self::destination] is required before
    /// [`execute`][Self::execute].
    pub fn create() -> Self {
        Self::empty()
    }

    /// Sets the destination path for the result.
    ///
    /// If the path is an existing directory (or [`unpack`][Self::unpack]
    /// is set), the result is an exploded directory; otherwise a packed
    /// archive file.
    pub fn destination(mut self, path: impl AsRef<Path>) -> Self {
        self.destination = Some(path.as_ref().to_path_buf());
        self
    }

    /// Requests an exploded-directory result instead of a packed archive.
    pub fn unpack(mut self, unpack: bool) -> Self {
        self.unpack = unpack;
        self
    }

    /// Whether copied entries keep their original timestamps (default) or
    /// are stamped with the rewrite time.
    pub fn preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = preserve;
        self
    }

    /// Sets the DEFLATE level for newly compressed content.
    ///
    /// Verbatim copies are unaffected; they keep their original encoding.
    pub fn compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }

    /// Queues an entry source to be written before the source archive is
    /// streamed.
    ///
    /// Insertion order is precedence order: the first entry claiming a
    /// path wins, and any entry here outranks the source archive at the
    /// same path.
    pub fn add(mut self, entry: impl EntrySource + 'static) -> Self {
        self.pending.push(PendingAdd::Source(Box::new(entry)));
        self
    }

    /// Queues an in-memory entry.
    pub fn add_entry(self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.add(BytesSource::new(path, data.into()))
    }

    /// Queues a filesystem file. Its metadata is read when the rewrite
    /// executes.
    pub fn add_file(mut self, path: impl Into<String>, disk_path: impl AsRef<Path>) -> Self {
        self.pending.push(PendingAdd::File {
            path: path.into(),
            disk_path: disk_path.as_ref().to_path_buf(),
        });
        self
    }

    /// Queues an explicit directory entry.
    pub fn add_directory_entry(self, path: impl Into<String>) -> Self {
        self.add(DirSource::new(path))
    }

    /// Queues a whole directory tree, walked when the rewrite executes.
    pub fn add_directory_tree(mut self, dir: impl AsRef<Path>, root: RootHandling) -> Self {
        self.pending.push(PendingAdd::Tree {
            dir: dir.as_ref().to_path_buf(),
            root,
        });
        self
    }

    /// Marks a path for removal from the source archive.
    ///
    /// A path that denotes a directory in the source removes everything
    /// under it. A path that is also added is **not** removed; the
    /// addition wins.
    pub fn remove(mut self, path: impl Into<String>) -> Self {
        self.removed.insert(path.into());
        self
    }

    /// Marks several paths for removal.
    pub fn remove_all<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.removed.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Registers a content transformer for the entry at `path`.
    ///
    /// The path is matched before name mapping. A transformer whose path
    /// never appears in the source archive is ignored; transformers never
    /// synthesize new entries.
    pub fn transform(
        mut self,
        path: impl Into<String>,
        transformer: impl ContentTransformer + 'static,
    ) -> Self {
        self.transformers
            .insert(path.into(), Box::new(transformer));
        self
    }

    /// Installs a name mapper consulted for every entry the pipeline
    /// considers.
    ///
    /// Returning `None` drops the entry; returning a different name
    /// renames it.
    pub fn map_names(mut self, mapper: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.mapper = Some(Box::new(mapper));
        self
    }

    /// Runs the rewrite and commits the result atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`][crate::Error::InvalidRequest]
    /// when neither a source nor a destination was specified, and any I/O,
    /// codec, or path-safety failure encountered while running. On
    /// failure, an in-place source is left untouched and temporary working
    /// targets are removed.
    pub fn execute(self) -> Result<RewriteResult> {
        commit::execute(self)
    }
}
