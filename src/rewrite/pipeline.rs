//! The merge pipeline: mutations against a streamed source archive.
//!
//! [`run`] produces the exact ordered sequence of entries for a rewrite
//! destination, given an optional source archive and a mutation set:
//!
//! 1. Every changed-or-added entry is emitted first, in caller order, after
//!    the name mapper is applied. Emitted names go into a "seen" set.
//! 2. The source archive is then streamed entry by entry. An entry already
//!    claimed by an earlier add is dropped (first writer wins, no error),
//!    removed paths are dropped, the mapper may rename or drop the entry,
//!    a transformer registered for the pre-mapping path rewrites the
//!    content, and everything else is copied verbatim (optionally with a
//!    rewritten timestamp).
//! 3. Transformers that never matched a source entry are not invoked.
//!
//! Writing goes through the [`EntrySink`] abstraction: an archive sink
//! drives the codec's writer (with raw entry copies that preserve CRC,
//! sizes, and extra attributes), a directory sink materializes entries on
//! the filesystem behind the path safety guard.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use zip::read::ZipFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::entry::{CompressionKind, EntryRecord};
use crate::mutation::{MutationSet, RemovalMatcher};
use crate::transform::{self, ContentTransformer};
use crate::{Error, Result, guard, timestamp};

/// Per-run counters, folded into the caller-facing result.
#[derive(Debug, Default, Clone)]
pub(crate) struct PipelineStats {
    pub(crate) added: usize,
    pub(crate) copied: usize,
    pub(crate) renamed: usize,
    pub(crate) transformed: usize,
    pub(crate) removed: usize,
    pub(crate) suppressed: usize,
    pub(crate) skipped: usize,
}

/// Where merged entries are written.
///
/// Exactly one sink exists per rewrite run; entries arrive in their final
/// order and with their final (post-mapping) paths.
pub(crate) trait EntrySink {
    /// Whether the sink can take verbatim compressed entry copies.
    fn prefers_raw_copy(&self) -> bool {
        false
    }

    /// Writes one entry from a metadata record and an optional content
    /// stream (`None` for directories).
    fn write_entry(&mut self, record: &EntryRecord, content: Option<&mut dyn Read>)
    -> Result<()>;

    /// Copies an existing archive entry without recompression, under the
    /// given destination name. `touch` rewrites only the timestamp.
    ///
    /// Only called when [`prefers_raw_copy`][Self::prefers_raw_copy]
    /// returns true.
    fn copy_raw(&mut self, file: ZipFile<'_>, name: &str, touch: Option<DateTime>) -> Result<()> {
        let _ = (file, name, touch);
        Err(Error::invalid_request(
            "raw entry copies are not supported by this destination",
        ))
    }

    /// Writes one entry whose content is produced by `transformer` from
    /// the source entry's stream.
    fn transform_entry(
        &mut self,
        transformer: &dyn ContentTransformer,
        record: &EntryRecord,
        input: &mut dyn Read,
    ) -> Result<()>;
}

fn apply_mapper(
    mapper: Option<&dyn Fn(&str) -> Option<String>>,
    name: &str,
) -> Option<String> {
    match mapper {
        Some(map) => map(name),
        None => Some(name.to_string()),
    }
}

/// Runs the merge, writing every surviving entry into `sink`.
pub(crate) fn run<R: Read + Seek>(
    mut source: Option<&mut ZipArchive<R>>,
    mutations: &mut MutationSet,
    mapper: Option<&dyn Fn(&str) -> Option<String>>,
    preserve_timestamps: bool,
    sink: &mut dyn EntrySink,
) -> Result<PipelineStats> {
    let mut stats = PipelineStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    let now = timestamp::now_or_default();

    // Step 1: changed-or-added entries, in caller order.
    for entry_source in mutations.changed_or_added.drain(..) {
        let original = entry_source.path().to_string();
        let Some(mapped) = apply_mapper(mapper, &original) else {
            log::debug!("name mapper dropped added entry '{original}'");
            stats.skipped += 1;
            continue;
        };
        if seen.contains(&mapped) {
            log::debug!("'{mapped}' already written, dropping later addition");
            stats.suppressed += 1;
            continue;
        }

        let mut record = if mapped == original {
            entry_source.record().clone()
        } else {
            entry_source.record().renamed(&mapped)
        };
        if !preserve_timestamps || record.timestamp().is_none() {
            record = record.with_timestamp(now);
        }

        match entry_source.open()? {
            Some(mut content) => sink.write_entry(&record, Some(&mut *content))?,
            None => sink.write_entry(&record, None)?,
        }
        seen.insert(mapped);
        stats.added += 1;
    }

    // Step 2: stream the source archive, if there is one.
    let Some(archive) = source.as_deref_mut() else {
        drop_unmatched_transformers(mutations);
        return Ok(stats);
    };

    let matcher = RemovalMatcher::new(&mutations.removed, archive.file_names());

    for index in 0..archive.len() {
        let (name, record) = {
            let entry = archive.by_index_raw(index)?;
            (entry.name().to_string(), EntryRecord::from_zip_entry(&entry))
        };

        // 2a: an earlier change/add claimed this name; first writer wins.
        if seen.contains(&name) {
            log::debug!("'{name}' already written, dropping source entry");
            stats.suppressed += 1;
            continue;
        }

        // 2b: removal, with directory-prefix cascade.
        if matcher.matches(&name) {
            log::debug!("removing '{name}'");
            stats.removed += 1;
            continue;
        }

        // 2c: name mapper; None drops the entry, a new name renames it.
        let Some(mapped) = apply_mapper(mapper, &name) else {
            log::debug!("name mapper dropped source entry '{name}'");
            stats.skipped += 1;
            continue;
        };
        if mapped != name && seen.contains(&mapped) {
            log::debug!("'{mapped}' already written, dropping mapped source entry '{name}'");
            stats.suppressed += 1;
            continue;
        }
        let was_renamed = mapped != name;

        // 2d: transformer, keyed by the pre-mapping path, consumed on use.
        if let Some(transformer) = mutations.transformers.remove(&name) {
            log::debug!("transforming '{name}'");
            let out_record = record
                .renamed(&mapped)
                .with_timestamp(if preserve_timestamps {
                    record.timestamp().unwrap_or(now)
                } else {
                    now
                });
            let mut entry = archive.by_index(index)?;
            sink.transform_entry(transformer.as_ref(), &out_record, &mut entry)?;
            stats.transformed += 1;
        } else {
            // 2e: verbatim copy, optionally with a rewritten timestamp.
            let touch = if preserve_timestamps { None } else { Some(now) };
            if sink.prefers_raw_copy() && !(was_renamed && touch.is_some()) {
                let entry = archive.by_index_raw(index)?;
                sink.copy_raw(entry, &mapped, touch)?;
            } else {
                // Rename plus timestamp rewrite has no raw path in the
                // codec; re-encode this one entry.
                let mut out_record = record.renamed(&mapped);
                if let Some(ts) = touch {
                    out_record = out_record.with_timestamp(ts);
                }
                if out_record.is_directory() {
                    sink.write_entry(&out_record, None)?;
                } else {
                    let mut entry = archive.by_index(index)?;
                    sink.write_entry(&out_record, Some(&mut entry))?;
                }
            }
            if was_renamed {
                stats.renamed += 1;
            } else {
                stats.copied += 1;
            }
        }

        // 2f: the emitted name is now taken.
        seen.insert(mapped);
    }

    drop_unmatched_transformers(mutations);
    Ok(stats)
}

/// Transformers only ever act on existing entries; leftovers are dropped.
fn drop_unmatched_transformers(mutations: &mut MutationSet) {
    if mutations.transformers.is_empty() {
        return;
    }
    for path in mutations.transformers.keys() {
        log::debug!("transformer for '{path}' matched no source entry, ignoring");
    }
    mutations.transformers.clear();
}

// ----------------------------------------------------------------------------
// Archive sink
// ----------------------------------------------------------------------------

/// Writes merged entries into a packed archive via the codec.
pub(crate) struct ArchiveSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    compression_level: Option<i64>,
}

impl<W: Write + Seek> ArchiveSink<W> {
    pub(crate) fn new(inner: W, compression_level: Option<i64>) -> Self {
        Self {
            writer: ZipWriter::new(inner),
            compression_level,
        }
    }

    /// Finalizes the central directory and flushes the underlying writer.
    pub(crate) fn finish(self) -> Result<()> {
        let mut inner = self.writer.finish()?;
        inner.flush()?;
        Ok(())
    }

    fn options_for(&self, record: &EntryRecord) -> SimpleFileOptions {
        let method = match record.compression() {
            CompressionKind::Stored => CompressionMethod::Stored,
            CompressionKind::Deflated | CompressionKind::Unspecified => {
                CompressionMethod::Deflated
            }
        };
        let mut options = SimpleFileOptions::default().compression_method(method);
        if method == CompressionMethod::Deflated {
            options = options.compression_level(self.compression_level);
        }
        if let Some(ts) = record.timestamp() {
            options = options.last_modified_time(ts);
        }
        if let Some(mode) = record.unix_mode() {
            options = options.unix_permissions(mode);
        }
        if record.size().is_some_and(|size| size >= zip::ZIP64_BYTES_THR) {
            options = options.large_file(true);
        }
        options
    }
}

impl<W: Write + Seek> EntrySink for ArchiveSink<W> {
    fn prefers_raw_copy(&self) -> bool {
        true
    }

    fn write_entry(
        &mut self,
        record: &EntryRecord,
        content: Option<&mut dyn Read>,
    ) -> Result<()> {
        let options = self.options_for(record);
        if record.is_directory() {
            self.writer.add_directory(record.path(), options)?;
            return Ok(());
        }
        self.writer.start_file(record.path(), options)?;
        if let Some(reader) = content {
            io::copy(reader, &mut self.writer)?;
        }
        Ok(())
    }

    fn copy_raw(&mut self, file: ZipFile<'_>, name: &str, touch: Option<DateTime>) -> Result<()> {
        match touch {
            Some(ts) => {
                let mode = file.unix_mode();
                self.writer.raw_copy_file_touch(file, ts, mode)?;
            }
            None if file.name() == name => self.writer.raw_copy_file(file)?,
            None => self.writer.raw_copy_file_rename(file, name)?,
        }
        Ok(())
    }

    fn transform_entry(
        &mut self,
        transformer: &dyn ContentTransformer,
        record: &EntryRecord,
        input: &mut dyn Read,
    ) -> Result<()> {
        let options = self.options_for(record);
        self.writer.start_file(record.path(), options)?;
        transformer.transform(input, record, &mut self.writer)
    }
}

// ----------------------------------------------------------------------------
// Directory sink
// ----------------------------------------------------------------------------

/// Materializes merged entries under a filesystem root.
///
/// Every destination path goes through the safety guard immediately before
/// the write. Permission bits and modification times are applied best
/// effort after the content lands, matching how extraction normally
/// behaves: a file whose mtime cannot be set is still a correct
/// extraction.
pub(crate) struct DirectorySink {
    root: PathBuf,
    preserve_timestamps: bool,
}

impl DirectorySink {
    pub(crate) fn new(root: impl Into<PathBuf>, preserve_timestamps: bool) -> Self {
        Self {
            root: root.into(),
            preserve_timestamps,
        }
    }

    fn apply_metadata(&self, path: &Path, record: &EntryRecord) {
        #[cfg(unix)]
        {
            if let Some(mode) = record.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                let permissions = fs::Permissions::from_mode(mode);
                if let Err(e) = fs::set_permissions(path, permissions) {
                    log::warn!("failed to set permissions on '{}': {e}", path.display());
                }
            }
        }

        if self.preserve_timestamps && !record.is_directory() {
            if let Some(system_time) = record.timestamp().and_then(timestamp::to_system_time) {
                let mtime = filetime::FileTime::from_system_time(system_time);
                if let Err(e) = filetime::set_file_mtime(path, mtime) {
                    log::warn!("failed to set mtime on '{}': {e}", path.display());
                }
            }
        }
    }

    fn discard_partial(path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("failed to clean up partial file '{}': {e}", path.display());
        }
    }

    fn prepare_file_path(&self, record: &EntryRecord) -> Result<PathBuf> {
        let path = guard::resolve_under_root(&self.root, record.path())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

impl EntrySink for DirectorySink {
    fn write_entry(
        &mut self,
        record: &EntryRecord,
        content: Option<&mut dyn Read>,
    ) -> Result<()> {
        if record.is_directory() {
            let path = guard::resolve_under_root(&self.root, record.path())?;
            fs::create_dir_all(&path)?;
            self.apply_metadata(&path, record);
            return Ok(());
        }

        let path = self.prepare_file_path(record)?;
        let outcome = (|| -> io::Result<()> {
            let mut out = BufWriter::new(File::create(&path)?);
            if let Some(reader) = content {
                io::copy(reader, &mut out)?;
            }
            out.flush()
        })();
        if let Err(e) = outcome {
            Self::discard_partial(&path);
            return Err(Error::Io(e));
        }

        self.apply_metadata(&path, record);
        Ok(())
    }

    fn transform_entry(
        &mut self,
        transformer: &dyn ContentTransformer,
        record: &EntryRecord,
        input: &mut dyn Read,
    ) -> Result<()> {
        let path = self.prepare_file_path(record)?;
        match transform::write_transformed_file(transformer, record, input, &path) {
            Ok(_) => {
                self.apply_metadata(&path, record);
                Ok(())
            }
            Err(e) => {
                Self::discard_partial(&path);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BytesSource, DirSource};
    use std::io::Cursor;

    fn archive_with(entries: &[(&str, &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(cursor).unwrap()
    }

    fn rewrite_to_memory(
        source: Option<&mut ZipArchive<Cursor<Vec<u8>>>>,
        mutations: &mut MutationSet,
        mapper: Option<&dyn Fn(&str) -> Option<String>>,
    ) -> (PipelineStats, Vec<(String, Vec<u8>)>) {
        let mut sink = ArchiveSink::new(Cursor::new(Vec::new()), None);
        let stats = run(source, mutations, mapper, true, &mut sink).unwrap();
        let mut out = sink.writer.finish().unwrap();
        out.set_position(0);
        let mut result = ZipArchive::new(out).unwrap();
        let mut entries = Vec::new();
        for i in 0..result.len() {
            let mut entry = result.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            entries.push((entry.name().to_string(), data));
        }
        (stats, entries)
    }

    #[test]
    fn test_added_entries_keep_caller_order() {
        let mut mutations = MutationSet::new();
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("b.txt", b"2".to_vec())));
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("a.txt", b"1".to_vec())));

        let (stats, entries) = rewrite_to_memory(None, &mut mutations, None);
        assert_eq!(stats.added, 2);
        assert_eq!(entries[0].0, "b.txt");
        assert_eq!(entries[1].0, "a.txt");
    }

    #[test]
    fn test_first_addition_wins_within_the_list() {
        let mut mutations = MutationSet::new();
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("a.txt", b"first".to_vec())));
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("a.txt", b"second".to_vec())));

        let (stats, entries) = rewrite_to_memory(None, &mut mutations, None);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.suppressed, 1);
        assert_eq!(entries, vec![("a.txt".to_string(), b"first".to_vec())]);
    }

    #[test]
    fn test_addition_outranks_source_entry() {
        let mut archive = archive_with(&[("a.txt", b"old"), ("b.txt", b"keep")]);
        let mut mutations = MutationSet::new();
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("a.txt", b"new".to_vec())));

        let (stats, entries) = rewrite_to_memory(Some(&mut archive), &mut mutations, None);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.suppressed, 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a.txt".to_string(), b"new".to_vec()));
        assert_eq!(entries[1], ("b.txt".to_string(), b"keep".to_vec()));
    }

    #[test]
    fn test_addition_beats_removal_of_same_path() {
        let mut archive = archive_with(&[("a.txt", b"old")]);
        let mut mutations = MutationSet::new();
        mutations.removed.insert("a.txt".to_string());
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("a.txt", b"new".to_vec())));

        let (_, entries) = rewrite_to_memory(Some(&mut archive), &mut mutations, None);
        assert_eq!(entries, vec![("a.txt".to_string(), b"new".to_vec())]);
    }

    #[test]
    fn test_mapper_renames_and_drops() {
        let mut archive = archive_with(&[("keep.txt", b"k"), ("drop.txt", b"d")]);
        let mut mutations = MutationSet::new();
        let mapper = |name: &str| -> Option<String> {
            if name == "drop.txt" {
                None
            } else {
                Some(format!("renamed/{name}"))
            }
        };

        let (stats, entries) =
            rewrite_to_memory(Some(&mut archive), &mut mutations, Some(&mapper));
        assert_eq!(stats.renamed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(entries, vec![("renamed/keep.txt".to_string(), b"k".to_vec())]);
    }

    #[test]
    fn test_mapper_collision_suppresses_later_entry() {
        // "a.txt" is mapped onto "z.txt", claiming the name before the
        // literal "z.txt" arrives.
        let mut archive = archive_with(&[("a.txt", b"mapped"), ("z.txt", b"literal")]);
        let mut mutations = MutationSet::new();
        let mapper = |name: &str| -> Option<String> {
            if name == "a.txt" {
                Some("z.txt".to_string())
            } else {
                Some(name.to_string())
            }
        };

        let (stats, entries) =
            rewrite_to_memory(Some(&mut archive), &mut mutations, Some(&mapper));
        assert_eq!(stats.suppressed, 1);
        assert_eq!(entries, vec![("z.txt".to_string(), b"mapped".to_vec())]);
    }

    #[test]
    fn test_transformer_rewrites_matched_entry_only() {
        let mut archive = archive_with(&[("config.ini", b"debug=0"), ("other.txt", b"x")]);
        let mut mutations = MutationSet::new();
        mutations.transformers.insert(
            "config.ini".to_string(),
            Box::new(
                |input: &mut dyn Read, _record: &EntryRecord, output: &mut dyn Write| -> Result<()> {
                    let mut text = String::new();
                    input.read_to_string(&mut text)?;
                    output.write_all(text.replace("debug=0", "debug=1").as_bytes())?;
                    Ok(())
                },
            ),
        );

        let (stats, entries) = rewrite_to_memory(Some(&mut archive), &mut mutations, None);
        assert_eq!(stats.transformed, 1);
        assert_eq!(stats.copied, 1);
        assert_eq!(entries[0], ("config.ini".to_string(), b"debug=1".to_vec()));
        assert_eq!(entries[1], ("other.txt".to_string(), b"x".to_vec()));
    }

    #[test]
    fn test_unmatched_transformer_is_ignored() {
        let mut archive = archive_with(&[("a.txt", b"a")]);
        let mut mutations = MutationSet::new();
        mutations.transformers.insert(
            "no-such-entry.txt".to_string(),
            Box::new(
                |_input: &mut dyn Read, _record: &EntryRecord, _output: &mut dyn Write| -> Result<()> {
                    panic!("must never run");
                },
            ),
        );

        let (stats, entries) = rewrite_to_memory(Some(&mut archive), &mut mutations, None);
        assert_eq!(stats.transformed, 0);
        assert_eq!(entries.len(), 1);
        assert!(mutations.transformers.is_empty());
    }

    #[test]
    fn test_directory_sink_writes_added_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut mutations = MutationSet::new();
        mutations
            .changed_or_added
            .push(Box::new(DirSource::new("sub")));
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("sub/file.txt", b"data".to_vec())));

        let mut sink = DirectorySink::new(dir.path(), true);
        let stats = run(
            None::<&mut ZipArchive<Cursor<Vec<u8>>>>,
            &mut mutations,
            None,
            true,
            &mut sink,
        )
        .unwrap();

        assert_eq!(stats.added, 2);
        assert!(dir.path().join("sub").is_dir());
        assert_eq!(
            std::fs::read(dir.path().join("sub/file.txt")).unwrap(),
            b"data"
        );
    }

    #[test]
    fn test_directory_sink_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let mut mutations = MutationSet::new();
        mutations
            .changed_or_added
            .push(Box::new(BytesSource::new("../evil.txt", b"x".to_vec())));

        let mut sink = DirectorySink::new(dir.path(), true);
        let err = run(
            None::<&mut ZipArchive<Cursor<Vec<u8>>>>,
            &mut mutations,
            None,
            true,
            &mut sink,
        )
        .unwrap_err();
        assert!(err.is_security_error());
        assert!(!dir.path().parent().unwrap().join("evil.txt").exists());
    }
}
