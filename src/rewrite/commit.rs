//! Atomic commit of a rewrite onto its destination.
//!
//! A rewrite either targets an explicit destination distinct from the
//! source (the working target *is* the destination; nothing is swapped),
//! or runs in place. In-place runs write to a fresh temporary file or
//! directory next to the source and only touch the original at the final
//! swap, so any failure during the pipeline leaves the source untouched
//! and the temporary is cleaned up on every exit path.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::mutation::MutationSet;
use crate::rewrite::{PendingAdd, Rewrite, RewriteResult, RootHandling};
use crate::source::{DirSource, EntrySource, FileSource};
use crate::{Error, Result};

use super::pipeline::{self, ArchiveSink, DirectorySink, PipelineStats};

/// How the working target relates to the source.
enum Plan {
    /// Write directly to this path; no temporary, no swap.
    Explicit(PathBuf),
    /// Write to a temporary next to this path, then swap it in.
    InPlace(PathBuf),
}

/// Runs the full rewrite: validation, pipeline, atomic commit.
pub(crate) fn execute(request: Rewrite) -> Result<RewriteResult> {
    let Rewrite {
        source,
        destination,
        unpack,
        preserve_timestamps,
        compression_level,
        pending,
        removed,
        transformers,
        mapper,
    } = request;

    let plan = match (&source, &destination) {
        (None, None) => {
            return Err(Error::invalid_request(
                "neither a source archive nor a destination was specified",
            ));
        }
        (Some(src), None) => Plan::InPlace(src.clone()),
        (Some(src), Some(dest)) if same_target(src, dest) => Plan::InPlace(src.clone()),
        (_, Some(dest)) => Plan::Explicit(dest.clone()),
    };

    // Directory shape when the caller asked for an unpacked result or the
    // explicit destination is already a directory.
    let exploded = unpack
        || matches!(&plan, Plan::Explicit(dest) if dest.is_dir());

    let mut mutations = MutationSet::new();
    mutations.removed = removed;
    mutations.transformers = transformers;
    expand_pending(pending, &mut mutations.changed_or_added)?;

    let mut archive = match &source {
        Some(path) => {
            let file = File::open(path)?;
            Some(ZipArchive::new(BufReader::new(file))?)
        }
        None => None,
    };
    let mapper_ref = mapper.as_deref();

    let (stats, destination) = match plan {
        Plan::Explicit(dest) => {
            let stats = if exploded {
                fs::create_dir_all(&dest)?;
                let mut sink = DirectorySink::new(&dest, preserve_timestamps);
                pipeline::run(
                    archive.as_mut(),
                    &mut mutations,
                    mapper_ref,
                    preserve_timestamps,
                    &mut sink,
                )?
            } else {
                if let Some(parent) = nonempty_parent(&dest) {
                    fs::create_dir_all(parent)?;
                }
                let out = BufWriter::new(File::create(&dest)?);
                let mut sink = ArchiveSink::new(out, compression_level);
                let stats = pipeline::run(
                    archive.as_mut(),
                    &mut mutations,
                    mapper_ref,
                    preserve_timestamps,
                    &mut sink,
                )?;
                sink.finish()?;
                stats
            };
            (stats, dest)
        }
        Plan::InPlace(target) => {
            let stats = if exploded {
                rewrite_in_place_exploded(
                    &target,
                    archive,
                    &mut mutations,
                    mapper_ref,
                    preserve_timestamps,
                )?
            } else {
                rewrite_in_place_packed(
                    &target,
                    archive,
                    &mut mutations,
                    mapper_ref,
                    preserve_timestamps,
                    compression_level,
                )?
            };
            (stats, target)
        }
    };

    Ok(RewriteResult::new(stats, destination))
}

type SourceArchive = ZipArchive<BufReader<File>>;

/// In-place rewrite to a packed archive: temp file beside the source,
/// pipeline into it, then persist over the source.
fn rewrite_in_place_packed(
    target: &Path,
    mut archive: Option<SourceArchive>,
    mutations: &mut MutationSet,
    mapper: Option<&dyn Fn(&str) -> Option<String>>,
    preserve_timestamps: bool,
    compression_level: Option<i64>,
) -> Result<PipelineStats> {
    let scratch = nonempty_parent(target).unwrap_or(Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(scratch)?;

    let out = BufWriter::new(temp.reopen()?);
    let mut sink = ArchiveSink::new(out, compression_level);
    let stats = pipeline::run(
        archive.as_mut(),
        mutations,
        mapper,
        preserve_timestamps,
        &mut sink,
    )?;
    sink.finish()?;

    // Release the source handle before overwriting it.
    drop(archive);
    log::debug!("committing rewrite onto '{}'", target.display());
    temp.persist(target)?;
    Ok(stats)
}

/// In-place rewrite to an exploded directory: temp dir beside the source,
/// pipeline into it, delete the source file, rename the dir into place.
fn rewrite_in_place_exploded(
    target: &Path,
    mut archive: Option<SourceArchive>,
    mutations: &mut MutationSet,
    mapper: Option<&dyn Fn(&str) -> Option<String>>,
    preserve_timestamps: bool,
) -> Result<PipelineStats> {
    let scratch = nonempty_parent(target).unwrap_or(Path::new("."));
    let temp = tempfile::tempdir_in(scratch)?;

    let mut sink = DirectorySink::new(temp.path(), preserve_timestamps);
    let stats = pipeline::run(
        archive.as_mut(),
        mutations,
        mapper,
        preserve_timestamps,
        &mut sink,
    )?;

    drop(archive);
    log::debug!("replacing '{}' with unpacked result", target.display());
    fs::remove_file(target)?;
    fs::rename(temp.path(), target)?;
    // The rename moved the directory away; the TempDir destructor's
    // removal of the now-nonexistent path is a no-op. Keeping the guard
    // alive until here means a failed remove/rename still cleans up.
    drop(temp);
    Ok(stats)
}

/// Expands pending additions (direct sources, deferred files, directory
/// trees) into concrete entry sources, in caller order.
fn expand_pending(
    pending: Vec<PendingAdd>,
    out: &mut Vec<Box<dyn EntrySource>>,
) -> Result<()> {
    for add in pending {
        match add {
            PendingAdd::Source(source) => out.push(source),
            PendingAdd::File { path, disk_path } => {
                out.push(Box::new(FileSource::new(path, disk_path)?));
            }
            PendingAdd::Tree { dir, root } => expand_tree(&dir, root, out)?,
        }
    }
    Ok(())
}

/// Walks a directory tree into entry sources, sorted for deterministic
/// output.
fn expand_tree(
    dir: &Path,
    root: RootHandling,
    out: &mut Vec<Box<dyn EntrySource>>,
) -> Result<()> {
    let prefix = match root {
        RootHandling::Flatten => None,
        RootHandling::Preserve => {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::invalid_request(format!(
                        "cannot preserve the root name of '{}'",
                        dir.display()
                    ))
                })?;
            Some(name)
        }
    };

    for walked in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let walked = walked.map_err(std::io::Error::from)?;
        let path = walked.path();
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };

        let mut name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if let Some(prefix) = &prefix {
            name = if name.is_empty() {
                prefix.clone()
            } else {
                format!("{prefix}/{name}")
            };
        }
        if name.is_empty() {
            // The tree root itself, with no preserved name.
            continue;
        }

        let file_type = walked.file_type();
        if file_type.is_dir() {
            out.push(Box::new(DirSource::new(name)));
        } else if file_type.is_file() {
            out.push(Box::new(FileSource::new(name, path)?));
        } else {
            log::debug!("skipping non-regular file '{}'", path.display());
        }
    }
    Ok(())
}

/// Whether the explicit destination is really the source again.
fn same_target(source: &Path, destination: &Path) -> bool {
    if source == destination {
        return true;
    }
    match (source.canonicalize(), destination.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn nonempty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
