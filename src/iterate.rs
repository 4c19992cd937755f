//! Read-only iteration and entry lookup.
//!
//! Iteration yields each entry to a caller-supplied closure. The closure's
//! return value decides whether iteration continues: returning
//! [`ControlFlow::Break`] stops cleanly after the current entry, with no
//! special control-flow error involved. [`iterate_info`] visits metadata
//! only and never opens a content stream.

use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::ControlFlow;
use std::path::Path;

use zip::ZipArchive;

use crate::Result;
use crate::entry::EntryRecord;

/// Visits every entry of `archive` with its metadata and content stream.
///
/// Directory entries are visited too; their streams yield no bytes. The
/// closure may stop iteration early by returning `ControlFlow::Break(())`,
/// which is a normal, successful return.
///
/// # Examples
///
/// ```rust,no_run
/// use std::io::Read;
/// use std::ops::ControlFlow;
/// use zipwright::iterate;
///
/// # fn main() -> zipwright::Result<()> {
/// let mut manifest = String::new();
/// iterate("app.zip", |record, content| {
///     if record.path() == "MANIFEST" {
///         content.read_to_string(&mut manifest)?;
///         return Ok(ControlFlow::Break(()));
///     }
///     Ok(ControlFlow::Continue(()))
/// })?;
/// # Ok(())
/// # }
/// ```
pub fn iterate<F>(archive: impl AsRef<Path>, mut visit: F) -> Result<()>
where
    F: FnMut(&EntryRecord, &mut dyn Read) -> Result<ControlFlow<()>>,
{
    let mut archive = open(archive.as_ref())?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let record = EntryRecord::from_zip_entry(&entry);
        if visit(&record, &mut entry)?.is_break() {
            break;
        }
    }
    Ok(())
}

/// Visits every entry's metadata without opening content streams.
///
/// This is the cheap variant for callers that do not need payloads.
pub fn iterate_info<F>(archive: impl AsRef<Path>, mut visit: F) -> Result<()>
where
    F: FnMut(&EntryRecord) -> Result<ControlFlow<()>>,
{
    let mut archive = open(archive.as_ref())?;
    for index in 0..archive.len() {
        let record = {
            let entry = archive.by_index_raw(index)?;
            EntryRecord::from_zip_entry(&entry)
        };
        if visit(&record)?.is_break() {
            break;
        }
    }
    Ok(())
}

/// Returns every entry name in archive order.
pub fn entry_names(archive: impl AsRef<Path>) -> Result<Vec<String>> {
    let mut names = Vec::new();
    iterate_info(archive, |record| {
        names.push(record.path().to_string());
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(names)
}

/// Returns whether the archive contains an entry with exactly this name.
pub fn contains_entry(archive: impl AsRef<Path>, name: &str) -> Result<bool> {
    let archive = open(archive.as_ref())?;
    Ok(archive.index_for_name(name).is_some())
}

/// Reads one entry's content into memory.
///
/// Returns `Ok(None)` when no entry with this name exists.
pub fn read_entry(archive: impl AsRef<Path>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = open(archive.as_ref())?;
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            Ok(Some(data))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn open(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}
