//! Shared test utilities for integration tests.
//!
//! Archive fixture builders are consolidated here to avoid duplication.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Writes an archive file containing the given (name, content) entries.
///
/// Entries are written with default options in the given order. Names are
/// used verbatim, which lets tests craft hostile archives the public API
/// would never produce.
pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// Writes an archive that also contains explicit directory entries.
pub fn write_archive_with_dirs(path: &Path, dirs: &[&str], entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for dir in dirs {
        writer
            .add_directory(*dir, SimpleFileOptions::default())
            .unwrap();
    }
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// Reads back every entry of an archive as (name, content) pairs, in
/// archive order.
pub fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path).unwrap())).unwrap();
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        entries.push((entry.name().to_string(), data));
    }
    entries
}

/// Returns just the entry names of an archive, in archive order.
pub fn archive_names(path: &Path) -> Vec<String> {
    read_archive(path)
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

/// Looks up one entry's content by name.
pub fn entry_content(path: &Path, name: &str) -> Option<Vec<u8>> {
    read_archive(path)
        .into_iter()
        .find(|(entry_name, _)| entry_name == name)
        .map(|(_, data)| data)
}
