//! Semantic archive equivalence.
//!
//! Two archives are equivalent when they contain the same entries with the
//! same content, independent of physical encoding: compression level,
//! entry ordering, and other container details do not matter. The
//! comparison is two-tier: a cheap whole-file byte check catches verbatim
//! copies, and only then are both archives opened and compared entry by
//! entry, so re-compressing identical content still compares equal.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use zip::ZipArchive;

use crate::Result;

const COMPARE_BUFFER_SIZE: usize = 16 * 1024;

/// Returns whether two archive files are semantically equivalent.
///
/// The check is symmetric: `archives_equivalent(a, b)` equals
/// `archives_equivalent(b, a)`.
///
/// Directories match on metadata alone; files must agree on size and CRC
/// and then on every content byte. The byte comparison runs even when the
/// recorded metadata matches, so lying metadata cannot fake equivalence.
///
/// # Errors
///
/// Returns an error when either file cannot be read or either archive
/// cannot be decoded.
///
/// # Examples
///
/// ```rust,no_run
/// use zipwright::archives_equivalent;
///
/// # fn main() -> zipwright::Result<()> {
/// if archives_equivalent("build-a.zip", "build-b.zip")? {
///     println!("builds are reproducible");
/// }
/// # Ok(())
/// # }
/// ```
pub fn archives_equivalent(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<bool> {
    let a = a.as_ref();
    let b = b.as_ref();

    // Tier one: byte-for-byte identical files are equal without decoding.
    if files_identical(a, b)? {
        return Ok(true);
    }

    // Tier two: structural comparison.
    let mut first = open_archive(a)?;
    let mut second = open_archive(b)?;

    if first.len() != second.len() {
        return Ok(false);
    }

    for index in 0..first.len() {
        let (name, is_dir, size, crc32) = {
            let entry = first.by_index_raw(index)?;
            (
                entry.name().to_string(),
                entry.is_dir(),
                entry.size(),
                entry.crc32(),
            )
        };

        let Some(peer_index) = second.index_for_name(&name) else {
            return Ok(false);
        };
        let (peer_is_dir, peer_size, peer_crc32) = {
            let entry = second.by_index_raw(peer_index)?;
            (entry.is_dir(), entry.size(), entry.crc32())
        };

        if is_dir != peer_is_dir {
            return Ok(false);
        }
        if is_dir {
            // Directory content is not compared further.
            continue;
        }
        if size != peer_size || crc32 != peer_crc32 {
            return Ok(false);
        }

        let mut entry = first.by_index(index)?;
        let mut peer = second.by_index(peer_index)?;
        if !readers_equal(&mut entry, &mut peer)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// Cheap whole-file comparison: lengths first, then chunked bytes.
fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let meta_a = std::fs::metadata(a)?;
    let meta_b = std::fs::metadata(b)?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    let mut reader_a = BufReader::new(File::open(a)?);
    let mut reader_b = BufReader::new(File::open(b)?);
    readers_equal(&mut reader_a, &mut reader_b)
}

/// Compares two readers byte by byte.
fn readers_equal<A: Read, B: Read>(a: &mut A, b: &mut B) -> Result<bool> {
    let mut buf_a = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut buf_b = vec![0u8; COMPARE_BUFFER_SIZE];
    loop {
        let n_a = read_full(a, &mut buf_a)?;
        let n_b = read_full(b, &mut buf_b)?;
        if n_a != n_b {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
        if buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
    }
}

/// Reads until the buffer is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_readers_equal_on_identical_data() {
        let mut a = Cursor::new(vec![1u8; 100_000]);
        let mut b = Cursor::new(vec![1u8; 100_000]);
        assert!(readers_equal(&mut a, &mut b).unwrap());
    }

    #[test]
    fn test_readers_differ_on_length() {
        let mut a = Cursor::new(vec![1u8; 10]);
        let mut b = Cursor::new(vec![1u8; 11]);
        assert!(!readers_equal(&mut a, &mut b).unwrap());
    }

    #[test]
    fn test_readers_differ_on_content() {
        let mut a = Cursor::new(b"abcdef".to_vec());
        let mut b = Cursor::new(b"abcdeg".to_vec());
        assert!(!readers_equal(&mut a, &mut b).unwrap());
    }

    #[test]
    fn test_read_full_handles_short_reads() {
        // A reader that returns one byte at a time still fills the buffer.
        struct OneByte(Cursor<Vec<u8>>);
        impl Read for OneByte {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let len = buf.len().min(1);
                self.0.read(&mut buf[..len])
            }
        }
        let mut reader = OneByte(Cursor::new(vec![9u8; 5]));
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &[9u8; 5]);
    }

    #[test]
    fn test_files_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let c = dir.path().join("c.bin");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        std::fs::write(&c, b"diff bytes").unwrap();
        assert!(files_identical(&a, &b).unwrap());
        assert!(!files_identical(&a, &c).unwrap());
    }
}
