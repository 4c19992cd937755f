//! Error types for ZIP rewrite operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when rewriting, extracting, or comparing ZIP archives,
//! along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Errors
//! propagate with the `?` operator; nothing is retried automatically, and
//! partial writes are never exposed because all writing happens against a
//! temporary target until the atomic commit step.
//!
//! ```rust,no_run
//! use zipwright::{Error, Rewrite};
//!
//! fn patch(archive: &str) -> zipwright::Result<()> {
//!     let result = Rewrite::source(archive)
//!         .remove("obsolete.txt")
//!         .execute();
//!     match result {
//!         Ok(_) => Ok(()),
//!         Err(Error::PathEscapesRoot { entry, .. }) => {
//!             eprintln!("refusing malicious entry: {}", entry);
//!             Err(Error::invalid_request("archive is untrusted"))
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

/// The main error type for ZIP rewrite operations.
///
/// Errors fall into a few categories:
///
/// | Category | Variants | Typical cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io], [`Persist`][Self::Persist] | File system operations |
/// | Codec | [`Codec`][Self::Codec] | Invalid or truncated archive data |
/// | Security | [`PathEscapesRoot`][Self::PathEscapesRoot] | Malicious entry names |
/// | Usage | [`InvalidRequest`][Self::InvalidRequest] | Misconfigured rewrite, caught before any I/O |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading source data or writing output.
    ///
    /// This wraps [`std::io::Error`] and is always fatal to the current
    /// operation. Common causes include missing files, permission problems,
    /// and full disks.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The ZIP codec reported a failure while decoding or encoding.
    ///
    /// This covers malformed local headers, a corrupt central directory,
    /// unsupported compression methods, and CRC mismatches detected by the
    /// codec during entry reads.
    #[error("ZIP codec error: {0}")]
    Codec(#[from] zip::result::ZipError),

    /// The completed working target could not be swapped onto the
    /// destination.
    ///
    /// Raised by the final commit step of an in-place rewrite. The original
    /// archive is left untouched when this occurs.
    #[error("could not replace destination: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// An entry name would resolve outside the extraction root.
    ///
    /// This is a **security error** indicating the archive contains a name
    /// designed to escape the output directory (e.g. `../../etc/passwd` or
    /// an absolute path). Extraction aborts and nothing is created outside
    /// the root.
    #[error("entry '{entry}' escapes the extraction root '{}'", root.display())]
    PathEscapesRoot {
        /// The offending entry name as stored in the archive.
        entry: String,
        /// The output root the entry tried to escape.
        root: PathBuf,
    },

    /// The rewrite request is inconsistent and was rejected before any I/O.
    ///
    /// For example, neither a source archive nor a destination was
    /// specified. This indicates a programming error in the caller, not a
    /// runtime failure.
    #[error("invalid rewrite request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: String,
    },
}

impl Error {
    /// Creates an [`Error::InvalidRequest`] from a reason string.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Error::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates a security issue.
    ///
    /// Security errors should cause extraction to abort unless the archive
    /// source is fully trusted.
    pub fn is_security_error(&self) -> bool {
        matches!(self, Error::PathEscapesRoot { .. })
    }

    /// Returns `true` if this error was detected before any I/O began.
    ///
    /// Such errors indicate a misconfigured request rather than a failure
    /// of the operation itself; the destination is guaranteed untouched.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::InvalidRequest { .. })
    }

    /// Returns the entry name associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::PathEscapesRoot { entry, .. } => Some(entry.as_str()),
            _ => None,
        }
    }
}

/// A specialized Result type for ZIP rewrite operations.
///
/// This is defined as `std::result::Result<T, Error>` for convenience.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_codec_error_from() {
        let zip_err = zip::result::ZipError::FileNotFound;
        let err: Error = zip_err.into();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_path_escapes_root() {
        let err = Error::PathEscapesRoot {
            entry: "../../etc/passwd".into(),
            root: PathBuf::from("/tmp/out"),
        };
        assert!(err.is_security_error());
        assert_eq!(err.entry_name(), Some("../../etc/passwd"));
        let msg = err.to_string();
        assert!(msg.contains("../../etc/passwd"));
        assert!(msg.contains("/tmp/out"));
    }

    #[test]
    fn test_invalid_request() {
        let err = Error::invalid_request("no source and no destination");
        assert!(err.is_usage_error());
        assert!(!err.is_security_error());
        assert!(err.to_string().contains("no source and no destination"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
