//! # zipwright
//!
//! A library for rewriting ZIP archives: pack directories, extract
//! entries, and patch existing archives by composing add, remove, replace,
//! and transform operations into a single streamed pass with an atomic
//! commit.
//!
//! The byte-level ZIP container work (local headers, central directory,
//! CRC32, DEFLATE) is delegated to the [`zip`] codec; this crate
//! orchestrates entry-level reads and writes against it.
//!
//! ## Quick Start
//!
//! ### Patching an Archive
//!
//! ```rust,no_run
//! use zipwright::Rewrite;
//!
//! fn main() -> zipwright::Result<()> {
//!     // Rewrites app.zip in place: the original is only replaced once
//!     // the whole rewrite has succeeded.
//!     let result = Rewrite::source("app.zip")
//!         .add_entry("VERSION", b"2.0.0".to_vec())
//!         .remove("docs/")
//!         .execute()?;
//!     println!("wrote {} entries", result.total_entries());
//!     Ok(())
//! }
//! ```
//!
//! ### Packing and Unpacking
//!
//! ```rust,no_run
//! use zipwright::{PackOptions, pack_directory, unpack};
//!
//! fn main() -> zipwright::Result<()> {
//!     pack_directory("site/", "site.zip", &PackOptions::new())?;
//!     unpack("site.zip", "elsewhere/")?;
//!     Ok(())
//! }
//! ```
//!
//! ### Transforming Entry Content
//!
//! ```rust,no_run
//! use std::io::{Read, Write};
//! use zipwright::{EntryRecord, Rewrite};
//!
//! fn main() -> zipwright::Result<()> {
//!     Rewrite::source("app.zip")
//!         .transform(
//!             "config.ini",
//!             |input: &mut dyn Read, _record: &EntryRecord, output: &mut dyn Write| -> zipwright::Result<()> {
//!                 let mut text = String::new();
//!                 input.read_to_string(&mut text)?;
//!                 output.write_all(text.replace("debug=1", "debug=0").as_bytes())?;
//!                 Ok(())
//!             },
//!         )
//!         .execute()?;
//!     Ok(())
//! }
//! ```
//!
//! ### Comparing Archives
//!
//! ```rust,no_run
//! use zipwright::archives_equivalent;
//!
//! fn main() -> zipwright::Result<()> {
//!     // True even when the archives were compressed at different levels,
//!     // as long as the entries and their content match.
//!     let same = archives_equivalent("a.zip", "b.zip")?;
//!     println!("equivalent: {same}");
//!     Ok(())
//! }
//! ```
//!
//! ## Semantics
//!
//! - **Precedence**: added entries are written first, in caller order, and
//!   outrank source entries at the same path; an entry both added and
//!   removed is not removed.
//! - **First wins**: duplicate names are suppressed, never an error.
//! - **Directory removal cascades**: removing `dir/` also removes
//!   everything under it (component-boundary prefix, so `dirty.txt`
//!   survives).
//! - **Atomicity**: an in-place rewrite writes to a temporary beside the
//!   source and only touches the original at the final swap; failures
//!   leave the source untouched and no stray temporaries behind.
//! - **Path safety**: extraction resolves every entry name against the
//!   output root and aborts on traversal
//!   ([`Error::PathEscapesRoot`]).
//!
//! ## Concurrency
//!
//! All operations run synchronously on the calling thread. The single
//! exception is the transform bridge: when a transformed entry is
//! materialized as a flat file, one short-lived worker thread adapts the
//! push-style transformer to the pull-style file write through a bounded
//! in-memory pipe, and is always joined before the call returns. There is
//! no cancellation mechanism; operations run to completion or fail.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod compare;
pub mod entry;
pub mod error;
pub mod guard;
pub mod iterate;
pub mod pack;
pub mod rewrite;
pub mod source;
pub mod transform;

mod mutation;
mod timestamp;

pub use error::{Error, Result};

pub use entry::{CompressionKind, EntryRecord};
pub use source::{BytesSource, DirSource, EntrySource, FileSource};
pub use transform::ContentTransformer;

// Re-export the rewrite API at the crate root for convenience
pub use rewrite::{Rewrite, RewriteResult, RootHandling};

// Re-export packing and comparison conveniences
pub use compare::archives_equivalent;
pub use pack::{PackOptions, pack_directory, unpack};

// Re-export iteration and lookup helpers
pub use iterate::{contains_entry, entry_names, iterate, iterate_info, read_entry};

// Re-export the path safety guard for callers doing their own extraction
pub use guard::resolve_under_root;

// The codec's timestamp type appears in `EntryRecord`; re-export it so
// callers do not need a direct `zip` dependency.
pub use zip::DateTime;
