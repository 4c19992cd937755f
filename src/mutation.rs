//! The mutation set consumed by one rewrite pipeline run.
//!
//! A [`MutationSet`] gathers three path-keyed collections the caller builds
//! up before execution: changed-or-added entries (ordered; insertion order
//! is precedence order), removed paths (with directory-prefix cascade
//! semantics), and per-path content transformers. The set is consumed by
//! exactly one pipeline run and discarded afterwards.
//!
//! A path present both in the additions and the removals is **not**
//! removed: additions are emitted before the source archive is streamed,
//! and removal only ever filters source entries.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::source::EntrySource;
use crate::transform::ContentTransformer;

/// Pending mutations for one rewrite run.
#[derive(Default)]
pub(crate) struct MutationSet {
    /// Entries to write before the source archive is streamed, in caller
    /// order. Earlier entries win over later ones at the same path.
    pub(crate) changed_or_added: Vec<Box<dyn EntrySource>>,
    /// Paths to drop from the source archive.
    pub(crate) removed: BTreeSet<String>,
    /// Content transformers keyed by the pre-mapping source path. Entries
    /// are taken out as they match; leftovers are never invoked.
    pub(crate) transformers: HashMap<String, Box<dyn ContentTransformer>>,
}

impl MutationSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

/// Removal decisions for source entries, derived once per run.
///
/// A removed path that denotes a directory in the source removes every
/// entry under it. "Under" is a component-boundary prefix: removing `dir/`
/// drops `dir/` and `dir/child.txt` but never `dirty.txt`.
pub(crate) struct RemovalMatcher {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl RemovalMatcher {
    /// Derives the matcher from the removed-path set and the source
    /// archive's entry names.
    ///
    /// A removed path denotes a directory when it is spelled with a
    /// trailing slash, when the source holds an explicit directory entry
    /// for it, or when the source holds entries beneath it.
    pub(crate) fn new<'a>(
        removed: &BTreeSet<String>,
        source_names: impl Iterator<Item = &'a str>,
    ) -> Self {
        let names: Vec<&str> = source_names.collect();
        let mut exact = HashSet::new();
        let mut prefixes = Vec::new();

        for path in removed {
            let base = path.trim_end_matches('/');
            if base.is_empty() {
                continue;
            }
            exact.insert(base.to_string());

            let dir_prefix = format!("{base}/");
            let denotes_dir = path.ends_with('/')
                || names.iter().any(|name| name.starts_with(dir_prefix.as_str()));
            if denotes_dir {
                prefixes.push(dir_prefix);
            }
        }

        Self { exact, prefixes }
    }

    /// Whether the named source entry should be dropped.
    pub(crate) fn matches(&self, name: &str) -> bool {
        let base = name.trim_end_matches('/');
        if self.exact.contains(base) {
            return true;
        }
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Whether any removal was requested at all.
    pub(crate) fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}
