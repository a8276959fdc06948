//! The set of files a gate run is scoped to.

use glob::Pattern;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Upper bound on the bytes of path arguments handed to one process.
///
/// Stays well under `ARG_MAX` on Linux and macOS, and under the
/// `cmd.exe` line limit on Windows.
#[cfg(not(windows))]
pub const ARG_BYTES_BUDGET: usize = 256 * 1024;
/// Upper bound on the bytes of path arguments handed to one process.
#[cfg(windows)]
pub const ARG_BYTES_BUDGET: usize = 6 * 1024;

/// Ordered, deduplicated list of repository-relative paths.
///
/// Built once per gate invocation and never mutated afterwards. Narrowing
/// for a single check ([`ChangeSet::filter`]) produces a new set. Paths are
/// kept as raw OS strings so names that are not valid UTF-8 reach the
/// checks byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<PathBuf>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub const fn empty() -> Self {
        Self { paths: Vec::new() }
    }

    /// Builds a change set from paths, keeping the first occurrence of each.
    ///
    /// Blank entries are dropped.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathBuf>,
    {
        let mut seen = HashSet::new();
        let paths = paths
            .into_iter()
            .map(Into::into)
            .filter(|p: &PathBuf| !p.as_os_str().is_empty())
            .filter(|p| seen.insert(p.clone()))
            .collect();
        Self { paths }
    }

    /// Parses NUL-separated output as produced by `git ... -z`.
    #[must_use]
    pub fn from_nul_separated(raw: &[u8]) -> Self {
        Self::from_paths(raw.split(|b| *b == 0).map(path_from_bytes))
    }

    /// Returns the paths in order.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if no paths are in the set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns true if the set contains `path`.
    #[must_use]
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.paths.iter().any(|p| p == path)
    }

    /// Keeps only the paths matching at least one pattern.
    ///
    /// An empty pattern list keeps everything. Patterns without a `/` match
    /// against the file name as well as the whole path, so `*.py` selects
    /// Python files in any directory.
    #[must_use]
    pub fn filter(&self, patterns: &[Pattern]) -> Self {
        if patterns.is_empty() {
            return self.clone();
        }

        let paths = self
            .paths
            .iter()
            .filter(|path| patterns.iter().any(|pattern| matches(pattern, path)))
            .cloned()
            .collect();
        Self { paths }
    }

    /// Splits the set into consecutive batches for separate invocations.
    ///
    /// A batch holds at most `max_paths` paths (`None` or zero means no
    /// count limit) and at most [`ARG_BYTES_BUDGET`] bytes of arguments. A
    /// single path over the byte budget gets a batch of its own. An empty
    /// set yields one empty batch.
    pub fn batches(&self, max_paths: Option<usize>) -> Vec<&[PathBuf]> {
        self.batches_within(max_paths, ARG_BYTES_BUDGET)
    }

    fn batches_within(&self, max_paths: Option<usize>, max_bytes: usize) -> Vec<&[PathBuf]> {
        let max_paths = max_paths.filter(|n| *n > 0).unwrap_or(usize::MAX);
        let mut batches = Vec::new();
        let mut start = 0;
        let mut bytes = 0;

        for (i, path) in self.paths.iter().enumerate() {
            // One extra byte for the terminating NUL of each argument.
            let cost = path.as_os_str().len() + 1;
            let count = i - start;
            if count > 0 && (count >= max_paths || bytes + cost > max_bytes) {
                batches.push(&self.paths[start..i]);
                start = i;
                bytes = 0;
            }
            bytes += cost;
        }

        batches.push(&self.paths[start..]);
        batches
    }
}

#[cfg(unix)]
fn path_from_bytes(raw: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(raw))
}

// Git for Windows writes paths as UTF-8.
#[cfg(not(unix))]
fn path_from_bytes(raw: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(raw).into_owned())
}

fn matches(pattern: &Pattern, path: &Path) -> bool {
    if pattern.matches_path(path) {
        return true;
    }
    if pattern.as_str().contains('/') {
        return false;
    }
    path.file_name()
        .is_some_and(|file_name| pattern.matches_path(Path::new(file_name)))
}

/// Serializes as a list of strings. Names that are not valid UTF-8 are
/// rendered lossily; the report is for reading, not for feeding back.
impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.paths.len()))?;
        for path in &self.paths {
            seq.serialize_element(&path.to_string_lossy())?;
        }
        seq.end()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}
