//! Git repository operations.
//!
//! This module provides the version-control side of the gate: finding the
//! repository root, resolving revisions, and listing changed or tracked
//! paths. Everything here is read-only.

use crate::core::changeset::ChangeSet;
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Default diff filter: added, copied, modified, renamed. Deleted paths are
/// left out because there is nothing on disk for a tool to inspect.
pub const DEFAULT_DIFF_FILTER: &str = "ACMR";

/// How the base and head revisions are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffRange {
    /// Changes on head since it diverged from base (`base...head`).
    #[default]
    MergeBase,
    /// Straight tree comparison (`base head`).
    Direct,
}

/// Represents a Git repository.
#[derive(Debug, Clone)]
pub struct GitRepo {
    /// Root directory of the repository (where .git is).
    root: PathBuf,
}

impl GitRepo {
    /// Discovers the Git repository from the current directory.
    pub fn discover() -> Result<Self> {
        Self::discover_from(&std::env::current_dir().map_err(|e| Error::io("get current dir", e))?)
    }

    /// Discovers the Git repository from a specific path.
    pub fn discover_from(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(|e| Error::io("run git rev-parse", e))?;

        if !output.status.success() {
            return Err(Error::NotGitRepo);
        }

        let root = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(PathBuf::from)
            .ok_or(Error::NotGitRepo)?;

        Ok(Self { root })
    }

    /// Returns the root directory of the repository.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a revision to a full commit id.
    pub fn resolve_revision(&self, revision: &str) -> Result<String> {
        if revision.trim().is_empty() || revision.starts_with('-') {
            return Err(Error::revision(revision, "not a revision name"));
        }

        let output = self.git(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("{revision}^{{commit}}"),
        ])?;

        if !output.status.success() {
            return Err(Error::revision(
                revision,
                "unknown revision or not a commit in this repository",
            ));
        }

        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!(revision, sha = %sha, "Resolved revision");
        Ok(sha)
    }

    /// Lists paths that differ between two revisions.
    ///
    /// Both revisions are resolved first; if they name the same commit the
    /// result is empty without running a diff.
    pub fn changed_files(
        &self,
        base: &str,
        head: &str,
        range: DiffRange,
        diff_filter: &str,
    ) -> Result<ChangeSet> {
        let base_sha = self.resolve_revision(base)?;
        let head_sha = self.resolve_revision(head)?;

        if base_sha == head_sha {
            tracing::debug!(base, head, "Base and head are the same commit");
            return Ok(ChangeSet::empty());
        }

        let filter = format!("--diff-filter={diff_filter}");
        let output = match range {
            DiffRange::MergeBase => {
                let spec = format!("{base_sha}...{head_sha}");
                self.git(&["diff", "--name-only", "--no-renames", "-z", &filter, &spec])?
            },
            DiffRange::Direct => self.git(&[
                "diff",
                "--name-only",
                "--no-renames",
                "-z",
                &filter,
                &base_sha,
                &head_sha,
            ])?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git("diff", stderr.trim().to_string()));
        }

        let changes = ChangeSet::from_nul_separated(&output.stdout);
        tracing::debug!(base, head, files = changes.len(), "Computed change set");
        Ok(changes)
    }

    /// Lists every path tracked at `revision`.
    ///
    /// Reads the committed tree, not the index, so the list matches the
    /// revision under test even when it is not checked out.
    pub fn tracked_files(&self, revision: &str) -> Result<ChangeSet> {
        let sha = self.resolve_revision(revision)?;
        let output = self.git(&["ls-tree", "-r", "-z", "--name-only", &sha])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git("ls-tree", stderr.trim().to_string()));
        }

        let tracked = ChangeSet::from_nul_separated(&output.stdout);
        tracing::debug!(revision, files = tracked.len(), "Listed tracked files");
        Ok(tracked)
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::io(format!("run git {}", args.first().unwrap_or(&"")), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn git(path: &Path, args: &[&str]) {
        Command::new("git")
            .args(args)
            .current_dir(path)
            .output()
            .expect("run git");
    }

    fn create_test_repo() -> (TempDir, GitRepo) {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path();

        git(path, &["init"]);
        git(path, &["config", "user.email", "test@test.com"]);
        git(path, &["config", "user.name", "Test"]);
        git(path, &["config", "commit.gpgsign", "false"]);

        let repo = GitRepo::discover_from(path).expect("discover repo");
        (temp, repo)
    }

    fn commit_file(temp: &TempDir, name: &str, content: &str) -> String {
        let file = temp.path().join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(&file, content).expect("write file");
        git(temp.path(), &["add", "."]);
        git(temp.path(), &["commit", "-q", "-m", name]);
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(temp.path())
            .output()
            .expect("rev-parse");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn names(set: &ChangeSet) -> Vec<String> {
        set.paths()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    // =========================================================================
    // Discovery tests
    // =========================================================================

    #[test]
    fn test_discover_from_subdirectory() {
        let (temp, _) = create_test_repo();

        let subdir = temp.path().join("src/lib");
        std::fs::create_dir_all(&subdir).expect("create subdir");

        let repo = GitRepo::discover_from(&subdir).expect("discover from subdir");
        // Canonicalize both paths to handle macOS /var -> /private/var symlinks
        let expected = temp.path().canonicalize().expect("canonicalize temp");
        let actual = repo.root().canonicalize().expect("canonicalize root");
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_not_git_repo() {
        let temp = TempDir::new().expect("create temp dir");
        let result = GitRepo::discover_from(temp.path());
        assert!(matches!(result, Err(Error::NotGitRepo)));
    }

    // =========================================================================
    // Revision tests
    // =========================================================================

    #[test]
    fn test_resolve_revision() {
        let (temp, repo) = create_test_repo();
        let sha = commit_file(&temp, "a.txt", "a");

        assert_eq!(repo.resolve_revision("HEAD").expect("resolve"), sha);
        assert_eq!(repo.resolve_revision(&sha[..10]).expect("resolve"), sha);
    }

    #[test]
    fn test_resolve_unknown_revision() {
        let (temp, repo) = create_test_repo();
        commit_file(&temp, "a.txt", "a");

        let result = repo.resolve_revision("does-not-exist");
        assert!(matches!(result, Err(Error::RevisionResolution { .. })));
    }

    #[test]
    fn test_resolve_rejects_option_like_revision() {
        let (_temp, repo) = create_test_repo();
        let result = repo.resolve_revision("--all");
        assert!(matches!(result, Err(Error::RevisionResolution { .. })));
    }

    #[test]
    fn test_resolve_head_in_empty_repo_fails() {
        let (_temp, repo) = create_test_repo();
        assert!(matches!(
            repo.resolve_revision("HEAD"),
            Err(Error::RevisionResolution { .. })
        ));
    }

    // =========================================================================
    // Change set tests
    // =========================================================================

    #[test]
    fn test_changed_files_between_commits() {
        let (temp, repo) = create_test_repo();
        let base = commit_file(&temp, "README.md", "readme");
        commit_file(&temp, "a.txt", "a");
        commit_file(&temp, "src/b.txt", "b");

        let changes = repo
            .changed_files(&base, "HEAD", DiffRange::MergeBase, DEFAULT_DIFF_FILTER)
            .expect("changed files");
        assert_eq!(names(&changes), ["a.txt", "src/b.txt"]);
    }

    #[test]
    fn test_changed_files_same_revision_is_empty() {
        let (temp, repo) = create_test_repo();
        let sha = commit_file(&temp, "a.txt", "a");

        let changes = repo
            .changed_files(&sha, "HEAD", DiffRange::Direct, DEFAULT_DIFF_FILTER)
            .expect("changed files");
        assert!(changes.is_empty());
    }

    #[test]
    fn test_changed_files_skips_deletions_by_default() {
        let (temp, repo) = create_test_repo();
        commit_file(&temp, "gone.txt", "x");
        let base = commit_file(&temp, "kept.txt", "x");
        std::fs::remove_file(temp.path().join("gone.txt")).expect("remove");
        commit_file(&temp, "kept.txt", "y");

        let changes = repo
            .changed_files(&base, "HEAD", DiffRange::Direct, DEFAULT_DIFF_FILTER)
            .expect("changed files");
        assert_eq!(names(&changes), ["kept.txt"]);

        let with_deleted = repo
            .changed_files(&base, "HEAD", DiffRange::Direct, "ACMRD")
            .expect("changed files");
        assert_eq!(names(&with_deleted), ["gone.txt", "kept.txt"]);
    }

    #[test]
    fn test_merge_base_ignores_changes_on_base_branch() {
        let (temp, repo) = create_test_repo();
        commit_file(&temp, "root.txt", "root");
        git(temp.path(), &["branch", "-M", "main"]);
        git(temp.path(), &["checkout", "-q", "-b", "feature"]);
        commit_file(&temp, "feature.txt", "f");
        git(temp.path(), &["checkout", "-q", "main"]);
        commit_file(&temp, "main-only.txt", "m");

        let merge_base = repo
            .changed_files("main", "feature", DiffRange::MergeBase, DEFAULT_DIFF_FILTER)
            .expect("changed files");
        assert_eq!(names(&merge_base), ["feature.txt"]);

        let direct = repo
            .changed_files("main", "feature", DiffRange::Direct, "ACMRD")
            .expect("changed files");
        assert!(direct.contains("main-only.txt"));
        assert!(direct.contains("feature.txt"));
    }

    #[test]
    fn test_changed_files_unresolvable_base() {
        let (temp, repo) = create_test_repo();
        commit_file(&temp, "a.txt", "a");

        let result = repo.changed_files("nope", "HEAD", DiffRange::MergeBase, DEFAULT_DIFF_FILTER);
        assert!(matches!(result, Err(Error::RevisionResolution { revision, .. }) if revision == "nope"));
    }

    #[test]
    fn test_tracked_files() {
        let (temp, repo) = create_test_repo();
        commit_file(&temp, "a.txt", "a");
        commit_file(&temp, "dir/b.txt", "b");
        std::fs::write(temp.path().join("untracked.txt"), "u").expect("write");

        let tracked = repo.tracked_files("HEAD").expect("tracked files");
        assert_eq!(names(&tracked), ["a.txt", "dir/b.txt"]);
    }

    #[test]
    fn test_tracked_files_at_older_revision() {
        let (temp, repo) = create_test_repo();
        let first = commit_file(&temp, "a.txt", "a");
        commit_file(&temp, "b.txt", "b");

        let tracked = repo.tracked_files(&first).expect("tracked files");
        assert_eq!(names(&tracked), ["a.txt"]);
        assert_eq!(repo.tracked_files("HEAD").expect("tracked files").len(), 2);
    }

    #[test]
    fn test_tracked_files_unresolvable_revision() {
        let (temp, repo) = create_test_repo();
        commit_file(&temp, "a.txt", "a");

        let result = repo.tracked_files("nope");
        assert!(matches!(result, Err(Error::RevisionResolution { .. })));
    }

    // macOS file systems refuse names that are not UTF-8.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_file_name_keeps_its_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (temp, repo) = create_test_repo();
        let base = commit_file(&temp, "README.md", "readme");
        let name = OsStr::from_bytes(b"caf\xe9.txt");
        std::fs::write(temp.path().join(name), "x").expect("write file");
        git(temp.path(), &["add", "."]);
        git(temp.path(), &["commit", "-q", "-m", "latin-1 name"]);

        let changes = repo
            .changed_files(&base, "HEAD", DiffRange::MergeBase, DEFAULT_DIFF_FILTER)
            .expect("changed files");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.paths()[0].as_os_str().as_bytes(), b"caf\xe9.txt");
        assert!(temp.path().join(&changes.paths()[0]).exists());

        let tracked = repo.tracked_files("HEAD").expect("tracked files");
        assert!(tracked.contains(name));
    }
}
