use anyhow::{Context, Result};
use git2::{Delta, DiffOptions, Repository};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Supplies the set of files a pull request touches.
///
/// Paths are relative to the repository root. This is the seam where a CI
/// integration would plug in a provider backed by its own API.
pub trait ChangedFilesProvider {
    fn changed_files(&self) -> Result<BTreeSet<PathBuf>>;

    /// Absolute directory the returned paths are relative to.
    fn root(&self) -> &Path;
}

/// Changed files computed by diffing two revisions of a local repository.
pub struct GitChangedFiles {
    repo: Repository,
    base: String,
    head: String,
}

impl GitChangedFiles {
    /// Opens the repository containing `path` and compares `base` with `head`.
    ///
    /// Revisions are anything `git rev-parse` understands (`origin/main`,
    /// a commit id, `HEAD~3`).
    pub fn new<P: AsRef<Path>>(path: P, base: &str, head: &str) -> Result<Self> {
        let repo = Repository::discover(path.as_ref()).with_context(|| {
            format!("Not in a Git repository: {}", path.as_ref().display())
        })?;
        Ok(Self {
            repo,
            base: base.to_string(),
            head: head.to_string(),
        })
    }

    fn tree_for(&self, revision: &str) -> Result<git2::Tree<'_>> {
        let object = self
            .repo
            .revparse_single(revision)
            .with_context(|| format!("Unknown revision '{revision}'"))?;
        object
            .peel_to_tree()
            .with_context(|| format!("Revision '{revision}' does not point to a tree"))
    }
}

impl ChangedFilesProvider for GitChangedFiles {
    fn changed_files(&self) -> Result<BTreeSet<PathBuf>> {
        let base_tree = self.tree_for(&self.base)?;
        let head_tree = self.tree_for(&self.head)?;

        let mut options = DiffOptions::new();
        let mut diff =
            self.repo
                .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut options))?;
        // Report a renamed file under its new name rather than as delete + add.
        diff.find_similar(None)?;

        let mut changed = BTreeSet::new();
        for delta in diff.deltas() {
            if matches!(delta.status(), Delta::Deleted) {
                continue;
            }
            if let Some(path) = delta.new_file().path() {
                changed.insert(path.to_path_buf());
            }
        }
        Ok(changed)
    }

    fn root(&self) -> &Path {
        // `workdir` is `None` for bare repositories, where `path` is the root.
        self.repo.workdir().unwrap_or(self.repo.path())
    }
}

/// Changed files handed over explicitly, from arguments or a list file.
pub struct StaticChangedFiles {
    root: PathBuf,
    files: BTreeSet<PathBuf>,
}

impl StaticChangedFiles {
    pub fn new(root: PathBuf, files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            root,
            files: files.into_iter().collect(),
        }
    }

    /// Reads one path per line; blank lines and `#` comments are skipped.
    pub fn from_list_file(root: PathBuf, list: &Path) -> Result<Self> {
        let content = fs::read_to_string(list)
            .with_context(|| format!("Failed to read changed files list {}", list.display()))?;
        let files = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PathBuf::from);
        Ok(Self::new(root, files))
    }
}

impl ChangedFilesProvider for StaticChangedFiles {
    fn changed_files(&self) -> Result<BTreeSet<PathBuf>> {
        Ok(self.files.clone())
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
