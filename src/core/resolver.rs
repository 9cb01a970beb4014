use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::builders::patterns::{self, MATCH_ALL, PatternMatcher, PatternType, SourcePattern};
use crate::core::config::ProjectConfig;
use crate::core::error::ResolveError;

/// Resolves which files a TypeScript project compiles.
///
/// The resolver is a pure function of its arguments and the filesystem state
/// at call time: it walks the search root once, never writes, and never logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResolver {
    allow_js: bool,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also select `.js`/`.jsx`/`.mjs`/`.cjs` files, as `allowJs` does.
    pub fn with_allow_js(mut self, allow_js: bool) -> Self {
        self.allow_js = allow_js;
        self
    }

    /// Resolves the compilation unit described by a loaded project configuration.
    ///
    /// Entries of `files` that exist under the search root come first, in the
    /// order they are listed, and are never removed by `exclude`. The files
    /// selected by `include` follow, as in [`FileResolver::resolve`].
    pub fn resolve_project(
        &self,
        working_dir: &Path,
        config: &ProjectConfig,
    ) -> Result<Vec<PathBuf>, ResolveError> {
        self.with_allow_js(config.allow_js).expand(
            working_dir,
            config.root_dir.as_deref(),
            &config.files,
            &config.include,
            &config.exclude,
        )
    }

    /// Expands `include` and `exclude` under `working_dir` (joined with
    /// `root_dir` when given) into an ordered list of absolute file paths.
    ///
    /// Files are grouped by the first include pattern that selects them, in
    /// pattern order. Within a group they are ordered component by component,
    /// the way `Path` compares, so `a/b.ts` comes before `a.ts`. Excludes are
    /// applied after every include, so an exclude always wins. An empty
    /// `include` selects every source file under the search root.
    ///
    /// # Errors
    /// * `ResolveError::RootNotFound` when the search root is not a directory.
    /// * `ResolveError::Pattern` for the first malformed pattern, checked
    ///   before the filesystem is touched.
    pub fn resolve(
        &self,
        working_dir: &Path,
        root_dir: Option<&Path>,
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<PathBuf>, ResolveError> {
        self.expand(working_dir, root_dir, &[], include, exclude)
    }

    fn expand(
        &self,
        working_dir: &Path,
        root_dir: Option<&Path>,
        files: &[String],
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<PathBuf>, ResolveError> {
        let search_root = match root_dir {
            Some(dir) => working_dir.join(dir),
            None => working_dir.to_path_buf(),
        };
        let search_root = search_root
            .canonicalize()
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| ResolveError::RootNotFound {
                path: search_root.clone(),
            })?;

        let include = if include.is_empty() {
            vec![MATCH_ALL.to_string()]
        } else {
            include.to_vec()
        };
        let include = SourcePattern::compile_all(PatternType::Include, &include, &search_root)?;
        let exclude = SourcePattern::compile_all(PatternType::Exclude, exclude, &search_root)?;

        let listed = listed_files(&search_root, files);
        let candidates = self.source_files(&search_root, &exclude);

        let mut seen: HashSet<&Path> = listed.iter().map(PathBuf::as_path).collect();
        let mut selected: Vec<&Path> = Vec::new();
        for pattern in &include {
            for relative in &candidates {
                if !seen.contains(relative.as_path()) && pattern.matches_path(relative) {
                    seen.insert(relative.as_path());
                    selected.push(relative.as_path());
                }
            }
        }

        let included = selected
            .into_iter()
            .filter(|relative| !exclude.iter().any(|p| p.matches_path(relative)));
        Ok(listed
            .iter()
            .map(PathBuf::as_path)
            .chain(included)
            .map(|relative| search_root.join(relative))
            .collect())
    }

    /// Lists every regular source file under `search_root`, relative to it.
    ///
    /// Siblings are visited in file name order and a directory's contents
    /// right after the directory, which yields `Path` ordering without a
    /// separate sort. Directories matched by an exclude pattern are not
    /// descended into.
    ///
    /// Symbolic links are followed. Entries that would re-enter an ancestor
    /// directory (a link cycle), dangling links, and unreadable entries are
    /// skipped.
    fn source_files(&self, search_root: &Path, exclude: &[SourcePattern]) -> Vec<PathBuf> {
        let excluded_dir = |entry: &DirEntry| {
            entry.depth() > 0
                && entry.file_type().is_dir()
                && entry
                    .path()
                    .strip_prefix(search_root)
                    .is_ok_and(|relative| exclude.iter().any(|p| p.matches_path(relative)))
        };

        WalkDir::new(search_root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !excluded_dir(entry))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| patterns::is_source_file(entry.path(), self.allow_js))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(search_root)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect()
    }
}

/// Turns `files` entries into root-relative paths of existing regular files,
/// dropping repeats. Entries that leave the search root are skipped.
fn listed_files(search_root: &Path, files: &[String]) -> Vec<PathBuf> {
    let mut listed: Vec<PathBuf> = Vec::new();
    for file in files {
        let path = Path::new(file);
        let relative = if path.is_absolute() {
            match path.strip_prefix(search_root) {
                Ok(relative) => relative,
                Err(_) => continue,
            }
        } else {
            path
        };
        let relative: PathBuf = relative
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        if relative.as_os_str().is_empty()
            || relative.components().any(|c| matches!(c, Component::ParentDir))
        {
            continue;
        }
        if search_root.join(&relative).is_file() && !listed.contains(&relative) {
            listed.push(relative);
        }
    }
    listed
}

/// Resolves a compilation unit with the default resolver.
pub fn resolve(
    working_dir: &Path,
    root_dir: Option<&Path>,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<PathBuf>, ResolveError> {
    FileResolver::new().resolve(working_dir, root_dir, include, exclude)
}
