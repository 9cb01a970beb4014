use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::{Component, Path};

use crate::core::error::ResolveError;

/// File extensions the TypeScript compiler treats as source files.
/// `.d.ts` declarations are covered by `.ts`.
pub const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Additional extensions selected when `allowJs` is enabled.
pub const JS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

/// The implicit include used when a project lists no include patterns.
pub const MATCH_ALL: &str = "**/*";

/// Options shared by every match: `/` is never crossed by `*` or `?`, and
/// wildcards never select dot-files or dot-directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Whether a pattern selects files into the compilation unit or removes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    /// Selects files. Only files with a source extension are ever selected,
    /// and a pattern naming a directory selects everything beneath it.
    Include,
    /// Removes files. Matches either the file itself or any directory
    /// containing it.
    Exclude,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::Include => write!(f, "include"),
            PatternType::Exclude => write!(f, "exclude"),
        }
    }
}

/// A compiled include or exclude pattern.
///
/// `specification` keeps the text exactly as it appeared in the configuration,
/// so error messages and reports can name it. `normalized` is the root-relative,
/// `/`-separated form that was actually compiled.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    pub pattern_type: PatternType,
    pub specification: String,
    pub normalized: String,
    matcher: Pattern,
}

/// The `PatternMatcher` trait lets the resolver treat include and exclude
/// patterns uniformly over root-relative paths.
pub trait PatternMatcher {
    /// Checks whether a root-relative path is selected by the pattern.
    ///
    /// # Arguments
    /// * `relative`: the path of a regular file, or of a directory the walk is
    ///   about to enter, relative to the search root.
    fn matches_path(&self, relative: &Path) -> bool;
}

impl SourcePattern {
    /// Compiles a pattern relative to `search_root`.
    ///
    /// # Arguments
    /// * `pattern_type`: whether the pattern includes or excludes.
    /// * `specification`: the raw pattern string from the configuration.
    /// * `search_root`: used to relativize absolute patterns.
    ///
    /// # Returns
    /// The compiled pattern, or `ResolveError::Pattern` naming `specification`
    /// when it is empty or not a valid glob.
    pub fn new(
        pattern_type: PatternType,
        specification: &str,
        search_root: &Path,
    ) -> Result<Self, ResolveError> {
        let normalized = normalize(pattern_type, specification, search_root)?;
        let matcher = Pattern::new(&normalized)
            .map_err(|e| ResolveError::pattern(specification, e.msg))?;

        Ok(Self {
            pattern_type,
            specification: specification.to_string(),
            normalized,
            matcher,
        })
    }

    /// Compiles a list of patterns of the same type, stopping at the first
    /// invalid one.
    pub fn compile_all(
        pattern_type: PatternType,
        specifications: &[String],
        search_root: &Path,
    ) -> Result<Vec<Self>, ResolveError> {
        specifications
            .iter()
            .map(|spec| Self::new(pattern_type, spec, search_root))
            .collect()
    }

    /// Whether the normalized pattern points outside the search root.
    pub fn escapes_root(&self) -> bool {
        self.normalized.split('/').any(|segment| segment == "..")
    }

    /// The extension named by the last segment, when it names one literally
    /// (`src/**/*.json` -> `json`). Wildcard extensions return `None`.
    pub fn literal_extension(&self) -> Option<&str> {
        let last = self.normalized.rsplit('/').next()?;
        let (_, ext) = last.rsplit_once('.')?;
        if ext.is_empty() || has_wildcard(ext) {
            None
        } else {
            Some(ext)
        }
    }
}

impl PatternMatcher for SourcePattern {
    fn matches_path(&self, relative: &Path) -> bool {
        let relative = to_slash(relative);
        match self.pattern_type {
            PatternType::Include => self.matcher.matches_with(&relative, MATCH_OPTIONS),
            PatternType::Exclude => {
                // The file itself, or any directory on the way down to it.
                if self.matcher.matches_with(&relative, MATCH_OPTIONS) {
                    return true;
                }
                relative
                    .match_indices('/')
                    .any(|(idx, _)| self.matcher.matches_with(&relative[..idx], MATCH_OPTIONS))
            }
        }
    }
}

impl fmt::Display for SourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.pattern_type, self.specification)
    }
}

/// Checks whether a file name carries one of the source extensions.
pub fn is_source_file(path: &Path, allow_js: bool) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    TS_EXTENSIONS.contains(&ext) || (allow_js && JS_EXTENSIONS.contains(&ext))
}

/// Renders a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// Turns a configuration pattern into the root-relative glob that is compiled.
fn normalize(
    pattern_type: PatternType,
    specification: &str,
    search_root: &Path,
) -> Result<String, ResolveError> {
    let trimmed = specification.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::pattern(specification, "pattern is empty"));
    }

    let mut pattern = trimmed.replace('\\', "/");

    let as_path = Path::new(&pattern);
    if as_path.is_absolute() {
        pattern = match as_path.strip_prefix(search_root) {
            Ok(rest) => to_slash(rest),
            Err(_) => {
                return Err(ResolveError::pattern(
                    specification,
                    format!("absolute pattern is not under {}", search_root.display()),
                ));
            }
        };
    }

    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest.to_string();
    }
    let pattern = pattern.trim_end_matches('/');

    if pattern.is_empty() || pattern == "." {
        return Ok(MATCH_ALL.to_string());
    }

    let last = pattern.rsplit('/').next().unwrap_or(pattern);
    let expanded = if last == "**" {
        format!("{pattern}/*")
    } else if pattern_type == PatternType::Include && !has_wildcard(last) && !last.contains('.') {
        // A bare directory name selects everything beneath it.
        format!("{pattern}/{MATCH_ALL}")
    } else {
        pattern.to_string()
    };

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("/project")
    }

    fn include(spec: &str) -> SourcePattern {
        SourcePattern::new(PatternType::Include, spec, &root()).unwrap()
    }

    fn exclude(spec: &str) -> SourcePattern {
        SourcePattern::new(PatternType::Exclude, spec, &root()).unwrap()
    }

    #[test]
    fn test_double_star_matches_zero_or_more_directories() {
        let pattern = include("src/**/*.ts");
        assert!(pattern.matches_path(Path::new("src/a.ts")));
        assert!(pattern.matches_path(Path::new("src/deep/nested/b.ts")));
        assert!(!pattern.matches_path(Path::new("lib/a.ts")));
    }

    #[test]
    fn test_single_star_stays_within_segment() {
        let pattern = include("src/*.ts");
        assert!(pattern.matches_path(Path::new("src/a.ts")));
        assert!(!pattern.matches_path(Path::new("src/sub/a.ts")));
    }

    #[test]
    fn test_directory_include_expands() {
        let pattern = include("./src/");
        assert_eq!(pattern.normalized, "src/**/*");
        assert!(pattern.matches_path(Path::new("src/x/y.ts")));
    }

    #[test]
    fn test_wildcards_skip_hidden_entries() {
        let pattern = include("**/*");
        assert!(!pattern.matches_path(Path::new(".cache/a.ts")));
        assert!(include(".cache/*.ts").matches_path(Path::new(".cache/a.ts")));
    }

    #[test]
    fn test_exclude_matches_ancestor_directory() {
        let pattern = exclude("node_modules");
        assert!(pattern.matches_path(Path::new("node_modules/pkg/index.d.ts")));
        assert!(!pattern.matches_path(Path::new("src/node_modules.ts")));
    }

    #[test]
    fn test_absolute_pattern_is_relativized() {
        let pattern = include("/project/src/*.ts");
        assert_eq!(pattern.normalized, "src/*.ts");
        assert!(SourcePattern::new(PatternType::Include, "/elsewhere/*.ts", &root()).is_err());
    }

    #[test]
    fn test_invalid_pattern_is_named() {
        let err = SourcePattern::new(PatternType::Include, "src/a**b/*.ts", &root()).unwrap_err();
        match err {
            ResolveError::Pattern { pattern, .. } => assert_eq!(pattern, "src/a**b/*.ts"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(SourcePattern::new(PatternType::Exclude, "  ", &root()).is_err());
    }

    #[test]
    fn test_source_extensions() {
        assert!(is_source_file(Path::new("a.ts"), false));
        assert!(is_source_file(Path::new("types/a.d.ts"), false));
        assert!(is_source_file(Path::new("a.tsx"), false));
        assert!(!is_source_file(Path::new("a.js"), false));
        assert!(is_source_file(Path::new("a.js"), true));
        assert!(!is_source_file(Path::new("README.md"), true));
    }

    #[test]
    fn test_literal_extension_and_escape() {
        assert_eq!(include("src/**/*.json").literal_extension(), Some("json"));
        assert_eq!(include("src/**/*.*").literal_extension(), None);
        assert!(include("../shared/*.ts").escapes_root());
        assert!(!include("src/*.ts").escapes_root());
    }
}
