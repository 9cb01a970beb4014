use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;

use crate::builders::patterns::{self, PatternType, SourcePattern};
use crate::core::config::ProjectConfig;

/// The `ConfigValidator` trait defines the public interface for checking a
/// project configuration before it is resolved.
///
/// Validators report issues rather than failing: every finding describes a
/// configuration that is legal but probably not what the author meant, or
/// one that resolution would reject.
pub trait ConfigValidator {
    /// Validates the whole configuration relative to `working_dir`.
    ///
    /// # Returns
    /// One human-readable string per issue. An empty vector means the
    /// configuration looks sound.
    fn validate_config(&self, config: &ProjectConfig, working_dir: &Path) -> Result<Vec<String>>;

    /// Validates a single compiled pattern.
    fn validate_pattern(&self, pattern: &SourcePattern, allow_js: bool) -> Vec<String>;
}

/// The `StandardValidator` runs the checks every project gets.
pub struct StandardValidator;

impl StandardValidator {
    pub fn new() -> Self {
        Self
    }

    /// Reports patterns listed more than once within the same list.
    fn check_duplicates(&self, pattern_type: PatternType, specs: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        specs
            .iter()
            .filter(|spec| !seen.insert(spec.trim()))
            .map(|spec| format!("Duplicate {pattern_type} pattern '{spec}'"))
            .collect()
    }

    /// Reports exclude patterns that literally repeat an include pattern,
    /// which silently removes everything that include selects.
    fn check_conflicts(&self, config: &ProjectConfig) -> Vec<String> {
        let include: HashSet<&str> = config.include.iter().map(|s| s.trim()).collect();
        config
            .exclude
            .iter()
            .filter(|spec| include.contains(spec.trim()))
            .map(|spec| format!("Pattern '{spec}' is both included and excluded; exclude wins"))
            .collect()
    }

    /// Reports `files` entries that do not name an existing file.
    fn check_files(&self, search_root: &Path, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|file| !search_root.join(file).is_file())
            .map(|file| format!("File '{file}' listed in files does not exist"))
            .collect()
    }
}

impl ConfigValidator for StandardValidator {
    fn validate_config(&self, config: &ProjectConfig, working_dir: &Path) -> Result<Vec<String>> {
        let mut issues = Vec::new();

        let search_root = match &config.root_dir {
            Some(dir) => working_dir.join(dir),
            None => working_dir.to_path_buf(),
        };
        if !search_root.is_dir() {
            issues.push(format!("Root directory not found: {}", search_root.display()));
        }
        // Patterns are checked against the best root available even if it is
        // missing, so a bad root does not hide pattern issues.
        let search_root = search_root.canonicalize().unwrap_or(search_root);

        issues.extend(self.check_duplicates(PatternType::Include, &config.include));
        issues.extend(self.check_duplicates(PatternType::Exclude, &config.exclude));
        issues.extend(self.check_conflicts(config));
        issues.extend(self.check_files(&search_root, &config.files));

        let lists = [
            (PatternType::Include, &config.include),
            (PatternType::Exclude, &config.exclude),
        ];
        for (pattern_type, specs) in lists {
            for spec in specs.iter() {
                match SourcePattern::new(pattern_type, spec, &search_root) {
                    Ok(pattern) => issues.extend(self.validate_pattern(&pattern, config.allow_js)),
                    Err(e) => issues.push(e.to_string()),
                }
            }
        }

        Ok(issues)
    }

    fn validate_pattern(&self, pattern: &SourcePattern, allow_js: bool) -> Vec<String> {
        let mut issues = Vec::new();

        if pattern.escapes_root() {
            issues.push(format!(
                "Pattern {pattern} points outside the root directory and will match nothing"
            ));
        }

        if pattern.pattern_type == PatternType::Include
            && let Some(ext) = pattern.literal_extension()
        {
            let selectable = patterns::TS_EXTENSIONS.contains(&ext)
                || (allow_js && patterns::JS_EXTENSIONS.contains(&ext));
            if !selectable {
                issues.push(format!(
                    "Pattern {pattern} only names '.{ext}' files, which are never compiled"
                ));
            }
        }

        issues
    }
}
