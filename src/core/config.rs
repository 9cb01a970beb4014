use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// The file name looked up when no explicit project file is given.
pub const DEFAULT_TSCONFIG: &str = "tsconfig.json";

/// Directories the compiler leaves out when a project declares no `exclude`.
pub const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

/// The part of a TypeScript project configuration that decides which files
/// make up the compilation unit.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Directory the patterns are expanded under. Absolute once loaded from a
    /// `tsconfig.json`; `None` means the working directory.
    pub root_dir: Option<PathBuf>,
    /// Files compiled whatever `include` and `exclude` say, relative to the
    /// search root.
    #[serde(default)]
    pub files: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Mirrors `compilerOptions.allowJs`.
    #[serde(default)]
    pub allow_js: bool,
}

/// `extends` is either one config path or, since TypeScript 5.0, a list of them.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    root_dir: Option<String>,
    out_dir: Option<String>,
    allow_js: Option<bool>,
}

/// A `tsconfig.json` as written on disk. Everything not listed is ignored.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    extends: Option<Extends>,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    #[serde(default)]
    compiler_options: RawCompilerOptions,
}

/// A config file merged with everything it extends. Directory options are
/// already absolute, anchored at the file that declared them.
#[derive(Debug, Default, Clone)]
struct MergedTsConfig {
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    root_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    allow_js: Option<bool>,
}

impl MergedTsConfig {
    /// Values from `child` win over values already in `self`.
    fn overlay(self, child: MergedTsConfig) -> Self {
        Self {
            files: child.files.or(self.files),
            include: child.include.or(self.include),
            exclude: child.exclude.or(self.exclude),
            root_dir: child.root_dir.or(self.root_dir),
            out_dir: child.out_dir.or(self.out_dir),
            allow_js: child.allow_js.or(self.allow_js),
        }
    }
}

/// Abstracts where a project configuration comes from, so commands can be
/// exercised against an in-memory configuration.
pub trait ConfigProvider {
    fn load_config(&self) -> Result<ProjectConfig>;
    fn get_config_path(&self) -> Result<PathBuf>;
}

/// Locates and loads the `tsconfig.json` of a project directory.
pub struct ConfigManager {
    config_path: PathBuf,
    working_dir: PathBuf,
}

impl ConfigManager {
    /// Builds a manager for `working_dir`, with `config_path` relative to it.
    ///
    /// Fails when the working directory or the configuration file is missing,
    /// naming the path that was looked up.
    pub fn new_at(working_dir: PathBuf, config_path: &Path) -> Result<Self> {
        if !working_dir.is_dir() {
            anyhow::bail!("working directory does not exist: {}", working_dir.display());
        }
        let config_path = working_dir.join(config_path);
        if !config_path.is_file() {
            anyhow::bail!("could not find tsconfig.json at: {}", config_path.display());
        }

        Ok(Self {
            config_path,
            working_dir,
        })
    }

    pub fn get_working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl ConfigProvider for ConfigManager {
    fn load_config(&self) -> Result<ProjectConfig> {
        TsConfigLoader::new()
            .with_working_dir(&self.working_dir)
            .load(&self.config_path)
    }

    fn get_config_path(&self) -> Result<PathBuf> {
        Ok(self.config_path.clone())
    }
}

/// Reads `tsconfig.json` files, following `extends` chains.
#[derive(Debug, Default)]
pub struct TsConfigLoader {
    visiting: Vec<PathBuf>,
    working_dir: Option<PathBuf>,
}

impl TsConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory the loaded patterns will be resolved under when the
    /// project has no `rootDir`. Defaults to the directory of the loaded file.
    pub fn with_working_dir(mut self, working_dir: &Path) -> Self {
        self.working_dir = Some(working_dir.to_path_buf());
        self
    }

    /// Loads the project configuration declared by the file at `path`.
    ///
    /// When no file in the chain declares `exclude`, the compiler's default
    /// exclude list is used, plus `outDir` relative to the search root when it
    /// lies under it.
    pub fn load(&mut self, path: &Path) -> Result<ProjectConfig> {
        let merged = self.load_merged(path)?;
        let config_dir = parent_dir(&path.canonicalize()?);

        let exclude = match merged.exclude {
            Some(exclude) => exclude,
            None => {
                let mut exclude: Vec<String> =
                    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
                let working_dir = match &self.working_dir {
                    Some(dir) => dir.canonicalize().unwrap_or_else(|_| dir.clone()),
                    None => config_dir,
                };
                let search_root =
                    lexical_clean(merged.root_dir.as_deref().unwrap_or(&working_dir));
                let out_dir = merged.out_dir.as_deref().map(lexical_clean);
                if let Some(out_dir) = &out_dir
                    && let Ok(relative) = out_dir.strip_prefix(&search_root)
                    && !relative.as_os_str().is_empty()
                {
                    exclude.push(crate::builders::patterns::to_slash(relative));
                }
                exclude
            }
        };

        Ok(ProjectConfig {
            root_dir: merged.root_dir,
            files: merged.files.unwrap_or_default(),
            include: merged.include.unwrap_or_default(),
            exclude,
            allow_js: merged.allow_js.unwrap_or(false),
        })
    }

    fn load_merged(&mut self, path: &Path) -> Result<MergedTsConfig> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("could not find tsconfig at: {}", path.display()))?;
        if self.visiting.contains(&canonical) {
            anyhow::bail!("circular 'extends' chain at: {}", canonical.display());
        }
        self.visiting.push(canonical.clone());

        let content = fs::read_to_string(&canonical)
            .with_context(|| format!("Failed to read {}", canonical.display()))?;
        let content = content.trim_start_matches('\u{feff}');
        let raw: RawTsConfig = serde_json::from_str(&strip_json_comments(content))
            .with_context(|| format!("Failed to parse {}", canonical.display()))?;

        let config_dir = parent_dir(&canonical);

        let bases = match raw.extends.clone() {
            None => Vec::new(),
            Some(Extends::One(base)) => vec![base],
            Some(Extends::Many(bases)) => bases,
        };
        let mut merged = MergedTsConfig::default();
        for base in bases {
            let base_path = resolve_extends(&config_dir, &base)?;
            merged = merged.overlay(self.load_merged(&base_path)?);
        }

        let own = MergedTsConfig {
            files: raw.files,
            include: raw.include,
            exclude: raw.exclude,
            root_dir: raw.compiler_options.root_dir.map(|d| config_dir.join(d)),
            out_dir: raw.compiler_options.out_dir.map(|d| config_dir.join(d)),
            allow_js: raw.compiler_options.allow_js,
        };

        self.visiting.pop();
        Ok(merged.overlay(own))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolves `.` and `..` components without touching the filesystem, so a
/// not yet built `outDir` can still be compared with the search root.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }
    clean
}

/// Turns an `extends` value into a file path relative to the extending config.
fn resolve_extends(config_dir: &Path, base: &str) -> Result<PathBuf> {
    let is_path = base.starts_with("./") || base.starts_with("../") || Path::new(base).is_absolute();
    if !is_path {
        anyhow::bail!("extending a package config is not supported: '{base}'");
    }

    let mut path = config_dir.join(base);
    if path.extension().is_none_or(|ext| ext != "json") {
        let mut with_ext = path.into_os_string();
        with_ext.push(".json");
        path = PathBuf::from(with_ext);
    }
    Ok(path)
}

/// Strips `//` and `/* */` comments and trailing commas from JSON text,
/// leaving string literals untouched.
pub fn strip_json_comments(content: &str) -> String {
    let without_comments = strip_comments(content);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    // Keep line numbers stable for parse errors.
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 1;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_strip_comments_and_trailing_commas() {
        let input = r#"{
            // line comment
            "include": ["src/**/*.ts", /* inline */ "lib",],
            "url": "http://example.com/*not a comment*/",
        }"#;
        let value: serde_json::Value = serde_json::from_str(&strip_json_comments(input)).unwrap();
        assert_eq!(value["include"][1], "lib");
        assert_eq!(value["url"], "http://example.com/*not a comment*/");
    }

    #[test]
    fn test_default_exclude_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "tsconfig.json",
            r#"{ "compilerOptions": { "outDir": "dist" }, "include": ["src"] }"#,
        );
        let config = TsConfigLoader::new().load(&path).unwrap();
        assert_eq!(config.include, vec!["src"]);
        assert_eq!(
            config.exclude,
            vec!["node_modules", "bower_components", "jspm_packages", "dist"]
        );
        assert_eq!(config.root_dir, None);
    }

    #[test]
    fn test_explicit_empty_exclude_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "tsconfig.json", r#"{ "exclude": [] }"#);
        let config = TsConfigLoader::new().load(&path).unwrap();
        assert!(config.exclude.is_empty());
        assert!(config.include.is_empty());
    }

    #[test]
    fn test_extends_merges_and_anchors_root_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "base/tsconfig.base.json",
            r#"{ "compilerOptions": { "rootDir": "../src", "allowJs": true }, "exclude": ["**/*.spec.ts"] }"#,
        );
        let path = write(
            dir.path(),
            "tsconfig.json",
            r#"{ "extends": "./base/tsconfig.base", "include": ["**/*"] }"#,
        );
        let config = TsConfigLoader::new().load(&path).unwrap();
        assert_eq!(config.include, vec!["**/*"]);
        assert_eq!(config.exclude, vec!["**/*.spec.ts"]);
        assert!(config.allow_js);
        let root_dir = config.root_dir.unwrap();
        assert!(root_dir.ends_with("base/../src"));
    }

    #[test]
    fn test_files_are_kept_apart_from_include() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "tsconfig.json",
            r#"{ "files": ["main[1].ts"], "include": ["src"] }"#,
        );
        let config = TsConfigLoader::new().load(&path).unwrap();
        assert_eq!(config.files, vec!["main[1].ts"]);
        assert_eq!(config.include, vec!["src"]);
    }

    #[test]
    fn test_out_dir_is_relative_to_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "web/tsconfig.json",
            r#"{ "compilerOptions": { "outDir": "dist" } }"#,
        );
        let manager =
            ConfigManager::new_at(dir.path().to_path_buf(), Path::new("web/tsconfig.json")).unwrap();
        let config = manager.load_config().unwrap();
        assert_eq!(config.exclude.last().map(String::as_str), Some("web/dist"));
    }

    #[test]
    fn test_out_dir_outside_root_dir_is_not_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "tsconfig.json",
            r#"{ "compilerOptions": { "rootDir": "./src", "outDir": "./src/../dist" } }"#,
        );
        let config = TsConfigLoader::new().load(&path).unwrap();
        assert_eq!(config.exclude, DEFAULT_EXCLUDES);
    }

    #[test]
    fn test_byte_order_mark_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "tsconfig.json",
            "\u{feff}{\n  // saved by an editor\n  \"include\": [\"src\"],\n}\n",
        );
        let config = TsConfigLoader::new().load(&path).unwrap();
        assert_eq!(config.include, vec!["src"]);
    }

    #[test]
    fn test_circular_extends_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"{ "extends": "./b.json" }"#);
        write(dir.path(), "b.json", r#"{ "extends": "./a.json" }"#);
        let err = TsConfigLoader::new().load(&dir.path().join("a.json")).unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_package_extends_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "tsconfig.json", r#"{ "extends": "@tsconfig/node20" }"#);
        assert!(TsConfigLoader::new().load(&path).is_err());
    }

    #[test]
    fn test_manager_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigManager::new_at(dir.path().to_path_buf(), Path::new(DEFAULT_TSCONFIG))
            .err()
            .unwrap();
        assert!(err.to_string().contains("could not find tsconfig.json"));
    }
}
