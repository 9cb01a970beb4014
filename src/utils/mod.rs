use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::builders::diagnostics::{DiagnosticFilter, DiagnosticParser};
use crate::builders::reporter::{
    ConsoleReporter, DiagnosticReport, ReportFormat, Reporter, ResolveReport,
};
use crate::builders::validator::{ConfigValidator, StandardValidator};
use crate::core::config::{ConfigManager, ConfigProvider, ProjectConfig};
use crate::core::git::{ChangedFilesProvider, GitChangedFiles, StaticChangedFiles};
use crate::core::resolver::FileResolver;

/// Where the changed files of a pull request come from.
#[derive(Debug, Clone)]
pub enum ChangedSource {
    /// Diff two revisions of the repository containing the working directory.
    Git { base: String, head: String },
    /// Paths given on the command line, relative to the working directory.
    Paths(Vec<PathBuf>),
    /// A file listing one path per line, relative to the working directory.
    ListFile(PathBuf),
}

/// Arguments of the `filter` command.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub working_dir: PathBuf,
    pub project: PathBuf,
    pub changed: ChangedSource,
    /// Compiler output file; standard input when `None`.
    pub input: Option<PathBuf>,
    pub format: ReportFormat,
}

/// Installs the global `tracing` subscriber. Logs go to stderr so reports on
/// stdout stay machine-readable.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

/// Loads the project at `working_dir` and resolves its compilation unit.
pub fn load_and_resolve(working_dir: &Path, project: &Path) -> Result<(ProjectConfig, Vec<PathBuf>)> {
    info!("working directory: {}", working_dir.display());
    let config_manager = ConfigManager::new_at(working_dir.to_path_buf(), project)?;
    info!("tsconfig path: {}", config_manager.get_config_path()?.display());

    let config = config_manager.load_config()?;
    debug!(
        root_dir = ?config.root_dir,
        files = ?config.files,
        include = ?config.include,
        exclude = ?config.exclude,
        allow_js = config.allow_js,
        "loaded project configuration"
    );

    let files = FileResolver::new()
        .resolve_project(config_manager.get_working_dir(), &config)
        .context("Failed to resolve files to compile")?;
    info!("{} files to compile", files.len());
    if files.is_empty() {
        warn!("the project configuration selects no source files");
    }
    for file in &files {
        debug!("file to compile: {}", file.display());
    }

    Ok((config, files))
}

/// `resolve`: prints the files the project compiles.
pub fn resolve_files(working_dir: &Path, project: &Path, format: ReportFormat) -> Result<()> {
    let (_, files) = load_and_resolve(working_dir, project)?;
    let report = ResolveReport::new(working_dir, &files);
    print!("{}", ConsoleReporter::new(format).render_resolved(&report)?);
    Ok(())
}

/// `changed`: prints the files changed between two revisions.
pub fn list_changed(working_dir: &Path, base: &str, head: &str) -> Result<()> {
    let provider = GitChangedFiles::new(working_dir, base, head)?;
    let changed = provider.changed_files()?;
    info!("{} files changed between {base} and {head}", changed.len());
    for file in changed {
        println!("{}", file.display());
    }
    Ok(())
}

/// `filter`: narrows compiler output to the changed files of the project.
///
/// # Returns
/// `true` when at least one diagnostic is left after filtering.
pub fn filter_diagnostics(options: &FilterOptions) -> Result<bool> {
    let (_, files) = load_and_resolve(&options.working_dir, &options.project)?;

    let provider = changed_files_provider(&options.working_dir, &options.changed)?;
    let changed = provider.changed_files()?;
    info!("{} changed files", changed.len());

    let output = read_compiler_output(options.input.as_deref())?;
    let diagnostics = DiagnosticParser::new()?.parse(&output);
    let total = diagnostics.len();
    info!("{total} diagnostics for all project files");

    let filter = DiagnosticFilter::new(&options.working_dir, &files, &changed, provider.root());
    let diagnostics = filter.filter(diagnostics);
    info!("{} diagnostics for changed files", diagnostics.len());

    let mut changed_files: Vec<PathBuf> = filter.relevant_files().iter().cloned().collect();
    changed_files.sort();
    let changed_files = ResolveReport::new(&options.working_dir, &changed_files).files;

    let report = DiagnosticReport {
        total,
        changed_files,
        diagnostics,
    };
    print!(
        "{}",
        ConsoleReporter::new(options.format).render_diagnostics(&report)?
    );

    Ok(!report.diagnostics.is_empty())
}

/// `validate`: reports configuration issues; fails when there are any.
pub fn validate_project(working_dir: &Path, project: &Path) -> Result<()> {
    let config_manager = ConfigManager::new_at(working_dir.to_path_buf(), project)?;
    let config = config_manager.load_config()?;
    let issues = StandardValidator::new().validate_config(&config, working_dir)?;

    if issues.is_empty() {
        println!("✓ Configuration is valid.");
        Ok(())
    } else {
        println!("⚠️  Found issues in configuration:");
        for issue in issues {
            println!("  - {issue}");
        }
        anyhow::bail!("Configuration validation failed.");
    }
}

fn changed_files_provider(
    working_dir: &Path,
    source: &ChangedSource,
) -> Result<Box<dyn ChangedFilesProvider>> {
    let provider: Box<dyn ChangedFilesProvider> = match source {
        ChangedSource::Git { base, head } => {
            Box::new(GitChangedFiles::new(working_dir, base, head)?)
        }
        ChangedSource::Paths(paths) => Box::new(StaticChangedFiles::new(
            working_dir.to_path_buf(),
            paths.iter().cloned(),
        )),
        ChangedSource::ListFile(list) => Box::new(StaticChangedFiles::from_list_file(
            working_dir.to_path_buf(),
            &working_dir.join(list),
        )?),
    };
    Ok(provider)
}

fn read_compiler_output(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read compiler output {}", path.display())),
        None => {
            let mut output = String::new();
            io::stdin()
                .read_to_string(&mut output)
                .context("Failed to read compiler output from stdin")?;
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "export {};\n").unwrap();
        fs::write(dir.path().join("src/b.ts"), "export {};\n").unwrap();
        fs::write(
            dir.path().join("tsconfig.json"),
            "{\n  // project\n  \"include\": [\"src\"],\n}\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_load_and_resolve() {
        let dir = project();
        let (config, files) = load_and_resolve(dir.path(), Path::new("tsconfig.json")).unwrap();
        assert_eq!(config.include, vec!["src"]);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_filter_with_explicit_paths() {
        let dir = project();
        let output = dir.path().join("tsc.log");
        fs::write(
            &output,
            "src/a.ts(1,1): error TS1005: ';' expected.\nsrc/b.ts(2,2): error TS1005: ';' expected.\n",
        )
        .unwrap();

        let options = FilterOptions {
            working_dir: dir.path().to_path_buf(),
            project: PathBuf::from("tsconfig.json"),
            changed: ChangedSource::Paths(vec![PathBuf::from("src/b.ts")]),
            input: Some(output),
            format: ReportFormat::Json,
        };
        assert!(filter_diagnostics(&options).unwrap());

        let options = FilterOptions {
            changed: ChangedSource::Paths(vec![PathBuf::from("README.md")]),
            ..options
        };
        assert!(!filter_diagnostics(&options).unwrap());
    }

    #[test]
    fn test_validate_reports_failure() {
        let dir = project();
        fs::write(dir.path().join("tsconfig.json"), r#"{ "include": ["src", "src"] }"#).unwrap();
        assert!(validate_project(dir.path(), Path::new("tsconfig.json")).is_err());
    }

    #[test]
    fn test_missing_tsconfig_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_and_resolve(dir.path(), Path::new("tsconfig.json")).unwrap_err();
        assert!(err.to_string().contains("could not find tsconfig.json"));
    }
}
