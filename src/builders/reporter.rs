use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::builders::diagnostics::Diagnostic;
use crate::builders::patterns;

/// Output formats shared by every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Toml,
}

/// The compilation unit of a project.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub working_dir: PathBuf,
    /// Files relative to `working_dir` when possible, absolute otherwise.
    pub files: Vec<String>,
}

impl ResolveReport {
    pub fn new(working_dir: &Path, files: &[PathBuf]) -> Self {
        let base = working_dir
            .canonicalize()
            .unwrap_or_else(|_| working_dir.to_path_buf());
        let files = files
            .iter()
            .map(|file| match file.strip_prefix(&base) {
                Ok(relative) => patterns::to_slash(relative),
                Err(_) => file.display().to_string(),
            })
            .collect();
        Self {
            working_dir: base,
            files,
        }
    }
}

/// Diagnostics left after narrowing to changed files.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    /// Diagnostics parsed from the compiler output, before filtering.
    pub total: usize,
    /// Changed files that are part of the compilation unit.
    pub changed_files: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A `Reporter` turns reports into text for a given output format.
pub trait Reporter {
    fn render_resolved(&self, report: &ResolveReport) -> Result<String>;
    fn render_diagnostics(&self, report: &DiagnosticReport) -> Result<String>;
}

/// Renders reports for printing on standard output.
pub struct ConsoleReporter {
    format: ReportFormat,
}

impl ConsoleReporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Serializes for the structured formats; `None` means plain text.
    fn render_structured<T: Serialize>(&self, report: &T) -> Result<Option<String>> {
        let rendered = match self.format {
            ReportFormat::Text => return Ok(None),
            ReportFormat::Json => {
                serde_json::to_string_pretty(report).context("Failed to serialize to JSON")?
            }
            ReportFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize to YAML")?
            }
            ReportFormat::Toml => {
                toml::to_string_pretty(report).context("Failed to serialize to TOML")?
            }
        };
        Ok(Some(rendered))
    }
}

impl Reporter for ConsoleReporter {
    fn render_resolved(&self, report: &ResolveReport) -> Result<String> {
        if let Some(rendered) = self.render_structured(report)? {
            return Ok(rendered);
        }

        let mut out = String::new();
        for file in &report.files {
            writeln!(out, "{file}")?;
        }
        Ok(out)
    }

    fn render_diagnostics(&self, report: &DiagnosticReport) -> Result<String> {
        if let Some(rendered) = self.render_structured(report)? {
            return Ok(rendered);
        }

        let mut out = String::new();
        for diagnostic in &report.diagnostics {
            writeln!(out, "{diagnostic}")?;
        }
        writeln!(
            out,
            "{} of {} diagnostics in {} changed project files",
            report.diagnostics.len(),
            report.total,
            report.changed_files.len()
        )?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::diagnostics::Severity;

    fn diagnostic_report() -> DiagnosticReport {
        DiagnosticReport {
            total: 3,
            changed_files: vec!["src/a.ts".to_string()],
            diagnostics: vec![
                Diagnostic {
                    file: Some(PathBuf::from("src/a.ts")),
                    line: 1,
                    column: 5,
                    severity: Severity::Error,
                    code: "TS2304".to_string(),
                    message: "Cannot find name 'x'.".to_string(),
                },
                Diagnostic {
                    file: None,
                    line: 0,
                    column: 0,
                    severity: Severity::Error,
                    code: "TS5083".to_string(),
                    message: "Cannot read file.".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_resolve_report_is_relative() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let report = ResolveReport::new(dir.path(), &[root.join("src/a.ts"), PathBuf::from("/elsewhere/b.ts")]);
        assert_eq!(report.files, vec!["src/a.ts", "/elsewhere/b.ts"]);

        let text = ConsoleReporter::new(ReportFormat::Text).render_resolved(&report).unwrap();
        assert_eq!(text, "src/a.ts\n/elsewhere/b.ts\n");
    }

    #[test]
    fn test_text_diagnostics_summary() {
        let text = ConsoleReporter::new(ReportFormat::Text)
            .render_diagnostics(&diagnostic_report())
            .unwrap();
        assert!(text.starts_with("src/a.ts(1,5): error TS2304: Cannot find name 'x'.\n"));
        assert!(text.ends_with("2 of 3 diagnostics in 1 changed project files\n"));
    }

    #[test]
    fn test_structured_formats() {
        let report = diagnostic_report();

        let json = ConsoleReporter::new(ReportFormat::Json).render_diagnostics(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["diagnostics"][0]["code"], "TS2304");
        assert_eq!(value["diagnostics"][0]["severity"], "error");

        let yaml = ConsoleReporter::new(ReportFormat::Yaml).render_diagnostics(&report).unwrap();
        assert!(yaml.contains("code: TS2304"));

        let toml = ConsoleReporter::new(ReportFormat::Toml).render_diagnostics(&report).unwrap();
        assert!(toml.contains("[[diagnostics]]"));
    }
}
