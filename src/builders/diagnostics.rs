use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// How serious the compiler considers a diagnostic.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Message,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Message => write!(f, "message"),
        }
    }
}

/// A single compiler diagnostic, as printed by `tsc --pretty false`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Source file as printed by the compiler. `None` for project-wide
    /// diagnostics such as configuration errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    /// The `TSxxxx` code.
    pub code: String,
    /// Message text; continuation lines are joined with `\n`.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "{}({},{}): {} {}: {}",
                file.display(),
                self.line,
                self.column,
                self.severity,
                self.code,
                self.message
            ),
            None => write!(f, "{} {}: {}", self.severity, self.code, self.message),
        }
    }
}

/// Parses compiler output into diagnostics.
pub struct DiagnosticParser {
    located: Regex,
    global: Regex,
}

impl DiagnosticParser {
    pub fn new() -> Result<Self> {
        let located = Regex::new(
            r"^(?P<file>.+?)\((?P<line>\d+),(?P<column>\d+)\): (?P<severity>error|warning|message) (?P<code>TS\d+): (?P<message>.*)$",
        )
        .context("Invalid located diagnostic regex")?;
        let global = Regex::new(
            r"^(?P<severity>error|warning|message) (?P<code>TS\d+): (?P<message>.*)$",
        )
        .context("Invalid global diagnostic regex")?;
        Ok(Self { located, global })
    }

    /// Parses every diagnostic in `output`.
    ///
    /// Lines that do not start a diagnostic are appended to the message of
    /// the previous one (the compiler prints message chains indented on the
    /// following lines). Anything before the first diagnostic is dropped.
    pub fn parse(&self, output: &str) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();

        for line in output.lines() {
            let line = line.trim_end();
            if let Some(diagnostic) = self.parse_line(line) {
                diagnostics.push(diagnostic);
            } else if !line.trim().is_empty()
                && let Some(last) = diagnostics.last_mut()
            {
                last.message.push('\n');
                last.message.push_str(line.trim());
            }
        }

        diagnostics
    }

    fn parse_line(&self, line: &str) -> Option<Diagnostic> {
        if let Some(caps) = self.located.captures(line) {
            return Some(Diagnostic {
                file: Some(PathBuf::from(&caps["file"])),
                line: caps["line"].parse().ok()?,
                column: caps["column"].parse().ok()?,
                severity: parse_severity(&caps["severity"]),
                code: caps["code"].to_string(),
                message: caps["message"].to_string(),
            });
        }

        let caps = self.global.captures(line)?;
        Some(Diagnostic {
            file: None,
            line: 0,
            column: 0,
            severity: parse_severity(&caps["severity"]),
            code: caps["code"].to_string(),
            message: caps["message"].to_string(),
        })
    }
}

fn parse_severity(text: &str) -> Severity {
    match text {
        "warning" => Severity::Warning,
        "message" => Severity::Message,
        _ => Severity::Error,
    }
}

/// Narrows diagnostics to files that are both part of the compilation unit
/// and changed by the pull request.
///
/// Project-wide diagnostics (no file) are always kept: they affect every
/// file, changed or not.
pub struct DiagnosticFilter {
    working_dir: PathBuf,
    relevant: HashSet<PathBuf>,
}

impl DiagnosticFilter {
    /// # Arguments
    /// * `working_dir`: directory the compiler ran in; relative diagnostic
    ///   paths are resolved against it.
    /// * `resolved`: absolute paths of the compilation unit.
    /// * `changed`: changed paths relative to `changed_root`.
    pub fn new(
        working_dir: &Path,
        resolved: &[PathBuf],
        changed: &BTreeSet<PathBuf>,
        changed_root: &Path,
    ) -> Self {
        let resolved: HashSet<PathBuf> = resolved.iter().map(|p| absolute(p)).collect();
        let relevant = changed
            .iter()
            .map(|p| absolute(&changed_root.join(p)))
            .filter(|p| resolved.contains(p))
            .collect();

        Self {
            working_dir: absolute(working_dir),
            relevant,
        }
    }

    /// Absolute paths that are both resolved and changed.
    pub fn relevant_files(&self) -> &HashSet<PathBuf> {
        &self.relevant
    }

    pub fn is_relevant(&self, diagnostic: &Diagnostic) -> bool {
        match &diagnostic.file {
            None => true,
            Some(file) => self.relevant.contains(&absolute(&self.working_dir.join(file))),
        }
    }

    pub fn filter(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        diagnostics
            .into_iter()
            .filter(|d| self.is_relevant(d))
            .collect()
    }
}

/// Canonical form when the path exists, the path as given otherwise.
fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const OUTPUT: &str = "\
src/a.ts(3,7): error TS2322: Type 'string' is not assignable to type 'number'.
src/b.ts(10,1): error TS2345: Argument of type 'X' is not assignable to parameter of type 'Y'.
  Property 'id' is missing in type 'X' but required in type 'Y'.
error TS5083: Cannot read file '/repo/tsconfig.base.json'.
";

    #[test]
    fn test_parse_located_and_global() {
        let diagnostics = DiagnosticParser::new().unwrap().parse(OUTPUT);
        assert_eq!(diagnostics.len(), 3);

        assert_eq!(diagnostics[0].file, Some(PathBuf::from("src/a.ts")));
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (3, 7));
        assert_eq!(diagnostics[0].code, "TS2322");
        assert_eq!(diagnostics[0].severity, Severity::Error);

        assert!(diagnostics[1].message.ends_with("required in type 'Y'."));
        assert!(diagnostics[1].message.contains('\n'));

        assert_eq!(diagnostics[2].file, None);
        assert_eq!(diagnostics[2].code, "TS5083");
    }

    #[test]
    fn test_parse_ignores_noise_before_first_diagnostic() {
        let output = "> tsc --noEmit\n\nsrc/a.ts(1,1): warning TS6133: 'x' is declared but never used.\n";
        let diagnostics = DiagnosticParser::new().unwrap().parse(output);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn test_display_round_trips_format() {
        let line = "src/a.ts(3,7): error TS2322: Bad type.";
        let diagnostics = DiagnosticParser::new().unwrap().parse(line);
        assert_eq!(diagnostics[0].to_string(), line);
    }

    #[test]
    fn test_filter_keeps_changed_resolved_and_global() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        for file in ["src/a.ts", "src/b.ts"] {
            fs::write(dir.path().join(file), "export {};\n").unwrap();
        }
        let resolved = vec![dir.path().join("src/a.ts"), dir.path().join("src/b.ts")];
        let changed: BTreeSet<PathBuf> = [PathBuf::from("src/b.ts"), PathBuf::from("README.md")]
            .into_iter()
            .collect();

        let filter = DiagnosticFilter::new(dir.path(), &resolved, &changed, dir.path());
        assert_eq!(filter.relevant_files().len(), 1);

        let diagnostics = DiagnosticParser::new().unwrap().parse(OUTPUT);
        let kept = filter.filter(diagnostics);
        let codes: Vec<&str> = kept.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["TS2345", "TS5083"]);
    }
}
