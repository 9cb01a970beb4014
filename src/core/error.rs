use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while resolving a project's compilation unit.
///
/// Both variants are fatal for the call that produced them. The resolver has no
/// network or concurrency exposure, so there is no transient class to retry.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The search root (working directory joined with `rootDir`) is missing
    /// or is not a directory.
    #[error("search root not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    /// An include or exclude pattern could not be compiled.
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

impl ResolveError {
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
