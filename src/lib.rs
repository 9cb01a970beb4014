//! Resolve the files a TypeScript project compiles and narrow compiler
//! diagnostics down to the files a pull request changed.
//!
//! The library is split the same way the binary uses it:
//! - [`core`] holds the resolver, project configuration loading and the
//!   changed-files providers.
//! - [`builders`] holds the glob dialect, diagnostic parsing, validation and
//!   report rendering.
//! - [`utils`] holds the command implementations behind the CLI.
pub mod builders;
pub mod core;
pub mod utils;
