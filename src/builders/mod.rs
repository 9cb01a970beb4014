// This file is the module declaration file for the `builders` module.
// It declares and makes public the supporting modules the commands are built
// from.

// `diagnostics` module:
// Parses `tsc` output into `Diagnostic`s and filters them down to files that
// are both compiled and changed.
pub mod diagnostics;

// `patterns` module:
// The glob dialect used by include/exclude patterns: normalization, directory
// expansion, source extensions, and the `PatternMatcher` trait.
pub mod patterns;

// `reporter` module:
// Renders resolved file lists and filtered diagnostics as text, JSON, YAML
// or TOML.
pub mod reporter;

// `validator` module:
// The `ConfigValidator` trait and `StandardValidator`, which flag suspicious
// but legal project configurations.
pub mod validator;
