// This file is the module declaration file for the `core` module.
// It declares the submodules that make up the heart of the tool and exposes
// them to the rest of the crate.

// `config` module:
// Loads a project's `tsconfig.json` (comments, trailing commas, `extends`
// chains) into a `ProjectConfig`, and provides the `ConfigManager` that
// locates the file for a working directory.
pub mod config;

// `error` module:
// The typed `ResolveError` returned by the resolver.
pub mod error;

// `git` module:
// The `ChangedFilesProvider` contract and its implementations: a diff between
// two revisions of a git repository, and an explicit list.
pub mod git;

// `resolver` module:
// Expands include/exclude patterns under the search root into the ordered,
// de-duplicated list of files in the compilation unit.
pub mod resolver;
