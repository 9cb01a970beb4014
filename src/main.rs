//! Type-check only what a pull request touched.
//!
//! A TypeScript project compiles whatever its `tsconfig.json` selects, and in
//! a large repository that is far more than a pull request changes. This tool
//! resolves the exact compilation unit, works out which of those files the
//! pull request changed, and narrows the compiler's diagnostics to them, so a
//! CI job only fails on errors the change is responsible for.
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tsc_changed_files::builders::reporter::ReportFormat;
use tsc_changed_files::core::config::DEFAULT_TSCONFIG;
use tsc_changed_files::utils::{self, ChangedSource, FilterOptions};

#[derive(Parser)]
#[command(name = "tsc-changed-files")]
#[command(about = "Narrow TypeScript diagnostics to the files changed in a pull request")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options every project command shares.
#[derive(Args)]
struct ProjectArgs {
    /// Project directory, relative to the current directory
    #[arg(short, long, default_value = ".")]
    directory: PathBuf,

    /// Path of the tsconfig file, relative to the project directory
    #[arg(short, long, default_value = DEFAULT_TSCONFIG)]
    project: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files the project compiles
    Resolve {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
    /// List the files changed between two revisions
    Changed {
        /// Project directory, relative to the current directory
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Base revision of the pull request (e.g. origin/main)
        #[arg(long)]
        base: String,

        /// Head revision of the pull request
        #[arg(long, default_value = "HEAD")]
        head: String,
    },
    /// Read tsc output and keep only diagnostics for changed project files
    Filter {
        #[command(flatten)]
        project: ProjectArgs,

        /// Base revision to diff against for the changed files
        #[arg(long, conflicts_with_all = ["changed_file", "changed_list"])]
        base: Option<String>,

        /// Head revision to diff against for the changed files
        #[arg(long, default_value = "HEAD")]
        head: String,

        /// A changed file, relative to the project directory (repeatable)
        #[arg(long = "changed-file")]
        changed_file: Vec<PathBuf>,

        /// File listing changed files, one per line
        #[arg(long = "changed-list", conflicts_with = "changed_file")]
        changed_list: Option<PathBuf>,

        /// File holding the compiler output; standard input when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
    /// Check the project configuration for suspicious patterns
    Validate {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Resolve { project, format } => {
            utils::resolve_files(&cwd.join(&project.directory), &project.project, format)
        }
        Commands::Changed {
            directory,
            base,
            head,
        } => utils::list_changed(&cwd.join(directory), &base, &head),
        Commands::Filter {
            project,
            base,
            head,
            changed_file,
            changed_list,
            input,
            format,
        } => {
            let changed = match (base, changed_list) {
                (Some(base), _) => ChangedSource::Git { base, head },
                (None, Some(list)) => ChangedSource::ListFile(list),
                (None, None) if !changed_file.is_empty() => ChangedSource::Paths(changed_file),
                (None, None) => {
                    anyhow::bail!("one of --base, --changed-file or --changed-list is required")
                }
            };
            let options = FilterOptions {
                working_dir: cwd.join(&project.directory),
                project: project.project,
                changed,
                input,
                format,
            };
            if utils::filter_diagnostics(&options)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Validate { project } => {
            utils::validate_project(&cwd.join(&project.directory), &project.project)
        }
    }
}
