//! Builder CLI - compile visual builder artifacts and recheck installations

mod commands;
mod logging;

use anyhow::Result;
use builder_core::{ArtifactKind, TargetDialect};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "builder")]
#[command(about = "Compile visual builder artifacts and keep installations in shape")]
#[command(version)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project root containing builder.yaml
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Local directory to use for templates instead of the built-in catalog
    #[arg(long = "template-dir", global = true)]
    pub template_dir: Option<PathBuf>,

    /// Remote template catalog base URL
    #[arg(long = "template-url", global = true)]
    pub template_url: Option<String>,

    /// Log debug diagnostics to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Audit the installation, optionally repair it, then audit again
    Recheck(RecheckCmd),
    /// Repair missing entries without prompting (recheck --fix --yes)
    Install(ApplyCmd),
    /// Repair and overwrite drifted entries (recheck --fix --force --yes)
    Update(ApplyCmd),
    /// Compile an artifact description into one or every dialect
    Compile(CompileCmd),
    /// List registered (kind, variant, dialect) templates
    Templates,
}

#[derive(Parser, Debug, Clone)]
pub struct RecheckCmd {
    /// Repair missing entries
    #[arg(long)]
    pub fix: bool,

    /// Overwrite drifted entries
    #[arg(long)]
    pub force: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Entries checked or repaired at once
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct ApplyCmd {
    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Entries checked or repaired at once
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl ApplyCmd {
    fn into_recheck(self, force: bool) -> RecheckCmd {
        RecheckCmd {
            fix: true,
            force,
            yes: true,
            json: self.json,
            jobs: self.jobs,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CompileCmd {
    /// Artifact kind: component, page, api, theme, form or table
    #[arg(short, long)]
    pub kind: ArtifactKind,

    /// Target dialect (defaults to the project's dialect)
    #[arg(short, long)]
    pub dialect: Option<TargetDialect>,

    /// JSON file with raw properties, or `-` for stdin
    #[arg(short, long, conflicts_with = "from_store")]
    pub input: Option<PathBuf>,

    /// Read properties from the artifact store under this id
    #[arg(long = "from-store")]
    pub from_store: Option<String>,

    /// Explicit artifact id
    #[arg(long)]
    pub id: Option<String>,

    /// Write JSON output here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Compile every dialect registered for the artifact
    #[arg(long, conflicts_with = "dialect")]
    pub all: bool,

    /// Write compiled files into a zip archive
    #[arg(long)]
    pub zip: Option<PathBuf>,

    /// Store the input properties under the artifact id
    #[arg(long, conflicts_with = "from_store")]
    pub save: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();
    logging::init(args.global.verbose);

    let project = commands::Project::open(&args.global)?;
    let result = match args.command {
        Command::Recheck(cmd) => commands::recheck(&project, cmd).await,
        Command::Install(cmd) => commands::recheck(&project, cmd.into_recheck(false)).await,
        Command::Update(cmd) => commands::recheck(&project, cmd.into_recheck(true)).await,
        Command::Compile(cmd) => commands::compile(&project, cmd).await,
        Command::Templates => commands::templates(&project).await,
    };

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}
