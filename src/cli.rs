//! CLI argument parsing for the crisis statement chain.
//!
//! Running with no subcommand behaves like `run` with every default: the
//! built-in crisis is drafted and reviewed against the configured model.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cchain",
    version,
    about = "Draft a crisis press statement, then revise it for legal safety",
    after_help = "Commands:\n  run       Draft and legally review a press statement (default)\n  prompts   Show each step's prompt template without calling the model\n  check     Probe the configured model backend\n  config    Print the effective configuration as JSON\n\nExamples:\n  cchain\n  cchain run --issue \"Data breach exposes 2M customer emails\"\n  cchain run --issue-file crisis.txt --model llama3.2 --json\n  CCHAIN_BACKEND=command CCHAIN_LM_COMMAND=\"ollama run llama3.2\" cchain run"
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Prompts(PromptsArgs),
    Check(CheckArgs),
    Config(ConfigArgs),
}

/// Backend selection shared by every command that talks to a model.
#[derive(Args, Debug, Default, Clone)]
pub struct BackendArgs {
    /// JSON config file (model, base_url, backend, timeout_secs, retry, ...)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model identifier, overriding config and CCHAIN_MODEL
    #[arg(long, value_name = "ID")]
    pub model: Option<String>,

    /// Backend base URL, overriding config and CCHAIN_BASE_URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

/// Run command inputs.
#[derive(Parser, Debug, Default)]
#[command(about = "Draft and legally review a press statement")]
pub struct RunArgs {
    /// Crisis description; defaults to the built-in example
    #[arg(long, value_name = "TEXT", conflicts_with = "issue_file")]
    pub issue: Option<String>,

    /// Read the crisis description from a file
    #[arg(long, value_name = "PATH")]
    pub issue_file: Option<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Emit the full result bundle as JSON
    #[arg(long)]
    pub json: bool,

    /// Log each step to stderr
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show the prompt templates and how steps are wired")]
pub struct PromptsArgs {}

#[derive(Parser, Debug)]
#[command(about = "Probe the configured model backend")]
pub struct CheckArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Print the effective configuration as JSON")]
pub struct ConfigArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Print a config file with every default filled in instead
    #[arg(long)]
    pub stub: bool,
}

impl RootArgs {
    /// Verbose logging was requested by the selected command.
    pub fn verbose(&self) -> bool {
        matches!(&self.command, Some(Command::Run(args)) if args.verbose)
    }
}
