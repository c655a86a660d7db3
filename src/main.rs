use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use tracing_subscriber::EnvFilter;

mod backend;
mod bundle;
mod cli;
mod config;
mod error;
mod output;
mod pipeline;
mod prompts;
mod template;

use crate::backend::OllamaBackend;
use crate::bundle::Bundle;
use crate::cli::{BackendArgs, CheckArgs, Command, ConfigArgs, RootArgs, RunArgs};
use crate::config::{BackendKind, ChainConfig, ConfigOverrides};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose());

    match args.command {
        None => cmd_run(RunArgs::default()),
        Some(Command::Run(args)) => cmd_run(args),
        Some(Command::Prompts(_)) => cmd_prompts(),
        Some(Command::Check(args)) => cmd_check(args),
        Some(Command::Config(args)) => cmd_config(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cchain={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(args: &BackendArgs) -> Result<ChainConfig> {
    let overrides = ConfigOverrides {
        model: args.model.clone(),
        base_url: args.base_url.clone(),
    };
    config::resolve_config(args.config.as_deref(), &overrides)
}

fn read_issue(args: &RunArgs) -> Result<String> {
    let issue = match (&args.issue, &args.issue_file) {
        (Some(issue), _) => issue.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("read issue file {}", path.display()))?,
        (None, None) => prompts::DEFAULT_ISSUE.to_string(),
    };
    let issue = issue.trim();
    if issue.is_empty() {
        return Err(anyhow!("issue description is empty"));
    }
    Ok(issue.to_string())
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args.backend)?;
    let issue = read_issue(&args)?;
    let pipeline = prompts::crisis_pipeline()?;
    let backend = backend::from_config(&config)?;

    tracing::info!(
        backend = %backend.describe(),
        outputs = ?pipeline.output_keys().collect::<Vec<_>>(),
        "starting crisis chain"
    );
    let result = pipeline
        .run(backend.as_ref(), Bundle::with(prompts::ISSUE_FIELD, issue))
        .context("crisis chain failed")?;
    tracing::info!(fields = ?result.keys().collect::<Vec<_>>(), "crisis chain complete");

    if args.json {
        println!("{}", output::render_json(&result)?);
    } else {
        print!("{}", output::render_text(&pipeline, &result));
    }
    Ok(())
}

fn cmd_prompts() -> Result<()> {
    let pipeline = prompts::crisis_pipeline()?;
    print!("{}", output::render_prompts(&pipeline));
    Ok(())
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    let config = resolve_config(&args.backend)?;
    match config.backend {
        BackendKind::Ollama => {
            let backend = OllamaBackend::new(&config);
            let report = backend
                .probe()
                .with_context(|| format!("probe {}", config.base_url))?;
            println!(
                "Connected to {} ({} models available)",
                config.base_url, report.model_count
            );
            if !report.model_available {
                return Err(anyhow!(
                    "model {:?} is not available on {}; pull it first (ollama pull {})",
                    config.model,
                    config.base_url,
                    config.model
                ));
            }
            println!("Model {} is available", config.model);
        }
        BackendKind::Command => {
            let command = config.command.as_deref().unwrap_or_default();
            let argv = shell_words::split(command)
                .with_context(|| format!("parse LM command: {command}"))?;
            let program = argv
                .first()
                .ok_or_else(|| anyhow!("LM command is empty"))?;
            let path = which::which(program)
                .with_context(|| format!("find LM command {program} on PATH"))?;
            println!("LM command {} resolves to {}", program, path.display());
        }
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> Result<()> {
    if args.stub {
        println!("{}", config::config_stub()?);
        return Ok(());
    }
    let config = resolve_config(&args.backend)?;
    let text = serde_json::to_string_pretty(&config).context("serialize config")?;
    println!("{text}");
    Ok(())
}
