//! sharedclasses - Shared class cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use sharedclasses::cli::{commands, Cli, Commands};
use sharedclasses::config::ConfigManager;
use sharedclasses::error::SharedClassResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> SharedClassResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load()?;
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = Some(dir);
    }

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("sharedclasses=warn"),
        1 => EnvFilter::new("sharedclasses=info"),
        _ => EnvFilter::new("sharedclasses=debug"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Store(args) => commands::store(args, &config),
        Commands::Find(args) => commands::find(args, &config),
        Commands::TokenStore(args) => commands::token_store(args, &config),
        Commands::TokenFind(args) => commands::token_find(args, &config),
        Commands::Config(args) => commands::config(args, &config, &config_manager),
    }
}
