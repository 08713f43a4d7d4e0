//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// sharedclasses - Shared class cache
///
/// Stores and finds class bytes in the on-disk shared class cache the way
/// a class loader's helpers do.
#[derive(Parser, Debug)]
#[command(name = "sharedclasses")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHAREDCLASSES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory, overriding cache.dir
    #[arg(long, global = true, env = "SHAREDCLASSES_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a class loaded from a jar, zip or directory
    Store(StoreArgs),

    /// Find a class by source URL or classpath
    Find(FindArgs),

    /// Store a class under a caller-chosen token
    TokenStore(TokenStoreArgs),

    /// Find a class stored under a token
    TokenFind(TokenFindArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the store command
#[derive(Parser, Debug)]
pub struct StoreArgs {
    /// Binary class name (e.g. com.example.Foo)
    pub class: String,

    /// URL or path the class was loaded from
    #[arg(long)]
    pub from: String,

    /// Store through a classpath helper with this classpath
    #[arg(long)]
    pub classpath: Option<String>,

    /// File holding the class bytes (defaults to the class file in a directory source)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Arguments for the find command
#[derive(Parser, Debug)]
pub struct FindArgs {
    /// Binary class name (e.g. com.example.Foo)
    pub class: String,

    /// Look the class up against a single source URL or path
    #[arg(long, conflicts_with = "classpath", required_unless_present = "classpath")]
    pub url: Option<String>,

    /// Look the class up along a classpath
    #[arg(long)]
    pub classpath: Option<String>,

    /// Write the class bytes to this file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the token-store command
#[derive(Parser, Debug)]
pub struct TokenStoreArgs {
    /// Binary class name (e.g. com.example.Foo)
    pub class: String,

    /// Token the entry is stored under
    #[arg(short, long)]
    pub token: String,

    /// File holding the class bytes
    #[arg(short, long)]
    pub input: PathBuf,
}

/// Arguments for the token-find command
#[derive(Parser, Debug)]
pub struct TokenFindArgs {
    /// Binary class name (e.g. com.example.Foo)
    pub class: String,

    /// Token the entry was stored under
    #[arg(short, long)]
    pub token: String,

    /// Write the class bytes to this file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
