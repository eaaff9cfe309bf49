use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "filer", about = "Content-addressed file store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server and the background reconciler
    Serve(ServeArgs),
    /// Run one reconciler sweep and exit
    Gc(BackendArgs),
    /// Print the SHA-256 content digest of local files
    Digest(DigestArgs),
    /// Store local files
    Store(StoreArgs),
    /// Write a stored instance to a file or stdout
    Fetch(FetchArgs),
    /// Delete a stored instance
    Rm(RmArgs),
}

/// Where the content root and the registry live.
#[derive(Args, Clone, Debug, Default)]
pub struct BackendArgs {
    /// TOML config file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Content root directory
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Redis URL of the instance registry
    #[arg(long)]
    pub redis: Option<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Listen address
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct DigestArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct StoreArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Content type recorded for every file
    #[arg(short = 't', long, default_value = "application/octet-stream")]
    pub content_type: String,
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// `<digest>/<instance>`
    pub instance: String,
    /// Output file; stdout if omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RmArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// `<digest>/<instance>`
    pub instance: String,
}
