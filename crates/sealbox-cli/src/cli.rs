use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use sealbox_transfer::MAX_PAYLOAD_SIZE;

#[derive(Parser)]
#[command(
    name = "sealbox",
    about = "Sealbox: persist a secret in protected storage and read it back",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the protected objects
    #[arg(long, global = true, default_value = ".sealbox")]
    pub root: PathBuf,

    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

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
    /// Store a secret
    Write(WriteArgs),
    /// Read the stored secret
    Read(ReadArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct WriteArgs {
    /// Secret given on the command line
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub secret: Option<String>,
    /// Read the secret from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct ReadArgs {
    /// Largest payload accepted
    #[arg(long, default_value_t = MAX_PAYLOAD_SIZE)]
    pub capacity: usize,
    /// Print the payload as hex
    #[arg(long)]
    pub hex: bool,
}
