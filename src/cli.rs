//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Patch-to-entity retrieval scorer
#[derive(Parser, Debug)]
#[command(name = "patchscope")]
#[command(about = "Maps patch hunks onto code entities and scores change-set retrieval")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands for patchscope
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a predicted patch against a reference patch
    #[command(visible_alias = "s")]
    Score(ScoreArgs),

    /// List the entities modified by a patch against a working checkout
    #[command(visible_alias = "n")]
    Nodes(NodesArgs),

    /// Find the innermost function/class entity containing a line
    Locate(LocateArgs),

    /// Dump the entity tree of a source file
    Entities(EntitiesArgs),
}

/// Arguments for the score command
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Path to the reference patch file
    #[arg(long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Path to the predicted patch file
    #[arg(long, value_name = "FILE")]
    pub predicted: PathBuf,

    /// Instance identifier recorded in the output
    #[arg(long, value_name = "ID", default_value = "unnamed")]
    pub instance_id: String,

    /// Working checkout to run entity-level scoring against.
    /// When absent, only file-level metrics are computed.
    #[arg(long, value_name = "DIR")]
    pub checkout: Option<PathBuf>,

    /// Repository name used for checkout locking (owner/name)
    #[arg(long, value_name = "REPO", default_value = "")]
    pub repo: String,

    /// Compare file basenames instead of full paths
    #[arg(long)]
    pub basename: bool,
}

/// Arguments for the nodes command
#[derive(Args, Debug)]
pub struct NodesArgs {
    /// Path to the patch file
    #[arg(value_name = "PATCH")]
    pub patch: PathBuf,

    /// Working checkout the patch applies to
    #[arg(long, value_name = "DIR")]
    pub checkout: PathBuf,
}

/// Arguments for the locate command
#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Source file to inspect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// 1-indexed line number
    #[arg(long, value_name = "N")]
    pub line: i64,
}

/// Arguments for the entities command
#[derive(Args, Debug)]
pub struct EntitiesArgs {
    /// Source file to inspect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Maximum tree depth to build
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}
