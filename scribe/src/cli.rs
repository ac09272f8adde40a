use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Scribe: a plain-file document store with backlinks and a recoverable trash.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root directory of the document store. Created if missing.
    #[arg(long, global = true, env = "SCRIBE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the document API over HTTP.
    Serve(ServeArgs),
    /// Rename entries whose names collide case-insensitively with a sibling.
    ResolveConflicts,
    /// List the documents that reference a document.
    Backlinks(BacklinksArgs),
    /// Inspect and manage the trash.
    Trash(TrashArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "SCRIBE_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,
}

#[derive(Args, Debug)]
pub struct BacklinksArgs {
    /// Logical path of the referenced document (without extension).
    #[arg(required = true)]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct TrashArgs {
    #[command(subcommand)]
    pub command: TrashCommands,
}

#[derive(Subcommand, Debug)]
pub enum TrashCommands {
    /// List trashed items by trash id.
    List {},
    /// Move a trashed item back to where it came from.
    Restore {
        /// Trash id as shown by `trash list`.
        id: String,
    },
    /// Remove a trashed item for good.
    Delete {
        /// Trash id as shown by `trash list`.
        id: String,
    },
    /// Remove everything in the trash.
    Empty {},
}
