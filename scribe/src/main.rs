use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scribe::cli::{Cli, Commands};
use scribe::{commands, AppContext};
use scribe_core::storage::Workspace;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let workspace = open_workspace(&cli.data_dir).await?;
    let cx = AppContext { workspace };

    match cli.command {
        Commands::Serve(args) => commands::handle_serve(args, cx).await?,
        Commands::ResolveConflicts => commands::handle_resolve_conflicts(cx).await?,
        Commands::Backlinks(args) => commands::handle_backlinks(args, cx).await?,
        Commands::Trash(args) => commands::handle_trash(args, cx).await?,
    }

    Ok(())
}

/// `RUST_LOG` wins over the verbosity flags when set.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::new(format!("warn,scribe={level},scribe_core={level}"))
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_workspace(data_dir: &Path) -> Result<Arc<Workspace>> {
    let workspace = Workspace::open(data_dir)
        .await
        .with_context(|| format!("Failed to open data directory at {}", data_dir.display()))?;
    Ok(Arc::new(workspace))
}
