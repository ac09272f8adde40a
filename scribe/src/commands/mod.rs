use crate::cli::{BacklinksArgs, ServeArgs, TrashArgs, TrashCommands};
use crate::{server, AppContext};
use anyhow::Result;
use scribe_core::storage::ItemKind;
use tracing::info;

// --- Handler Functions ---

pub async fn handle_serve(args: ServeArgs, cx: AppContext) -> Result<()> {
    info!("Serving documents from {}", cx.workspace.path().display());
    server::run(cx.workspace, args.bind).await
}

pub async fn handle_resolve_conflicts(cx: AppContext) -> Result<()> {
    let operations = cx.workspace.resolve_conflicts().await?;
    if operations.is_empty() {
        println!("No name conflicts found.");
        return Ok(());
    }
    for op in &operations {
        println!("  Renamed: {} -> {}", op.old_path, op.new_path);
    }
    println!("Resolved {} conflict(s).", operations.len());
    Ok(())
}

pub async fn handle_backlinks(args: BacklinksArgs, cx: AppContext) -> Result<()> {
    let sources = cx.workspace.backlinks(&args.path).await;
    if sources.is_empty() {
        println!("No documents reference '{}'.", args.path);
    }
    for source in sources {
        println!("{}", source);
    }
    Ok(())
}

pub async fn handle_trash(args: TrashArgs, cx: AppContext) -> Result<()> {
    match args.command {
        TrashCommands::List {} => {
            let items = cx.workspace.list_trash().await?;
            if items.is_empty() {
                println!("Trash is empty.");
            }
            for item in items {
                let marker = match item.kind {
                    ItemKind::Folder => "/",
                    ItemKind::File => "",
                };
                println!("{}{}", item.name, marker);
            }
        }
        TrashCommands::Restore { id } => {
            let restored = cx.workspace.restore(&id).await?;
            println!("Restored '{}' to '{}'.", id, restored);
        }
        TrashCommands::Delete { id } => {
            cx.workspace.delete_permanently(&id).await?;
            println!("Deleted '{}'.", id);
        }
        TrashCommands::Empty {} => {
            let count = cx.workspace.empty_trash().await?;
            println!("Removed {} item(s) from the trash.", count);
        }
    }
    Ok(())
}
