use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::fs;

use scribe_core::storage::{
    ConflictError, Error, FixedClock, ItemKind, RenameOperation, Workspace, TRASH_DIR_NAME,
};

fn moment(second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 7, 1).unwrap().and_hms_opt(10, 0, second).unwrap()
}

async fn open(root: &Path) -> (Workspace, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(moment(0)));
    let ws = Workspace::open_with_clock(root, clock.clone())
        .await
        .expect("Failed to open workspace");
    (ws, clock)
}

async fn create_dummy(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.expect("Test helper: Failed to create parent dir");
    }
    fs::write(path, "").await.expect("Test helper: Failed to create dummy file");
}

#[tokio::test]
async fn integration_save_and_backlinks() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;

    ws.save("D", b"@(A) @(B) @(A)").await.unwrap();

    assert_eq!(ws.backlinks("A").await, vec!["D".to_string()]);
    assert_eq!(ws.backlinks("B").await, vec!["D".to_string()]);
    assert!(ws.backlinks("C").await.is_empty());

    // Re-saving without a reference drops the backlink.
    ws.save("D", b"@(B)").await.unwrap();
    assert!(ws.backlinks("A").await.is_empty());
    assert_eq!(ws.backlinks("B").await, vec!["D".to_string()]);
}

#[tokio::test]
async fn integration_folder_rename_carries_backlinks() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("f/x", b"@(t)").await.unwrap();
    ws.save("outside", b"@(f/x)").await.unwrap();

    ws.rename("f", "g").await.unwrap();

    assert_eq!(ws.backlinks("t").await, vec!["g/x".to_string()]);
    assert_eq!(ws.backlinks("g/x").await, vec!["outside".to_string()]);
    assert!(ws.backlinks("f/x").await.is_empty());
    assert!(ws.path().join("g/x.md").is_file());
}

#[tokio::test]
async fn integration_trash_removes_source_everywhere() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("D", b"@(A) @(B)").await.unwrap();
    ws.save("E", b"@(A)").await.unwrap();

    ws.trash("D").await.unwrap();

    assert_eq!(ws.backlinks("A").await, vec!["E".to_string()]);
    assert!(ws.backlinks("B").await.is_empty());
}

#[tokio::test]
async fn integration_name_guard_is_case_insensitive() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    create_dummy(&ws.path().join("Note.md")).await;

    let result = ws.save("note", b"other").await;
    assert!(matches!(result, Err(Error::Conflict(ConflictError::NameTaken { .. }))));

    ws.save("Notebook", b"").await.unwrap();
    ws.create_folder("archive").await.unwrap();
    assert!(matches!(ws.rename("Notebook", "NOTE").await, Err(Error::Conflict(_))));
    assert!(matches!(ws.rename("Notebook", "Archive").await, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn integration_trash_restore_round_trip() {
    let dir = tempdir().unwrap();
    let (ws, clock) = open(dir.path()).await;
    ws.save("notes/plan", b"@(goals)").await.unwrap();

    let id = ws.trash("notes/plan").await.unwrap();
    assert_eq!(id, "plan_20260701100000.md");
    assert!(ws.path().join(TRASH_DIR_NAME).join(&id).is_file());

    let trash = ws.list_trash().await.unwrap();
    assert_eq!(trash.len(), 1);
    assert_eq!(trash[0].name, id);
    assert_eq!(trash[0].kind, ItemKind::File);

    ws.restore(&id).await.unwrap();
    let restored = fs::read(ws.path().join("notes/plan.md")).await.unwrap();
    assert_eq!(restored, b"@(goals)");
    assert_eq!(ws.backlinks("goals").await, vec!["notes/plan".to_string()]);

    // A conflicting sibling created in the meantime blocks the restore.
    clock.set(moment(1));
    let id = ws.trash("notes/plan").await.unwrap();
    create_dummy(&ws.path().join("notes/PLAN.txt")).await;
    assert!(matches!(ws.restore(&id).await, Err(Error::Conflict(_))));
    assert!(ws.path().join(TRASH_DIR_NAME).join(&id).exists());
}

#[tokio::test]
async fn integration_resolve_conflicts_is_idempotent() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    create_dummy(&ws.path().join("Idea.md")).await;
    create_dummy(&ws.path().join("idea.txt")).await;
    create_dummy(&ws.path().join("sub/a.md")).await;
    create_dummy(&ws.path().join("sub/A.md")).await;

    let first = ws.resolve_conflicts().await.unwrap();

    assert_eq!(first, vec![
        RenameOperation { old_path: "idea.txt".to_string(), new_path: "idea-1.txt".to_string() },
        RenameOperation { old_path: "sub/a.md".to_string(), new_path: "sub/a-1.md".to_string() },
    ]);
    assert!(ws.resolve_conflicts().await.unwrap().is_empty());
    assert!(ws.resolve_conflicts().await.unwrap().is_empty());

    let log = ws.read_activity().await.unwrap().unwrap();
    assert!(log.contains("DATA INTEGRITY: Renamed 'idea.txt' to 'idea-1.txt'"));
}

#[tokio::test]
async fn integration_resolve_conflicts_updates_backlinks() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("reader", b"@(dup)").await.unwrap();
    ws.save("dup", b"@(reader)").await.unwrap();
    create_dummy(&ws.path().join("DUP.txt")).await;

    // "DUP.txt" sorts before "dup.md", so the saved document is renamed.
    let renames = ws.resolve_conflicts().await.unwrap();
    assert_eq!(renames.len(), 1);
    assert_eq!(renames[0].new_path, "dup-1.md");

    assert_eq!(ws.backlinks("reader").await, vec!["dup-1".to_string()]);
    assert_eq!(ws.backlinks("dup-1").await, vec!["reader".to_string()]);
}

#[tokio::test]
async fn integration_mutual_reference_after_trash() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("a", b"@(b)").await.unwrap();
    ws.save("b", b"@(a)").await.unwrap();
    assert_eq!(ws.backlinks("a").await, vec!["b".to_string()]);
    assert_eq!(ws.backlinks("b").await, vec!["a".to_string()]);

    ws.trash("a").await.unwrap();
    assert!(ws.backlinks("b").await.is_empty());
    assert!(ws.backlinks("a").await.is_empty());

    // b still mentions a, so saving b records the reference again although a is gone.
    ws.save("b", b"@(a)").await.unwrap();
    assert_eq!(ws.backlinks("a").await, vec!["b".to_string()]);
}

#[tokio::test]
async fn integration_nested_folder_restore() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("projects/2026/q1", b"@(budget)").await.unwrap();

    let id = ws.trash("projects/2026").await.unwrap();
    assert_eq!(id, "2026_20260701100000");
    assert!(ws.backlinks("budget").await.is_empty());

    let restored = ws.restore(&id).await.unwrap();
    assert_eq!(restored, "projects/2026");
    assert!(ws.path().join("projects/2026/q1.md").is_file());
    assert_eq!(ws.backlinks("budget").await, vec!["projects/2026/q1".to_string()]);
}

#[tokio::test]
async fn integration_list_tree() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("b", b"").await.unwrap();
    ws.save("folder/inner", b"").await.unwrap();
    ws.save("a", b"").await.unwrap();
    ws.trash("b").await.unwrap();

    let tree = ws.list_tree().await.unwrap();
    let json = serde_json::to_value(&tree).unwrap();

    assert_eq!(json, serde_json::json!([
        { "name": "folder", "path": "folder", "type": "folder", "children": [
            { "name": "inner", "path": "folder/inner", "type": "file" }
        ]},
        { "name": "a", "path": "a", "type": "file" }
    ]));
}

#[tokio::test]
async fn integration_state_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let id = {
        let (ws, _) = open(dir.path()).await;
        ws.save("deep/note", b"@(x)").await.unwrap();
        ws.trash("deep/note").await.unwrap()
    };

    let (ws, _) = open(dir.path()).await;
    assert_eq!(ws.restore(&id).await.unwrap(), "deep/note");
    assert_eq!(ws.backlinks("x").await, vec!["deep/note".to_string()]);
}

#[tokio::test]
async fn integration_delete_folder_purges_inner_documents() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("box/inner", b"@(t)").await.unwrap();
    let id = ws.trash("box").await.unwrap();

    // Saved after the trash, so "box/inner" is an index key again.
    ws.save("reader", b"@(box/inner)").await.unwrap();
    assert_eq!(ws.backlinks("box/inner").await, vec!["reader".to_string()]);

    ws.delete_permanently(&id).await.unwrap();

    assert!(ws.backlinks("box/inner").await.is_empty());
    assert!(!ws.path().join(TRASH_DIR_NAME).join(&id).exists());
    assert!(ws.list_trash().await.unwrap().is_empty());
}

#[tokio::test]
async fn integration_resolve_conflicts_skips_unrenamable_entry() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    ws.save("b", b"@(t)").await.unwrap();
    create_dummy(&ws.path().join("B.md")).await;
    // No room left in the file name for a `-1` suffix.
    let long = "z".repeat(251);
    create_dummy(&ws.path().join(format!("{}.md", long.to_uppercase()))).await;
    create_dummy(&ws.path().join(format!("{}.md", long))).await;

    let renames = ws.resolve_conflicts().await.unwrap();

    assert_eq!(renames, vec![
        RenameOperation { old_path: "b.md".to_string(), new_path: "b-1.md".to_string() },
    ]);
    assert_eq!(ws.backlinks("t").await, vec!["b-1".to_string()]);
    let log = ws.read_activity().await.unwrap().unwrap();
    assert!(log.contains("DATA INTEGRITY: Renamed 'b.md' to 'b-1.md'"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_concurrent_saves_keep_every_backlink() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    let ws = Arc::new(ws);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let ws = ws.clone();
            tokio::spawn(async move { ws.save(&format!("source{:02}", i), b"@(target)").await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    drop(ws);

    let (ws, _) = open(dir.path()).await;
    let mut sources = ws.backlinks("target").await;
    sources.sort();
    let expected: Vec<String> = (0..16).map(|i| format!("source{:02}", i)).collect();
    assert_eq!(sources, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_concurrent_case_variants_admit_one() {
    let dir = tempdir().unwrap();
    let (ws, _) = open(dir.path()).await;
    let ws = Arc::new(ws);

    let tasks: Vec<_> = ["Topic", "topic"]
        .into_iter()
        .map(|name| {
            let ws = ws.clone();
            tokio::spawn(async move { ws.save(name, b"body").await })
        })
        .collect();
    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(Error::Conflict(ConflictError::NameTaken { .. }))))
            .count(),
        1
    );
    let entries = ws.list_tree().await.unwrap();
    assert_eq!(entries.len(), 1);
}
