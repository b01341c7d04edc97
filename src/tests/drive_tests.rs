use super::*;
use crate::error::DriveError;
use crate::memory::{MemoryDrive, Operation};

fn folder(id: &str, name: &str) -> DriveEntry {
    DriveEntry::new(id, name, FOLDER_MIME_TYPE)
}

fn file(id: &str, name: &str) -> DriveEntry {
    DriveEntry::new(id, name, XLSX_MIME_TYPE)
}

#[test]
fn kind_follows_folder_mime_type() {
    assert_eq!(EntryKind::from_mime_type(FOLDER_MIME_TYPE), EntryKind::Folder);
    assert_eq!(EntryKind::from_mime_type(XLSX_MIME_TYPE), EntryKind::File);
    assert_eq!(
        EntryKind::from_mime_type("application/vnd.google-apps.spreadsheet"),
        EntryKind::File
    );
}

#[test]
fn partitions_cover_listing_exactly_once() {
    let listing = Listing {
        scope: Scope::Root,
        entries: vec![
            file("1", "budget.xlsx"),
            folder("2", "Invoices"),
            file("3", "notes.xlsx"),
            folder("4", "Archive"),
        ],
    };

    let folders = listing.folders();
    let files = listing.files();

    assert_eq!(folders.len() + files.len(), listing.entries.len());
    for entry in &listing.entries {
        let in_folders = folders.contains(&entry);
        let in_files = files.contains(&entry);
        assert!(in_folders != in_files, "{} must be in exactly one partition", entry.name);
    }
    assert_eq!(
        folders.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        vec!["Invoices", "Archive"]
    );
    assert_eq!(
        files.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        vec!["budget.xlsx", "notes.xlsx"]
    );
}

#[test]
fn root_and_folder_queries() {
    assert_eq!(Scope::Root.query(), "trashed = false");
    assert_eq!(
        Scope::Folder(folder("abc123", "Invoices")).query(),
        "'abc123' in parents"
    );
    assert_eq!(
        Scope::Folder(folder("it's", "odd")).query(),
        "'it\\'s' in parents"
    );
}

#[test]
fn scope_serializes_with_type_tag() {
    let json = serde_json::to_value(Scope::Root).expect("json");
    assert_eq!(json, serde_json::json!({ "type": "root" }));

    let json = serde_json::to_value(Scope::Folder(folder("f1", "Invoices"))).expect("json");
    assert_eq!(json["type"], "folder");
    assert_eq!(json["id"], "f1");
    assert_eq!(json["kind"], "folder");
}

#[tokio::test]
async fn list_is_bounded_by_page_size() {
    let drive = MemoryDrive::new();
    for i in 0..15 {
        drive.add_file(None, &format!("id{i}"), &format!("file{i}.xlsx"), Vec::new());
    }

    let listing = list(&drive, &Scope::Root, DEFAULT_PAGE_SIZE).await.expect("listing");
    assert_eq!(listing.entries.len(), 10);
    assert_eq!(listing.entries[0].name, "file0.xlsx");
    assert_eq!(listing.scope, Scope::Root);
}

#[tokio::test]
async fn root_skips_trashed_and_folder_lists_children() {
    let drive = MemoryDrive::new();
    let invoices = drive.add_folder(None, "f1", "Invoices");
    drive.add_file(Some("f1"), "a", "january.xlsx", Vec::new());
    drive.add_file(None, "b", "old.xlsx", Vec::new());
    drive.trash("b");

    let root = list(&drive, &Scope::Root, 10).await.expect("root");
    assert!(root.entries.iter().all(|e| e.id != "b"));

    let inside = list(&drive, &Scope::Folder(invoices), 10).await.expect("folder");
    assert_eq!(inside.entries.len(), 1);
    assert_eq!(inside.entries[0].name, "january.xlsx");
}

#[tokio::test]
async fn listing_failure_propagates() {
    let drive = MemoryDrive::new();
    drive.add_file(None, "a", "budget.xlsx", Vec::new());
    drive.fail(Operation::List);

    let err = list(&drive, &Scope::Root, 10).await.expect_err("must fail");
    assert!(matches!(err, DriveError::Listing(_)));
}
