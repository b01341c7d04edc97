use super::*;
use crate::memory::{MemoryDrive, Operation};
use crate::workbook::CellValue;

fn budget() -> Table {
    Table::new(
        vec!["Month".into(), "Spent".into()],
        vec![
            vec![CellValue::Text("January".into()), CellValue::Number(950.0)],
            vec![CellValue::Text("February".into()), CellValue::Number(1010.25)],
        ],
    )
}

fn drive_with_budget() -> (MemoryDrive, DriveEntry) {
    let drive = MemoryDrive::new();
    let entry = drive.add_file(None, "id-budget", "budget.xlsx", budget().to_xlsx().expect("xlsx"));
    (drive, entry)
}

#[test]
fn local_path_is_keyed_by_session_and_entry_id() {
    let store = LocalStore::new("/tmp/work");
    let a = DriveEntry::new("id-1", "same.xlsx", XLSX_MIME_TYPE);
    let b = DriveEntry::new("id-2", "same.xlsx", XLSX_MIME_TYPE);

    assert_eq!(
        store.path_for("s1", &a),
        PathBuf::from("/tmp/work/s1/id-1.xlsx")
    );
    assert_ne!(store.path_for("s1", &a), store.path_for("s1", &b));
    assert_ne!(store.path_for("s1", &a), store.path_for("s2", &a));
}

#[test]
fn path_components_cannot_escape_the_store() {
    let store = LocalStore::new("/tmp/work");
    let sneaky = DriveEntry::new("../../etc/passwd", "x", XLSX_MIME_TYPE);
    let path = store.path_for("..", &sneaky);
    assert!(path.starts_with("/tmp/work"));
    assert_eq!(path, PathBuf::from("/tmp/work/__/______etc_passwd.xlsx"));
}

#[tokio::test]
async fn download_writes_local_file_and_parses_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let (drive, entry) = drive_with_budget();

    let local = download(&drive, &store, "session-a", &entry).await.expect("download");

    assert_eq!(local.path, dir.path().join("session-a").join("id-budget.xlsx"));
    assert_eq!(fs::read(&local.path).expect("local"), drive.content("id-budget").expect("remote"));
    assert_eq!(local.table, budget());
    assert_eq!(local.entry, entry);
}

#[tokio::test]
async fn download_of_non_spreadsheet_is_parse_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let drive = MemoryDrive::new();
    let entry = drive.add_file(None, "id-notes", "notes.xlsx", b"just some text".to_vec());

    let err = download(&drive, &store, "s", &entry).await.expect_err("parse");
    assert!(matches!(err, DriveError::Parse(_)));
}

#[tokio::test]
async fn download_failure_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let (drive, entry) = drive_with_budget();
    drive.fail(Operation::Download);

    let err = download(&drive, &store, "s", &entry).await.expect_err("download");
    assert!(matches!(err, DriveError::Download(_)));
    assert!(!store.path_for("s", &entry).exists());
}

#[tokio::test]
async fn folders_cannot_be_downloaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let drive = MemoryDrive::new();
    let folder = drive.add_folder(None, "f1", "Invoices");

    let err = download(&drive, &store, "s", &folder).await.expect_err("folder");
    assert!(matches!(err, DriveError::NotFound { .. }));
}

#[tokio::test]
async fn save_replaces_remote_content_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let (drive, entry) = drive_with_budget();
    let mut local = download(&drive, &store, "s", &entry).await.expect("download");

    let mut edited = local.table.clone();
    edited.set(1, "Spent", CellValue::Number(999.0)).expect("cell");
    save(&drive, &mut local, edited.clone()).await.expect("save");

    let uploads = drive.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].id, "id-budget");
    assert_eq!(uploads[0].mime_type, XLSX_MIME_TYPE);
    assert_eq!(uploads[0].bytes, fs::read(&local.path).expect("local"));
    assert_eq!(local.table, edited);

    let again = download(&drive, &store, "s", &entry).await.expect("download again");
    assert_eq!(again.table.get(1, "Spent"), Some(&CellValue::Number(999.0)));
}

#[tokio::test]
async fn unedited_save_reproduces_the_same_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let (drive, entry) = drive_with_budget();
    let mut local = download(&drive, &store, "s", &entry).await.expect("download");
    let original = local.table.clone();

    save(&drive, &mut local, original.clone()).await.expect("save");
    let again = download(&drive, &store, "s", &entry).await.expect("download again");
    assert_eq!(again.table, original);
}

#[tokio::test]
async fn upload_failure_keeps_local_file_and_remote_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let (drive, entry) = drive_with_budget();
    let before = drive.content("id-budget").expect("remote");
    let mut local = download(&drive, &store, "s", &entry).await.expect("download");

    let mut edited = local.table.clone();
    edited.set(0, "Spent", CellValue::Number(1.0)).expect("cell");
    drive.fail(Operation::Upload);

    let err = save(&drive, &mut local, edited.clone()).await.expect_err("upload");
    assert!(matches!(err, DriveError::Upload(_)));
    assert_eq!(drive.content("id-budget").expect("remote"), before);
    assert_eq!(local.table, budget());

    let on_disk = Table::read_xlsx(&local.path).expect("local file");
    assert_eq!(on_disk, edited);
}

#[tokio::test]
async fn reshaped_table_is_not_uploaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let (drive, entry) = drive_with_budget();
    let mut local = download(&drive, &store, "s", &entry).await.expect("download");

    let mut edited = local.table.clone();
    edited.columns.push("Extra".into());
    let err = save(&drive, &mut local, edited).await.expect_err("shape");
    assert!(matches!(err, DriveError::Shape(_)));
    assert!(drive.uploads().is_empty());
}
