//! Download a spreadsheet to local storage, and upload edits back over it.
//!
//! Local files are kept under `<root>/<session id>/<entry id>.xlsx`. They are
//! overwritten on every download and save and never removed by the tool. The
//! files are not locked: two requests sharing one session id and entry would
//! write the same path.

use std::fs;
use std::path::PathBuf;

use log::{error, info, warn};

use crate::drive::{DriveEntry, DriveService, XLSX_MIME_TYPE};
use crate::error::{DriveError, Result};
use crate::workbook::Table;

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// # Arguments
    ///
    /// * `root` - directory that holds one subdirectory per session; created
    ///   on first download
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    /// Deterministic local path for `entry` within `session_id`.
    pub fn path_for(&self, session_id: &str, entry: &DriveEntry) -> PathBuf {
        self.root
            .join(sanitize(session_id))
            .join(format!("{}.xlsx", sanitize(&entry.id)))
    }
}

/// Keep only characters that are safe in a single path component.
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// A downloaded spreadsheet and the table parsed from it.
#[derive(Debug, Clone)]
pub struct LocalSpreadsheet {
    /// Local copy, rewritten on every save.
    pub path: PathBuf,
    /// The remote entry the copy came from; saves replace its content.
    pub entry: DriveEntry,
    /// Table as last downloaded or successfully saved. Edits are checked
    /// against its shape.
    pub table: Table,
}

/// Fetch `entry`, store it locally and parse it.
///
/// # Arguments
///
/// * `service` - authenticated remote storage
/// * `store` - where local copies live
/// * `session_id` - namespaces the local path so sessions never share a file
/// * `entry` - a file from the current listing; folders are rejected as
///   not found
///
/// # Errors
///
/// `Download` if the content cannot be fetched, `Io` if the local copy cannot
/// be written and `Parse` if it is not a readable `.xlsx`.
pub async fn download(
    service: &dyn DriveService,
    store: &LocalStore,
    session_id: &str,
    entry: &DriveEntry,
) -> Result<LocalSpreadsheet> {
    if entry.is_folder() {
        return Err(DriveError::not_found(&entry.name));
    }

    let bytes = service.get_content(&entry.id).await?;
    let path = store.path_for(session_id, entry);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &bytes)?;
    info!(
        "downloaded {} ({} bytes) to {}",
        entry.name,
        bytes.len(),
        path.display()
    );

    let table = match Table::read_xlsx(&path) {
        Ok(table) => table,
        Err(e) => {
            warn!("{} is not a readable spreadsheet: {}", entry.name, e);
            return Err(e);
        }
    };

    Ok(LocalSpreadsheet {
        path,
        entry: entry.clone(),
        table,
    })
}

/// Write `edited` to the local file and replace the remote content with it.
///
/// The local file stays in place whether or not the upload succeeds.
pub async fn save(
    service: &dyn DriveService,
    local: &mut LocalSpreadsheet,
    edited: Table,
) -> Result<()> {
    edited.check_shape(&local.table)?;

    fs::write(&local.path, edited.to_xlsx()?)?;
    let bytes = fs::read(&local.path)?;
    let size = bytes.len();

    if let Err(e) = service
        .replace_content(&local.entry.id, bytes, XLSX_MIME_TYPE)
        .await
    {
        error!("upload of {} failed: {}", local.entry.name, e);
        return Err(e);
    }

    info!("uploaded {} ({} bytes)", local.entry.name, size);
    local.table = edited;
    Ok(())
}

#[cfg(test)]
#[path = "tests/roundtrip_tests.rs"]
mod tests;
