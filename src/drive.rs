//! Drive entries, browsing scopes and the directory lister.

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// MIME type Drive uses for folders. Anything else is listed as a file.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// MIME type used when uploading spreadsheet content.
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Number of entries requested per listing call unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

impl EntryKind {
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    }
}

/// One item from a single listing call. Not cached across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEntry {
    /// Opaque Drive file id. Stable across listings and renames.
    pub id: String,
    /// Display name. Not unique; see [`crate::resolver::resolve`].
    pub name: String,
    /// Derived from `mime_type` when the entry is built.
    pub kind: EntryKind,
    pub mime_type: String,
}

impl DriveEntry {
    /// Build an entry, deriving its kind from `mime_type`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        DriveEntry {
            id: id.into(),
            name: name.into(),
            kind: EntryKind::from_mime_type(&mime_type),
            mime_type,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// The browsing context that decides which listing query is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Scope {
    /// Everything visible to the account.
    Root,
    /// Direct children of one folder.
    Folder(DriveEntry),
}

impl Scope {
    /// Drive search expression for this scope.
    ///
    /// Root lists every non-trashed entry visible to the account; a folder
    /// lists the entries whose parent is that folder.
    pub fn query(&self) -> String {
        match self {
            Scope::Root => "trashed = false".to_string(),
            Scope::Folder(folder) => format!("'{}' in parents", escape_query_literal(&folder.id)),
        }
    }

    pub fn folder_id(&self) -> Option<&str> {
        match self {
            Scope::Root => None,
            Scope::Folder(folder) => Some(&folder.id),
        }
    }
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Result of one lister call, in the order the service returned it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub scope: Scope,
    pub entries: Vec<DriveEntry>,
}

impl Listing {
    pub fn folders(&self) -> Vec<&DriveEntry> {
        self.entries.iter().filter(|e| e.is_folder()).collect()
    }

    pub fn files(&self) -> Vec<&DriveEntry> {
        self.entries.iter().filter(|e| e.is_file()).collect()
    }
}

/// Remote storage operations the core depends on.
///
/// Credential handling belongs to the implementation; callers pass an
/// already-authenticated handle.
#[async_trait]
pub trait DriveService: Send + Sync {
    async fn list_entries(&self, scope: &Scope, page_size: u32) -> Result<Vec<DriveEntry>>;

    async fn get_content(&self, id: &str) -> Result<Vec<u8>>;

    /// Replace the content of an existing entry. The id is unchanged.
    async fn replace_content(&self, id: &str, bytes: Vec<u8>, mime_type: &str) -> Result<()>;
}

/// List the entries under `scope`, bounded by `page_size`.
///
/// # Arguments
///
/// * `service` - authenticated remote storage
/// * `scope` - root or a folder
/// * `page_size` - maximum number of entries; only the first page is fetched
///
/// # Returns
///
/// The entries in service order, or `Listing`/`Authentication` on failure.
/// No partial listing is ever returned.
pub async fn list(service: &dyn DriveService, scope: &Scope, page_size: u32) -> Result<Listing> {
    let entries = match service.list_entries(scope, page_size).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("listing {} failed: {}", scope.query(), e);
            return Err(e);
        }
    };

    debug!(
        "listed {} entries for scope {:?}",
        entries.len(),
        scope.folder_id().unwrap_or("root")
    );

    Ok(Listing {
        scope: scope.clone(),
        entries,
    })
}

#[cfg(test)]
#[path = "tests/drive_tests.rs"]
mod tests;
