//! In-memory [`DriveService`], used by tests and local demos.
//!
//! Mirrors the Drive query semantics the lister relies on: a root listing
//! returns every non-trashed entry, a folder listing returns the entries whose
//! parent is that folder, and both are truncated to the page size.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::drive::{DriveEntry, DriveService, FOLDER_MIME_TYPE, Scope, XLSX_MIME_TYPE};
use crate::error::{DriveError, Result};

/// A [`DriveService`] call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Download,
    Upload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub id: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

struct StoredEntry {
    parent: Option<String>,
    entry: DriveEntry,
    trashed: bool,
}

#[derive(Default)]
struct MemoryState {
    entries: Vec<StoredEntry>,
    contents: HashMap<String, Vec<u8>>,
    list_calls: Vec<Scope>,
    uploads: Vec<Upload>,
    failing: HashSet<Operation>,
}

#[derive(Default)]
pub struct MemoryDrive {
    state: Mutex<MemoryState>,
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a folder under `parent`, or at the top level when `parent` is `None`.
    pub fn add_folder(&self, parent: Option<&str>, id: &str, name: &str) -> DriveEntry {
        self.insert(parent, DriveEntry::new(id, name, FOLDER_MIME_TYPE), None)
    }

    /// Add an `.xlsx` file with the given content.
    ///
    /// # Arguments
    ///
    /// * `parent` - folder id, or `None` for the top level
    /// * `id` - Drive id; uploads must target an existing id
    /// * `name` - display name, need not be unique
    /// * `bytes` - content returned by downloads
    pub fn add_file(&self, parent: Option<&str>, id: &str, name: &str, bytes: Vec<u8>) -> DriveEntry {
        self.insert(parent, DriveEntry::new(id, name, XLSX_MIME_TYPE), Some(bytes))
    }

    fn insert(&self, parent: Option<&str>, entry: DriveEntry, bytes: Option<Vec<u8>>) -> DriveEntry {
        let mut state = self.state();
        if let Some(bytes) = bytes {
            state.contents.insert(entry.id.clone(), bytes);
        }
        state.entries.push(StoredEntry {
            parent: parent.map(str::to_string),
            entry: entry.clone(),
            trashed: false,
        });
        entry
    }

    pub fn trash(&self, id: &str) {
        for stored in self.state().entries.iter_mut() {
            if stored.entry.id == id {
                stored.trashed = true;
            }
        }
    }

    /// Make every later call of `operation` fail until [`MemoryDrive::recover`].
    pub fn fail(&self, operation: Operation) {
        self.state().failing.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.state().failing.remove(&operation);
    }

    /// Scopes of every listing call made so far, oldest first.
    pub fn list_calls(&self) -> Vec<Scope> {
        self.state().list_calls.clone()
    }

    /// Every successful upload, oldest first.
    pub fn uploads(&self) -> Vec<Upload> {
        self.state().uploads.clone()
    }

    /// Current content of `id`, reflecting any uploads.
    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.state().contents.get(id).cloned()
    }
}

#[async_trait]
impl DriveService for MemoryDrive {
    async fn list_entries(&self, scope: &Scope, page_size: u32) -> Result<Vec<DriveEntry>> {
        let mut state = self.state();
        state.list_calls.push(scope.clone());
        if state.failing.contains(&Operation::List) {
            return Err(DriveError::Listing("service unavailable".to_string()));
        }

        let entries = state
            .entries
            .iter()
            .filter(|stored| match scope {
                Scope::Root => !stored.trashed,
                Scope::Folder(folder) => stored.parent.as_deref() == Some(folder.id.as_str()),
            })
            .take(page_size as usize)
            .map(|stored| stored.entry.clone())
            .collect();
        Ok(entries)
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        let state = self.state();
        if state.failing.contains(&Operation::Download) {
            return Err(DriveError::Download("service unavailable".to_string()));
        }
        state
            .contents
            .get(id)
            .cloned()
            .ok_or_else(|| DriveError::Download(format!("no content for {id}")))
    }

    async fn replace_content(&self, id: &str, bytes: Vec<u8>, mime_type: &str) -> Result<()> {
        let mut state = self.state();
        if state.failing.contains(&Operation::Upload) {
            return Err(DriveError::Upload("service unavailable".to_string()));
        }
        if !state.contents.contains_key(id) {
            return Err(DriveError::Upload(format!("no file with id {id}")));
        }
        state.contents.insert(id.to_string(), bytes.clone());
        state.uploads.push(Upload {
            id: id.to_string(),
            bytes,
            mime_type: mime_type.to_string(),
        });
        Ok(())
    }
}
