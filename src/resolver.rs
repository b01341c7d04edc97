//! Mapping display names back to entries, and tracking the active scope.

use log::{debug, info};

use crate::drive::{self, DriveEntry, DriveService, Listing, Scope};
use crate::error::{DriveError, Result};

/// Find the entry called exactly `name` among `candidates`.
///
/// Matching is case-sensitive. When several candidates share the name, the
/// first one in listing order wins.
pub fn resolve<'a, I>(name: &str, candidates: I) -> Result<&'a DriveEntry>
where
    I: IntoIterator<Item = &'a DriveEntry>,
{
    candidates
        .into_iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| DriveError::not_found(name))
}

/// Browsing state for one user: the active scope and its latest listing.
///
/// Selections are only ever resolved against the listing produced by the most
/// recent lister call. Each call bumps `generation`; a selection carrying an
/// older generation is rejected as stale.
#[derive(Debug, Clone)]
pub struct Navigator {
    scope: Scope,
    listing: Option<Listing>,
    generation: u64,
    page_size: u32,
}

impl Navigator {
    pub fn new(page_size: u32) -> Self {
        Navigator {
            scope: Scope::Root,
            listing: None,
            generation: 0,
            page_size,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn listing(&self) -> Option<&Listing> {
        self.listing.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Re-list the active scope.
    pub async fn refresh(&mut self, service: &dyn DriveService) -> Result<&Listing> {
        self.list_scope(service, self.scope.clone()).await
    }

    /// Switch back to the root scope and list it.
    pub async fn go_root(&mut self, service: &dyn DriveService) -> Result<&Listing> {
        self.list_scope(service, Scope::Root).await
    }

    /// Enter the folder called `name` in the current listing and list it.
    pub async fn enter_folder(
        &mut self,
        service: &dyn DriveService,
        name: &str,
        generation: Option<u64>,
    ) -> Result<&Listing> {
        let folder = {
            let listing = self.current(name, generation)?;
            resolve(name, listing.folders())?.clone()
        };
        info!("entering folder {} ({})", folder.name, folder.id);
        self.list_scope(service, Scope::Folder(folder)).await
    }

    /// Resolve the file called `name` in the current listing.
    ///
    /// Never issues a listing call.
    pub fn select_file(&self, name: &str, generation: Option<u64>) -> Result<DriveEntry> {
        let listing = self.current(name, generation)?;
        let entry = resolve(name, listing.files())?;
        debug!("selected file {} ({})", entry.name, entry.id);
        Ok(entry.clone())
    }

    fn current(&self, name: &str, generation: Option<u64>) -> Result<&Listing> {
        let listing = self
            .listing
            .as_ref()
            .ok_or_else(|| DriveError::not_found(name))?;
        match generation {
            Some(seen) if seen != self.generation => {
                debug!(
                    "rejecting stale selection of '{}' (generation {}, current {})",
                    name, seen, self.generation
                );
                Err(DriveError::not_found(name))
            }
            _ => Ok(listing),
        }
    }

    async fn list_scope(&mut self, service: &dyn DriveService, scope: Scope) -> Result<&Listing> {
        // A failed listing leaves no listing to select from.
        self.listing = None;
        self.generation += 1;
        self.scope = scope;

        let listing = drive::list(service, &self.scope, self.page_size).await?;
        Ok(self.listing.insert(listing))
    }
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
