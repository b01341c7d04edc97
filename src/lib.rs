/*!
# sheetdrive

A small web tool for editing spreadsheets stored in Google Drive.

## Overview

The user logs in with a shared password, browses the Drive account visible to
a service account, picks an `.xlsx` file, edits its first worksheet in a grid
and saves it back. Saving replaces the content of the same Drive file; it never
creates a new one.

## Architecture

### Core
- **Directory Lister** (`drive`): lists a scope (root or a folder) and splits
  the result into folders and files
- **Selection Resolver** (`resolver`): maps a display name back to an entry of
  the most recent listing; duplicate names resolve to the first in listing order
- **Spreadsheet Roundtripper** (`roundtrip`): downloads an entry to a local file,
  parses it into a `Table`, and after edits writes and uploads it again

### Remote storage
- `DriveService` trait with three operations: list entries, get content,
  replace content
- `google::GoogleDrive`: Drive v3 REST client authenticated as a service account
- `memory::MemoryDrive`: in-memory implementation for tests and demos

### Web layer (feature `web`)
- **app**: axum router, JSON API and per-session browsing/editing state
- **login**: password gate and session cookies

## Local files

Downloads are kept under `<work_dir>/<session id>/<entry id>.xlsx`, overwritten
on each download or save and never cleaned up by the tool. Files are not locked.

## REST API Endpoints

- `GET /api/entries` - List the active scope
- `POST /api/folder` - Enter a folder of the current listing
- `POST /api/root` - Go back to the root scope
- `POST /api/open` - Download and parse a file of the current listing
- `POST /api/save` - Upload the edited table over the open file
*/

pub mod app;
pub mod config;
pub mod drive;
pub mod error;
pub mod google;
pub mod login;
pub mod memory;
pub mod resolver;
pub mod roundtrip;
pub mod workbook;

pub use drive::*;
pub use error::*;
pub use resolver::*;
pub use roundtrip::*;
pub use workbook::*;
