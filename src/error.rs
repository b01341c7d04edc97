use thiserror::Error;

/// Failures surfaced to the user by the core operations.
///
/// None of these are retried. Each variant maps to exactly one user-visible
/// message; the web layer additionally derives an HTTP status from it.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Credentials could not be read or the token endpoint refused them.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The listing call failed; no partial listing is returned.
    #[error("listing unavailable: {0}")]
    Listing(String),

    /// The name is not in the current listing, or the selection is stale.
    #[error("'{name}' not found in the current listing")]
    NotFound { name: String },

    #[error("download failed: {0}")]
    Download(String),

    /// Content is not a readable spreadsheet.
    #[error("could not read spreadsheet: {0}")]
    Parse(String),

    /// The edited table no longer matches the downloaded one.
    #[error("edited table does not match the original shape: {0}")]
    Shape(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriveError {
    pub fn not_found(name: impl Into<String>) -> Self {
        DriveError::NotFound { name: name.into() }
    }

    /// Short machine-readable tag, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DriveError::Authentication(_) => "authentication",
            DriveError::Listing(_) => "listing",
            DriveError::NotFound { .. } => "not_found",
            DriveError::Download(_) => "download",
            DriveError::Parse(_) => "parse",
            DriveError::Shape(_) => "shape",
            DriveError::Upload(_) => "upload",
            DriveError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;
