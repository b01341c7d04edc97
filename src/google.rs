//! Google Drive v3 over REST, authenticated as a service account.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::drive::{DriveEntry, DriveService, Scope};
use crate::error::{DriveError, Result};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/drive.file",
];
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Error reason Drive gives for `alt=media` on native Google documents.
const NOT_DOWNLOADABLE: &str = "fileNotDownloadable";
// Refresh this long before the token actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// The parts of a service-account JSON key this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            DriveError::Authentication(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DriveError::Authentication(format!("invalid service account key: {e}")))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    name: String,
    mime_type: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Authenticated Drive handle. Build once and pass it to the core operations.
pub struct GoogleDrive {
    http: Client,
    key: ServiceAccountKey,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleDrive {
    pub fn new(key: ServiceAccountKey, api_base: impl Into<String>) -> Self {
        GoogleDrive {
            http: Client::new(),
            key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        }
    }

    pub fn from_key_file(path: impl AsRef<Path>, api_base: impl Into<String>) -> Result<Self> {
        Ok(Self::new(ServiceAccountKey::from_file(path)?, api_base))
    }

    /// Check the credentials by listing a single root entry.
    pub async fn verify(&self) -> Result<()> {
        match self.list_entries(&Scope::Root, 1).await {
            Ok(entries) => {
                if entries.is_empty() {
                    warn!("authenticated as {}, but no files are visible", self.key.client_email);
                } else {
                    info!("authenticated as {}", self.key.client_email);
                }
                Ok(())
            }
            Err(DriveError::Authentication(msg)) => Err(DriveError::Authentication(msg)),
            Err(e) => Err(DriveError::Authentication(e.to_string())),
        }
    }

    fn assertion(&self) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            iss: self.key.client_email.clone(),
            scope: SCOPES.join(" "),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| DriveError::Authentication(format!("invalid private key: {e}")))?;
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| DriveError::Authentication(format!("cannot sign assertion: {e}")))
    }

    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.token.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Instant::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        let assertion = self.assertion()?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| DriveError::Authentication(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DriveError::Authentication(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DriveError::Authentication(format!("invalid token response: {e}")))?;

        debug!("obtained access token valid for {}s", token.expires_in);
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        let value = token.access_token;
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }
}

/// Turn a non-success status into the given error. Only 401 means the
/// credentials were refused; Drive also answers 403 for rate limits and for
/// files it cannot serve, which are not authentication problems.
fn check_status(status: StatusCode, fail: fn(String) -> DriveError) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(DriveError::Authentication(format!("drive returned {status}")));
    }
    Err(fail(format!("drive returned {status}")))
}

#[async_trait]
impl DriveService for GoogleDrive {
    async fn list_entries(&self, scope: &Scope, page_size: u32) -> Result<Vec<DriveEntry>> {
        let token = self.access_token().await?;
        let page_size = page_size.to_string();
        let response = self
            .http
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[
                ("q", scope.query().as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", "files(id, name, mimeType)"),
            ])
            .send()
            .await
            .map_err(|e| DriveError::Listing(e.to_string()))?;
        check_status(response.status(), DriveError::Listing)?;

        let list: FileList = response
            .json()
            .await
            .map_err(|e| DriveError::Listing(format!("invalid listing response: {e}")))?;

        Ok(list
            .files
            .into_iter()
            .map(|f| DriveEntry::new(f.id, f.name, f.mime_type))
            .collect())
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{}/{}", self.files_url(), id))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| DriveError::Download(e.to_string()))?;

        if response.status() == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            // Google Docs, Sheets and Slides have no binary content to fetch.
            if body.contains(NOT_DOWNLOADABLE) {
                warn!("file {} is a native Google document", id);
                return Err(DriveError::Parse(
                    "native Google documents cannot be opened; only .xlsx files".to_string(),
                ));
            }
            return Err(DriveError::Download(format!(
                "drive returned {}",
                StatusCode::FORBIDDEN
            )));
        }
        check_status(response.status(), DriveError::Download)?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DriveError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn replace_content(&self, id: &str, bytes: Vec<u8>, mime_type: &str) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .http
            .patch(format!("{}/upload/drive/v3/files/{}", self.api_base, id))
            .bearer_auth(token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| DriveError::Upload(e.to_string()))?;
        check_status(response.status(), DriveError::Upload)
    }
}

#[cfg(all(test, feature = "web"))]
#[path = "tests/google_tests.rs"]
mod tests;
