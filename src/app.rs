#![cfg(feature = "web")]

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::drive::{DriveEntry, DriveService, Listing, Scope};
use crate::error::DriveError;
use crate::google::GoogleDrive;
use crate::login::{self, SessionId, Sessions};
use crate::resolver::Navigator;
use crate::roundtrip::{self, LocalSpreadsheet, LocalStore};
use crate::workbook::Table;

/// Browsing and editing state of one session.
pub(crate) struct EditSession {
    navigator: Navigator,
    open: Option<LocalSpreadsheet>,
}

pub struct AppState {
    drive: Arc<dyn DriveService>,
    store: LocalStore,
    page_size: u32,
    pub(crate) password_hash: Option<String>,
    pub(crate) sessions: Sessions,
    pub(crate) edits: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<EditSession>>>>,
}

impl AppState {
    pub fn new(drive: Arc<dyn DriveService>, settings: &Settings) -> Self {
        AppState {
            drive,
            store: LocalStore::new(&settings.work_dir),
            page_size: settings.page_size,
            password_hash: settings.password_hash.clone(),
            sessions: Sessions::new(Duration::from_secs(settings.session_hours.saturating_mul(60 * 60))),
            edits: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn edit_session(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<EditSession>> {
        let mut edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
        edits
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(EditSession {
                    navigator: Navigator::new(self.page_size),
                    open: None,
                }))
            })
            .clone()
    }

    pub(crate) fn forget_session(&self, id: &SessionId) {
        let mut edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
        edits.remove(id);
    }
}

#[derive(Deserialize)]
struct Selection {
    name: String,
    #[serde(default)]
    generation: Option<u64>,
}

#[derive(Deserialize)]
struct SaveRequest {
    table: Table,
}

#[derive(Serialize)]
struct ListingResponse {
    scope: Scope,
    generation: u64,
    folders: Vec<DriveEntry>,
    files: Vec<DriveEntry>,
}

impl ListingResponse {
    fn new(listing: &Listing, generation: u64) -> Self {
        ListingResponse {
            scope: listing.scope.clone(),
            generation,
            folders: listing.folders().into_iter().cloned().collect(),
            files: listing.files().into_iter().cloned().collect(),
        }
    }
}

#[derive(Serialize)]
struct OpenResponse {
    entry: DriveEntry,
    table: Table,
}

#[derive(Serialize)]
struct SaveResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    kind: &'static str,
    message: String,
}

enum ApiError {
    Drive(DriveError),
    NothingOpen,
}

impl From<DriveError> for ApiError {
    fn from(e: DriveError) -> Self {
        ApiError::Drive(e)
    }
}

fn status_for(e: &DriveError) -> StatusCode {
    match e {
        DriveError::Authentication(_) | DriveError::Download(_) | DriveError::Upload(_) => {
            StatusCode::BAD_GATEWAY
        }
        DriveError::Listing(_) => StatusCode::SERVICE_UNAVAILABLE,
        DriveError::NotFound { .. } => StatusCode::NOT_FOUND,
        DriveError::Parse(_) | DriveError::Shape(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DriveError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Drive(e) => (status_for(&e), e.kind(), e.to_string()),
            ApiError::NothingOpen => (
                StatusCode::CONFLICT,
                "nothing_open",
                "no spreadsheet is open".to_string(),
            ),
        };
        let body = ErrorResponse {
            status: "error".to_string(),
            kind,
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/entries", get(list_entries))
        .route("/folder", post(enter_folder))
        .route("/root", post(go_root))
        .route("/open", post(open_file))
        .route("/save", post(save_file))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route("/", get(serve_index))
        .route("/healthz", get(healthz))
        .route("/login", post(login::handle_login))
        .route("/logout", post(login::handle_logout))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect to Drive with the configured service account and serve until
/// the listener fails.
#[cfg(not(tarpaulin_include))]
pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let drive = GoogleDrive::from_key_file(&settings.credentials_path, settings.api_base.clone())?;
    if let Err(e) = drive.verify().await {
        // Keep serving; every request will surface the same failure.
        error!("{}", e);
    }
    if settings.password_hash.is_none() {
        warn!("no password_hash configured; all logins will be rejected");
    }

    let app_state = Arc::new(AppState::new(Arc::new(drive), &settings));
    let app = build_router(app_state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Listening on http://{}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
) -> Result<Json<ListingResponse>, ApiError> {
    let edit = state.edit_session(&id);
    let mut edit = edit.lock().await;
    let listing = edit.navigator.refresh(state.drive.as_ref()).await?.clone();
    Ok(Json(ListingResponse::new(&listing, edit.navigator.generation())))
}

async fn enter_folder(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Json(selection): Json<Selection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let edit = state.edit_session(&id);
    let mut edit = edit.lock().await;
    let listing = edit
        .navigator
        .enter_folder(state.drive.as_ref(), &selection.name, selection.generation)
        .await?
        .clone();
    Ok(Json(ListingResponse::new(&listing, edit.navigator.generation())))
}

async fn go_root(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
) -> Result<Json<ListingResponse>, ApiError> {
    let edit = state.edit_session(&id);
    let mut edit = edit.lock().await;
    let listing = edit.navigator.go_root(state.drive.as_ref()).await?.clone();
    Ok(Json(ListingResponse::new(&listing, edit.navigator.generation())))
}

async fn open_file(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Json(selection): Json<Selection>,
) -> Result<Json<OpenResponse>, ApiError> {
    let edit = state.edit_session(&id);
    let mut edit = edit.lock().await;
    // A failed open leaves nothing open; the user re-selects to retry.
    edit.open = None;

    let entry = edit
        .navigator
        .select_file(&selection.name, selection.generation)?;
    let local = roundtrip::download(state.drive.as_ref(), &state.store, &id.0, &entry).await?;

    let response = OpenResponse {
        entry: local.entry.clone(),
        table: local.table.clone(),
    };
    edit.open = Some(local);
    Ok(Json(response))
}

async fn save_file(
    State(state): State<Arc<AppState>>,
    Extension(id): Extension<SessionId>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    let edit = state.edit_session(&id);
    let mut edit = edit.lock().await;
    let local = edit.open.as_mut().ok_or(ApiError::NothingOpen)?;

    roundtrip::save(state.drive.as_ref(), local, request.table).await?;

    Ok(Json(SaveResponse {
        status: "ok".to_string(),
        message: Some(format!("Saved {} to Drive", local.entry.name)),
    }))
}
