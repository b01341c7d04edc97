use super::*;

#[test]
fn hashed_password_verifies() {
    let hash = hash_password("s3cret").expect("hash");
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("s3cret", &hash));
    assert!(!verify_password("S3cret", &hash));
    assert!(!verify_password("", &hash));
}

#[test]
fn malformed_hash_never_matches() {
    assert!(!verify_password("s3cret", "s3cret"));
    assert!(!verify_password("", ""));
}

#[test]
fn sessions_validate_until_removed() {
    let sessions = Sessions::new(Duration::from_secs(60));
    let token = sessions.create();

    let id = sessions.validate(&token).expect("valid");
    assert_eq!(sessions.validate(&token), Some(id.clone()));
    assert_ne!(id.0, token);

    assert_eq!(sessions.remove(&token), Some(id));
    assert!(sessions.validate(&token).is_none());
}

#[test]
fn each_login_gets_its_own_session() {
    let sessions = Sessions::new(Duration::from_secs(60));
    let a = sessions.create();
    let b = sessions.create();
    assert_ne!(a, b);
    assert_ne!(sessions.validate(&a), sessions.validate(&b));
}

#[test]
fn expired_sessions_are_rejected() {
    let sessions = Sessions::new(Duration::ZERO);
    let token = sessions.create();
    assert!(sessions.validate(&token).is_none());
    assert!(sessions.remove(&token).is_none());
}

#[test]
fn unknown_token_is_rejected() {
    let sessions = Sessions::new(Duration::from_secs(60));
    assert!(sessions.validate("not-a-token").is_none());
}

#[test]
fn sweep_drops_sessions_nobody_presents_again() {
    let sessions = Sessions::new(Duration::ZERO);
    let a = sessions.create();
    let b = sessions.create();

    assert_eq!(sessions.sweep_expired().len(), 2);
    assert_eq!(sessions.lookup(&a), Lookup::Unknown);
    assert_eq!(sessions.lookup(&b), Lookup::Unknown);
}

#[test]
fn huge_lifetime_is_capped() {
    let sessions = Sessions::new(Duration::MAX);
    let token = sessions.create();
    assert!(sessions.validate(&token).is_some());
}

fn app_state(lifetime: Duration) -> AppState {
    use crate::config::Settings;
    use crate::memory::MemoryDrive;

    let settings = Settings {
        password_hash: Some(hash_password("pw").expect("hash")),
        work_dir: std::env::temp_dir().join("sheetdrive-login-tests"),
        ..Settings::default()
    };
    let mut state = AppState::new(Arc::new(MemoryDrive::new()), &settings);
    state.sessions = Sessions::new(lifetime);
    state
}

fn open_edit_sessions(state: &AppState) -> usize {
    state.edits.lock().expect("lock").len()
}

async fn send(app: &axum::Router, request: axum::http::Request<axum::body::Body>) -> StatusCode {
    use tower::ServiceExt;

    app.clone().oneshot(request).await.expect("response").status()
}

fn entries_request(token: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::get("/api/entries")
        .header(axum::http::header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .body(axum::body::Body::empty())
        .expect("request")
}

#[tokio::test]
async fn expired_session_drops_its_edit_state() {
    let state = Arc::new(app_state(Duration::from_millis(500)));
    let app = crate::app::build_router(state.clone());
    let token = state.sessions.create();

    assert_eq!(send(&app, entries_request(&token)).await, StatusCode::OK);
    assert_eq!(open_edit_sessions(&state), 1);

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(send(&app, entries_request(&token)).await, StatusCode::UNAUTHORIZED);
    assert_eq!(open_edit_sessions(&state), 0);
    assert_eq!(state.sessions.lookup(&token), Lookup::Unknown);
}

#[tokio::test]
async fn login_sweeps_abandoned_sessions() {
    let state = Arc::new(app_state(Duration::from_secs(60)));
    let app = crate::app::build_router(state.clone());

    let abandoned = SessionId("abandoned".to_string());
    state.sessions.by_token.write().expect("lock").insert(
        "old-token".to_string(),
        Session {
            id: abandoned.clone(),
            expires_at: SystemTime::now() - Duration::from_secs(1),
        },
    );
    state.edit_session(&abandoned);
    assert_eq!(open_edit_sessions(&state), 1);

    let login = axum::http::Request::post("/login")
        .header(axum::http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(axum::body::Body::from("password=pw"))
        .expect("request");
    assert_eq!(send(&app, login).await, StatusCode::SEE_OTHER);

    assert_eq!(open_edit_sessions(&state), 0);
    assert!(!state.sessions.by_token.read().expect("lock").contains_key("old-token"));
}
