#![cfg(feature = "web")]

//! Password gate in front of the browser UI and the API.
//!
//! There is a single shared password, stored as an argon2 hash in the
//! settings. Logging in creates a session identified by a random cookie token;
//! each session also gets its own id, which namespaces its local files.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{info, warn};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::MAX_SESSION_HOURS;

pub const SESSION_COOKIE: &str = "session";

/// Identifies one logged-in browser. Inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

#[derive(Debug, Clone)]
struct Session {
    id: SessionId,
    expires_at: SystemTime,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
}

/// What a presented cookie token refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Active(SessionId),
    /// The session timed out. The lookup has already removed it.
    Expired(SessionId),
    Unknown,
}

/// Active sessions, keyed by cookie token.
#[derive(Debug)]
pub struct Sessions {
    by_token: RwLock<HashMap<String, Session>>,
    lifetime: Duration,
}

impl Sessions {
    /// # Arguments
    ///
    /// * `lifetime` - how long a session stays valid after login, capped at
    ///   [`MAX_SESSION_HOURS`]
    pub fn new(lifetime: Duration) -> Self {
        let max = Duration::from_secs(MAX_SESSION_HOURS * 60 * 60);
        Sessions {
            by_token: RwLock::new(HashMap::new()),
            lifetime: lifetime.min(max),
        }
    }

    /// Start a session and return its cookie token.
    pub fn create(&self) -> String {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            id: SessionId(Uuid::new_v4().simple().to_string()),
            expires_at: SystemTime::now() + self.lifetime,
        };

        let mut sessions = self.by_token.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(token.clone(), session);
        token
    }

    pub fn lookup(&self, token: &str) -> Lookup {
        {
            let sessions = self.by_token.read().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(token) {
                Some(session) if session.expires_at > SystemTime::now() => {
                    return Lookup::Active(session.id.clone());
                }
                Some(_) => {}
                None => return Lookup::Unknown,
            }
        }

        match self.remove(token) {
            Some(id) => Lookup::Expired(id),
            None => Lookup::Unknown,
        }
    }

    /// The session behind `token`, if it exists and has not expired.
    pub fn validate(&self, token: &str) -> Option<SessionId> {
        match self.lookup(token) {
            Lookup::Active(id) => Some(id),
            Lookup::Expired(_) | Lookup::Unknown => None,
        }
    }

    pub fn remove(&self, token: &str) -> Option<SessionId> {
        let mut sessions = self.by_token.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(token).map(|session| session.id)
    }

    /// Drop every expired session, including ones whose token is never
    /// presented again, and return their ids.
    pub fn sweep_expired(&self) -> Vec<SessionId> {
        let now = SystemTime::now();
        let mut expired = Vec::new();
        let mut sessions = self.by_token.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, session| {
            if session.expires_at > now {
                true
            } else {
                expired.push(session.id.clone());
                false
            }
        });
        expired
    }
}

/// Hash a password using Argon2id, as a PHC string.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Check a password against a stored Argon2 hash. A malformed hash never
/// matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        warn!("configured password hash is not a valid PHC string");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let accepted = state
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(&form.password, hash));

    if !accepted {
        warn!("rejected login attempt");
        return (StatusCode::UNAUTHORIZED, "Password incorrect").into_response();
    }

    for id in state.sessions.sweep_expired() {
        state.forget_session(&id);
    }
    let token = state.sessions.create();
    info!("login accepted");
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true);
    (jar.add(cookie), Redirect::to("/")).into_response()
}

pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(id) = state.sessions.remove(cookie.value()) {
            state.forget_session(&id);
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/")).into_response()
}

/// Reject requests without a valid session; otherwise attach its [`SessionId`].
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.sessions.lookup(cookie.value()) {
            Lookup::Active(id) => {
                request.extensions_mut().insert(id);
                return next.run(request).await;
            }
            Lookup::Expired(id) => {
                info!("session expired");
                state.forget_session(&id);
            }
            Lookup::Unknown => {}
        }
    }

    (StatusCode::UNAUTHORIZED, "Login required").into_response()
}

#[cfg(test)]
#[path = "tests/login_tests.rs"]
mod tests;
