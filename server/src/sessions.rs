use axum::http::{header, HeaderMap};
use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};
use uuid::Uuid;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "bourse_session";

/// A logged-in user and their pending flash messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    /// Shown on the home view
    pub home_message: Option<String>,
    /// Shown on the my-stocks view
    pub stocks_message: Option<String>,
    expires_at: Instant,
}

/// Sessions keyed by random token.
pub struct Sessions {
    ttl: Duration,
    inner: RwLock<HashMap<Uuid, Session>>,
}

impl Sessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, username: &str) -> Uuid {
        let token = Uuid::new_v4();
        let now = Instant::now();
        let session = Session {
            username: username.to_string(),
            home_message: None,
            stocks_message: None,
            expires_at: now + self.ttl,
        };
        match self.inner.write() {
            Ok(mut sessions) => {
                sessions.retain(|_, s| s.expires_at > now);
                sessions.insert(token, session);
            }
            Err(e) => tracing::error!("Failed to acquire write lock in create: {}", e),
        }
        token
    }

    /// The live session for `token`, dropping it if expired.
    pub fn get(&self, token: &Uuid) -> Option<Session> {
        let mut sessions = match self.inner.write() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!("Failed to acquire write lock in get: {}", e);
                return None;
            }
        };
        let session = sessions.get(token)?;
        if session.expires_at <= Instant::now() {
            sessions.remove(token);
            return None;
        }
        Some(session.clone())
    }

    /// Applies `f` to the session for `token` and returns the updated copy.
    pub fn update(&self, token: &Uuid, f: impl FnOnce(&mut Session)) -> Option<Session> {
        let mut sessions = match self.inner.write() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!("Failed to acquire write lock in update: {}", e);
                return None;
            }
        };
        let session = sessions.get_mut(token)?;
        f(session);
        Some(session.clone())
    }

    pub fn remove(&self, token: &Uuid) -> bool {
        match self.inner.write() {
            Ok(mut sessions) => sessions.remove(token).is_some(),
            Err(e) => {
                tracing::error!("Failed to acquire write lock in remove: {}", e);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session token from `Authorization: Bearer` or the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|v| Uuid::parse_str(v.trim()).ok());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &Uuid, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
