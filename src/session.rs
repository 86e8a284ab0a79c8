// task_manager/src/session.rs
use crate::TaskApp;
use dashmap::DashMap;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_token";

/// Logged-in sessions: token -> user id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, i32>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::default()
    }

    /// Opens a session for `user_id` and returns its token.
    pub fn create(&self, user_id: i32) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), user_id);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<i32> {
        self.sessions.get(token).map(|entry| *entry.value())
    }

    /// Returns the user id the token belonged to, if it was live.
    pub fn revoke(&self, token: &str) -> Option<i32> {
        self.sessions.remove(token).map(|(_, user_id)| user_id)
    }

    /// Opens a fresh session for a login, dropping the one the client presented, if any.
    pub fn rotate(&self, previous: Option<&str>, user_id: i32) -> String {
        if let Some(previous) = previous {
            if let Some(old_user_id) = self.revoke(previous) {
                tracing::debug!(user_id = old_user_id, "previous session replaced");
            }
        }
        self.create(user_id)
    }
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());
}

/// Why a request was not authenticated. Stored in the request-local cache so the
/// 401 catchers can say which case happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingCredentials,
    MalformedHeader,
    InvalidToken,
    NoSessionState,
}

impl AuthError {
    pub fn code(self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MalformedHeader => "malformed_authorization_header",
            AuthError::InvalidToken => "invalid_token",
            AuthError::NoSessionState => "no_session_state",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "Login required.",
            AuthError::MalformedHeader => "Authorization header must be 'Bearer <token>'.",
            AuthError::InvalidToken => "Session token is invalid or expired.",
            AuthError::NoSessionState => "Application state is not available.",
        }
    }
}

/// The session token carried by a request: the cookie first, then a Bearer header.
pub struct SessionToken(pub String);

fn cookie_token(req: &Request<'_>) -> Option<String> {
    req.cookies()
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(req: &Request<'_>) -> Result<Option<String>, AuthError> {
    match req.headers().get_one("Authorization") {
        Some(header_value) => match header_value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
            _ => Err(AuthError::MalformedHeader),
        },
        None => Ok(None),
    }
}

fn extract_token(req: &Request<'_>) -> Result<String, AuthError> {
    if let Some(token) = cookie_token(req) {
        return Ok(token);
    }
    bearer_token(req)?.ok_or(AuthError::MissingCredentials)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_token(req) {
            Ok(token) => Outcome::Success(SessionToken(token)),
            Err(err) => {
                req.local_cache(|| Some(err));
                Outcome::Error((Status::Unauthorized, err))
            }
        }
    }
}

/// Request guard resolving the logged-in user. Fails with 401 before the handler
/// (and therefore before any data access) runs.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: i32,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let fail = |err: AuthError| {
            req.local_cache(|| Some(err));
            Outcome::Error((Status::Unauthorized, err))
        };

        let app = match req.rocket().state::<TaskApp>() {
            Some(app) => app,
            None => {
                req.local_cache(|| Some(AuthError::NoSessionState));
                return Outcome::Error((Status::InternalServerError, AuthError::NoSessionState));
            }
        };

        // A stale cookie must not shadow a valid Bearer token.
        let cookie = cookie_token(req);
        if let Some(user_id) = cookie.as_deref().and_then(|token| app.sessions.resolve(token)) {
            return Outcome::Success(CurrentUser { user_id });
        }

        match bearer_token(req) {
            Ok(Some(token)) => match app.sessions.resolve(&token) {
                Some(user_id) => Outcome::Success(CurrentUser { user_id }),
                None => fail(AuthError::InvalidToken),
            },
            Ok(None) if cookie.is_some() => fail(AuthError::InvalidToken),
            Ok(None) => fail(AuthError::MissingCredentials),
            Err(err) => fail(err),
        }
    }
}
