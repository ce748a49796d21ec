//! Session store and the logged-in user extractor.

use crate::state::SharedState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde::Serialize;
use sim_runtime::User;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";

/// A page a user can be looking at. Remembered so that actions and
/// navigation can re-render it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "page", content = "id", rename_all = "snake_case")]
pub enum Page {
    Welcome,
    About,
    Dashboard,
    Index,
    Commodities,
    Industries,
    Classes,
    IndustryStocks,
    ClassStocks,
    Commodity(i64),
    Industry(i64),
    Class(i64),
}

impl Page {
    /// Index and table pages show the step being viewed.
    pub fn shows_tables(self) -> bool {
        matches!(
            self,
            Page::Index
                | Page::Commodities
                | Page::Industries
                | Page::Classes
                | Page::IndustryStocks
                | Page::ClassStocks
        )
    }

    /// Page to show after an action.
    pub fn after_action(self) -> Page {
        if self.shows_tables() {
            self
        } else {
            Page::Dashboard
        }
    }

    /// Page to show after moving back or forward.
    pub fn after_navigation(self) -> Page {
        if self.shows_tables() {
            self
        } else {
            Page::Index
        }
    }
}

/// In-memory record of a logged-in user.
#[derive(Debug, Serialize)]
pub struct LoggedInUser {
    pub user: User,
    pub last_page: Page,
}

pub type UserHandle = Arc<Mutex<LoggedInUser>>;

/// Session token to username, and username to the user's record.
///
/// Each record sits behind its own mutex. Handlers hold it for the whole
/// request, so requests of one user run one at a time.
#[derive(Default)]
pub struct SessionStore {
    tokens: DashMap<Uuid, String>,
    users: DashMap<String, UserHandle>,
}

impl SessionStore {
    /// Start a session. An earlier record of the same user is replaced and
    /// their old tokens stop working.
    pub fn login(&self, user: User) -> Uuid {
        let username = user.username.clone();
        self.tokens.retain(|_, name| *name != username);
        let token = Uuid::new_v4();
        self.users.insert(
            username.clone(),
            Arc::new(Mutex::new(LoggedInUser {
                user,
                last_page: Page::Welcome,
            })),
        );
        self.tokens.insert(token, username.clone());
        info!(user = %username, "session started");
        token
    }

    pub fn lookup(&self, token: &Uuid) -> Option<(String, UserHandle)> {
        let username = self.tokens.get(token)?.value().clone();
        let handle = self.users.get(&username)?.value().clone();
        Some((username, handle))
    }

    /// End the session and drop the user's in-memory record.
    pub fn logout(&self, token: &Uuid) -> Option<String> {
        let (_, username) = self.tokens.remove(token)?;
        self.tokens.retain(|_, name| *name != username);
        self.users.remove(&username);
        info!(user = %username, "session ended");
        Some(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Session token from the request's cookies.
pub fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix("session="))
        .find_map(|raw| Uuid::parse_str(raw).ok())
}

pub fn session_cookie(token: Uuid) -> HeaderValue {
    let value = format!("{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax");
    // A uuid and fixed attributes are always valid header text.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("session=; Path=/"))
}

pub fn expired_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// 302 to the login page.
pub fn to_login() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/auth/login")]).into_response()
}

/// The logged-in user behind the request's session cookie. Requests without
/// a valid session are redirected to the login page.
pub struct CurrentUser {
    pub username: String,
    pub handle: UserHandle,
}

#[async_trait]
impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            debug!(path = %parts.uri.path(), "no session cookie");
            return Err(to_login());
        };
        match state.sessions.lookup(&token) {
            Some((username, handle)) => Ok(CurrentUser { username, handle }),
            None => {
                debug!(path = %parts.uri.path(), "stale session");
                Err(to_login())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_found_among_other_cookies() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; session={token}; lang=en")).unwrap(),
        );
        assert_eq!(session_token(&headers), Some(token));

        let mut junk = HeaderMap::new();
        junk.insert(header::COOKIE, HeaderValue::from_static("session=not-a-uuid"));
        assert_eq!(session_token(&junk), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn relogin_invalidates_old_tokens() {
        let store = SessionStore::default();
        let first = store.login(User::new("alice", "k"));
        let second = store.login(User::new("alice", "k"));
        assert!(store.lookup(&first).is_none());
        assert!(store.lookup(&second).is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(store.logout(&second).as_deref(), Some("alice"));
        assert!(store.lookup(&second).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn table_pages_survive_actions_and_navigation() {
        assert_eq!(Page::Industries.after_action(), Page::Industries);
        assert_eq!(Page::Welcome.after_action(), Page::Dashboard);
        assert_eq!(Page::Commodity(3).after_action(), Page::Dashboard);
        assert_eq!(Page::Index.after_navigation(), Page::Index);
        assert_eq!(Page::Dashboard.after_navigation(), Page::Index);
    }

    #[test]
    fn cookie_is_http_only() {
        let c = session_cookie(Uuid::nil());
        let s = c.to_str().unwrap();
        assert!(s.starts_with("session=00000000-0000-0000-0000-000000000000"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("SameSite=Lax"));
    }
}
