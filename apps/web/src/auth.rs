//! Registration, login and logout.

use crate::error::WebError;
use crate::session::{expired_cookie, session_cookie, session_token};
use crate::state::SharedState;
use crate::views::{self, Header};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use persistence::{RegisteredUser, StoreError};
use serde::Deserialize;
use sim_api::RegistrationOutcome;
use sim_runtime::User;
use tracing::{error, info, warn};

pub const MIN_USERNAME_LEN: usize = 2;

/// Hash a password with Argon2id. The result is a PHC string carrying its salt.
pub fn hash_password(password: &str) -> Result<String, WebError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WebError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, WebError> {
    let parsed = PasswordHash::new(hash).map_err(|e| WebError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn page(status: StatusCode, body: String) -> Response {
    (status, Html(body)).into_response()
}

pub async fn login_form() -> Html<String> {
    Html(views::login(None))
}

pub async fn register_form() -> Html<String> {
    Html(views::register(None))
}

pub async fn register(State(app): State<SharedState>, Form(form): Form<Credentials>) -> Response {
    let username = form.username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return page(
            StatusCode::BAD_REQUEST,
            views::register(Some("Usernames must have at least 2 characters")),
        );
    }
    if form.password.is_empty() {
        return page(
            StatusCode::BAD_REQUEST,
            views::register(Some("Please choose a password")),
        );
    }
    match app.store.find(username).await {
        Ok(None) => {}
        Ok(Some(_)) => {
            return page(
                StatusCode::CONFLICT,
                views::register(Some("That username is taken")),
            )
        }
        Err(e) => {
            error!(user = %username, error = %e, "user lookup failed");
            return page(store_status(&e), views::register(Some("The user database failed")));
        }
    }

    let outcome = match app.api.register_user(username).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(user = %username, error = %e, "remote registration failed");
            return page(
                StatusCode::BAD_GATEWAY,
                views::register(Some("The simulation server did not accept the registration")),
            );
        }
    };
    let api_key = match outcome {
        RegistrationOutcome::Created {
            api_key: Some(key),
        } => key,
        RegistrationOutcome::Created { api_key: None } | RegistrationOutcome::AlreadyRegistered => {
            match app.api.remote_user(username).await {
                Ok(remote) => remote.api_key,
                Err(e) => {
                    warn!(
                        user = %username,
                        error = %e,
                        "no api key for new user; it will be fetched at login"
                    );
                    String::new()
                }
            }
        }
    };

    let record = match hash_password(&form.password) {
        Ok(hash) => RegisteredUser::new(username, hash, api_key),
        Err(e) => {
            error!(error = %e, "could not hash password");
            return page(e.status(), views::register(Some("Registration failed")));
        }
    };
    match app.store.create(&record).await {
        Ok(()) => {
            info!(user = %username, "registered");
            page(
                StatusCode::OK,
                views::login(Some("Registered. You can now log in")),
            )
        }
        Err(StoreError::Duplicate(_)) => page(
            StatusCode::CONFLICT,
            views::register(Some("That username is taken")),
        ),
        Err(e) => {
            error!(user = %username, error = %e, "could not store user");
            page(store_status(&e), views::register(Some("The user database failed")))
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::Duplicate(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Db(_) | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn login(State(app): State<SharedState>, Form(form): Form<Credentials>) -> Response {
    let username = form.username.trim();
    let registered = match app.store.find(username).await {
        Ok(found) => found,
        Err(e) => {
            error!(user = %username, error = %e, "user lookup failed");
            return page(store_status(&e), views::login(Some("The user database failed")));
        }
    };
    let verified = match &registered {
        Some(r) => verify_password(&form.password, &r.password_hash).unwrap_or_else(|e| {
            error!(user = %username, error = %e, "stored hash is unreadable");
            false
        }),
        None => false,
    };
    let Some(registered) = registered.filter(|_| verified) else {
        info!(user = %username, "login refused");
        return page(
            StatusCode::UNAUTHORIZED,
            views::login(Some("Unknown user or wrong password")),
        );
    };

    let mut remote = match app.api.remote_user(username).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!(user = %username, error = %e, "server does not know this user");
            return page(
                StatusCode::BAD_GATEWAY,
                views::login(Some("The simulation server does not recognise this user")),
            );
        }
    };
    if remote.api_key.is_empty() {
        remote.api_key = registered.api_key.clone();
    } else if remote.api_key != registered.api_key {
        if let Err(e) = app.store.set_api_key(username, &remote.api_key).await {
            warn!(user = %username, error = %e, "could not update stored api key");
        }
    }
    if remote.username.is_empty() {
        remote.username = username.to_string();
    }

    let user = User::from_remote(remote);
    let name = user.username.clone();
    let token = app.sessions.login(user);
    app.refresh_templates().await;

    let chrome = Header {
        username: &name,
        simulation: None,
        notice: None,
    };
    let body = views::layout("Welcome", &chrome, &views::welcome(&name));
    (
        [(header::SET_COOKIE, session_cookie(token))],
        Html(body),
    )
        .into_response()
}

pub async fn logout(State(app): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        app.sessions.logout(&token);
    }
    (
        [(header::SET_COOKIE, expired_cookie())],
        Html(views::login(Some("Logged Out"))),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("pw").unwrap(), hash_password("pw").unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(matches!(
            verify_password("pw", "not a hash"),
            Err(WebError::Hash(_))
        ));
    }
}
