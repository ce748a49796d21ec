#![deny(warnings)]

//! Web front end for the circuit-of-capital simulation API.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod session;
pub mod state;
pub mod views;

pub use config::Config;
pub use error::WebError;
pub use state::{AppState, SharedState};

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Every route of the front end.
pub fn router(state: SharedState) -> Router {
    Router::new()
        // Authentication
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/loginauth", post(auth::login))
        .route("/auth/register", get(auth::register_form).post(auth::register))
        .route("/auth/registerauth", post(auth::register))
        .route("/auth/logout", get(auth::logout))
        // Pages
        .route("/", get(handlers::index))
        .route("/welcome", get(handlers::welcome))
        .route("/about", get(handlers::about))
        .route("/index", get(handlers::index))
        .route("/user/dashboard", get(handlers::dashboard))
        .route("/commodities", get(handlers::commodities))
        .route("/industries", get(handlers::industries))
        .route("/classes", get(handlers::classes))
        .route("/industry_stocks", get(handlers::industry_stocks))
        .route("/class_stocks", get(handlers::class_stocks))
        .route("/commodity/:id", get(handlers::commodity))
        .route("/industry/:id", get(handlers::industry))
        .route("/class/:id", get(handlers::class))
        // Simulation control
        .route("/action/:action", get(handlers::action))
        .route("/user/back", get(handlers::back))
        .route("/user/forward", get(handlers::forward))
        .route("/user/create/:id", get(handlers::create))
        .route("/user/switch/:id", get(handlers::switch))
        .route("/user/delete/:id", get(handlers::delete))
        .route("/user/restart/:id", get(handlers::restart))
        // Diagnostics
        .route("/user/data", get(handlers::data))
        .route("/download", get(handlers::download))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
