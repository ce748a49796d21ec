//! Page, navigation and action handlers.
//!
//! Every handler locks the user's record for its whole duration. Errors are
//! shown as a re-render of the user's last page carrying the error message;
//! if that page cannot be rendered either, the generic error page is used.

use crate::error::WebError;
use crate::session::{CurrentUser, LoggedInUser, Page};
use crate::state::{AppState, SharedState};
use crate::views::{self, Header};
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use sim_core::{parse_id, TableName};
use sim_runtime::Simulation;
use tracing::{info, warn};

/// Render `page` for `logged` inside the page chrome.
pub async fn render(
    app: &AppState,
    logged: &LoggedInUser,
    page: Page,
    notice: Option<&str>,
) -> Result<String, WebError> {
    let user = &logged.user;
    let (title, body) = match page {
        Page::Welcome => ("Welcome".to_string(), views::welcome(&user.username)),
        Page::About => ("About".to_string(), views::about()),
        Page::Dashboard => {
            let templates = app.templates.read().await;
            ("Dashboard".to_string(), views::dashboard(user, &templates))
        }
        Page::Index => ("Index".to_string(), views::index(user.current()?)),
        Page::Commodities => table_page(user.current()?, TableName::Commodities),
        Page::Industries => table_page(user.current()?, TableName::Industries),
        Page::Classes => table_page(user.current()?, TableName::Classes),
        Page::IndustryStocks => table_page(user.current()?, TableName::IndustryStocks),
        Page::ClassStocks => table_page(user.current()?, TableName::ClassStocks),
        Page::Commodity(id) => (
            format!("Commodity {id}"),
            views::commodity_detail(user.current()?, id),
        ),
        Page::Industry(id) => (
            format!("Industry {id}"),
            views::industry_detail(user.current()?, id),
        ),
        Page::Class(id) => (
            format!("Class {id}"),
            views::class_detail(user.current()?, id),
        ),
    };
    let chrome = Header {
        username: &user.username,
        simulation: user.current().ok(),
        notice,
    };
    Ok(views::layout(&title, &chrome, &body))
}

fn table_page(sim: &Simulation, table: TableName) -> (String, String) {
    let label = table.label();
    let mut title = label.to_string();
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    (title, views::table(sim, table))
}

/// Render `page` and remember it as the user's last page.
async fn show(
    app: &AppState,
    logged: &mut LoggedInUser,
    page: Page,
    notice: Option<&str>,
) -> Response {
    match render(app, logged, page, notice).await {
        Ok(body) => {
            logged.last_page = page;
            Html(body).into_response()
        }
        Err(e) => failure(app, logged, e).await,
    }
}

/// Turn an error into a rendered page.
async fn failure(app: &AppState, logged: &LoggedInUser, err: WebError) -> Response {
    let status = err.status();
    let message = err.to_string();
    warn!(
        user = %logged.user.username,
        error = %message,
        status = status.as_u16(),
        "request failed"
    );
    match render(app, logged, logged.last_page, Some(&message)).await {
        Ok(body) => (status, Html(body)).into_response(),
        Err(_) => (status, Html(views::error_page(&message))).into_response(),
    }
}

async fn show_page(app: &AppState, user: CurrentUser, page: Page) -> Response {
    let mut logged = user.handle.lock().await;
    show(app, &mut logged, page, None).await
}

pub async fn welcome(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::Welcome).await
}

pub async fn about(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::About).await
}

pub async fn dashboard(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::Dashboard).await
}

pub async fn index(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::Index).await
}

pub async fn commodities(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::Commodities).await
}

pub async fn industries(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::Industries).await
}

pub async fn classes(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::Classes).await
}

pub async fn industry_stocks(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::IndustryStocks).await
}

pub async fn class_stocks(State(app): State<SharedState>, user: CurrentUser) -> Response {
    show_page(&app, user, Page::ClassStocks).await
}

async fn show_detail(
    app: &AppState,
    user: CurrentUser,
    raw: &str,
    page: impl FnOnce(i64) -> Page,
) -> Response {
    let mut logged = user.handle.lock().await;
    match parse_id(raw) {
        Ok(id) => show(app, &mut logged, page(id), None).await,
        Err(e) => failure(app, &logged, e.into()).await,
    }
}

pub async fn commodity(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(raw): Path<String>,
) -> Response {
    show_detail(&app, user, &raw, Page::Commodity).await
}

pub async fn industry(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(raw): Path<String>,
) -> Response {
    show_detail(&app, user, &raw, Page::Industry).await
}

pub async fn class(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(raw): Path<String>,
) -> Response {
    show_detail(&app, user, &raw, Page::Class).await
}

pub async fn action(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(action): Path<String>,
) -> Response {
    let mut logged = user.handle.lock().await;
    match logged.user.advance(app.api.as_ref(), &action).await {
        Ok(state) => {
            info!(user = %user.username, action = %action, state = %state, "action executed");
            let page = logged.last_page.after_action();
            show(&app, &mut logged, page, None).await
        }
        Err(e) => failure(&app, &logged, e.into()).await,
    }
}

pub async fn back(State(app): State<SharedState>, user: CurrentUser) -> Response {
    let mut logged = user.handle.lock().await;
    match logged.user.step_back() {
        Ok(moved) => {
            let notice = (!moved).then_some("Already at the first step");
            let page = logged.last_page.after_navigation();
            show(&app, &mut logged, page, notice).await
        }
        Err(e) => failure(&app, &logged, e.into()).await,
    }
}

pub async fn forward(State(app): State<SharedState>, user: CurrentUser) -> Response {
    let mut logged = user.handle.lock().await;
    match logged.user.step_forward() {
        Ok(moved) => {
            let notice = (!moved).then_some("Already at the latest step");
            let page = logged.last_page.after_navigation();
            show(&app, &mut logged, page, notice).await
        }
        Err(e) => failure(&app, &logged, e.into()).await,
    }
}

pub async fn create(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(raw): Path<String>,
) -> Response {
    let mut logged = user.handle.lock().await;
    let created = match parse_id(raw.as_str()) {
        Ok(template_id) => logged
            .user
            .create_simulation(app.api.as_ref(), template_id)
            .await
            .map_err(WebError::from),
        Err(e) => Err(e.into()),
    };
    match created {
        Ok(_) => show(&app, &mut logged, Page::Index, None).await,
        Err(e) => failure(&app, &logged, e).await,
    }
}

pub async fn switch(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(raw): Path<String>,
) -> Response {
    let mut logged = user.handle.lock().await;
    let switched = parse_id(&raw)
        .map_err(WebError::from)
        .and_then(|id| logged.user.switch_to(id).map_err(WebError::from));
    match switched {
        Ok(()) => show(&app, &mut logged, Page::Index, None).await,
        Err(e) => failure(&app, &logged, e).await,
    }
}

pub async fn delete(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(raw): Path<String>,
) -> Response {
    let mut logged = user.handle.lock().await;
    let deleted = parse_id(&raw)
        .map_err(WebError::from)
        .and_then(|id| logged.user.delete(id).map_err(WebError::from));
    match deleted {
        Ok(_) => show(&app, &mut logged, Page::Dashboard, None).await,
        Err(e) => failure(&app, &logged, e).await,
    }
}

/// Restarting a simulation is not available yet; the dashboard says so.
pub async fn restart(
    State(app): State<SharedState>,
    user: CurrentUser,
    Path(raw): Path<String>,
) -> Response {
    let mut logged = user.handle.lock().await;
    let known = parse_id(&raw)
        .map_err(WebError::from)
        .and_then(|id| logged.user.simulation(id).map(|_| id).map_err(WebError::from));
    match known {
        Ok(id) => {
            info!(user = %user.username, simulation_id = id, "restart requested");
            let notice = format!("Restarting simulation {id} is not ready yet");
            show(&app, &mut logged, Page::Dashboard, Some(&notice)).await
        }
        Err(e) => failure(&app, &logged, e).await,
    }
}

/// The user's in-memory state as JSON. The api key is never included.
pub async fn data(user: CurrentUser) -> Response {
    let logged = user.handle.lock().await;
    Json(&*logged).into_response()
}

/// Write the viewed step's tables into the dump directory.
pub async fn download(State(app): State<SharedState>, user: CurrentUser) -> Response {
    let logged = user.handle.lock().await;
    match write_dump(&app, &logged).await {
        Ok(written) => {
            let mut body = format!(
                "<p>The viewed step was written to <code>{}</code>:</p>\n<ul>",
                views::esc(&app.dump_dir.display().to_string())
            );
            for name in written {
                body.push_str(&format!("<li>{name}</li>"));
            }
            body.push_str("</ul>\n");
            let chrome = Header {
                username: &logged.user.username,
                simulation: logged.user.current().ok(),
                notice: None,
            };
            Html(views::layout("Download", &chrome, &body)).into_response()
        }
        Err(e) => failure(&app, &logged, e).await,
    }
}

async fn write_dump(
    app: &AppState,
    logged: &LoggedInUser,
) -> Result<Vec<&'static str>, WebError> {
    let sim = logged.user.current()?;
    let stage = sim.viewed_stage().stage();
    tokio::fs::create_dir_all(&app.dump_dir).await?;
    let mut written = Vec::new();
    for table in TableName::ALL {
        let json = stage.table_json(table)?;
        tokio::fs::write(app.dump_dir.join(table.file_name()), json).await?;
        written.push(table.file_name());
    }
    info!(
        user = %logged.user.username,
        simulation_id = sim.id(),
        step = sim.manager().viewed(),
        dir = %app.dump_dir.display(),
        "tables dumped"
    );
    Ok(written)
}

pub async fn not_found(uri: Uri) -> Response {
    (StatusCode::NOT_FOUND, Html(views::not_found(uri.path()))).into_response()
}
