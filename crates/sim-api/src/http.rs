//! reqwest-backed implementation of [`SimulationApi`].

use crate::{
    ApiError, CloneResult, RegistrationOutcome, RemoteUser, SimulationApi, SimulationTemplate,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use sim_core::{Action, TableName};
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// Connection settings for [`HttpApi`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// Key sent on admin calls.
    pub admin_key: String,
    /// Timeout for table fetches, actions and clones.
    pub user_timeout: Duration,
    /// Timeout for admin lookups.
    pub admin_timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, admin_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            admin_key: admin_key.into(),
            user_timeout: Duration::from_secs(5),
            admin_timeout: Duration::from_secs(2),
        }
    }
}

/// Talks to the simulation API over HTTP. One attempt per call, no retries.
pub struct HttpApi {
    base_url: String,
    admin_key: String,
    user_client: Client,
    admin_client: Client,
}

impl HttpApi {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let build = |timeout: Duration| {
            Client::builder()
                .timeout(timeout)
                .user_agent("circuit-web/0.1")
                .build()
                .map_err(|e| ApiError::Transport(e.to_string()))
        };
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            admin_key: config.admin_key,
            user_client: build(config.user_timeout)?,
            admin_client: build(config.admin_timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A user GET. The body identifies the caller to the server.
    fn user_get(&self, api_key: &str, path: &str) -> RequestBuilder {
        self.user_client
            .get(self.url(path))
            .header(API_KEY_HEADER, api_key)
            .json(&json!({ "origin": "Simulation-client" }))
    }

    fn admin_get(&self, path: &str) -> RequestBuilder {
        debug!(path, "admin request");
        self.admin_client
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.admin_key)
    }

    /// Send and require a 200, returning the body.
    async fn send_ok(request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport)?;
        if status != StatusCode::OK {
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!(status = status.as_u16(), %body, "server rejected the request");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body.to_vec())
    }

    async fn admin_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = Self::send_ok(self.admin_get(path)).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn map_transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(e.to_string())
    }
}

#[async_trait]
impl SimulationApi for HttpApi {
    async fn fetch_table(
        &self,
        api_key: &str,
        table: TableName,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        let body = Self::send_ok(self.user_get(api_key, table.endpoint())).await?;
        Ok(if body.is_empty() { None } else { Some(body) })
    }

    async fn trigger_action(&self, api_key: &str, action: Action) -> Result<(), ApiError> {
        Self::send_ok(self.user_get(api_key, &action.endpoint())).await?;
        info!(%action, "server executed action");
        Ok(())
    }

    async fn clone_simulation(
        &self,
        api_key: &str,
        template_id: i64,
    ) -> Result<CloneResult, ApiError> {
        let body = Self::send_ok(self.user_get(api_key, &format!("/clone/{template_id}"))).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn register_user(&self, username: &str) -> Result<RegistrationOutcome, ApiError> {
        let response = self
            .admin_client
            .post(self.url("/admin/register"))
            .header(API_KEY_HEADER, &self.admin_key)
            .json(&json!({ "username": username }))
            .send()
            .await
            .map_err(map_transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport)?;
        match status {
            StatusCode::CREATED => {
                let api_key = serde_json::from_slice::<RemoteUser>(&body)
                    .ok()
                    .map(|u| u.api_key)
                    .filter(|k| !k.is_empty());
                info!(username, "server registered user");
                Ok(RegistrationOutcome::Created { api_key })
            }
            StatusCode::CONFLICT => {
                info!(username, "user already registered on the server");
                Ok(RegistrationOutcome::AlreadyRegistered)
            }
            other => Err(ApiError::Status {
                status: other.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }

    async fn remote_user(&self, username: &str) -> Result<RemoteUser, ApiError> {
        self.admin_json(&format!("/admin/user/{username}")).await
    }

    async fn registered_users(&self) -> Result<Vec<RemoteUser>, ApiError> {
        self.admin_json("/admin/users").await
    }

    async fn templates(&self) -> Result<Vec<SimulationTemplate>, ApiError> {
        self.admin_json("/templates/templates").await
    }
}
