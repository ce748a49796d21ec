#![deny(warnings)]

//! Client side of the simulation API.
//!
//! [`SimulationApi`] is the seam between the front end and the remote
//! service: the web app talks to an [`HttpApi`], tests talk to a fake.
//! [`fetch_stage`] builds one snapshot from the five table endpoints and
//! tolerates individual table failures.

mod http;

pub use http::{ApiConfig, HttpApi};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Action, Stage, TableName, TableRows};
use thiserror::Error;
use tracing::{error, info};

/// Failures of a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("the simulation server did not answer in time")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("server rejected the request with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode the server's response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status of a rejection, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A user as the server knows it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteUser {
    #[serde(alias = "UserName")]
    pub username: String,
    pub email: String,
    pub api_key: String,
    pub role: String,
    pub current_simulation_id: i64,
}

/// A simulation the server can clone for a user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationTemplate {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub state: String,
    pub periods_per_year: Decimal,
    pub population_growth_rate: Decimal,
    pub investment_ratio: Decimal,
    pub labour_supply_response: String,
    pub price_response_type: String,
    pub melt_response_type: String,
    pub currency_symbol: String,
    pub quantity_symbol: String,
    pub melt: Decimal,
    pub user_id: i64,
}

/// Server reply to a clone request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneResult {
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: i64,
    pub simulation_id: i64,
}

/// Result of asking the server to register a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Newly created. The key is present when the server included it in the reply.
    Created { api_key: Option<String> },
    /// The server already knew this user.
    AlreadyRegistered,
}

/// Calls the front end makes against the simulation API.
#[async_trait]
pub trait SimulationApi: Send + Sync {
    /// Raw body of a table endpoint. `Ok(None)` means the server answered
    /// with an empty body: no data yet for that table.
    async fn fetch_table(&self, api_key: &str, table: TableName)
        -> Result<Option<Vec<u8>>, ApiError>;

    /// Execute one action of the circuit on the user's current simulation.
    async fn trigger_action(&self, api_key: &str, action: Action) -> Result<(), ApiError>;

    /// Clone template `template_id` into a new simulation owned by the user.
    async fn clone_simulation(&self, api_key: &str, template_id: i64)
        -> Result<CloneResult, ApiError>;

    async fn register_user(&self, username: &str) -> Result<RegistrationOutcome, ApiError>;

    async fn remote_user(&self, username: &str) -> Result<RemoteUser, ApiError>;

    async fn registered_users(&self) -> Result<Vec<RemoteUser>, ApiError>;

    async fn templates(&self) -> Result<Vec<SimulationTemplate>, ApiError>;
}

/// Fetch all five tables of the user's current simulation.
///
/// A table that fails to fetch or decode is logged, left empty and recorded
/// in [`Stage::failed`]; the other tables are still fetched.
pub async fn fetch_stage(api: &dyn SimulationApi, api_key: &str) -> Stage {
    let mut stage = Stage::default();
    for table in TableName::ALL {
        match api.fetch_table(api_key, table).await {
            Ok(Some(body)) => match TableRows::decode(table, &body) {
                Ok(rows) => {
                    info!(%table, rows = rows.len(), "table fetched");
                    stage.insert(rows);
                }
                Err(e) => {
                    error!(%table, error = %e, "could not decode table");
                    stage.mark_failed(table);
                }
            },
            Ok(None) => info!(%table, "server has no data for table yet"),
            Err(e) => {
                error!(%table, error = %e, "table fetch failed");
                stage.mark_failed(table);
            }
        }
    }
    stage
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Serves canned table bodies; tables without an entry fail with 500.
    struct CannedTables(HashMap<TableName, Option<&'static str>>);

    #[async_trait]
    impl SimulationApi for CannedTables {
        async fn fetch_table(
            &self,
            _api_key: &str,
            table: TableName,
        ) -> Result<Option<Vec<u8>>, ApiError> {
            match self.0.get(&table) {
                Some(body) => Ok(body.map(|b| b.as_bytes().to_vec())),
                None => Err(ApiError::Status {
                    status: 500,
                    body: "boom".into(),
                }),
            }
        }

        async fn trigger_action(&self, _: &str, _: Action) -> Result<(), ApiError> {
            Ok(())
        }

        async fn clone_simulation(&self, _: &str, _: i64) -> Result<CloneResult, ApiError> {
            Ok(CloneResult::default())
        }

        async fn register_user(&self, _: &str) -> Result<RegistrationOutcome, ApiError> {
            Ok(RegistrationOutcome::AlreadyRegistered)
        }

        async fn remote_user(&self, _: &str) -> Result<RemoteUser, ApiError> {
            Ok(RemoteUser::default())
        }

        async fn registered_users(&self) -> Result<Vec<RemoteUser>, ApiError> {
            Ok(vec![])
        }

        async fn templates(&self) -> Result<Vec<SimulationTemplate>, ApiError> {
            Ok(vec![])
        }
    }

    fn all_tables() -> HashMap<TableName, Option<&'static str>> {
        HashMap::from([
            (TableName::Commodities, Some(r#"[{"id":1,"name":"Means of Production"}]"#)),
            (TableName::Industries, Some(r#"[{"id":1,"name":"DeptI"}]"#)),
            (TableName::Classes, Some(r#"[{"id":1,"name":"Workers"}]"#)),
            (
                TableName::IndustryStocks,
                Some(r#"[{"id":1,"industry_id":1,"commodity_id":1,"usage_type":"Sales"}]"#),
            ),
            (
                TableName::ClassStocks,
                Some(r#"[{"id":1,"class_id":1,"commodity_id":1,"usage_type":"Money"}]"#),
            ),
        ])
    }

    #[tokio::test]
    async fn one_failed_table_leaves_the_others_populated() {
        let mut tables = all_tables();
        tables.remove(&TableName::Classes);
        let stage = fetch_stage(&CannedTables(tables), "key").await;
        assert_eq!(stage.failed, vec![TableName::Classes]);
        assert!(stage.classes.is_empty());
        assert_eq!(stage.commodities.len(), 1);
        assert_eq!(stage.industries.len(), 1);
        assert_eq!(stage.industry_stocks.len(), 1);
        assert_eq!(stage.class_stocks.len(), 1);
    }

    #[tokio::test]
    async fn empty_body_is_not_a_failure() {
        let mut tables = all_tables();
        tables.insert(TableName::IndustryStocks, None);
        let stage = fetch_stage(&CannedTables(tables), "key").await;
        assert!(stage.is_complete());
        assert!(stage.industry_stocks.is_empty());
    }

    #[tokio::test]
    async fn undecodable_table_is_marked_failed() {
        let mut tables = all_tables();
        tables.insert(TableName::Commodities, Some("{not json"));
        let stage = fetch_stage(&CannedTables(tables), "key").await;
        assert_eq!(stage.failed, vec![TableName::Commodities]);
        assert_eq!(stage.industries[0].name, "DeptI");
    }

    #[test]
    fn remote_user_accepts_both_name_spellings() {
        let a: RemoteUser = serde_json::from_str(r#"{"UserName":"alice","api_key":"k1"}"#).unwrap();
        let b: RemoteUser =
            serde_json::from_str(r#"{"username":"bob","current_simulation_id":4}"#).unwrap();
        assert_eq!(a.username, "alice");
        assert_eq!(a.api_key, "k1");
        assert_eq!(b.current_simulation_id, 4);
    }

    #[test]
    fn clone_result_uses_camel_case_status() {
        let r: CloneResult =
            serde_json::from_str(r#"{"message":"ok","statusCode":200,"simulation_id":17}"#).unwrap();
        assert_eq!(r.status_code, 200);
        assert_eq!(r.simulation_id, 17);
    }

    #[test]
    fn templates_decode_with_float_parameters() {
        let t: SimulationTemplate = serde_json::from_str(
            r#"{"id":1,"name":"Simple Reproduction","periods_per_year":1.0,"melt":0.5,"currency_symbol":"$"}"#,
        )
        .unwrap();
        assert_eq!(t.melt, Decimal::new(5, 1));
        assert_eq!(t.currency_symbol, "$");
    }
}
