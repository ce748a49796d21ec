//! Command line and environment configuration.

use clap::Parser;
use sim_api::ApiConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// SQLite file name that selects the in-memory user store.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Parser, Debug, Clone)]
#[command(name = "circuit-web")]
#[command(about = "Web front end for the circuit-of-capital simulation API")]
#[command(version)]
pub struct Config {
    /// Base URL of the simulation API
    #[arg(long, env = "APISOURCE", default_value = "http://localhost:5000")]
    pub api_source: String,

    /// Admin api key, sent as x-api-key on admin calls
    #[arg(long, env = "ADMINKEY", hide_env_values = true)]
    pub admin_key: String,

    /// Admin username (diagnostics only)
    #[arg(long, env = "ADMINUSER", default_value = "admin")]
    pub admin_user: String,

    /// Address to listen on
    #[arg(long, env = "CLIENT_HOST", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Local user database file; ":memory:" keeps users in memory only
    #[arg(long, env = "SQLITE_FILE", default_value = "./saves/users.db")]
    pub sqlite_file: String,

    /// Directory that /download writes into
    #[arg(long, env = "DUMP_DIR", default_value = "./dump")]
    pub dump_dir: PathBuf,

    /// Password given to users imported from the server at startup
    #[arg(long, env = "SEED_PASSWORD", default_value = "insecure", hide_env_values = true)]
    pub seed_password: String,

    /// Timeout in seconds for table fetches and actions
    #[arg(long, default_value_t = 5)]
    pub user_timeout_secs: u64,

    /// Timeout in seconds for admin calls
    #[arg(long, default_value_t = 2)]
    pub admin_timeout_secs: u64,
}

impl Config {
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_source.clone(),
            admin_key: self.admin_key.clone(),
            user_timeout: Duration::from_secs(self.user_timeout_secs),
            admin_timeout: Duration::from_secs(self.admin_timeout_secs),
        }
    }

    /// `None` selects the in-memory store.
    pub fn sqlite_url(&self) -> Option<String> {
        if self.sqlite_file == IN_MEMORY {
            None
        } else {
            Some(format!("sqlite://{}", self.sqlite_file))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_the_key_is_given() {
        let c = Config::try_parse_from(["circuit-web", "--admin-key", "k"]).unwrap();
        assert_eq!(c.api_source, "http://localhost:5000");
        assert_eq!(c.listen.to_string(), "127.0.0.1:8080");
        assert_eq!(c.seed_password, "insecure");
        assert_eq!(c.sqlite_url().as_deref(), Some("sqlite://./saves/users.db"));
        let api = c.api_config();
        assert_eq!(api.user_timeout, Duration::from_secs(5));
        assert_eq!(api.admin_timeout, Duration::from_secs(2));
    }

    #[test]
    fn memory_store_is_selected_by_name() {
        let c = Config::try_parse_from([
            "circuit-web",
            "--admin-key",
            "k",
            "--sqlite-file",
            ":memory:",
        ])
        .unwrap();
        assert_eq!(c.sqlite_url(), None);
    }
}
