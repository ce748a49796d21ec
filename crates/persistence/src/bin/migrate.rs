#![deny(warnings)]

use persistence::{default_sqlite_url, SqliteUserStore, UserStore};

/// Create the user database (default path, or the URL given as first argument)
/// and report how many users it holds.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    let store = SqliteUserStore::open(&url, false).await?;
    let users = store.list().await?;
    println!("DB migrated at {} ({} registered users)", url, users.len());
    Ok(())
}
