//! Shared application state.

use crate::auth::hash_password;
use crate::session::SessionStore;
use persistence::{RegisteredUser, StoreError, UserStore};
use sim_api::{SimulationApi, SimulationTemplate};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub api: Arc<dyn SimulationApi>,
    pub store: Arc<dyn UserStore>,
    pub sessions: SessionStore,
    /// Template catalog shared by all users; replaced on each refresh.
    pub templates: RwLock<Vec<SimulationTemplate>>,
    pub dump_dir: PathBuf,
}

impl AppState {
    pub fn new(
        api: Arc<dyn SimulationApi>,
        store: Arc<dyn UserStore>,
        dump_dir: impl Into<PathBuf>,
    ) -> SharedState {
        Arc::new(Self {
            api,
            store,
            sessions: SessionStore::default(),
            templates: RwLock::new(Vec::new()),
            dump_dir: dump_dir.into(),
        })
    }

    /// Reload the template catalog. On failure the previous catalog is kept.
    pub async fn refresh_templates(&self) {
        match self.api.templates().await {
            Ok(list) => {
                info!(count = list.len(), "templates retrieved from server");
                *self.templates.write().await = list;
            }
            Err(e) => warn!(error = %e, "could not retrieve templates"),
        }
    }

    /// Copy the server's user list into the local store, giving every
    /// imported user `seed_password`. Returns how many users were added.
    pub async fn import_remote_users(&self, seed_password: &str) -> anyhow::Result<usize> {
        let remote = self.api.registered_users().await?;
        let mut added = 0;
        for user in remote {
            let hash = hash_password(seed_password)?;
            let record = RegisteredUser::new(user.username.as_str(), hash, user.api_key);
            match self.store.create(&record).await {
                Ok(()) => added += 1,
                Err(StoreError::Duplicate(name)) => debug!(user = %name, "already known"),
                Err(e) => return Err(e.into()),
            }
        }
        info!(added, "registered users loaded");
        Ok(added)
    }
}
