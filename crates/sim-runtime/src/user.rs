//! A logged-in user and the simulations they have open.

use crate::{RuntimeError, Simulation};
use serde::Serialize;
use sim_api::{RemoteUser, SimulationApi};
use sim_core::CycleState;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct User {
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(skip)]
    api_key: String,
    /// Simulation the server acts on: the one reported at login, then the
    /// latest clone.
    pub remote_simulation_id: i64,
    current_simulation: Option<i64>,
    simulations: BTreeMap<i64, Simulation>,
}

impl User {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: String::new(),
            role: String::new(),
            api_key: api_key.into(),
            remote_simulation_id: 0,
            current_simulation: None,
            simulations: BTreeMap::new(),
        }
    }

    /// Build from the record the server returns at login.
    pub fn from_remote(remote: RemoteUser) -> Self {
        Self {
            username: remote.username,
            email: remote.email,
            role: remote.role,
            api_key: remote.api_key,
            remote_simulation_id: remote.current_simulation_id,
            current_simulation: None,
            simulations: BTreeMap::new(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn current_simulation_id(&self) -> Option<i64> {
        self.current_simulation
    }

    pub fn simulations(&self) -> impl Iterator<Item = &Simulation> {
        self.simulations.values()
    }

    pub fn simulation(&self, id: i64) -> Result<&Simulation, RuntimeError> {
        self.simulations
            .get(&id)
            .ok_or(RuntimeError::UnknownSimulation(id))
    }

    pub fn current(&self) -> Result<&Simulation, RuntimeError> {
        let id = self
            .current_simulation
            .ok_or(RuntimeError::NoCurrentSimulation)?;
        self.simulation(id)
    }

    pub fn current_mut(&mut self) -> Result<&mut Simulation, RuntimeError> {
        let id = self
            .current_simulation
            .ok_or(RuntimeError::NoCurrentSimulation)?;
        self.simulations
            .get_mut(&id)
            .ok_or(RuntimeError::UnknownSimulation(id))
    }

    /// Clone `template_id` on the server and make the clone current.
    pub async fn create_simulation(
        &mut self,
        api: &dyn SimulationApi,
        template_id: i64,
    ) -> Result<i64, RuntimeError> {
        let sim = Simulation::create(api, &self.api_key, template_id).await?;
        let id = sim.id();
        self.simulations.insert(id, sim);
        self.current_simulation = Some(id);
        self.remote_simulation_id = id;
        info!(user = %self.username, simulation_id = id, template_id, "simulation created");
        Ok(id)
    }

    /// Make an existing simulation current.
    ///
    /// Actions always run against the simulation the server last cloned, so
    /// that is the only one that can be selected.
    pub fn switch_to(&mut self, id: i64) -> Result<(), RuntimeError> {
        if !self.simulations.contains_key(&id) {
            return Err(RuntimeError::UnknownSimulation(id));
        }
        if id != self.remote_simulation_id {
            info!(user = %self.username, simulation_id = id, "switch refused");
            return Err(RuntimeError::SwitchUnsupported(id));
        }
        self.current_simulation = Some(id);
        Ok(())
    }

    /// Forget a simulation locally. The server copy is left alone.
    pub fn delete(&mut self, id: i64) -> Result<Simulation, RuntimeError> {
        let sim = self
            .simulations
            .remove(&id)
            .ok_or(RuntimeError::UnknownSimulation(id))?;
        if self.current_simulation == Some(id) {
            self.current_simulation = None;
        }
        info!(user = %self.username, simulation_id = id, "simulation deleted");
        Ok(sim)
    }

    /// Advance the current simulation by one action.
    pub async fn advance(
        &mut self,
        api: &dyn SimulationApi,
        action: &str,
    ) -> Result<CycleState, RuntimeError> {
        let api_key = self.api_key.clone();
        self.current_mut()?.advance(api, &api_key, action).await
    }

    pub fn step_back(&mut self) -> Result<bool, RuntimeError> {
        Ok(self.current_mut()?.step_back())
    }

    pub fn step_forward(&mut self) -> Result<bool, RuntimeError> {
        Ok(self.current_mut()?.step_forward())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;

    #[tokio::test]
    async fn created_simulation_becomes_current() {
        let api = FakeApi::default();
        let mut user = User::new("alice", "k");
        assert!(matches!(user.current(), Err(RuntimeError::NoCurrentSimulation)));
        let id = user.create_simulation(&api, 2).await.unwrap();
        assert_eq!(id, 102);
        assert_eq!(user.current_simulation_id(), Some(102));
        assert_eq!(user.current().unwrap().template_id(), 2);
    }

    #[tokio::test]
    async fn switch_and_delete() {
        let api = FakeApi::default();
        let mut user = User::new("alice", "k");
        user.create_simulation(&api, 1).await.unwrap();
        user.create_simulation(&api, 2).await.unwrap();
        user.switch_to(102).unwrap();
        assert!(matches!(
            user.switch_to(7),
            Err(RuntimeError::UnknownSimulation(7))
        ));
        user.delete(102).unwrap();
        assert_eq!(user.current_simulation_id(), None);
        assert_eq!(user.simulations().count(), 1);
        assert!(user.delete(102).is_err());
    }

    #[tokio::test]
    async fn older_simulation_cannot_be_selected() {
        let api = FakeApi::default();
        let mut user = User::new("alice", "k");
        user.create_simulation(&api, 1).await.unwrap();
        user.advance(&api, "demand").await.unwrap();
        user.create_simulation(&api, 2).await.unwrap();

        assert!(matches!(
            user.switch_to(101),
            Err(RuntimeError::SwitchUnsupported(101))
        ));
        assert_eq!(user.current_simulation_id(), Some(102));

        // Actions keep landing on the simulation the server acts on.
        user.advance(&api, "demand").await.unwrap();
        assert_eq!(user.current().unwrap().history_len(), 2);
        assert_eq!(user.simulation(101).unwrap().history_len(), 2);
        assert_eq!(user.simulation(101).unwrap().state(), CycleState::Supply);
    }

    #[tokio::test]
    async fn navigation_without_a_simulation_is_an_error() {
        let api = FakeApi::default();
        let mut user = User::new("bob", "k");
        assert!(matches!(
            user.advance(&api, "demand").await,
            Err(RuntimeError::NoCurrentSimulation)
        ));
        assert!(user.step_back().is_err());
        assert!(user.step_forward().is_err());
    }

    #[tokio::test]
    async fn api_key_stays_out_of_the_dump() {
        let mut user = User::from_remote(RemoteUser {
            username: "carol".into(),
            api_key: "secret-key".into(),
            current_simulation_id: 9,
            ..RemoteUser::default()
        });
        assert_eq!(user.remote_simulation_id, 9);
        let api = FakeApi::default();
        user.create_simulation(&api, 1).await.unwrap();
        user.advance(&api, "demand").await.unwrap();
        let dump = serde_json::to_string(&user).unwrap();
        assert!(!dump.contains("secret-key"));
        assert!(dump.contains("carol"));
        assert_eq!(user.api_key(), "secret-key");
        assert_eq!(user.remote_simulation_id, 101);
    }
}
