#![deny(warnings)]

//! Per-simulation history and the cycle state machine.
//!
//! A [`Simulation`] owns an append-only list of linked snapshots and a
//! [`Manager`] holding three cursors into it: `current` (latest step),
//! `viewed` (the step on screen) and `compared` (the baseline for change
//! highlighting). The cursors always satisfy
//! `0 <= compared <= viewed <= current`.

mod user;

pub use user::User;

use serde::Serialize;
use sim_api::{fetch_stage, ApiError, SimulationApi};
use sim_core::{Action, CycleState, Stage, TableName, ValidationError};
use sim_link::{link, LinkedStage};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("remote call failed: {0}")]
    Remote(#[from] ApiError),
    #[error("no simulation is selected")]
    NoCurrentSimulation,
    #[error("simulation {0} does not exist")]
    UnknownSimulation(i64),
    #[error("the server returned no data for simulation {0}")]
    EmptySnapshot(i64),
    #[error("the server returned data of simulation {found} instead of {expected}")]
    ForeignSnapshot { expected: i64, found: i64 },
    #[error("switching to simulation {0} is not ready yet")]
    SwitchUnsupported(i64),
}

/// Cycle state and history cursors of one simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Manager {
    state: CycleState,
    current: usize,
    viewed: usize,
    compared: usize,
    /// State reached at each step.
    states: BTreeMap<usize, CycleState>,
}

impl Default for Manager {
    fn default() -> Self {
        Self {
            state: CycleState::Demand,
            current: 0,
            viewed: 0,
            compared: 0,
            states: BTreeMap::from([(0, CycleState::Demand)]),
        }
    }
}

impl Manager {
    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn viewed(&self) -> usize {
        self.viewed
    }

    pub fn compared(&self) -> usize {
        self.compared
    }

    /// State the simulation was in at `step`.
    pub fn state_at(&self, step: usize) -> Option<CycleState> {
        self.states.get(&step).copied()
    }

    /// Record a completed step and move the view to it.
    fn push_step(&mut self, state: CycleState) {
        self.compared = self.viewed;
        self.current += 1;
        self.viewed = self.current;
        self.state = state;
        self.states.insert(self.current, state);
    }

    /// Move both cursors one step back. Returns false at the start of history.
    pub fn step_back(&mut self) -> bool {
        if self.compared == 0 {
            return false;
        }
        self.compared -= 1;
        self.viewed -= 1;
        true
    }

    /// Move both cursors one step forward. Returns false at the head of history.
    pub fn step_forward(&mut self) -> bool {
        if self.viewed >= self.current {
            return false;
        }
        self.viewed += 1;
        self.compared += 1;
        true
    }
}

/// One simulation: its manager and every snapshot fetched so far.
#[derive(Debug, Serialize)]
pub struct Simulation {
    id: i64,
    template_id: i64,
    manager: Manager,
    history: Vec<LinkedStage>,
}

impl Simulation {
    /// Start a simulation whose first snapshot is `first`.
    pub fn new(id: i64, template_id: i64, first: LinkedStage) -> Self {
        Self {
            id,
            template_id,
            manager: Manager::default(),
            history: vec![first],
        }
    }

    /// Ask the server to clone `template_id` and load the clone's first step.
    ///
    /// Nothing is returned if no table of the first step could be fetched.
    pub async fn create(
        api: &dyn SimulationApi,
        api_key: &str,
        template_id: i64,
    ) -> Result<Simulation, RuntimeError> {
        let clone = api.clone_simulation(api_key, template_id).await?;
        info!(
            template_id,
            simulation_id = clone.simulation_id,
            message = %clone.message,
            "server cloned template"
        );
        let stage = fetch_stage(api, api_key).await;
        if stage.failed.len() == TableName::ALL.len() {
            error!(
                simulation_id = clone.simulation_id,
                "no table of the first step could be fetched"
            );
            return Err(RuntimeError::EmptySnapshot(clone.simulation_id));
        }
        check_owner(&stage, clone.simulation_id)?;
        Ok(Simulation::new(clone.simulation_id, template_id, link(stage)))
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn template_id(&self) -> i64 {
        self.template_id
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn state(&self) -> CycleState {
        self.manager.state
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn stage(&self, step: usize) -> Option<&LinkedStage> {
        self.history.get(step)
    }

    pub fn viewed_stage(&self) -> &LinkedStage {
        &self.history[self.manager.viewed]
    }

    pub fn compared_stage(&self) -> &LinkedStage {
        &self.history[self.manager.compared]
    }

    pub fn current_stage(&self) -> &LinkedStage {
        &self.history[self.manager.current]
    }

    /// Execute `action` remotely, then fetch and link the resulting step.
    ///
    /// The action name is validated before any remote call. If the remote
    /// action fails, or the fetched step belongs to another simulation,
    /// state, cursors and history are left untouched.
    pub async fn advance(
        &mut self,
        api: &dyn SimulationApi,
        api_key: &str,
        action: &str,
    ) -> Result<CycleState, RuntimeError> {
        let action: Action = action.parse()?;
        if let Err(e) = api.trigger_action(api_key, action).await {
            error!(simulation_id = self.id, %action, error = %e, "action failed");
            return Err(e.into());
        }
        let stage = fetch_stage(api, api_key).await;
        check_owner(&stage, self.id)?;
        let next = action.next_state();
        self.history.push(link(stage));
        self.manager.push_step(next);
        info!(
            simulation_id = self.id,
            %action,
            state = %next,
            step = self.manager.current,
            "advanced"
        );
        Ok(next)
    }

    pub fn step_back(&mut self) -> bool {
        self.manager.step_back()
    }

    pub fn step_forward(&mut self) -> bool {
        self.manager.step_forward()
    }
}

/// Refuse a stage holding records of a simulation other than `id`.
fn check_owner(stage: &Stage, id: i64) -> Result<(), RuntimeError> {
    match stage.foreign_simulation(id) {
        None => Ok(()),
        Some(found) => {
            error!(
                simulation_id = id,
                found, "fetched step belongs to another simulation; discarded"
            );
            Err(RuntimeError::ForeignSnapshot {
                expected: id,
                found,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use sim_api::{
        ApiError, CloneResult, RegistrationOutcome, RemoteUser, SimulationApi, SimulationTemplate,
    };
    use sim_core::{Action, TableName};
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

    /// Counts executed actions; the commodity table reports the count as its size.
    /// Like the real server, records belong to the most recently cloned simulation.
    #[derive(Default)]
    pub struct FakeApi {
        pub current: AtomicI64,
        pub actions: AtomicUsize,
        pub fetches: AtomicUsize,
        pub fail_actions: AtomicBool,
        pub fail_tables: AtomicBool,
        /// Keep serving the previous simulation after a clone.
        pub ignore_clones: AtomicBool,
    }

    #[async_trait]
    impl SimulationApi for FakeApi {
        async fn fetch_table(
            &self,
            _api_key: &str,
            table: TableName,
        ) -> Result<Option<Vec<u8>>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_tables.load(Ordering::SeqCst) {
                return Err(ApiError::Timeout);
            }
            let body = match table {
                TableName::Commodities => format!(
                    r#"[{{"id":1,"simulation_id":{},"name":"Corn","size":{}}}]"#,
                    self.current.load(Ordering::SeqCst),
                    self.actions.load(Ordering::SeqCst)
                ),
                _ => "[]".to_string(),
            };
            Ok(Some(body.into_bytes()))
        }

        async fn trigger_action(&self, _api_key: &str, _action: Action) -> Result<(), ApiError> {
            if self.fail_actions.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 500,
                    body: "refused".into(),
                });
            }
            self.actions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn clone_simulation(
            &self,
            _api_key: &str,
            template_id: i64,
        ) -> Result<CloneResult, ApiError> {
            if !self.ignore_clones.load(Ordering::SeqCst) {
                self.current.store(template_id + 100, Ordering::SeqCst);
            }
            Ok(CloneResult {
                message: "cloned".into(),
                status_code: 200,
                simulation_id: template_id + 100,
            })
        }

        async fn register_user(&self, _username: &str) -> Result<RegistrationOutcome, ApiError> {
            Ok(RegistrationOutcome::AlreadyRegistered)
        }

        async fn remote_user(&self, username: &str) -> Result<RemoteUser, ApiError> {
            Ok(RemoteUser {
                username: username.into(),
                ..RemoteUser::default()
            })
        }

        async fn registered_users(&self) -> Result<Vec<RemoteUser>, ApiError> {
            Ok(vec![])
        }

        async fn templates(&self) -> Result<Vec<SimulationTemplate>, ApiError> {
            Ok(vec![])
        }
    }
}
