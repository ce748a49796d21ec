#![deny(warnings)]

//! Core domain models for the circuit client.
//!
//! This crate defines the serializable records returned by the simulation
//! API, the fixed set of tables that make up one simulation step, the
//! six-state economic cycle and the field-access capability used to compare
//! two steps of the same simulation.

mod records;
mod stage;
mod view;

pub use records::*;
pub use stage::*;
pub use view::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Validation errors for caller-supplied values.
///
/// These are rejected before any remote call is made.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    /// Action name is not a key of the transition table.
    #[error("unknown action: {0}")]
    UnknownAction(String),
    /// Cycle state name is not one of the six stages of the circuit.
    #[error("unknown cycle state: {0}")]
    UnknownState(String),
    /// Table name is not one of the five snapshot tables.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// An object id in a URL could not be parsed.
    #[error("malformed id: {0}")]
    MalformedId(String),
}

/// One of the six stages of the economic circuit.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    /// Initial state of every new simulation.
    #[default]
    Demand,
    Supply,
    Trade,
    Produce,
    Consume,
    Invest,
}

impl CycleState {
    /// All states in circuit order, starting from the initial state.
    pub const ALL: [CycleState; 6] = [
        CycleState::Demand,
        CycleState::Supply,
        CycleState::Trade,
        CycleState::Produce,
        CycleState::Consume,
        CycleState::Invest,
    ];

    /// The successor of this state. The cycle has no terminal state.
    pub fn next(self) -> CycleState {
        match self {
            CycleState::Demand => CycleState::Supply,
            CycleState::Supply => CycleState::Trade,
            CycleState::Trade => CycleState::Produce,
            CycleState::Produce => CycleState::Consume,
            CycleState::Consume => CycleState::Invest,
            CycleState::Invest => CycleState::Demand,
        }
    }

    /// The action a user triggers to complete this stage.
    pub fn action(self) -> Action {
        match self {
            CycleState::Demand => Action::Demand,
            CycleState::Supply => Action::Supply,
            CycleState::Trade => Action::Trade,
            CycleState::Produce => Action::Produce,
            CycleState::Consume => Action::Consume,
            CycleState::Invest => Action::Invest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleState::Demand => "DEMAND",
            CycleState::Supply => "SUPPLY",
            CycleState::Trade => "TRADE",
            CycleState::Produce => "PRODUCE",
            CycleState::Consume => "CONSUME",
            CycleState::Invest => "INVEST",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CycleState::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownState(s.to_string()))
    }
}

/// A user-triggered action, sent to the remote API as `/action/{name}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Demand,
    Supply,
    Trade,
    Produce,
    Consume,
    Invest,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Demand,
        Action::Supply,
        Action::Trade,
        Action::Produce,
        Action::Consume,
        Action::Invest,
    ];

    /// Lowercase name used in URLs.
    pub fn name(self) -> &'static str {
        match self {
            Action::Demand => "demand",
            Action::Supply => "supply",
            Action::Trade => "trade",
            Action::Produce => "produce",
            Action::Consume => "consume",
            Action::Invest => "invest",
        }
    }

    /// Remote endpoint that executes this action.
    pub fn endpoint(self) -> String {
        format!("/action/{}", self.name())
    }

    /// The state the simulation enters once this action has executed.
    ///
    /// Transition table: demand→SUPPLY, supply→TRADE, trade→PRODUCE,
    /// produce→CONSUME, consume→INVEST, invest→DEMAND.
    pub fn next_state(self) -> CycleState {
        match self {
            Action::Demand => CycleState::Supply,
            Action::Supply => CycleState::Trade,
            Action::Trade => CycleState::Produce,
            Action::Produce => CycleState::Consume,
            Action::Consume => CycleState::Invest,
            Action::Invest => CycleState::Demand,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| ValidationError::UnknownAction(s.to_string()))
    }
}

/// Parse an object id taken from a URL segment.
pub fn parse_id(raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::MalformedId(raw.to_string()))
}
