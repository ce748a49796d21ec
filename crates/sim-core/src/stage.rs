//! The five tables fetched for one simulation step.

use crate::{Class, ClassStock, Commodity, Industry, IndustryStock, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of one of the snapshot tables. Each has a fixed remote endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Commodities,
    Industries,
    Classes,
    IndustryStocks,
    ClassStocks,
}

impl TableName {
    /// Fetch order. Owners come before the stocks that reference them.
    pub const ALL: [TableName; 5] = [
        TableName::Commodities,
        TableName::Industries,
        TableName::Classes,
        TableName::IndustryStocks,
        TableName::ClassStocks,
    ];

    /// Endpoint path on the simulation API, relative to its base URL.
    pub fn endpoint(self) -> &'static str {
        match self {
            TableName::Commodities => "/commodity",
            TableName::Industries => "/industry",
            TableName::Classes => "/classes",
            TableName::IndustryStocks => "/stocks/industry",
            TableName::ClassStocks => "/stocks/class",
        }
    }

    /// Human-readable table name.
    pub fn label(self) -> &'static str {
        match self {
            TableName::Commodities => "commodities",
            TableName::Industries => "industries",
            TableName::Classes => "classes",
            TableName::IndustryStocks => "industry stocks",
            TableName::ClassStocks => "class stocks",
        }
    }

    /// Name of the JSON file the table is dumped to.
    pub fn file_name(self) -> &'static str {
        match self {
            TableName::Commodities => "commodities.json",
            TableName::Industries => "industries.json",
            TableName::Classes => "classes.json",
            TableName::IndustryStocks => "industry-stocks.json",
            TableName::ClassStocks => "class-stocks.json",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TableName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableName::ALL
            .into_iter()
            .find(|t| t.label() == s)
            .ok_or_else(|| ValidationError::UnknownTable(s.to_string()))
    }
}

/// The decoded payload of one table, tagged with its record kind.
#[derive(Clone, Debug, PartialEq)]
pub enum TableRows {
    Commodities(Vec<Commodity>),
    Industries(Vec<Industry>),
    Classes(Vec<Class>),
    IndustryStocks(Vec<IndustryStock>),
    ClassStocks(Vec<ClassStock>),
}

impl TableRows {
    /// Decode a JSON array response into the record type of `table`.
    pub fn decode(table: TableName, body: &[u8]) -> Result<TableRows, serde_json::Error> {
        Ok(match table {
            TableName::Commodities => TableRows::Commodities(serde_json::from_slice(body)?),
            TableName::Industries => TableRows::Industries(serde_json::from_slice(body)?),
            TableName::Classes => TableRows::Classes(serde_json::from_slice(body)?),
            TableName::IndustryStocks => TableRows::IndustryStocks(serde_json::from_slice(body)?),
            TableName::ClassStocks => TableRows::ClassStocks(serde_json::from_slice(body)?),
        })
    }

    pub fn table(&self) -> TableName {
        match self {
            TableRows::Commodities(_) => TableName::Commodities,
            TableRows::Industries(_) => TableName::Industries,
            TableRows::Classes(_) => TableName::Classes,
            TableRows::IndustryStocks(_) => TableName::IndustryStocks,
            TableRows::ClassStocks(_) => TableName::ClassStocks,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TableRows::Commodities(v) => v.len(),
            TableRows::Industries(v) => v.len(),
            TableRows::Classes(v) => v.len(),
            TableRows::IndustryStocks(v) => v.len(),
            TableRows::ClassStocks(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One simulation step: the five tables, unlinked.
///
/// A table whose fetch failed is empty and listed in `failed`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub commodities: Vec<Commodity>,
    pub industries: Vec<Industry>,
    pub classes: Vec<Class>,
    pub industry_stocks: Vec<IndustryStock>,
    pub class_stocks: Vec<ClassStock>,
    #[serde(default)]
    pub failed: Vec<TableName>,
}

impl Stage {
    /// Replace the contents of the table the rows belong to.
    pub fn insert(&mut self, rows: TableRows) {
        match rows {
            TableRows::Commodities(v) => self.commodities = v,
            TableRows::Industries(v) => self.industries = v,
            TableRows::Classes(v) => self.classes = v,
            TableRows::IndustryStocks(v) => self.industry_stocks = v,
            TableRows::ClassStocks(v) => self.class_stocks = v,
        }
    }

    /// Record that a table could not be fetched.
    pub fn mark_failed(&mut self, table: TableName) {
        if !self.failed.contains(&table) {
            self.failed.push(table);
        }
    }

    pub fn len(&self, table: TableName) -> usize {
        match table {
            TableName::Commodities => self.commodities.len(),
            TableName::Industries => self.industries.len(),
            TableName::Classes => self.classes.len(),
            TableName::IndustryStocks => self.industry_stocks.len(),
            TableName::ClassStocks => self.class_stocks.len(),
        }
    }

    /// True when every table was fetched without a transport or decode error.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Simulation of the first record that does not belong to simulation `id`.
    pub fn foreign_simulation(&self, id: i64) -> Option<i64> {
        self.commodities
            .iter()
            .map(|r| r.simulation_id)
            .chain(self.industries.iter().map(|r| r.simulation_id))
            .chain(self.classes.iter().map(|r| r.simulation_id))
            .chain(self.industry_stocks.iter().map(|r| r.simulation_id))
            .chain(self.class_stocks.iter().map(|r| r.simulation_id))
            .find(|&other| other != id)
    }

    /// Serialize one table as pretty JSON.
    pub fn table_json(&self, table: TableName) -> Result<String, serde_json::Error> {
        match table {
            TableName::Commodities => serde_json::to_string_pretty(&self.commodities),
            TableName::Industries => serde_json::to_string_pretty(&self.industries),
            TableName::Classes => serde_json::to_string_pretty(&self.classes),
            TableName::IndustryStocks => serde_json::to_string_pretty(&self.industry_stocks),
            TableName::ClassStocks => serde_json::to_string_pretty(&self.class_stocks),
        }
    }
}
