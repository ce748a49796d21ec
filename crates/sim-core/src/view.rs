//! Named-field access for display and for comparing two steps.

use crate::{Class, ClassStock, Commodity, Industry, IndustryStock, Record};
use rust_decimal::Decimal;
use serde::Serialize;

/// Format a number for display: at most two decimals, no trailing zeros.
pub fn format_number(d: Decimal) -> String {
    d.round_dp(2).normalize().to_string()
}

/// Read access to an entity's fields by name.
pub trait Viewable: Record {
    /// Displayable fields, in column order.
    const FIELDS: &'static [&'static str];

    /// Formatted value of `field`, or `None` if the entity has no such field.
    fn field_value(&self, field: &str) -> Option<String>;
}

impl Viewable for Commodity {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "origin",
        "usage",
        "size",
        "total_value",
        "total_price",
        "unit_value",
        "unit_price",
        "turnover_time",
        "demand",
        "supply",
        "allocation_ratio",
    ];

    fn field_value(&self, field: &str) -> Option<String> {
        let n = |d: Decimal| Some(format_number(d));
        match field {
            "id" => Some(self.id.to_string()),
            "name" => Some(self.name.clone()),
            "origin" => Some(self.origin.clone()),
            "usage" => Some(self.usage.clone()),
            "size" => n(self.size),
            "total_value" => n(self.total_value),
            "total_price" => n(self.total_price),
            "unit_value" => n(self.unit_value),
            "unit_price" => n(self.unit_price),
            "turnover_time" => n(self.turnover_time),
            "demand" => n(self.demand),
            "supply" => n(self.supply),
            "allocation_ratio" => n(self.allocation_ratio),
            "monetarily_effective_demand" => n(self.monetarily_effective_demand),
            "investment_proportion" => n(self.investment_proportion),
            _ => None,
        }
    }
}

impl Viewable for Industry {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "output",
        "output_scale",
        "output_growth_rate",
        "initial_capital",
        "work_in_progress",
        "current_capital",
        "profit",
        "profit_rate",
    ];

    fn field_value(&self, field: &str) -> Option<String> {
        let n = |d: Decimal| Some(format_number(d));
        match field {
            "id" => Some(self.id.to_string()),
            "name" => Some(self.name.clone()),
            "output" => Some(self.output.clone()),
            "output_scale" => n(self.output_scale),
            "output_growth_rate" => n(self.output_growth_rate),
            "initial_capital" => n(self.initial_capital),
            "work_in_progress" => n(self.work_in_progress),
            "current_capital" => n(self.current_capital),
            "profit" => n(self.profit),
            "profit_rate" => n(self.profit_rate),
            _ => None,
        }
    }
}

impl Viewable for Class {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "population",
        "participation_ratio",
        "consumption_ratio",
        "revenue",
        "assets",
    ];

    fn field_value(&self, field: &str) -> Option<String> {
        let n = |d: Decimal| Some(format_number(d));
        match field {
            "id" => Some(self.id.to_string()),
            "name" => Some(self.name.clone()),
            "output" => Some(self.output.clone()),
            "population" => n(self.population),
            "participation_ratio" => n(self.participation_ratio),
            "consumption_ratio" => n(self.consumption_ratio),
            "revenue" => n(self.revenue),
            "assets" => n(self.assets),
            _ => None,
        }
    }
}

impl Viewable for IndustryStock {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "usage_type",
        "origin",
        "size",
        "value",
        "price",
        "requirement",
        "demand",
    ];

    fn field_value(&self, field: &str) -> Option<String> {
        let n = |d: Decimal| Some(format_number(d));
        match field {
            "id" => Some(self.id.to_string()),
            "name" => Some(self.name.clone()),
            "industry_id" => Some(self.industry_id.to_string()),
            "commodity_id" => Some(self.commodity_id.to_string()),
            "usage_type" => Some(self.usage_type.clone()),
            "origin" => Some(self.origin.clone()),
            "size" => n(self.size),
            "value" => n(self.value),
            "price" => n(self.price),
            "requirement" => n(self.requirement),
            "demand" => n(self.demand),
            _ => None,
        }
    }
}

impl Viewable for ClassStock {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "usage_type",
        "size",
        "value",
        "price",
        "requirement",
        "demand",
    ];

    fn field_value(&self, field: &str) -> Option<String> {
        let n = |d: Decimal| Some(format_number(d));
        match field {
            "id" => Some(self.id.to_string()),
            "name" => Some(self.name.clone()),
            "class_id" => Some(self.class_id.to_string()),
            "commodity_id" => Some(self.commodity_id.to_string()),
            "usage_type" => Some(self.usage_type.clone()),
            "size" => n(self.size),
            "value" => n(self.value),
            "price" => n(self.price),
            "requirement" => n(self.requirement),
            "demand" => n(self.demand),
            _ => None,
        }
    }
}

/// One displayed value, flagged when it differs from the compared step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub field: &'static str,
    pub value: String,
    pub changed: bool,
}

/// The same entity seen at the viewed step and at the compared step.
#[derive(Clone, Copy, Debug)]
pub struct Comparison<'a, T> {
    pub viewed: &'a T,
    pub compared: Option<&'a T>,
}

impl<'a, T: Viewable> Comparison<'a, T> {
    /// Pair `viewed` with the record of the same id in `baseline`.
    pub fn find(viewed: &'a T, baseline: &'a [T]) -> Self {
        let compared = baseline.iter().find(|c| c.id() == viewed.id());
        Comparison { viewed, compared }
    }

    /// A cell for `field`. A record missing from the baseline counts as unchanged.
    pub fn cell(&self, field: &'static str) -> Cell {
        let value = self.viewed.field_value(field).unwrap_or_default();
        let changed = match self.compared {
            Some(c) => c.field_value(field).unwrap_or_default() != value,
            None => false,
        };
        Cell {
            field,
            value,
            changed,
        }
    }

    /// Cells for every field in `T::FIELDS`.
    pub fn cells(&self) -> Vec<Cell> {
        T::FIELDS.iter().map(|f| self.cell(*f)).collect()
    }
}

/// Pair every viewed record with its counterpart in the compared step.
pub fn compare_all<'a, T: Viewable>(viewed: &'a [T], compared: &'a [T]) -> Vec<Comparison<'a, T>> {
    viewed
        .iter()
        .map(|v| Comparison::find(v, compared))
        .collect()
}
