#![deny(warnings)]

//! Reference linker: resolves the foreign keys of one fetched [`Stage`] into
//! direct associations.
//!
//! The API relates records only by id (a stock's `industry_id`,
//! `commodity_id`, ...). [`link`] resolves every key once per snapshot and
//! stores the result as indices into the snapshot's own tables, so the
//! associations never outlive or cross the snapshot that produced them.
//! Rendering code then navigates through [`IndustryNode`], [`ClassNode`] and
//! the stock nodes without re-scanning tables.
//!
//! Integrity problems (unknown usage types, keys that resolve to nothing,
//! duplicated slots) are logged and collected in a [`LinkReport`]; they never
//! abort linking.

use serde::Serialize;
use sim_core::{
    Class, ClassStock, Commodity, Industry, IndustryStock, Origin, Record, Stage, StockUsage,
    TableName, NOT_FOUND_CLASS, NOT_FOUND_CLASS_STOCK, NOT_FOUND_COMMODITY, NOT_FOUND_INDUSTRY,
    NOT_FOUND_INDUSTRY_STOCK,
};
use std::collections::HashMap;
use std::ops::Deref;
use thiserror::Error;
use tracing::{error, warn};

/// Non-fatal data-integrity findings produced while linking.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum IntegrityIssue {
    /// Two records of the same table share an id; the first one wins.
    #[error("{table}: duplicate id {id}")]
    DuplicateId { table: TableName, id: i64 },
    /// A stock names an owner that is not in the snapshot.
    #[error("{table}: stock {stock_id} refers to missing owner {owner_id}")]
    UnresolvedOwner {
        table: TableName,
        stock_id: i64,
        owner_id: i64,
    },
    /// A stock names a commodity that is not in the snapshot.
    #[error("{table}: stock {stock_id} refers to missing commodity {commodity_id}")]
    UnresolvedCommodity {
        table: TableName,
        stock_id: i64,
        commodity_id: i64,
    },
    /// A stock's usage type is not valid for its owner kind.
    #[error("{table}: stock {stock_id} has unknown usage type {usage_type:?}")]
    UnknownUsage {
        table: TableName,
        stock_id: i64,
        usage_type: String,
    },
    /// An owner has more than one stock for a single-valued slot.
    #[error("{table}: owner {owner_id} already has a {slot} stock; ignoring stock {stock_id}")]
    DuplicateSlot {
        table: TableName,
        owner_id: i64,
        slot: &'static str,
        stock_id: i64,
    },
    /// An owner lacks a stock that every owner must have.
    #[error("{table}: owner {owner_id} has no {slot} stock")]
    MissingSlot {
        table: TableName,
        owner_id: i64,
        slot: &'static str,
    },
}

/// Everything that went wrong while linking one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub issues: Vec<IntegrityIssue>,
}

impl LinkReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, issue: IntegrityIssue) {
        match issue {
            IntegrityIssue::MissingSlot { .. } | IntegrityIssue::DuplicateId { .. } => {
                warn!(%issue, "snapshot integrity")
            }
            _ => error!(%issue, "snapshot integrity"),
        }
        self.issues.push(issue);
    }
}

/// Resolved associations of one industry, as indices into the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndustryLinks {
    pub money: Option<usize>,
    pub sales: Option<usize>,
    /// Labour power: the Production stock of SOCIAL origin.
    pub variable: Option<usize>,
    /// Other Production stocks, in fetch order.
    pub constant: Vec<usize>,
    /// Output commodity: the commodity of the sales stock.
    pub commodity: Option<usize>,
}

/// Resolved associations of one social class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassLinks {
    pub money: Option<usize>,
    pub sales: Option<usize>,
    pub consumption: Vec<usize>,
    pub commodity: Option<usize>,
}

/// Resolved owner and commodity of one stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StockLinks {
    pub owner: Option<usize>,
    pub commodity: Option<usize>,
}

/// Row index of every id, per table. The first record with an id wins.
#[derive(Debug, Clone, Default)]
struct IdIndex {
    commodities: HashMap<i64, usize>,
    industries: HashMap<i64, usize>,
    classes: HashMap<i64, usize>,
    industry_stocks: HashMap<i64, usize>,
    class_stocks: HashMap<i64, usize>,
}

/// A snapshot whose foreign keys have been resolved.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkedStage {
    stage: Stage,
    industries: Vec<IndustryLinks>,
    classes: Vec<ClassLinks>,
    industry_stocks: Vec<StockLinks>,
    class_stocks: Vec<StockLinks>,
    report: LinkReport,
    #[serde(skip)]
    ids: IdIndex,
}

fn index_by_id<R: Record>(
    table: TableName,
    rows: &[R],
    report: &mut LinkReport,
) -> HashMap<i64, usize> {
    let mut index = HashMap::with_capacity(rows.len());
    for (i, r) in rows.iter().enumerate() {
        if index.contains_key(&r.id()) {
            report.push(IntegrityIssue::DuplicateId { table, id: r.id() });
            continue;
        }
        index.insert(r.id(), i);
    }
    index
}

/// Fill a single-valued slot, reporting a duplicate instead of overwriting.
fn fill(
    slot: &mut Option<usize>,
    stock: usize,
    report: &mut LinkReport,
    table: TableName,
    owner_id: i64,
    name: &'static str,
    stock_id: i64,
) {
    if slot.is_some() {
        report.push(IntegrityIssue::DuplicateSlot {
            table,
            owner_id,
            slot: name,
            stock_id,
        });
    } else {
        *slot = Some(stock);
    }
}

/// Resolve every foreign key in `stage`.
pub fn link(stage: Stage) -> LinkedStage {
    let mut report = LinkReport::default();
    let commodity_ix = index_by_id(TableName::Commodities, &stage.commodities, &mut report);
    let industry_ix = index_by_id(TableName::Industries, &stage.industries, &mut report);
    let class_ix = index_by_id(TableName::Classes, &stage.classes, &mut report);
    let industry_stock_ix =
        index_by_id(TableName::IndustryStocks, &stage.industry_stocks, &mut report);
    let class_stock_ix = index_by_id(TableName::ClassStocks, &stage.class_stocks, &mut report);

    let mut industries = vec![IndustryLinks::default(); stage.industries.len()];
    let mut classes = vec![ClassLinks::default(); stage.classes.len()];
    let mut industry_stocks = vec![StockLinks::default(); stage.industry_stocks.len()];
    let mut class_stocks = vec![StockLinks::default(); stage.class_stocks.len()];

    for (s, stock) in stage.industry_stocks.iter().enumerate() {
        let table = TableName::IndustryStocks;
        industry_stocks[s].commodity = commodity_ix.get(&stock.commodity_id).copied();
        if industry_stocks[s].commodity.is_none() {
            report.push(IntegrityIssue::UnresolvedCommodity {
                table,
                stock_id: stock.id,
                commodity_id: stock.commodity_id,
            });
        }
        let Some(&owner) = industry_ix.get(&stock.industry_id) else {
            report.push(IntegrityIssue::UnresolvedOwner {
                table,
                stock_id: stock.id,
                owner_id: stock.industry_id,
            });
            continue;
        };
        industry_stocks[s].owner = Some(owner);
        let links = &mut industries[owner];
        let owner_table = TableName::Industries;
        match (stock.usage(), stock.origin()) {
            (StockUsage::Money, _) => fill(
                &mut links.money,
                s,
                &mut report,
                owner_table,
                stock.industry_id,
                "money",
                stock.id,
            ),
            (StockUsage::Sales, _) => fill(
                &mut links.sales,
                s,
                &mut report,
                owner_table,
                stock.industry_id,
                "sales",
                stock.id,
            ),
            (StockUsage::Production, Origin::Social) => fill(
                &mut links.variable,
                s,
                &mut report,
                owner_table,
                stock.industry_id,
                "variable capital",
                stock.id,
            ),
            (StockUsage::Production, _) => links.constant.push(s),
            (StockUsage::Consumption | StockUsage::Unknown, _) => {
                report.push(IntegrityIssue::UnknownUsage {
                    table,
                    stock_id: stock.id,
                    usage_type: stock.usage_type.clone(),
                })
            }
        }
    }

    for (s, stock) in stage.class_stocks.iter().enumerate() {
        let table = TableName::ClassStocks;
        class_stocks[s].commodity = commodity_ix.get(&stock.commodity_id).copied();
        if class_stocks[s].commodity.is_none() {
            report.push(IntegrityIssue::UnresolvedCommodity {
                table,
                stock_id: stock.id,
                commodity_id: stock.commodity_id,
            });
        }
        let Some(&owner) = class_ix.get(&stock.class_id) else {
            report.push(IntegrityIssue::UnresolvedOwner {
                table,
                stock_id: stock.id,
                owner_id: stock.class_id,
            });
            continue;
        };
        class_stocks[s].owner = Some(owner);
        let links = &mut classes[owner];
        let owner_table = TableName::Classes;
        match stock.usage() {
            StockUsage::Money => fill(
                &mut links.money,
                s,
                &mut report,
                owner_table,
                stock.class_id,
                "money",
                stock.id,
            ),
            StockUsage::Sales => fill(
                &mut links.sales,
                s,
                &mut report,
                owner_table,
                stock.class_id,
                "sales",
                stock.id,
            ),
            StockUsage::Consumption => links.consumption.push(s),
            StockUsage::Production | StockUsage::Unknown => {
                report.push(IntegrityIssue::UnknownUsage {
                    table,
                    stock_id: stock.id,
                    usage_type: stock.usage_type.clone(),
                })
            }
        }
    }

    // An owner's commodity is the commodity of its sales stock.
    for links in industries.iter_mut() {
        links.commodity = links.sales.and_then(|s| industry_stocks[s].commodity);
    }
    for links in classes.iter_mut() {
        links.commodity = links.sales.and_then(|s| class_stocks[s].commodity);
    }

    // Missing slots are only meaningful when the stock table actually arrived.
    if !stage.failed.contains(&TableName::IndustryStocks) {
        for (i, links) in industries.iter().enumerate() {
            let owner_id = stage.industries[i].id;
            for (slot, present) in [("money", links.money), ("sales", links.sales)] {
                if present.is_none() {
                    report.push(IntegrityIssue::MissingSlot {
                        table: TableName::Industries,
                        owner_id,
                        slot,
                    });
                }
            }
        }
    }
    if !stage.failed.contains(&TableName::ClassStocks) {
        for (c, links) in classes.iter().enumerate() {
            let owner_id = stage.classes[c].id;
            for (slot, present) in [("money", links.money), ("sales", links.sales)] {
                if present.is_none() {
                    report.push(IntegrityIssue::MissingSlot {
                        table: TableName::Classes,
                        owner_id,
                        slot,
                    });
                }
            }
        }
    }

    LinkedStage {
        stage,
        industries,
        classes,
        industry_stocks,
        class_stocks,
        report,
        ids: IdIndex {
            commodities: commodity_ix,
            industries: industry_ix,
            classes: class_ix,
            industry_stocks: industry_stock_ix,
            class_stocks: class_stock_ix,
        },
    }
}

impl LinkedStage {
    /// The raw tables.
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn report(&self) -> &LinkReport {
        &self.report
    }

    pub fn commodities(&self) -> &[Commodity] {
        &self.stage.commodities
    }

    pub fn industries(&self) -> impl Iterator<Item = IndustryNode<'_>> + '_ {
        (0..self.stage.industries.len()).map(move |index| IndustryNode { stage: self, index })
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassNode<'_>> + '_ {
        (0..self.stage.classes.len()).map(move |index| ClassNode { stage: self, index })
    }

    pub fn industry_stocks(&self) -> impl Iterator<Item = IndustryStockNode<'_>> + '_ {
        (0..self.stage.industry_stocks.len())
            .map(move |index| IndustryStockNode { stage: self, index })
    }

    pub fn class_stocks(&self) -> impl Iterator<Item = ClassStockNode<'_>> + '_ {
        (0..self.stage.class_stocks.len()).map(move |index| ClassStockNode { stage: self, index })
    }

    pub fn commodity(&self, id: i64) -> Option<&Commodity> {
        let &index = self.ids.commodities.get(&id)?;
        self.stage.commodities.get(index)
    }

    pub fn industry(&self, id: i64) -> Option<IndustryNode<'_>> {
        let &index = self.ids.industries.get(&id)?;
        Some(IndustryNode { stage: self, index })
    }

    pub fn class(&self, id: i64) -> Option<ClassNode<'_>> {
        let &index = self.ids.classes.get(&id)?;
        Some(ClassNode { stage: self, index })
    }

    pub fn industry_stock(&self, id: i64) -> Option<IndustryStockNode<'_>> {
        let &index = self.ids.industry_stocks.get(&id)?;
        Some(IndustryStockNode { stage: self, index })
    }

    pub fn class_stock(&self, id: i64) -> Option<ClassStockNode<'_>> {
        let &index = self.ids.class_stocks.get(&id)?;
        Some(ClassStockNode { stage: self, index })
    }

    /// Commodity by id, or the NOT FOUND placeholder.
    pub fn commodity_or_placeholder(&self, id: i64) -> &Commodity {
        self.commodity(id).unwrap_or(&*NOT_FOUND_COMMODITY)
    }

    /// Industry record by id, or the NOT FOUND placeholder.
    pub fn industry_or_placeholder(&self, id: i64) -> &Industry {
        self.industry(id)
            .map(|n| n.record())
            .unwrap_or(&*NOT_FOUND_INDUSTRY)
    }

    /// Class record by id, or the NOT FOUND placeholder.
    pub fn class_or_placeholder(&self, id: i64) -> &Class {
        self.class(id)
            .map(|n| n.record())
            .unwrap_or(&*NOT_FOUND_CLASS)
    }

    pub fn industry_stock_or_placeholder(&self, id: i64) -> &IndustryStock {
        self.industry_stock(id)
            .map(|n| n.record())
            .unwrap_or(&*NOT_FOUND_INDUSTRY_STOCK)
    }

    pub fn class_stock_or_placeholder(&self, id: i64) -> &ClassStock {
        self.class_stock(id)
            .map(|n| n.record())
            .unwrap_or(&*NOT_FOUND_CLASS_STOCK)
    }
}

/// An industry with its resolved stocks.
#[derive(Clone, Copy)]
pub struct IndustryNode<'a> {
    stage: &'a LinkedStage,
    index: usize,
}

impl<'a> IndustryNode<'a> {
    pub fn record(&self) -> &'a Industry {
        &self.stage.stage.industries[self.index]
    }

    pub fn links(&self) -> &'a IndustryLinks {
        &self.stage.industries[self.index]
    }

    fn stock(&self, ix: Option<usize>) -> Option<IndustryStockNode<'a>> {
        ix.map(|index| IndustryStockNode {
            stage: self.stage,
            index,
        })
    }

    pub fn money(&self) -> Option<IndustryStockNode<'a>> {
        self.stock(self.links().money)
    }

    pub fn sales(&self) -> Option<IndustryStockNode<'a>> {
        self.stock(self.links().sales)
    }

    pub fn variable(&self) -> Option<IndustryStockNode<'a>> {
        self.stock(self.links().variable)
    }

    pub fn constant(&self) -> Vec<IndustryStockNode<'a>> {
        self.links()
            .constant
            .iter()
            .map(|&index| IndustryStockNode {
                stage: self.stage,
                index,
            })
            .collect()
    }

    /// The commodity this industry produces.
    pub fn commodity(&self) -> Option<&'a Commodity> {
        self.links()
            .commodity
            .map(|c| &self.stage.stage.commodities[c])
    }

    pub fn money_or_placeholder(&self) -> &'a IndustryStock {
        self.money()
            .map(|s| s.record())
            .unwrap_or(&*NOT_FOUND_INDUSTRY_STOCK)
    }

    pub fn sales_or_placeholder(&self) -> &'a IndustryStock {
        self.sales()
            .map(|s| s.record())
            .unwrap_or(&*NOT_FOUND_INDUSTRY_STOCK)
    }

    pub fn variable_or_placeholder(&self) -> &'a IndustryStock {
        self.variable()
            .map(|s| s.record())
            .unwrap_or(&*NOT_FOUND_INDUSTRY_STOCK)
    }
}

impl Deref for IndustryNode<'_> {
    type Target = Industry;

    fn deref(&self) -> &Industry {
        self.record()
    }
}

/// A social class with its resolved stocks.
#[derive(Clone, Copy)]
pub struct ClassNode<'a> {
    stage: &'a LinkedStage,
    index: usize,
}

impl<'a> ClassNode<'a> {
    pub fn record(&self) -> &'a Class {
        &self.stage.stage.classes[self.index]
    }

    pub fn links(&self) -> &'a ClassLinks {
        &self.stage.classes[self.index]
    }

    fn stock(&self, ix: Option<usize>) -> Option<ClassStockNode<'a>> {
        ix.map(|index| ClassStockNode {
            stage: self.stage,
            index,
        })
    }

    pub fn money(&self) -> Option<ClassStockNode<'a>> {
        self.stock(self.links().money)
    }

    pub fn sales(&self) -> Option<ClassStockNode<'a>> {
        self.stock(self.links().sales)
    }

    pub fn consumption(&self) -> Vec<ClassStockNode<'a>> {
        self.links()
            .consumption
            .iter()
            .map(|&index| ClassStockNode {
                stage: self.stage,
                index,
            })
            .collect()
    }

    /// The commodity this class sells (for workers, labour power).
    pub fn commodity(&self) -> Option<&'a Commodity> {
        self.links()
            .commodity
            .map(|c| &self.stage.stage.commodities[c])
    }

    pub fn money_or_placeholder(&self) -> &'a ClassStock {
        self.money()
            .map(|s| s.record())
            .unwrap_or(&*NOT_FOUND_CLASS_STOCK)
    }

    pub fn sales_or_placeholder(&self) -> &'a ClassStock {
        self.sales()
            .map(|s| s.record())
            .unwrap_or(&*NOT_FOUND_CLASS_STOCK)
    }
}

impl Deref for ClassNode<'_> {
    type Target = Class;

    fn deref(&self) -> &Class {
        self.record()
    }
}

/// An industry stock with its resolved owner and commodity.
#[derive(Clone, Copy)]
pub struct IndustryStockNode<'a> {
    stage: &'a LinkedStage,
    index: usize,
}

impl<'a> IndustryStockNode<'a> {
    pub fn record(&self) -> &'a IndustryStock {
        &self.stage.stage.industry_stocks[self.index]
    }

    pub fn industry(&self) -> Option<IndustryNode<'a>> {
        self.stage.industry_stocks[self.index]
            .owner
            .map(|index| IndustryNode {
                stage: self.stage,
                index,
            })
    }

    pub fn commodity(&self) -> Option<&'a Commodity> {
        self.stage.industry_stocks[self.index]
            .commodity
            .map(|c| &self.stage.stage.commodities[c])
    }

    /// Owner name, or the placeholder name when unresolved.
    pub fn industry_name(&self) -> &'a str {
        self.industry()
            .map(|n| n.record().name.as_str())
            .unwrap_or(NOT_FOUND_INDUSTRY.name.as_str())
    }

    pub fn commodity_name(&self) -> &'a str {
        self.commodity()
            .map(|c| c.name.as_str())
            .unwrap_or(NOT_FOUND_COMMODITY.name.as_str())
    }
}

impl Deref for IndustryStockNode<'_> {
    type Target = IndustryStock;

    fn deref(&self) -> &IndustryStock {
        self.record()
    }
}

/// A class stock with its resolved owner and commodity.
#[derive(Clone, Copy)]
pub struct ClassStockNode<'a> {
    stage: &'a LinkedStage,
    index: usize,
}

impl<'a> ClassStockNode<'a> {
    pub fn record(&self) -> &'a ClassStock {
        &self.stage.stage.class_stocks[self.index]
    }

    pub fn class(&self) -> Option<ClassNode<'a>> {
        self.stage.class_stocks[self.index]
            .owner
            .map(|index| ClassNode {
                stage: self.stage,
                index,
            })
    }

    pub fn commodity(&self) -> Option<&'a Commodity> {
        self.stage.class_stocks[self.index]
            .commodity
            .map(|c| &self.stage.stage.commodities[c])
    }

    pub fn class_name(&self) -> &'a str {
        self.class()
            .map(|n| n.record().name.as_str())
            .unwrap_or(NOT_FOUND_CLASS.name.as_str())
    }

    pub fn commodity_name(&self) -> &'a str {
        self.commodity()
            .map(|c| c.name.as_str())
            .unwrap_or(NOT_FOUND_COMMODITY.name.as_str())
    }
}

impl Deref for ClassStockNode<'_> {
    type Target = ClassStock;

    fn deref(&self) -> &ClassStock {
        self.record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn commodity(id: i64, name: &str) -> Commodity {
        Commodity {
            id,
            name: name.into(),
            ..Commodity::default()
        }
    }

    fn industry(id: i64, name: &str) -> Industry {
        Industry {
            id,
            name: name.into(),
            ..Industry::default()
        }
    }

    fn istock(
        id: i64,
        industry_id: i64,
        commodity_id: i64,
        usage: &str,
        origin: &str,
        size: i64,
    ) -> IndustryStock {
        IndustryStock {
            id,
            industry_id,
            commodity_id,
            usage_type: usage.into(),
            origin: origin.into(),
            size: Decimal::new(size, 0),
            ..IndustryStock::default()
        }
    }

    fn cstock(id: i64, class_id: i64, commodity_id: i64, usage: &str) -> ClassStock {
        ClassStock {
            id,
            class_id,
            commodity_id,
            usage_type: usage.into(),
            ..ClassStock::default()
        }
    }

    fn two_departments() -> Stage {
        Stage {
            commodities: vec![
                commodity(1, "MeansOfProduction"),
                commodity(2, "Money"),
                commodity(3, "LabourPower"),
            ],
            industries: vec![industry(10, "DeptI"), industry(11, "DeptII")],
            industry_stocks: vec![
                istock(100, 10, 2, "Money", "MONEY", 100),
                istock(101, 10, 1, "Sales", "INDUSTRIAL", 50),
                istock(102, 10, 3, "Production", "SOCIAL", 10),
                istock(103, 10, 1, "Production", "INDUSTRIAL", 20),
                istock(104, 11, 2, "Money", "MONEY", 70),
                istock(105, 11, 1, "Sales", "INDUSTRIAL", 5),
            ],
            ..Stage::default()
        }
    }

    #[test]
    fn two_departments_scenario() {
        let linked = link(two_departments());
        let dept = linked.industry(10).expect("DeptI");
        assert_eq!(dept.money().unwrap().size, Decimal::new(100, 0));
        assert_eq!(
            dept.sales().unwrap().commodity().unwrap().name,
            "MeansOfProduction"
        );
        assert_eq!(dept.variable().unwrap().size, Decimal::new(10, 0));
        let constant = dept.constant();
        assert_eq!(constant.len(), 1);
        assert_eq!(constant[0].size, Decimal::new(20, 0));
        assert_eq!(dept.commodity().unwrap().name, "MeansOfProduction");
        assert!(linked.report().is_clean(), "{:?}", linked.report());
    }

    #[test]
    fn industries_without_production_stocks_get_empty_constant_list() {
        let linked = link(two_departments());
        let dept = linked.industry(11).unwrap();
        assert!(dept.constant().is_empty());
        assert!(dept.variable().is_none());
        assert_eq!(dept.variable_or_placeholder().name, "NOT FOUND");
    }

    #[test]
    fn stocks_point_back_to_owner_and_commodity() {
        let linked = link(two_departments());
        let s = linked.industry_stock(102).unwrap();
        assert_eq!(s.industry().unwrap().name, "DeptI");
        assert_eq!(s.industry_name(), "DeptI");
        assert_eq!(s.commodity_name(), "LabourPower");
    }

    #[test]
    fn unresolved_keys_yield_none_and_are_reported() {
        let mut stage = two_departments();
        stage.industry_stocks.push(istock(200, 99, 1, "Money", "MONEY", 1));
        stage.industry_stocks.push(istock(201, 11, 77, "Production", "INDUSTRIAL", 1));
        let linked = link(stage);

        let orphan = linked.industry_stock(200).unwrap();
        assert!(orphan.industry().is_none());
        assert_eq!(orphan.industry_name(), "NOT FOUND");
        let dangling = linked.industry_stock(201).unwrap();
        assert!(dangling.commodity().is_none());
        assert_eq!(dangling.industry().unwrap().name, "DeptII");

        let issues = &linked.report().issues;
        assert!(issues.contains(&IntegrityIssue::UnresolvedOwner {
            table: TableName::IndustryStocks,
            stock_id: 200,
            owner_id: 99,
        }));
        assert!(issues.contains(&IntegrityIssue::UnresolvedCommodity {
            table: TableName::IndustryStocks,
            stock_id: 201,
            commodity_id: 77,
        }));
    }

    #[test]
    fn lookups_of_missing_ids_return_placeholders() {
        let linked = link(two_departments());
        assert!(linked.industry(4242).is_none());
        assert_eq!(linked.industry_or_placeholder(4242).name, "NOT FOUND");
        assert_eq!(
            linked.commodity_or_placeholder(4242).size,
            Decimal::NEGATIVE_ONE
        );
        assert_eq!(linked.class_or_placeholder(1).name, "NOT FOUND");
        assert_eq!(
            linked.industry_stock_or_placeholder(9).size,
            Decimal::NEGATIVE_ONE
        );
        assert_eq!(linked.class_stock_or_placeholder(9).usage_type, "PROGRAMME ERROR");
    }

    #[test]
    fn unknown_usage_types_are_reported_but_not_fatal() {
        let mut stage = two_departments();
        stage.industry_stocks.push(istock(300, 10, 1, "Speculation", "INDUSTRIAL", 3));
        let linked = link(stage);
        let dept = linked.industry(10).unwrap();
        assert_eq!(dept.constant().len(), 1);
        assert!(linked.report().issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::UnknownUsage { stock_id: 300, .. }
        )));
        // The stock still knows its owner.
        assert_eq!(linked.industry_stock(300).unwrap().industry_name(), "DeptI");
    }

    #[test]
    fn duplicate_money_stock_keeps_the_first() {
        let mut stage = two_departments();
        stage.industry_stocks.push(istock(400, 10, 2, "Money", "MONEY", 999));
        let linked = link(stage);
        assert_eq!(linked.industry(10).unwrap().money().unwrap().id, 100);
        assert!(linked.report().issues.contains(&IntegrityIssue::DuplicateSlot {
            table: TableName::Industries,
            owner_id: 10,
            slot: "money",
            stock_id: 400,
        }));
    }

    #[test]
    fn classes_link_money_sales_and_consumption() {
        let stage = Stage {
            commodities: vec![
                commodity(1, "Necessities"),
                commodity(2, "Money"),
                commodity(3, "LabourPower"),
            ],
            classes: vec![Class {
                id: 5,
                name: "Workers".into(),
                ..Class::default()
            }],
            class_stocks: vec![
                cstock(50, 5, 2, "Money"),
                cstock(51, 5, 3, "Sales"),
                cstock(52, 5, 1, "Consumption"),
                cstock(53, 5, 1, "Consumption"),
                cstock(54, 5, 1, "Production"),
            ],
            ..Stage::default()
        };
        let linked = link(stage);
        let workers = linked.class(5).unwrap();
        assert_eq!(workers.money().unwrap().id, 50);
        assert_eq!(workers.sales().unwrap().id, 51);
        let consumption: Vec<i64> = workers.consumption().iter().map(|s| s.id).collect();
        assert_eq!(consumption, vec![52, 53]);
        assert_eq!(workers.commodity().unwrap().name, "LabourPower");
        assert_eq!(linked.class_stock(52).unwrap().class_name(), "Workers");
        assert!(linked.report().issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::UnknownUsage { stock_id: 54, .. }
        )));
    }

    #[test]
    fn unresolved_class_stock_keys_yield_none_and_are_reported() {
        let stage = Stage {
            commodities: vec![commodity(1, "Necessities"), commodity(2, "Money")],
            classes: vec![Class {
                id: 5,
                name: "Capitalists".into(),
                ..Class::default()
            }],
            class_stocks: vec![
                cstock(60, 5, 2, "Money"),
                cstock(61, 5, 1, "Sales"),
                cstock(62, 99, 1, "Consumption"),
                cstock(63, 5, 77, "Consumption"),
            ],
            ..Stage::default()
        };
        let linked = link(stage);

        let orphan = linked.class_stock(62).unwrap();
        assert!(orphan.class().is_none());
        assert_eq!(orphan.class_name(), "NOT FOUND");
        assert_eq!(orphan.commodity_name(), "Necessities");
        let dangling = linked.class_stock(63).unwrap();
        assert!(dangling.commodity().is_none());
        assert_eq!(dangling.commodity_name(), "NOT FOUND");
        assert_eq!(dangling.class().unwrap().name, "Capitalists");

        // The orphan is not attached to any class; the dangling stock still is.
        let owner = linked.class(5).unwrap();
        let consumption: Vec<i64> = owner.consumption().iter().map(|s| s.id).collect();
        assert_eq!(consumption, vec![63]);

        let issues = &linked.report().issues;
        assert_eq!(issues.len(), 2, "{issues:?}");
        assert!(issues.contains(&IntegrityIssue::UnresolvedOwner {
            table: TableName::ClassStocks,
            stock_id: 62,
            owner_id: 99,
        }));
        assert!(issues.contains(&IntegrityIssue::UnresolvedCommodity {
            table: TableName::ClassStocks,
            stock_id: 63,
            commodity_id: 77,
        }));
    }

    #[test]
    fn lookups_by_id_return_the_first_of_duplicates() {
        let mut stage = two_departments();
        stage.industries.push(industry(10, "Shadow"));
        stage.commodities.push(commodity(2, "Gold"));
        let linked = link(stage);
        assert_eq!(linked.industry(10).unwrap().name, "DeptI");
        assert_eq!(linked.industry(11).unwrap().name, "DeptII");
        assert_eq!(linked.commodity(2).unwrap().name, "Money");
        assert_eq!(linked.industry_stock(104).unwrap().industry_name(), "DeptII");
        assert!(linked.report().issues.contains(&IntegrityIssue::DuplicateId {
            table: TableName::Industries,
            id: 10,
        }));

        // The index is rebuilt from the tables, not serialized with them.
        let json = serde_json::to_value(&linked).unwrap();
        assert!(json.get("ids").is_none());
    }

    #[test]
    fn missing_slots_are_reported_only_when_stocks_arrived() {
        let stage = Stage {
            industries: vec![industry(1, "Lonely")],
            ..Stage::default()
        };
        let linked = link(stage.clone());
        assert_eq!(linked.report().issues.len(), 2);

        let mut partial = stage;
        partial.mark_failed(TableName::IndustryStocks);
        assert!(link(partial).report().is_clean());
    }

    /// Per industry: one money, one sales, optional variable, some constants.
    fn well_formed_stage() -> impl Strategy<Value = Stage> {
        prop::collection::vec((any::<bool>(), 0usize..4), 1..8).prop_flat_map(|shape| {
            let commodities = vec![
                commodity(1, "Money"),
                commodity(2, "Means"),
                commodity(3, "Labour"),
            ];
            let mut industries = Vec::new();
            let mut stocks = Vec::new();
            let mut next_id = 1000;
            for (i, (has_variable, constants)) in shape.iter().enumerate() {
                let iid = i as i64 + 1;
                industries.push(industry(iid, &format!("I{iid}")));
                let mut push = |usage: &str, origin: &str, com: i64| {
                    next_id += 1;
                    stocks.push(istock(next_id, iid, com, usage, origin, next_id));
                };
                push("Money", "MONEY", 1);
                push("Sales", "INDUSTRIAL", 2);
                if *has_variable {
                    push("Production", "SOCIAL", 3);
                }
                for _ in 0..*constants {
                    push("Production", "INDUSTRIAL", 2);
                }
            }
            Just(stocks).prop_shuffle().prop_map(move |industry_stocks| Stage {
                commodities: commodities.clone(),
                industries: industries.clone(),
                industry_stocks,
                ..Stage::default()
            })
        })
    }

    proptest! {
        #[test]
        fn every_stock_lands_in_exactly_one_slot(stage in well_formed_stage()) {
            let linked = link(stage);
            prop_assert!(linked.report().is_clean());
            for stock in linked.industry_stocks() {
                let owner = stock.industry().unwrap();
                let mut hits = 0;
                for slot in [owner.money(), owner.sales(), owner.variable()].into_iter().flatten() {
                    if slot.id == stock.id { hits += 1; }
                }
                hits += owner.constant().iter().filter(|s| s.id == stock.id).count();
                prop_assert_eq!(hits, 1);
                let expected = match (stock.usage(), stock.origin()) {
                    (StockUsage::Money, _) => owner.money().map(|s| s.id),
                    (StockUsage::Sales, _) => owner.sales().map(|s| s.id),
                    (StockUsage::Production, Origin::Social) => owner.variable().map(|s| s.id),
                    _ => owner.constant().iter().find(|s| s.id == stock.id).map(|s| s.id),
                };
                prop_assert_eq!(expected, Some(stock.id));
            }
            for ind in linked.industries() {
                let via_sales = ind.sales().and_then(|s| s.commodity()).map(|c| c.id);
                prop_assert_eq!(ind.commodity().map(|c| c.id), via_sales);
            }
        }
    }
}
