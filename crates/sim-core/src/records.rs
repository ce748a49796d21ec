//! Records of the five snapshot tables, as the simulation API sends them.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a commodity comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Industrial,
    Social,
    Money,
    /// Anything else the API sends; a schema-drift signal.
    Unknown,
}

impl Origin {
    pub fn parse(raw: &str) -> Origin {
        match raw {
            "INDUSTRIAL" => Origin::Industrial,
            "SOCIAL" => Origin::Social,
            "MONEY" => Origin::Money,
            _ => Origin::Unknown,
        }
    }
}

/// Purpose for which a stock is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockUsage {
    Money,
    Production,
    Sales,
    Consumption,
    /// Unrecognized `usage_type`. Treated as a data-integrity error by the linker.
    Unknown,
}

impl StockUsage {
    pub fn parse(raw: &str) -> StockUsage {
        match raw {
            "Money" => StockUsage::Money,
            "Production" => StockUsage::Production,
            "Sales" => StockUsage::Sales,
            "Consumption" => StockUsage::Consumption,
            _ => StockUsage::Unknown,
        }
    }
}

/// Anything with an integer identity inside one snapshot.
pub trait Record {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

/// A commodity: anything that is produced, consumed or circulates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commodity {
    pub id: i64,
    pub name: String,
    pub simulation_id: i64,
    pub username: String,
    /// INDUSTRIAL, SOCIAL or MONEY.
    pub origin: String,
    pub usage: String,
    pub size: Decimal,
    pub total_value: Decimal,
    pub total_price: Decimal,
    pub unit_value: Decimal,
    pub unit_price: Decimal,
    pub turnover_time: Decimal,
    pub demand: Decimal,
    pub supply: Decimal,
    pub allocation_ratio: Decimal,
    pub display_order: Decimal,
    pub image_name: String,
    pub tooltip: String,
    pub monetarily_effective_demand: Decimal,
    pub investment_proportion: Decimal,
}

impl Commodity {
    pub fn origin(&self) -> Origin {
        Origin::parse(&self.origin)
    }
}

/// An industry (a branch of production).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Industry {
    pub id: i64,
    pub name: String,
    pub simulation_id: i64,
    pub username: String,
    /// Name of the output commodity, as reported by the API.
    pub output: String,
    pub output_scale: Decimal,
    pub output_growth_rate: Decimal,
    pub initial_capital: Decimal,
    pub work_in_progress: Decimal,
    pub current_capital: Decimal,
    pub profit: Decimal,
    pub profit_rate: Decimal,
}

/// A social class.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub simulation_id: i64,
    pub username: String,
    pub output: String,
    pub population: Decimal,
    pub participation_ratio: Decimal,
    pub consumption_ratio: Decimal,
    pub revenue: Decimal,
    pub assets: Decimal,
}

/// A stock owned by an industry. Relations are foreign keys until linked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndustryStock {
    pub id: i64,
    pub simulation_id: i64,
    pub industry_id: i64,
    pub commodity_id: i64,
    pub username: String,
    pub name: String,
    /// Money, Production or Sales.
    pub usage_type: String,
    /// SOCIAL marks variable capital among Production stocks.
    pub origin: String,
    pub size: Decimal,
    pub value: Decimal,
    pub price: Decimal,
    pub requirement: Decimal,
    pub demand: Decimal,
}

impl IndustryStock {
    pub fn usage(&self) -> StockUsage {
        StockUsage::parse(&self.usage_type)
    }

    pub fn origin(&self) -> Origin {
        Origin::parse(&self.origin)
    }
}

/// A stock owned by a social class.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassStock {
    pub id: i64,
    pub simulation_id: i64,
    pub class_id: i64,
    pub commodity_id: i64,
    pub username: String,
    pub name: String,
    /// Money, Consumption or Sales.
    pub usage_type: String,
    pub size: Decimal,
    pub value: Decimal,
    pub price: Decimal,
    pub requirement: Decimal,
    pub demand: Decimal,
}

impl ClassStock {
    pub fn usage(&self) -> StockUsage {
        StockUsage::parse(&self.usage_type)
    }
}

macro_rules! impl_record {
    ($($t:ty),*) => {
        $(impl Record for $t {
            fn id(&self) -> i64 {
                self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_record!(Commodity, Industry, Class, IndustryStock, ClassStock);

const NOT_FOUND: &str = "NOT FOUND";
const PROGRAMME_ERROR: &str = "PROGRAMME ERROR";
const UNDEFINED: &str = "UNDEFINED";

/// Placeholder returned by lookups that find no commodity.
pub static NOT_FOUND_COMMODITY: Lazy<Commodity> = Lazy::new(|| Commodity {
    name: NOT_FOUND.to_string(),
    origin: UNDEFINED.to_string(),
    usage: UNDEFINED.to_string(),
    size: Decimal::NEGATIVE_ONE,
    total_value: Decimal::NEGATIVE_ONE,
    total_price: Decimal::NEGATIVE_ONE,
    unit_value: Decimal::NEGATIVE_ONE,
    unit_price: Decimal::NEGATIVE_ONE,
    turnover_time: Decimal::NEGATIVE_ONE,
    demand: Decimal::NEGATIVE_ONE,
    supply: Decimal::NEGATIVE_ONE,
    allocation_ratio: Decimal::NEGATIVE_ONE,
    display_order: Decimal::NEGATIVE_ONE,
    image_name: UNDEFINED.to_string(),
    tooltip: UNDEFINED.to_string(),
    monetarily_effective_demand: Decimal::NEGATIVE_ONE,
    investment_proportion: Decimal::NEGATIVE_ONE,
    ..Commodity::default()
});

/// Placeholder returned by lookups that find no industry.
pub static NOT_FOUND_INDUSTRY: Lazy<Industry> = Lazy::new(|| Industry {
    name: NOT_FOUND.to_string(),
    username: UNDEFINED.to_string(),
    output: UNDEFINED.to_string(),
    output_scale: Decimal::NEGATIVE_ONE,
    output_growth_rate: Decimal::NEGATIVE_ONE,
    initial_capital: Decimal::NEGATIVE_ONE,
    work_in_progress: Decimal::NEGATIVE_ONE,
    current_capital: Decimal::NEGATIVE_ONE,
    profit: Decimal::NEGATIVE_ONE,
    profit_rate: Decimal::NEGATIVE_ONE,
    ..Industry::default()
});

/// Placeholder returned by lookups that find no class.
pub static NOT_FOUND_CLASS: Lazy<Class> = Lazy::new(|| Class {
    name: NOT_FOUND.to_string(),
    username: UNDEFINED.to_string(),
    output: UNDEFINED.to_string(),
    population: Decimal::NEGATIVE_ONE,
    participation_ratio: Decimal::NEGATIVE_ONE,
    consumption_ratio: Decimal::NEGATIVE_ONE,
    revenue: Decimal::NEGATIVE_ONE,
    assets: Decimal::NEGATIVE_ONE,
    ..Class::default()
});

/// Placeholder returned by lookups that find no industry stock.
pub static NOT_FOUND_INDUSTRY_STOCK: Lazy<IndustryStock> = Lazy::new(|| IndustryStock {
    name: NOT_FOUND.to_string(),
    usage_type: PROGRAMME_ERROR.to_string(),
    origin: UNDEFINED.to_string(),
    size: Decimal::NEGATIVE_ONE,
    value: Decimal::NEGATIVE_ONE,
    price: Decimal::NEGATIVE_ONE,
    requirement: Decimal::NEGATIVE_ONE,
    demand: Decimal::NEGATIVE_ONE,
    ..IndustryStock::default()
});

/// Placeholder returned by lookups that find no class stock.
pub static NOT_FOUND_CLASS_STOCK: Lazy<ClassStock> = Lazy::new(|| ClassStock {
    name: NOT_FOUND.to_string(),
    usage_type: PROGRAMME_ERROR.to_string(),
    size: Decimal::NEGATIVE_ONE,
    value: Decimal::NEGATIVE_ONE,
    price: Decimal::NEGATIVE_ONE,
    requirement: Decimal::NEGATIVE_ONE,
    demand: Decimal::NEGATIVE_ONE,
    ..ClassStock::default()
});

/// True for any of the NOT FOUND placeholders.
pub fn is_not_found<R: Record>(r: &R) -> bool {
    r.id() == 0 && r.name() == NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_api_json_with_floats_and_missing_fields() {
        let raw = r#"{
            "id": 7,
            "simulation_id": 3,
            "industry_id": 2,
            "commodity_id": 1,
            "name": "Labour Power",
            "usage_type": "Production",
            "origin": "SOCIAL",
            "size": 10.5,
            "value": 21,
            "price": 21.0,
            "requirement": 0,
            "demand": 4.25
        }"#;
        let s: IndustryStock = serde_json::from_str(raw).unwrap();
        assert_eq!(s.id, 7);
        assert_eq!(s.usage(), StockUsage::Production);
        assert_eq!(s.origin(), Origin::Social);
        assert_eq!(s.size, Decimal::new(105, 1));
        assert_eq!(s.demand, Decimal::new(425, 2));
        assert!(s.username.is_empty());
    }

    #[test]
    fn unknown_enumerations_map_to_unknown() {
        assert_eq!(StockUsage::parse("Speculation"), StockUsage::Unknown);
        assert_eq!(Origin::parse("ALIEN"), Origin::Unknown);
        assert_eq!(Origin::parse("MONEY"), Origin::Money);
    }

    #[test]
    fn sentinels_carry_negative_numbers() {
        let s = &*NOT_FOUND_INDUSTRY_STOCK;
        assert_eq!(s.name, "NOT FOUND");
        assert_eq!(s.size, Decimal::NEGATIVE_ONE);
        assert_eq!(s.demand, Decimal::NEGATIVE_ONE);
        assert!(is_not_found(s));
        assert!(is_not_found(&*NOT_FOUND_COMMODITY));
        assert_eq!(NOT_FOUND_CLASS.population, Decimal::NEGATIVE_ONE);
        assert!(!is_not_found(&Commodity {
            id: 1,
            name: "Corn".into(),
            ..Commodity::default()
        }));
    }
}
