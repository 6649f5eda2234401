//! Seeded demo datasets with realistic gaps.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use super::table::{Column, Table};
use crate::error::AnalyticsError;

pub const MAX_SAMPLE_SIZE: usize = 100_000;

const PRODUCTS: [&str; 7] = ["Laptop", "Mouse", "Keyboard", "Monitor", "Tablet", "Phone", "Headphones"];
const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const SEGMENTS: [&str; 3] = ["Enterprise", "SMB", "Startup"];
const CATEGORIES: [&str; 3] = ["Electronics", "Office", "Accessories"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Sales,
    Customers,
    Inventory,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Sales => "sales",
            SampleKind::Customers => "customers",
            SampleKind::Inventory => "inventory",
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sales" => Ok(SampleKind::Sales),
            "customers" => Ok(SampleKind::Customers),
            "inventory" => Ok(SampleKind::Inventory),
            other => Err(AnalyticsError::validation(format!(
                "Unknown data type '{}'. Use sales, customers, or inventory",
                other
            ))),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn pick(rng: &mut StdRng, options: &[&str]) -> Option<String> {
    options.choose(rng).map(|s| s.to_string())
}

/// `None` with probability `rate`, otherwise whatever `value` yields.
fn gap<T>(rng: &mut StdRng, rate: f64, value: impl FnOnce(&mut StdRng) -> T) -> Option<T> {
    if rng.gen::<f64>() < rate {
        None
    } else {
        Some(value(rng))
    }
}

pub fn generate(kind: SampleKind, size: usize, seed: u64) -> Result<Table, AnalyticsError> {
    if size == 0 || size > MAX_SAMPLE_SIZE {
        return Err(AnalyticsError::validation(format!(
            "size must be between 1 and {}",
            MAX_SAMPLE_SIZE
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let columns = match kind {
        SampleKind::Sales => sales(&mut rng, size),
        SampleKind::Customers => customers(&mut rng, size),
        SampleKind::Inventory => inventory(&mut rng, size),
    };
    Table::new(columns)
}

fn sales(rng: &mut StdRng, size: usize) -> Vec<Column> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();

    let mut id = Vec::with_capacity(size);
    let mut product = Vec::with_capacity(size);
    let mut quantity = Vec::with_capacity(size);
    let mut price = Vec::with_capacity(size);
    let mut region = Vec::with_capacity(size);
    let mut date = Vec::with_capacity(size);
    let mut revenue = Vec::with_capacity(size);
    let mut customer_id = Vec::with_capacity(size);

    for i in 0..size {
        let qty = rng.gen_range(1..=50) as f64;
        let unit = round2(rng.gen_range(100.0..1100.0));

        id.push(Some((i + 1) as f64));
        product.push(pick(rng, &PRODUCTS));
        quantity.push(Some(qty));
        price.push(Some(unit));
        region.push(pick(rng, &REGIONS));
        let day = start + Duration::days(rng.gen_range(0..=365));
        date.push(Some(day.format("%Y-%m-%d").to_string()));
        revenue.push(if rng.gen::<f64>() > 0.15 { Some(round2(unit * qty)) } else { None });
        customer_id.push(gap(rng, 0.1, |r| r.gen_range(1..=1000) as f64));
    }

    vec![
        Column::numeric("id", id),
        Column::text("product", product),
        Column::numeric("quantity", quantity),
        Column::numeric("price", price),
        Column::text("region", region),
        Column::text("date", date),
        Column::numeric("revenue", revenue),
        Column::numeric("customer_id", customer_id),
    ]
}

fn customers(rng: &mut StdRng, size: usize) -> Vec<Column> {
    let mut customer_id = Vec::with_capacity(size);
    let mut name = Vec::with_capacity(size);
    let mut segment = Vec::with_capacity(size);
    let mut ltv = Vec::with_capacity(size);
    let mut acquisition_cost = Vec::with_capacity(size);
    let mut churn_risk = Vec::with_capacity(size);

    for i in 0..size {
        customer_id.push(Some((i + 1) as f64));
        name.push(Some(format!("Customer {}", i + 1)));
        segment.push(pick(rng, &SEGMENTS));
        ltv.push(Some(round2(rng.gen_range(5000.0..55000.0))));
        acquisition_cost.push(gap(rng, 0.15, |r| round2(r.gen_range(100.0..2100.0))));
        churn_risk.push(gap(rng, 0.2, |r| round2(r.gen_range(0.0..0.3))));
    }

    vec![
        Column::numeric("customer_id", customer_id),
        Column::text("name", name),
        Column::text("segment", segment),
        Column::numeric("ltv", ltv),
        Column::numeric("acquisition_cost", acquisition_cost),
        Column::numeric("churn_risk", churn_risk),
    ]
}

fn inventory(rng: &mut StdRng, size: usize) -> Vec<Column> {
    let mut sku = Vec::with_capacity(size);
    let mut product_name = Vec::with_capacity(size);
    let mut category = Vec::with_capacity(size);
    let mut stock_level = Vec::with_capacity(size);
    let mut reorder_point = Vec::with_capacity(size);
    let mut unit_cost = Vec::with_capacity(size);

    for i in 0..size {
        sku.push(Some(format!("SKU{}", i + 1)));
        product_name.push(Some(format!("Product {}", i + 1)));
        category.push(pick(rng, &CATEGORIES));
        stock_level.push(Some(rng.gen_range(0..=200) as f64));
        reorder_point.push(gap(rng, 0.1, |r| r.gen_range(10..=60) as f64));
        unit_cost.push(Some(round2(rng.gen_range(1.0..100.0))));
    }

    vec![
        Column::text("sku", sku),
        Column::text("product_name", product_name),
        Column::text("category", category),
        Column::numeric("stock_level", stock_level),
        Column::numeric("reorder_point", reorder_point),
        Column::numeric("unit_cost", unit_cost),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::table::ColumnKind;

    #[test]
    fn test_sales_schema() {
        let table = generate(SampleKind::Sales, 200, 42).unwrap();
        assert_eq!(table.row_count(), 200);
        assert_eq!(
            table.headers(),
            vec!["id", "product", "quantity", "price", "region", "date", "revenue", "customer_id"]
        );
        assert_eq!(table.column("date").unwrap().kind(), ColumnKind::Text);
        assert_eq!(table.column("customer_id").unwrap().kind(), ColumnKind::Numeric);
        assert!(table.column("revenue").unwrap().missing_count() > 0);
        assert_eq!(table.column("price").unwrap().missing_count(), 0);

        let quantities = table.require_numeric("quantity").unwrap();
        assert!(quantities.iter().flatten().all(|q| (1.0..=50.0).contains(q)));
    }

    #[test]
    fn test_same_seed_same_table() {
        for kind in [SampleKind::Sales, SampleKind::Customers, SampleKind::Inventory] {
            assert_eq!(generate(kind, 50, 9).unwrap(), generate(kind, 50, 9).unwrap());
        }
        assert_ne!(
            generate(SampleKind::Sales, 50, 1).unwrap(),
            generate(SampleKind::Sales, 50, 2).unwrap()
        );
    }

    #[test]
    fn test_customer_and_inventory_gaps() {
        let customers = generate(SampleKind::Customers, 400, 42).unwrap();
        assert!(customers.column("churn_risk").unwrap().missing_count() > 0);
        assert_eq!(customers.column("ltv").unwrap().missing_count(), 0);

        let inventory = generate(SampleKind::Inventory, 400, 42).unwrap();
        assert!(inventory.column("reorder_point").unwrap().missing_count() > 0);
        assert_eq!(inventory.column("sku").unwrap().cell(0).to_string(), "SKU1");
    }

    #[test]
    fn test_kind_parsing_and_zero_size() {
        assert_eq!("Sales".parse::<SampleKind>().unwrap(), SampleKind::Sales);
        assert!("weather".parse::<SampleKind>().is_err());
        assert!(matches!(
            generate(SampleKind::Inventory, 0, 42),
            Err(AnalyticsError::Validation(_))
        ));
        assert!(matches!(
            generate(SampleKind::Sales, usize::MAX, 42),
            Err(AnalyticsError::Validation(_))
        ));
    }
}
