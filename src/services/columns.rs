//! Column-role classifier.
//!
//! Roles come from case-insensitive substring matches on the column name.
//! This is a heuristic: no match, or several matches, is a normal outcome.

use super::table::{Column, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Temporal,
    Monetary,
    Sales,
    Customer,
    Segment,
    Product,
    Region,
}

pub const ALL_ROLES: [ColumnRole; 7] = [
    ColumnRole::Temporal,
    ColumnRole::Monetary,
    ColumnRole::Sales,
    ColumnRole::Customer,
    ColumnRole::Segment,
    ColumnRole::Product,
    ColumnRole::Region,
];

impl ColumnRole {
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            ColumnRole::Temporal => &["date", "time"],
            ColumnRole::Monetary => &["revenue", "price"],
            ColumnRole::Sales => &["sales"],
            ColumnRole::Customer => &["customer"],
            ColumnRole::Segment => &["segment"],
            ColumnRole::Product => &["product", "category"],
            ColumnRole::Region => &["region", "location"],
        }
    }

    pub fn matches(self, column_name: &str) -> bool {
        let lower = column_name.to_lowercase();
        self.keywords().iter().any(|k| lower.contains(k))
    }
}

/// Every role a column name matches, in `ALL_ROLES` order.
pub fn classify(column_name: &str) -> Vec<ColumnRole> {
    ALL_ROLES
        .iter()
        .copied()
        .filter(|role| role.matches(column_name))
        .collect()
}

/// Columns matching any of `roles`, in table order.
pub fn candidates<'a>(table: &'a Table, roles: &[ColumnRole]) -> Vec<&'a Column> {
    table
        .columns()
        .iter()
        .filter(|c| classify(c.name()).iter().any(|r| roles.contains(r)))
        .collect()
}

pub fn first_candidate<'a>(table: &'a Table, roles: &[ColumnRole]) -> Option<&'a Column> {
    candidates(table, roles).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("Order_Date"), vec![ColumnRole::Temporal]);
        assert_eq!(classify("UNIT_PRICE"), vec![ColumnRole::Monetary]);
        assert!(classify("quantity").is_empty());
    }

    #[test]
    fn test_classify_multiple_roles() {
        assert_eq!(
            classify("customer_segment"),
            vec![ColumnRole::Customer, ColumnRole::Segment]
        );
        assert_eq!(
            classify("sales_revenue"),
            vec![ColumnRole::Monetary, ColumnRole::Sales]
        );
    }

    #[test]
    fn test_candidates_follow_table_order() {
        let table = Table::new(vec![
            Column::numeric("price", vec![Some(1.0)]),
            Column::text("product", vec![Some("a".into())]),
            Column::numeric("revenue", vec![Some(2.0)]),
        ])
        .unwrap();

        let names: Vec<&str> = candidates(&table, &[ColumnRole::Monetary])
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["price", "revenue"]);
        assert!(first_candidate(&table, &[ColumnRole::Region]).is_none());
    }
}
