//! Natural-language insight and recommendation records.
//!
//! Each signal is driven by a column-role match and reports a fixed
//! confidence. A signal with no matching column contributes nothing.

use serde::Serialize;

use super::columns::{first_candidate, ColumnRole};
use super::statistics::{mean, value_counts};
use super::table::{CellValue, Column, Table};

const REVENUE_INSIGHT_CONFIDENCE: u8 = 92;
const CUSTOMER_INSIGHT_CONFIDENCE: u8 = 88;
const PRODUCT_INSIGHT_CONFIDENCE: u8 = 85;
const CLEAN_DATA_CONFIDENCE: u8 = 98;
const CLEANED_DATA_CONFIDENCE: u8 = 95;
const REGION_INSIGHT_CONFIDENCE: u8 = 89;

const REVENUE_RECOMMENDATION_CONFIDENCE: u8 = 88;
const CATEGORY_RECOMMENDATION_CONFIDENCE: u8 = 85;
const QUALITY_RECOMMENDATION_CONFIDENCE: u8 = 92;
const SCALE_RECOMMENDATION_CONFIDENCE: u8 = 79;

/// Rows above which the scale recommendation fires.
const SCALE_THRESHOLD_ROWS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub icon: String,
    pub text: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub icon: String,
    pub title: String,
    pub detail: String,
    pub confidence: u8,
}

fn insight(icon: &str, text: String, confidence: u8) -> Insight {
    Insight { icon: icon.to_string(), text, confidence }
}

/// Most frequent value of a text column and its share of all rows.
fn dominant_text(column: &Column, rows: usize) -> Option<(CellValue, f64)> {
    column.as_text()?;
    let (top, count) = value_counts(column.data()).into_iter().next()?;
    Some((top, count as f64 / rows as f64 * 100.0))
}

/// Insights over the cleaned table, plus a data-quality note comparing it
/// with the raw table.
pub fn generate_insights(raw: &Table, cleaned: &Table) -> Vec<Insight> {
    [
        revenue_insight(cleaned),
        customer_insight(cleaned),
        product_insight(cleaned),
        Some(quality_insight(raw)),
        region_insight(cleaned),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn revenue_insight(table: &Table) -> Option<Insight> {
    let column = first_candidate(table, &[ColumnRole::Monetary])?;
    let data = column.present_numbers();
    let avg = mean(&data)?;
    let high = data.iter().filter(|v| **v > avg * 1.2).count();
    let pct = high as f64 / data.len() as f64 * 100.0;

    Some(insight(
        "💰",
        format!(
            "Revenue analysis shows average of ${:.2} per transaction. {} high-value transactions ({:.0}% above 20% average) identified, representing significant growth opportunities.",
            avg, high, pct
        ),
        REVENUE_INSIGHT_CONFIDENCE,
    ))
}

fn customer_insight(table: &Table) -> Option<Insight> {
    let column = first_candidate(table, &[ColumnRole::Customer, ColumnRole::Segment])?;
    let (top, pct) = dominant_text(column, table.row_count())?;

    Some(insight(
        "👥",
        format!(
            "Customer segmentation reveals {} as the dominant segment ({:.1}% of total). Focus marketing efforts on this high-value segment for maximum ROI.",
            top, pct
        ),
        CUSTOMER_INSIGHT_CONFIDENCE,
    ))
}

fn product_insight(table: &Table) -> Option<Insight> {
    let column = first_candidate(table, &[ColumnRole::Product])?;
    let (top, pct) = dominant_text(column, table.row_count())?;

    Some(insight(
        "📦",
        format!(
            "Product analysis indicates {} leads with {:.1}% market share. Consider expanding this product line and analyzing success factors for replication across other products.",
            top, pct
        ),
        PRODUCT_INSIGHT_CONFIDENCE,
    ))
}

fn quality_insight(raw: &Table) -> Insight {
    match raw.missing_count() {
        0 => insight(
            "✅",
            "Data quality is excellent with no missing values detected. Dataset is ready for advanced analytics and predictive modeling with high confidence.".to_string(),
            CLEAN_DATA_CONFIDENCE,
        ),
        missing => insight(
            "🔍",
            format!(
                "Data quality improvement: Successfully cleaned {} missing values using advanced imputation techniques. Dataset reliability increased significantly for accurate predictive modeling.",
                missing
            ),
            CLEANED_DATA_CONFIDENCE,
        ),
    }
}

fn region_insight(table: &Table) -> Option<Insight> {
    let column = first_candidate(table, &[ColumnRole::Region])?;
    let (top, pct) = dominant_text(column, table.row_count())?;

    Some(insight(
        "🌍",
        format!(
            "Geographic analysis shows {} region dominates with {:.1}% of activity. Consider region-specific strategies and investigate expansion opportunities in underperforming areas.",
            top, pct
        ),
        REGION_INSIGHT_CONFIDENCE,
    ))
}

/// Business recommendations over the active (cleaned if present) table.
pub fn generate_recommendations(table: &Table) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some(column) = first_candidate(table, &[ColumnRole::Monetary, ColumnRole::Sales]) {
        let data = column.present_numbers();
        if let Some(avg) = mean(&data) {
            let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let high = data.iter().filter(|v| **v > avg * 1.5).count();
            let pct = high as f64 / data.len() as f64 * 100.0;

            recommendations.push(Recommendation {
                icon: "💰".to_string(),
                title: format!(
                    "Focus on high-value transactions ({:.1}% generate 50%+ above average)",
                    pct
                ),
                detail: format!(
                    "Average: ${:.2} | Top: ${:.2} | Potential: +${:.2}",
                    avg,
                    max,
                    avg * 0.15
                ),
                confidence: REVENUE_RECOMMENDATION_CONFIDENCE,
            });
        }
    }

    if let Some(column) = first_candidate(table, &[ColumnRole::Product, ColumnRole::Segment]) {
        if let Some((top, count)) = value_counts(column.data()).into_iter().next() {
            let pct = count as f64 / table.row_count() as f64 * 100.0;
            recommendations.push(Recommendation {
                icon: "📊".to_string(),
                title: format!("Expand \"{}\" category ({:.1}% market share)", top, pct),
                detail: format!(
                    "{} records | Growth potential: {} units | High demand segment",
                    count,
                    (count as f64 * 0.25) as usize
                ),
                confidence: CATEGORY_RECOMMENDATION_CONFIDENCE,
            });
        }
    }

    let missing = table.missing_count();
    if missing > 0 {
        recommendations.push(Recommendation {
            icon: "🔍".to_string(),
            title: format!("Improve data collection processes ({} values to validate)", missing),
            detail: "Better data quality = Better predictions | Implement validation at source".to_string(),
            confidence: QUALITY_RECOMMENDATION_CONFIDENCE,
        });
    }

    let rows = table.row_count();
    if rows > SCALE_THRESHOLD_ROWS {
        recommendations.push(Recommendation {
            icon: "📈".to_string(),
            title: format!(
                "Scale operations to handle {}+ more transactions",
                (rows as f64 * 0.18) as usize
            ),
            detail: format!(
                "Current: {} records | Historical growth suggests capacity planning needed",
                rows
            ),
            confidence: SCALE_RECOMMENDATION_CONFIDENCE,
        });
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cleaner::{clean, CleaningOptions};
    use crate::services::sample_data::{generate, SampleKind};

    fn shop() -> Table {
        Table::new(vec![
            Column::numeric("price", vec![Some(10.0), Some(10.0), Some(10.0), Some(50.0)]),
            Column::text(
                "product",
                vec![Some("Mouse".into()), Some("Laptop".into()), Some("Mouse".into()), None],
            ),
            Column::text(
                "region",
                vec![Some("East".into()), Some("East".into()), Some("West".into()), Some("East".into())],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_insights_for_matching_columns() {
        let table = shop();
        let insights = generate_insights(&table, &table);
        let confidences: Vec<u8> = insights.iter().map(|i| i.confidence).collect();
        assert_eq!(confidences, vec![92, 85, 95, 89]);

        assert_eq!(
            insights[0].text,
            "Revenue analysis shows average of $20.00 per transaction. 1 high-value transactions (25% above 20% average) identified, representing significant growth opportunities."
        );
        assert!(insights[1].text.starts_with("Product analysis indicates Mouse leads with 50.0% market share."));
        assert!(insights[3].text.starts_with("Geographic analysis shows East region dominates with 75.0%"));
    }

    #[test]
    fn test_quality_insight_without_missing_values() {
        let table = Table::new(vec![Column::numeric("quantity", vec![Some(1.0)])]).unwrap();
        let insights = generate_insights(&table, &table);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].confidence, 98);
        assert_eq!(insights[0].icon, "✅");
    }

    #[test]
    fn test_numeric_customer_column_is_not_a_segment() {
        let table = Table::new(vec![Column::numeric("customer_id", vec![Some(1.0), Some(2.0)])]).unwrap();
        let insights = generate_insights(&table, &table);
        assert!(insights.iter().all(|i| i.confidence != 88));
    }

    #[test]
    fn test_recommendations() {
        let recs = generate_recommendations(&shop());
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].title, "Focus on high-value transactions (25.0% generate 50%+ above average)");
        assert_eq!(recs[0].detail, "Average: $20.00 | Top: $50.00 | Potential: +$3.00");
        assert_eq!(recs[1].title, "Expand \"Mouse\" category (50.0% market share)");
        assert_eq!(recs[1].detail, "2 records | Growth potential: 0 units | High demand segment");
        assert_eq!(recs[2].confidence, 92);
    }

    #[test]
    fn test_sales_sample_recommendations() {
        let raw = generate(SampleKind::Sales, 500, 42).unwrap();
        let (cleaned, _) = clean(&raw, &CleaningOptions::default()).unwrap();

        let recs = generate_recommendations(&cleaned);
        let confidences: Vec<u8> = recs.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![88, 85, 79]);
        assert_eq!(recs[2].title, "Scale operations to handle 90+ more transactions");

        let insights = generate_insights(&raw, &cleaned);
        assert!(insights.iter().any(|i| i.confidence == 95));
    }

    #[test]
    fn test_no_matches_contributes_nothing() {
        let table = Table::new(vec![Column::numeric("x", vec![Some(1.0)])]).unwrap();
        assert!(generate_recommendations(&table).is_empty());
    }
}
