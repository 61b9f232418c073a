//! Cost aggregator: raw cost-query rows to a `(resource group, formatted cost)` table.
//!
//! The aggregator is total. A failed query, whatever the cause, becomes exactly
//! one sentinel row; a query result with any malformed row is treated as a
//! failed query so the table is never partially emitted.

use serde_json::Value;

use crate::core::errors::{AcsError, Result};
use crate::cost::{CostQueryResult, CostRow};

/// Resource group label used when the query succeeds with no rows.
pub const NO_USAGE_GROUP: &str = "No Usage";

/// Aggregated cost rows plus the reason the table degraded, if it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostOutcome {
    pub rows: Vec<CostRow>,
    pub degraded: Option<String>,
}

/// Formats query rows with a fixed currency prefix.
#[derive(Debug, Clone)]
pub struct CostAggregator {
    currency_prefix: String,
}

impl CostAggregator {
    #[must_use]
    pub fn new(currency_prefix: impl Into<String>) -> Self {
        Self {
            currency_prefix: currency_prefix.into(),
        }
    }

    /// Turn a query result (or its failure) into cost rows.
    #[must_use]
    pub fn aggregate(&self, result: Result<CostQueryResult>) -> CostOutcome {
        let parsed = result.and_then(|res| self.format_rows(&res));
        match parsed {
            Ok(rows) if rows.is_empty() => CostOutcome {
                rows: vec![CostRow {
                    resource_group: NO_USAGE_GROUP.to_string(),
                    formatted_cost: format_cost(&self.currency_prefix, 0.0),
                }],
                degraded: None,
            },
            Ok(rows) => CostOutcome {
                rows,
                degraded: None,
            },
            Err(err) => CostOutcome {
                rows: vec![CostRow::sentinel()],
                degraded: Some(err.to_string()),
            },
        }
    }

    fn format_rows(&self, result: &CostQueryResult) -> Result<Vec<CostRow>> {
        result
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let (group, cost) = extract_row(index, row)?;
                Ok(CostRow {
                    resource_group: group.to_string(),
                    formatted_cost: format_cost(&self.currency_prefix, cost),
                })
            })
            .collect()
    }
}

/// Aggregate with the given currency prefix, discarding the degradation reason.
#[must_use]
pub fn aggregate(result: Result<CostQueryResult>, currency_prefix: &str) -> Vec<CostRow> {
    CostAggregator::new(currency_prefix).aggregate(result).rows
}

/// Fixed-point, two-decimal amount behind a currency prefix.
#[must_use]
pub fn format_cost(prefix: &str, value: f64) -> String {
    let formatted = format!("{value:.2}");
    // "-0.00" reads as a credit; show zero plainly.
    if formatted == "-0.00" {
        return format!("{prefix}0.00");
    }
    format!("{prefix}{formatted}")
}

fn extract_row(index: usize, row: &[Value]) -> Result<(&str, f64)> {
    let malformed = |details: String| AcsError::source("query_cost", format!("row {index}: {details}"));

    let group = row
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing resource group name".to_string()))?;
    let cost = match row.get(1) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite())
    .ok_or_else(|| malformed(format!("unusable cost value {:?}", row.get(1))))?;

    Ok((group, cost))
}
