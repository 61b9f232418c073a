//! Cost query model and the cost aggregator.

pub mod aggregator;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use aggregator::{CostAggregator, CostOutcome, aggregate, format_cost};

/// Resource group value of the sentinel row.
pub const SENTINEL_GROUP: &str = "Not Supported";
/// Cost value of the sentinel row.
pub const SENTINEL_COST: &str = "N/A";

/// Cost-management query parameters, serialized in the provider's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostQuery {
    /// Query scope, e.g. `/subscriptions/{id}`. Not part of the body.
    #[serde(skip)]
    pub scope: String,
    #[serde(rename = "type")]
    pub query_type: String,
    pub timeframe: String,
    pub dataset: CostDataset,
}

/// Dataset section of a cost query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostDataset {
    pub granularity: String,
    pub aggregation: BTreeMap<String, CostAggregationSpec>,
    pub grouping: Vec<CostGrouping>,
}

/// One named aggregation, e.g. `totalCost = Sum(PreTaxCost)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAggregationSpec {
    pub name: String,
    pub function: String,
}

/// Grouping dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostGrouping {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl CostQuery {
    /// Usage query summing pre-tax cost grouped by resource group.
    #[must_use]
    pub fn usage(scope: String, timeframe: &str, granularity: &str) -> Self {
        let mut aggregation = BTreeMap::new();
        aggregation.insert(
            "totalCost".to_string(),
            CostAggregationSpec {
                name: "PreTaxCost".to_string(),
                function: "Sum".to_string(),
            },
        );
        Self {
            scope,
            query_type: "Usage".to_string(),
            timeframe: timeframe.to_string(),
            dataset: CostDataset {
                granularity: granularity.to_string(),
                aggregation,
                grouping: vec![CostGrouping {
                    kind: "Dimension".to_string(),
                    name: "ResourceGroupName".to_string(),
                }],
            },
        }
    }
}

/// Raw result of a cost query: `[[groupName, cost, ...], ...]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostQueryResult {
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// One row of the cost summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRow {
    pub resource_group: String,
    pub formatted_cost: String,
}

impl CostRow {
    /// The placeholder row emitted when no breakdown can be obtained.
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            resource_group: SENTINEL_GROUP.to_string(),
            formatted_cost: SENTINEL_COST.to_string(),
        }
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.resource_group == SENTINEL_GROUP && self.formatted_cost == SENTINEL_COST
    }
}
