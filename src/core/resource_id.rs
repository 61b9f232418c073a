//! Azure resource identifier parsing.
//!
//! Identifiers look like
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`.
//! The resource group is taken from the fixed positional segment at index 4
//! after splitting on `/`; no "last segment" heuristics.

use crate::core::errors::{AcsError, Result};

/// Segment index of the resource group in a split identifier.
pub const RESOURCE_GROUP_SEGMENT: usize = 4;

/// Extract the resource group name from a hierarchical resource identifier.
pub fn resource_group_from_id(id: &str) -> Result<&str> {
    match id.split('/').nth(RESOURCE_GROUP_SEGMENT) {
        Some(segment) if !segment.is_empty() => Ok(segment),
        Some(_) => Err(AcsError::InvalidResourceId {
            id: id.to_string(),
            details: "empty resource group segment".to_string(),
        }),
        None => Err(AcsError::InvalidResourceId {
            id: id.to_string(),
            details: format!("fewer than {} segments", RESOURCE_GROUP_SEGMENT + 1),
        }),
    }
}

/// Build the subscription-level scope used by the cost query.
#[must_use]
pub fn subscription_scope(subscription_id: &str) -> String {
    format!("/subscriptions/{subscription_id}")
}
