//! Findings: one classified observation per scanned resource, and the
//! append-only set that carries them through a run.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scanner::deletion::DiskDisposition;

/// Kind of resource a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    VirtualMachine,
    Disk,
    BlobContainer,
}

impl ResourceType {
    /// Label used in the report `Type` column.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::VirtualMachine => "VirtualMachine",
            Self::Disk => "Disk",
            Self::BlobContainer => "BlobContainer",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of scan output. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub resource_group: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub status: String,
    /// Advisory right-size note (VMs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
    /// Disk size in GB (disks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<u32>,
    /// What the deletion orchestrator did with the disk (disks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<DiskDisposition>,
}

impl Finding {
    #[must_use]
    pub fn new(
        resource_group: impl Into<String>,
        name: impl Into<String>,
        resource_type: ResourceType,
        status: impl Into<String>,
    ) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
            resource_type,
            status: status.into(),
            advice: None,
            size_gb: None,
            disposition: None,
        }
    }

    #[must_use]
    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = Some(advice.into());
        self
    }

    #[must_use]
    pub fn with_size_gb(mut self, size_gb: Option<u32>) -> Self {
        self.size_gb = size_gb;
        self
    }

    #[must_use]
    pub fn with_disposition(mut self, disposition: DiskDisposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    /// Whether this finding records a fetch or access failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.starts_with(crate::scanner::classify::ERROR_STATUS_PREFIX)
    }
}

/// Ordered, append-only collection of findings.
///
/// Each pass returns its own set; the run concatenates them in a fixed pass
/// order, so discovery order is also report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingSet {
    findings: Vec<Finding>,
}

impl FindingSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Append another set, preserving both orders.
    pub fn extend(&mut self, other: Self) {
        self.findings.extend(other.findings);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Finding] {
        &self.findings
    }

    /// Number of findings of one resource type.
    #[must_use]
    pub fn count_of(&self, resource_type: ResourceType) -> usize {
        self.findings
            .iter()
            .filter(|f| f.resource_type == resource_type)
            .count()
    }
}

impl FromIterator<Finding> for FindingSet {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        Self {
            findings: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FindingSet {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}
