//! Resource data source: the read/delete contract the scan pipeline consumes.
//!
//! The pipeline never talks to a provider API directly. Anything that can list
//! VMs, disks and storage accounts, probe containers, query cost, and accept a
//! disk delete can drive a sweep.

#![allow(missing_docs)]

pub mod snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::cost::{CostQuery, CostQueryResult};

/// Resource tags, ordered for deterministic output.
pub type TagSet = BTreeMap<String, String>;

/// A virtual machine as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    /// Hardware profile size, e.g. `Standard_D2s_v3`.
    #[serde(default)]
    pub vm_size: String,
}

/// A managed disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size_gb: Option<u32>,
    /// Id of the VM the disk is attached to; `None` when unattached.
    #[serde(default)]
    pub managed_by: Option<String>,
    #[serde(default)]
    pub tags: TagSet,
}

impl Disk {
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.managed_by.is_some()
    }
}

/// A storage account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAccount {
    pub id: String,
    pub name: String,
}

/// A blob container inside a storage account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
}

/// A blob returned by a bounded listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub name: String,
}

/// What the provider reported for an accepted delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    /// The resource is gone.
    Completed,
    /// Accepted as a long-running operation; completion was not observed.
    Accepted,
}

/// Provider operations consumed by the sweep.
///
/// Implementations must be `Sync`: passes fan calls out across worker threads.
pub trait ResourceSource: Sync {
    fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>>;

    /// Raw status codes of a VM's instance view, e.g. `PowerState/running`.
    fn instance_view(&self, resource_group: &str, vm_name: &str) -> Result<Vec<String>>;

    fn list_disks(&self) -> Result<Vec<Disk>>;

    fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>>;

    fn list_containers(&self, account_name: &str) -> Result<Vec<Container>>;

    /// List at most `limit` blobs of a container.
    fn list_blobs(&self, account_name: &str, container_name: &str, limit: usize)
    -> Result<Vec<Blob>>;

    fn delete_disk(&self, resource_group: &str, disk_name: &str) -> Result<DeleteStatus>;

    fn query_cost(&self, query: &CostQuery) -> Result<CostQueryResult>;

    /// Re-read a disk's tags right before a destructive call.
    ///
    /// `Ok(None)` means the source cannot refresh and the listed tags stand.
    fn current_disk_tags(&self, resource_group: &str, disk_name: &str) -> Result<Option<TagSet>> {
        let _ = (resource_group, disk_name);
        Ok(None)
    }
}
