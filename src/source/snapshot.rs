//! Inventory snapshot source: drives a sweep from an exported JSON inventory.
//!
//! The snapshot mirrors what the provider APIs return: VMs with their
//! instance-view status codes, disks with attachment and tags, storage accounts
//! with per-container blob counts, and the cost-query rows. Delete requests are
//! accepted and recorded in memory; the file on disk is never rewritten.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{AcsError, Result};
use crate::core::resource_id::resource_group_from_id;
use crate::cost::{CostQuery, CostQueryResult};
use crate::source::{
    Blob, Container, DeleteStatus, Disk, ResourceSource, StorageAccount, TagSet, VirtualMachine,
};

/// On-disk inventory layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub virtual_machines: Vec<SnapshotVm>,
    pub disks: Vec<Disk>,
    pub storage_accounts: Vec<SnapshotAccount>,
    /// Cost rows; `None` means the subscription does not support cost queries.
    pub cost: Option<CostQueryResult>,
    /// Provider error message reported for the cost query.
    pub cost_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVm {
    #[serde(flatten)]
    pub vm: VirtualMachine,
    /// Instance-view status codes; `None` when the view could not be captured.
    #[serde(default)]
    pub statuses: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAccount {
    #[serde(flatten)]
    pub account: StorageAccount,
    #[serde(default)]
    pub containers: Vec<SnapshotContainer>,
    /// Set when the blob endpoint of the account was not reachable.
    #[serde(default)]
    pub access_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotContainer {
    pub name: String,
    #[serde(default)]
    pub blob_count: usize,
}

/// A delete call received by the snapshot source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteRequest {
    pub resource_group: String,
    pub disk_name: String,
}

/// [`ResourceSource`] backed by an [`Inventory`].
#[derive(Debug)]
pub struct SnapshotSource {
    origin: Option<PathBuf>,
    inventory: Inventory,
    deletes: Mutex<Vec<DeleteRequest>>,
}

impl SnapshotSource {
    #[must_use]
    pub fn new(inventory: Inventory) -> Self {
        Self {
            origin: None,
            inventory,
            deletes: Mutex::new(Vec::new()),
        }
    }

    /// Read and parse an inventory file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| AcsError::io(path, source))?;
        let inventory: Inventory = serde_json::from_str(&raw)?;
        Ok(Self {
            origin: Some(path.to_path_buf()),
            ..Self::new(inventory)
        })
    }

    /// File the inventory was loaded from, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Delete calls received so far, in call order.
    #[must_use]
    pub fn delete_requests(&self) -> Vec<DeleteRequest> {
        self.deletes.lock().clone()
    }

    fn find_disk(&self, resource_group: &str, disk_name: &str) -> Option<&Disk> {
        self.inventory
            .disks
            .iter()
            .find(|d| d.name == disk_name && same_group(&d.id, resource_group))
    }

    fn find_account(&self, account_name: &str) -> Result<&SnapshotAccount> {
        self.inventory
            .storage_accounts
            .iter()
            .find(|a| a.account.name == account_name)
            .ok_or_else(|| {
                AcsError::source("list_containers", format!("unknown account {account_name}"))
            })
    }
}

impl ResourceSource for SnapshotSource {
    fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
        Ok(self
            .inventory
            .virtual_machines
            .iter()
            .map(|v| v.vm.clone())
            .collect())
    }

    fn instance_view(&self, resource_group: &str, vm_name: &str) -> Result<Vec<String>> {
        let entry = self
            .inventory
            .virtual_machines
            .iter()
            .find(|v| v.vm.name == vm_name && same_group(&v.vm.id, resource_group))
            .ok_or_else(|| {
                AcsError::source("instance_view", format!("{vm_name} not found in {resource_group}"))
            })?;
        entry.statuses.clone().ok_or_else(|| {
            AcsError::source("instance_view", format!("no instance view captured for {vm_name}"))
        })
    }

    fn list_disks(&self) -> Result<Vec<Disk>> {
        Ok(self.inventory.disks.clone())
    }

    fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>> {
        Ok(self
            .inventory
            .storage_accounts
            .iter()
            .map(|a| a.account.clone())
            .collect())
    }

    fn list_containers(&self, account_name: &str) -> Result<Vec<Container>> {
        let account = self.find_account(account_name)?;
        if let Some(error) = &account.access_error {
            return Err(AcsError::source("list_containers", error.clone()));
        }
        Ok(account
            .containers
            .iter()
            .map(|c| Container {
                name: c.name.clone(),
            })
            .collect())
    }

    fn list_blobs(
        &self,
        account_name: &str,
        container_name: &str,
        limit: usize,
    ) -> Result<Vec<Blob>> {
        let account = self.find_account(account_name)?;
        let container = account
            .containers
            .iter()
            .find(|c| c.name == container_name)
            .ok_or_else(|| {
                AcsError::source(
                    "list_blobs",
                    format!("unknown container {container_name} in {account_name}"),
                )
            })?;
        Ok((0..container.blob_count.min(limit))
            .map(|i| Blob {
                name: format!("blob-{i}"),
            })
            .collect())
    }

    fn delete_disk(&self, resource_group: &str, disk_name: &str) -> Result<DeleteStatus> {
        if self.find_disk(resource_group, disk_name).is_none() {
            return Err(AcsError::source(
                "delete_disk",
                format!("{disk_name} not found in {resource_group}"),
            ));
        }
        self.deletes.lock().push(DeleteRequest {
            resource_group: resource_group.to_string(),
            disk_name: disk_name.to_string(),
        });
        Ok(DeleteStatus::Accepted)
    }

    fn query_cost(&self, _query: &CostQuery) -> Result<CostQueryResult> {
        if let Some(error) = &self.inventory.cost_error {
            return Err(AcsError::CostUnsupported {
                details: error.clone(),
            });
        }
        self.inventory
            .cost
            .clone()
            .ok_or_else(|| AcsError::CostUnsupported {
                details: "no cost data in inventory".to_string(),
            })
    }

    fn current_disk_tags(&self, resource_group: &str, disk_name: &str) -> Result<Option<TagSet>> {
        Ok(self
            .find_disk(resource_group, disk_name)
            .map(|d| d.tags.clone()))
    }
}

/// Resource group names are case-insensitive in Azure.
fn same_group(id: &str, resource_group: &str) -> bool {
    resource_group_from_id(id).is_ok_and(|rg| rg.eq_ignore_ascii_case(resource_group))
}
