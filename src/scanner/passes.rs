//! The three scan passes: virtual machines, disks (with inline deletion), and
//! blob storage.
//!
//! Each pass returns its own [`FindingSet`]. Per-resource calls within the VM
//! and storage passes fan out over a small worker pool; results are merged back
//! in listing order, so the output never depends on scheduling. The disk pass
//! runs sequentially because it may issue deletes.

#![allow(missing_docs)]

use std::thread;

use crossbeam_channel as channel;

use crate::core::errors::AcsError;
use crate::core::resource_id::resource_group_from_id;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scanner::classify::{self, ACCOUNT_NO_EMPTY_CONTAINERS, CONTAINER_EMPTY};
use crate::scanner::deletion::{DeleteResult, DiskDisposition, DeletionOrchestrator};
use crate::scanner::finding::{Finding, FindingSet, ResourceType};
use crate::scanner::rightsize::RightSizePolicy;
use crate::source::{Disk, ResourceSource, StorageAccount, VirtualMachine};

/// Resource group recorded when a whole listing call failed.
pub const LISTING_FAILURE_GROUP: &str = "(subscription)";

/// Resource group recorded when an identifier could not be parsed.
pub const UNKNOWN_GROUP: &str = "(unknown)";

// ──────────────────── fan-out ────────────────────

/// Apply `work` to every item on up to `parallelism` scoped worker threads.
///
/// Results come back in input order.
pub fn fan_out<T, R, F>(items: &[T], parallelism: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = parallelism.clamp(1, items.len().max(1));
    if workers == 1 {
        return items.iter().map(&work).collect();
    }

    let (work_tx, work_rx) = channel::bounded::<(usize, &T)>(items.len());
    for pair in items.iter().enumerate() {
        let _ = work_tx.send(pair);
    }
    drop(work_tx);

    let (result_tx, result_rx) = channel::unbounded::<(usize, R)>();
    thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let work = &work;
            scope.spawn(move || {
                for (index, item) in work_rx.iter() {
                    if result_tx.send((index, work(item))).is_err() {
                        return;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut results: Vec<(usize, R)> = result_rx.iter().collect();
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

// ──────────────────── passes ────────────────────

/// Runs the passes against one data source.
pub struct ScanPasses<'a, S: ResourceSource + ?Sized> {
    source: &'a S,
    parallelism: usize,
    logger: Option<&'a ActivityLoggerHandle>,
}

impl<'a, S: ResourceSource + ?Sized> ScanPasses<'a, S> {
    pub fn new(source: &'a S, parallelism: usize) -> Self {
        Self {
            source,
            parallelism: parallelism.max(1),
            logger: None,
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Option<&'a ActivityLoggerHandle>) -> Self {
        self.logger = logger;
        self
    }

    /// Classify every VM by power state and attach right-size advice.
    pub fn vm_pass(&self, policy: &RightSizePolicy) -> FindingSet {
        let vms = match self.source.list_virtual_machines() {
            Ok(vms) => vms,
            Err(e) => {
                return std::iter::once(self.listing_failure(ResourceType::VirtualMachine, &e))
                    .collect();
            }
        };
        fan_out(&vms, self.parallelism, |vm| self.scan_vm(vm, policy))
            .into_iter()
            .collect()
    }

    /// Classify every disk and drive it through the deletion orchestrator.
    pub fn disk_pass(&self, orchestrator: &DeletionOrchestrator) -> FindingSet {
        let disks = match self.source.list_disks() {
            Ok(disks) => disks,
            Err(e) => {
                return std::iter::once(self.listing_failure(ResourceType::Disk, &e)).collect();
            }
        };
        disks
            .iter()
            .map(|disk| self.scan_disk(disk, orchestrator))
            .collect()
    }

    /// Probe every container of every account for emptiness.
    pub fn storage_pass(&self, probe_limit: usize) -> FindingSet {
        let accounts = match self.source.list_storage_accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                return std::iter::once(self.listing_failure(ResourceType::BlobContainer, &e))
                    .collect();
            }
        };
        let limit = probe_limit.max(1);
        fan_out(&accounts, self.parallelism, |account| {
            self.scan_account(account, limit)
        })
        .into_iter()
        .flatten()
        .collect()
    }

    // ──────────────────── per-resource work ────────────────────

    fn scan_vm(&self, vm: &VirtualMachine, policy: &RightSizePolicy) -> Finding {
        let resource_group = match resource_group_from_id(&vm.id) {
            Ok(rg) => rg,
            Err(e) => {
                return self.resource_error(UNKNOWN_GROUP, &vm.name, ResourceType::VirtualMachine, &e);
            }
        };
        // Advice needs only the listed size.
        let advice = policy.advise(&vm.vm_size).to_string();
        match self.source.instance_view(resource_group, &vm.name) {
            Ok(codes) => Finding::new(
                resource_group,
                &vm.name,
                ResourceType::VirtualMachine,
                classify::classify_vm(&codes),
            ),
            Err(e) => {
                self.resource_error(resource_group, &vm.name, ResourceType::VirtualMachine, &e)
            }
        }
        .with_advice(advice)
    }

    fn scan_disk(&self, disk: &Disk, orchestrator: &DeletionOrchestrator) -> Finding {
        let resource_group = match resource_group_from_id(&disk.id) {
            Ok(rg) => rg,
            Err(e) => {
                return self
                    .resource_error(UNKNOWN_GROUP, &disk.name, ResourceType::Disk, &e)
                    .with_size_gb(disk.size_gb);
            }
        };

        let disposition = orchestrator.dispose(self.source, resource_group, disk);
        let status = match &disposition {
            DiskDisposition::DeleteRequested {
                outcome: DeleteResult::Failed { message, .. },
            } => classify::error_status(format!("delete failed: {message}")),
            other => other.disk_class().status(orchestrator.guard().tag()),
        };

        Finding::new(resource_group, &disk.name, ResourceType::Disk, status)
            .with_size_gb(disk.size_gb)
            .with_disposition(disposition)
    }

    fn scan_account(&self, account: &StorageAccount, limit: usize) -> Vec<Finding> {
        let resource_group = match resource_group_from_id(&account.id) {
            Ok(rg) => rg,
            Err(e) => {
                return vec![self.resource_error(
                    UNKNOWN_GROUP,
                    &account.name,
                    ResourceType::BlobContainer,
                    &e,
                )];
            }
        };

        let containers = match self.source.list_containers(&account.name) {
            Ok(containers) => containers,
            Err(e) => {
                return vec![self.resource_error(
                    resource_group,
                    &account.name,
                    ResourceType::BlobContainer,
                    &e,
                )];
            }
        };

        let mut findings = Vec::new();
        let mut probe_failed = false;
        for container in &containers {
            let name = format!("{}/{}", account.name, container.name);
            match self.source.list_blobs(&account.name, &container.name, limit) {
                Ok(blobs) if classify::container_is_empty(blobs.len()) => {
                    findings.push(Finding::new(
                        resource_group,
                        name,
                        ResourceType::BlobContainer,
                        CONTAINER_EMPTY,
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    probe_failed = true;
                    findings.push(self.resource_error(
                        resource_group,
                        &name,
                        ResourceType::BlobContainer,
                        &e,
                    ));
                }
            }
        }

        if findings.is_empty() && !probe_failed {
            findings.push(Finding::new(
                resource_group,
                &account.name,
                ResourceType::BlobContainer,
                ACCOUNT_NO_EMPTY_CONTAINERS,
            ));
        }
        findings
    }

    // ──────────────────── error findings ────────────────────

    fn listing_failure(&self, resource_type: ResourceType, error: &AcsError) -> Finding {
        let name = match resource_type {
            ResourceType::VirtualMachine => "virtual machines",
            ResourceType::Disk => "disks",
            ResourceType::BlobContainer => "storage accounts",
        };
        self.resource_error(LISTING_FAILURE_GROUP, name, resource_type, error)
    }

    fn resource_error(
        &self,
        resource_group: &str,
        name: &str,
        resource_type: ResourceType,
        error: &AcsError,
    ) -> Finding {
        if let Some(logger) = self.logger {
            logger.send(ActivityEvent::ResourceError {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
                resource_type: resource_type.label().to_string(),
                error_code: error.code().to_string(),
                error_message: error.to_string(),
            });
        }
        Finding::new(
            resource_group,
            name,
            resource_type,
            classify::error_status(error),
        )
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::deletion::DeletionConfig;
    use crate::source::snapshot::{Inventory, SnapshotSource};

    const INVENTORY: &str = r#"{
        "virtual_machines": [
            {"id": "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/web-01",
             "name": "web-01", "vm_size": "Standard_D4s_v3", "statuses": ["PowerState/running"]},
            {"id": "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/batch-01",
             "name": "batch-01", "vm_size": "Standard_B1s", "statuses": ["PowerState/deallocated"]},
            {"id": "/subscriptions/s/resourceGroups/rg2/providers/Microsoft.Compute/virtualMachines/ghost",
             "name": "ghost", "vm_size": "Standard_D4s_v3"},
            {"id": "not-an-id", "name": "broken", "statuses": []}
        ],
        "disks": [
            {"id": "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/disks/os-1",
             "name": "os-1", "managed_by": "/vm/web-01"},
            {"id": "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/disks/data-disk-1",
             "name": "data-disk-1", "size_gb": 128},
            {"id": "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/disks/data-disk-2",
             "name": "data-disk-2", "tags": {"safe": "YES"}}
        ],
        "storage_accounts": [
            {"id": "/subscriptions/s/resourceGroups/rg3/providers/Microsoft.Storage/storageAccounts/logs",
             "name": "logs", "containers": [{"name": "old"}, {"name": "live", "blob_count": 3}]},
            {"id": "/subscriptions/s/resourceGroups/rg3/providers/Microsoft.Storage/storageAccounts/busy",
             "name": "busy", "containers": [{"name": "a", "blob_count": 1}]},
            {"id": "/subscriptions/s/resourceGroups/rg3/providers/Microsoft.Storage/storageAccounts/locked",
             "name": "locked", "access_error": "AuthorizationFailure"}
        ]
    }"#;

    fn source() -> SnapshotSource {
        let inventory: Inventory = serde_json::from_str(INVENTORY).unwrap();
        SnapshotSource::new(inventory)
    }

    #[test]
    fn fan_out_preserves_input_order() {
        let items: Vec<u32> = (0..64).collect();
        let doubled = fan_out(&items, 8, |n| n * 2);
        assert_eq!(doubled, (0..64).map(|n| n * 2).collect::<Vec<_>>());
        assert!(fan_out(&Vec::<u32>::new(), 4, |n| *n).is_empty());
    }

    #[test]
    fn vm_pass_isolates_per_vm_failures() {
        let src = source();
        let findings = ScanPasses::new(&src, 4).vm_pass(&RightSizePolicy::default());
        let rows: Vec<(&str, &str)> = findings
            .iter()
            .map(|f| (f.name.as_str(), f.status.as_str()))
            .collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], ("web-01", "Running"));
        assert_eq!(rows[1], ("batch-01", "Deallocated — No cost"));
        assert!(findings.as_slice()[2].is_error());
        assert_eq!(
            findings.as_slice()[2].advice.as_deref(),
            Some("Consider resizing from Standard_D4s_v3 to Standard_B2s")
        );
        assert_eq!(findings.as_slice()[3].resource_group, UNKNOWN_GROUP);
        assert_eq!(
            findings.as_slice()[0].advice.as_deref(),
            Some("Consider resizing from Standard_D4s_v3 to Standard_B2s")
        );
    }

    #[test]
    fn disk_pass_read_only_never_deletes() {
        let src = source();
        let orchestrator = DeletionOrchestrator::new(DeletionConfig::default(), None);
        let findings = ScanPasses::new(&src, 1).disk_pass(&orchestrator);
        let statuses: Vec<&str> = findings.iter().map(|f| f.status.as_str()).collect();
        assert_eq!(
            statuses,
            [
                "Attached",
                "Unattached — recommended for cleanup",
                "Protected (safe=yes) — skipped",
            ]
        );
        assert_eq!(findings.as_slice()[1].size_gb, Some(128));
        assert!(src.delete_requests().is_empty());
    }

    #[test]
    fn disk_pass_deletes_only_the_unprotected_disk() {
        let src = source();
        let orchestrator = DeletionOrchestrator::new(
            DeletionConfig {
                auto_delete: true,
                ..Default::default()
            },
            None,
        );
        let findings = ScanPasses::new(&src, 1).disk_pass(&orchestrator);
        let requests = src.delete_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].disk_name, "data-disk-1");
        assert_eq!(
            findings.as_slice()[1].disposition,
            Some(DiskDisposition::DeleteRequested {
                outcome: DeleteResult::Pending
            })
        );
    }

    #[test]
    fn storage_pass_reports_empty_containers_and_access_failures() {
        let src = source();
        let findings = ScanPasses::new(&src, 3).storage_pass(1);
        let rows: Vec<(&str, &str)> = findings
            .iter()
            .map(|f| (f.name.as_str(), f.status.as_str()))
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], ("logs/old", "Empty — cleanup recommended"));
        assert_eq!(rows[1], ("busy", "No empty containers"));
        assert_eq!(rows[2].0, "locked");
        assert!(rows[2].1.starts_with("Error — "));
        assert!(findings.iter().all(|f| f.resource_group == "rg3"));
    }

    #[test]
    fn listing_failure_becomes_one_error_finding() {
        struct Down;
        impl ResourceSource for Down {
            fn list_virtual_machines(&self) -> crate::core::errors::Result<Vec<VirtualMachine>> {
                Err(AcsError::source("list_virtual_machines", "unreachable"))
            }
            fn instance_view(&self, _: &str, _: &str) -> crate::core::errors::Result<Vec<String>> {
                Ok(Vec::new())
            }
            fn list_disks(&self) -> crate::core::errors::Result<Vec<Disk>> {
                Ok(Vec::new())
            }
            fn list_storage_accounts(&self) -> crate::core::errors::Result<Vec<StorageAccount>> {
                Ok(Vec::new())
            }
            fn list_containers(
                &self,
                _: &str,
            ) -> crate::core::errors::Result<Vec<crate::source::Container>> {
                Ok(Vec::new())
            }
            fn list_blobs(
                &self,
                _: &str,
                _: &str,
                _: usize,
            ) -> crate::core::errors::Result<Vec<crate::source::Blob>> {
                Ok(Vec::new())
            }
            fn delete_disk(
                &self,
                _: &str,
                _: &str,
            ) -> crate::core::errors::Result<crate::source::DeleteStatus> {
                Ok(crate::source::DeleteStatus::Completed)
            }
            fn query_cost(
                &self,
                _: &crate::cost::CostQuery,
            ) -> crate::core::errors::Result<crate::cost::CostQueryResult> {
                Ok(crate::cost::CostQueryResult::default())
            }
        }

        let (logger, rx) = ActivityLoggerHandle::capture(8);
        let findings = ScanPasses::new(&Down, 2)
            .with_logger(Some(&logger))
            .vm_pass(&RightSizePolicy::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings.as_slice()[0].resource_group, LISTING_FAILURE_GROUP);
        assert!(findings.as_slice()[0].is_error());
        assert!(matches!(
            rx.try_recv(),
            Ok(ActivityEvent::ResourceError { .. })
        ));
    }
}
