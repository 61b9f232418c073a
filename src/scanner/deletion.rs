//! Deletion orchestrator: decides, per disk, whether a delete call is issued.
//!
//! Terminal dispositions, no retries:
//!
//! ```text
//! Scanned -> SkippedAttached       (disk has an attachment reference)
//!         -> SkippedProtected      (protection tag present, checked on listed
//!                                   tags and again on refreshed tags)
//!         -> SkippedModeDisabled   (read-only run)
//!         -> SkippedUnverified     (tags could not be re-read before deleting)
//!         -> DeleteRequested(result)
//! ```
//!
//! A delete is irreversible. It is gated only by `auto_delete` and the guard.

#![allow(missing_docs)]

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::scanner::classify::DiskClass;
use crate::scanner::protection::ProtectionGuard;
use crate::source::{DeleteStatus, Disk, ResourceSource};

// ──────────────────── dispositions ────────────────────

/// Tracked outcome of an issued delete call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeleteResult {
    /// Provider reported the disk gone.
    Completed,
    /// Provider accepted a long-running delete; completion not observed.
    Pending,
    /// The call failed; the disk is presumably still there.
    Failed { error_code: String, message: String },
}

/// Terminal state of one disk in the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DiskDisposition {
    SkippedAttached,
    SkippedProtected,
    SkippedModeDisabled,
    SkippedUnverified { reason: String },
    DeleteRequested { outcome: DeleteResult },
}

impl DiskDisposition {
    /// Classification implied by the disposition.
    #[must_use]
    pub const fn disk_class(&self) -> DiskClass {
        match self {
            Self::SkippedAttached => DiskClass::Attached,
            Self::SkippedProtected => DiskClass::Protected,
            Self::SkippedModeDisabled
            | Self::SkippedUnverified { .. }
            | Self::DeleteRequested { .. } => DiskClass::Unattached,
        }
    }

    /// Whether a delete call reached the data source.
    #[must_use]
    pub const fn delete_issued(&self) -> bool {
        matches!(self, Self::DeleteRequested { .. })
    }

    /// Short label for logs and console output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::SkippedAttached => "skipped: attached",
            Self::SkippedProtected => "skipped: protected",
            Self::SkippedModeDisabled => "skipped: read-only mode",
            Self::SkippedUnverified { .. } => "skipped: tags unverified",
            Self::DeleteRequested {
                outcome: DeleteResult::Completed,
            } => "deleted",
            Self::DeleteRequested {
                outcome: DeleteResult::Pending,
            } => "delete pending",
            Self::DeleteRequested {
                outcome: DeleteResult::Failed { .. },
            } => "delete failed",
        }
    }
}

// ──────────────────── orchestrator ────────────────────

/// Configuration for the deletion orchestrator.
#[derive(Debug, Clone)]
pub struct DeletionConfig {
    /// Mutation mode. When false every unattached disk ends `SkippedModeDisabled`.
    pub auto_delete: bool,
    /// Tag key for the protection guard.
    pub protected_tag: String,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            auto_delete: false,
            protected_tag: crate::scanner::protection::DEFAULT_PROTECTED_TAG.to_string(),
        }
    }
}

/// Applies the guard and mode to each disk and issues at most one delete.
pub struct DeletionOrchestrator {
    config: DeletionConfig,
    guard: ProtectionGuard,
    logger: Option<ActivityLoggerHandle>,
}

impl DeletionOrchestrator {
    pub fn new(config: DeletionConfig, logger: Option<ActivityLoggerHandle>) -> Self {
        let guard = ProtectionGuard::new(config.protected_tag.clone());
        Self {
            config,
            guard,
            logger,
        }
    }

    #[must_use]
    pub fn guard(&self) -> &ProtectionGuard {
        &self.guard
    }

    /// Drive one disk to its terminal disposition.
    pub fn dispose<S>(&self, source: &S, resource_group: &str, disk: &Disk) -> DiskDisposition
    where
        S: ResourceSource + ?Sized,
    {
        if disk.is_attached() {
            return DiskDisposition::SkippedAttached;
        }

        if self.guard.is_protected(Some(&disk.tags)) {
            self.log_skip(resource_group, disk, "protected");
            return DiskDisposition::SkippedProtected;
        }

        if !self.config.auto_delete {
            return DiskDisposition::SkippedModeDisabled;
        }

        // Re-read tags: the listing may be stale by now.
        match source.current_disk_tags(resource_group, &disk.name) {
            Ok(Some(fresh)) if self.guard.is_protected(Some(&fresh)) => {
                self.log_skip(resource_group, disk, "protected (refreshed tags)");
                return DiskDisposition::SkippedProtected;
            }
            Ok(_) => {}
            Err(e) => {
                let reason = e.to_string();
                self.log_skip(resource_group, disk, &reason);
                return DiskDisposition::SkippedUnverified { reason };
            }
        }

        eprintln!(
            "[ACS-DELETE] deleting unattached disk {} in {} ({})",
            disk.name,
            resource_group,
            disk.size_gb
                .map_or_else(|| "size unknown".to_string(), |gb| format!("{gb} GB")),
        );
        self.log_event(ActivityEvent::DiskDeleteRequested {
            resource_group: resource_group.to_string(),
            name: disk.name.clone(),
            size_gb: disk.size_gb,
        });

        let started = Instant::now();
        let outcome = match source.delete_disk(resource_group, &disk.name) {
            Ok(DeleteStatus::Completed) => DeleteResult::Completed,
            Ok(DeleteStatus::Accepted) => DeleteResult::Pending,
            Err(e) => {
                let outcome = DeleteResult::Failed {
                    error_code: e.code().to_string(),
                    message: e.to_string(),
                };
                self.log_event(ActivityEvent::DiskDeleteFailed {
                    resource_group: resource_group.to_string(),
                    name: disk.name.clone(),
                    error_code: e.code().to_string(),
                    error_message: e.to_string(),
                });
                outcome
            }
        };

        if !matches!(outcome, DeleteResult::Failed { .. }) {
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            self.log_event(ActivityEvent::DiskDeleteAccepted {
                resource_group: resource_group.to_string(),
                name: disk.name.clone(),
                completed: outcome == DeleteResult::Completed,
                duration_ms,
            });
        }

        DiskDisposition::DeleteRequested { outcome }
    }

    // ──────────────────── logging helpers ────────────────────

    fn log_skip(&self, resource_group: &str, disk: &Disk, reason: &str) {
        self.log_event(ActivityEvent::DiskSkipped {
            resource_group: resource_group.to_string(),
            name: disk.name.clone(),
            reason: reason.to_string(),
        });
    }

    fn log_event(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{AcsError, Result};
    use crate::cost::{CostQuery, CostQueryResult};
    use crate::source::{Blob, Container, StorageAccount, TagSet, VirtualMachine};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct DiskOnlySource {
        deletes: Mutex<Vec<String>>,
        fail_delete: bool,
        refreshed: Option<TagSet>,
        refresh_error: bool,
    }

    impl ResourceSource for DiskOnlySource {
        fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
            Ok(Vec::new())
        }
        fn instance_view(&self, _: &str, _: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn list_disks(&self) -> Result<Vec<Disk>> {
            Ok(Vec::new())
        }
        fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>> {
            Ok(Vec::new())
        }
        fn list_containers(&self, _: &str) -> Result<Vec<Container>> {
            Ok(Vec::new())
        }
        fn list_blobs(&self, _: &str, _: &str, _: usize) -> Result<Vec<Blob>> {
            Ok(Vec::new())
        }
        fn delete_disk(&self, resource_group: &str, disk_name: &str) -> Result<DeleteStatus> {
            self.deletes.lock().push(format!("{resource_group}/{disk_name}"));
            if self.fail_delete {
                Err(AcsError::source("delete_disk", "conflict: disk is leased"))
            } else {
                Ok(DeleteStatus::Accepted)
            }
        }
        fn query_cost(&self, _: &CostQuery) -> Result<CostQueryResult> {
            Ok(CostQueryResult::default())
        }
        fn current_disk_tags(&self, _: &str, _: &str) -> Result<Option<TagSet>> {
            if self.refresh_error {
                return Err(AcsError::source("current_disk_tags", "throttled"));
            }
            Ok(self.refreshed.clone())
        }
    }

    fn disk(name: &str, managed_by: Option<&str>, tags: &[(&str, &str)]) -> Disk {
        Disk {
            id: format!("/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/disks/{name}"),
            name: name.to_string(),
            size_gb: Some(64),
            managed_by: managed_by.map(str::to_string),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn orchestrator(auto_delete: bool) -> DeletionOrchestrator {
        DeletionOrchestrator::new(
            DeletionConfig {
                auto_delete,
                ..Default::default()
            },
            None,
        )
    }

    #[test]
    fn unattached_unprotected_disk_is_deleted_once() {
        let src = DiskOnlySource::default();
        let d = orchestrator(true).dispose(&src, "rg1", &disk("data-disk-1", None, &[]));
        assert_eq!(
            d,
            DiskDisposition::DeleteRequested {
                outcome: DeleteResult::Pending
            }
        );
        assert_eq!(*src.deletes.lock(), vec!["rg1/data-disk-1".to_string()]);
    }

    #[test]
    fn protected_disk_is_never_deleted() {
        for auto_delete in [true, false] {
            let src = DiskOnlySource::default();
            let d = orchestrator(auto_delete).dispose(
                &src,
                "rg1",
                &disk("data-disk-2", None, &[("safe", "YES")]),
            );
            assert_eq!(d, DiskDisposition::SkippedProtected);
            assert!(src.deletes.lock().is_empty());
        }
    }

    #[test]
    fn attached_disk_is_skipped_even_without_tags() {
        let src = DiskOnlySource::default();
        let d = orchestrator(true).dispose(&src, "rg1", &disk("os", Some("/vm/web-01"), &[]));
        assert_eq!(d, DiskDisposition::SkippedAttached);
        assert!(src.deletes.lock().is_empty());
    }

    #[test]
    fn read_only_mode_skips() {
        let src = DiskOnlySource::default();
        let d = orchestrator(false).dispose(&src, "rg1", &disk("d", None, &[]));
        assert_eq!(d, DiskDisposition::SkippedModeDisabled);
        assert!(src.deletes.lock().is_empty());
    }

    #[test]
    fn refreshed_protection_tag_blocks_delete() {
        let src = DiskOnlySource {
            refreshed: Some(
                [("safe".to_string(), "yes".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let d = orchestrator(true).dispose(&src, "rg1", &disk("d", None, &[]));
        assert_eq!(d, DiskDisposition::SkippedProtected);
        assert!(src.deletes.lock().is_empty());
    }

    #[test]
    fn protection_key_case_does_not_matter() {
        let src = DiskOnlySource::default();
        let d = orchestrator(true).dispose(&src, "rg1", &disk("d", None, &[("Safe", "yes")]));
        assert_eq!(d, DiskDisposition::SkippedProtected);
        assert!(src.deletes.lock().is_empty());

        let src = DiskOnlySource {
            refreshed: Some(
                [("SAFE".to_string(), "Yes".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let d = orchestrator(true).dispose(&src, "rg1", &disk("d", None, &[]));
        assert_eq!(d, DiskDisposition::SkippedProtected);
        assert!(src.deletes.lock().is_empty());
    }

    #[test]
    fn tag_refresh_failure_blocks_delete() {
        let src = DiskOnlySource {
            refresh_error: true,
            ..Default::default()
        };
        let d = orchestrator(true).dispose(&src, "rg1", &disk("d", None, &[]));
        assert!(matches!(d, DiskDisposition::SkippedUnverified { .. }));
        assert!(src.deletes.lock().is_empty());
    }

    #[test]
    fn delete_failure_is_tracked() {
        let src = DiskOnlySource {
            fail_delete: true,
            ..Default::default()
        };
        let d = orchestrator(true).dispose(&src, "rg1", &disk("d", None, &[]));
        match d {
            DiskDisposition::DeleteRequested {
                outcome: DeleteResult::Failed { error_code, message },
            } => {
                assert_eq!(error_code, "ACS-2002");
                assert!(message.contains("leased"));
            }
            other => panic!("unexpected disposition: {other:?}"),
        }
        assert_eq!(src.deletes.lock().len(), 1);
    }

    #[test]
    fn disposition_implies_class() {
        assert_eq!(DiskDisposition::SkippedAttached.disk_class(), DiskClass::Attached);
        assert_eq!(DiskDisposition::SkippedProtected.disk_class(), DiskClass::Protected);
        assert_eq!(
            DiskDisposition::SkippedModeDisabled.disk_class(),
            DiskClass::Unattached
        );
    }
}
