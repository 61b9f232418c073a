//! Scan run: the full sweep for one invocation.
//!
//! Passes run strictly one after another (VM, Disk, Storage), then the cost
//! aggregation, then report assembly. Nothing carries over between runs.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::SweepOptions;
use crate::core::errors::Result;
use crate::cost::{CostAggregator, CostRow};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::report;
use crate::scanner::deletion::{DeleteResult, DeletionConfig, DeletionOrchestrator, DiskDisposition};
use crate::scanner::finding::{FindingSet, ResourceType};
use crate::scanner::passes::ScanPasses;
use crate::scanner::rightsize::RightSizePolicy;
use crate::source::ResourceSource;

/// Counters derived from a run's findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub virtual_machines: usize,
    pub disks: usize,
    pub blob_findings: usize,
    pub errors: usize,
    pub disks_protected: usize,
    pub deletes_requested: usize,
    pub deletes_failed: usize,
    pub cost_rows: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_findings(findings: &FindingSet, cost_rows: usize) -> Self {
        let mut summary = Self {
            virtual_machines: findings.count_of(ResourceType::VirtualMachine),
            disks: findings.count_of(ResourceType::Disk),
            blob_findings: findings.count_of(ResourceType::BlobContainer),
            cost_rows,
            ..Self::default()
        };
        for finding in findings {
            if finding.is_error() {
                summary.errors += 1;
            }
            match &finding.disposition {
                Some(DiskDisposition::SkippedProtected) => summary.disks_protected += 1,
                Some(DiskDisposition::DeleteRequested { outcome }) => {
                    summary.deletes_requested += 1;
                    if matches!(outcome, DeleteResult::Failed { .. }) {
                        summary.deletes_failed += 1;
                    }
                }
                _ => {}
            }
        }
        summary
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub auto_delete: bool,
    pub findings: FindingSet,
    pub costs: Vec<CostRow>,
    /// Why the cost table fell back to the sentinel row, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_degraded: Option<String>,
    pub summary: RunSummary,
}

/// One invocation of the sweep against a data source.
pub struct ScanRun<'a, S: ResourceSource + ?Sized> {
    source: &'a S,
    options: SweepOptions,
    logger: Option<ActivityLoggerHandle>,
}

impl<'a, S: ResourceSource + ?Sized> ScanRun<'a, S> {
    pub fn new(source: &'a S, options: SweepOptions) -> Self {
        Self {
            source,
            options,
            logger: None,
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Option<ActivityLoggerHandle>) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// Scan, classify, dispose of disks, and aggregate cost.
    pub fn execute(&self) -> ScanReport {
        let started = Instant::now();
        let passes =
            ScanPasses::new(self.source, self.options.parallelism).with_logger(self.logger.as_ref());

        let policy = RightSizePolicy::default().with_custom(&self.options.rightsize_rules);
        let orchestrator = DeletionOrchestrator::new(
            DeletionConfig {
                auto_delete: self.options.auto_delete,
                protected_tag: self.options.protected_tag.clone(),
            },
            self.logger.clone(),
        );

        let mut findings = FindingSet::new();
        findings.extend(self.timed_pass("vm", || passes.vm_pass(&policy)));
        findings.extend(self.timed_pass("disk", || passes.disk_pass(&orchestrator)));
        findings.extend(self.timed_pass("storage", || {
            passes.storage_pass(self.options.blob_probe_limit)
        }));

        let outcome = CostAggregator::new(self.options.currency_prefix.clone())
            .aggregate(self.source.query_cost(&self.options.cost_query));
        if let Some(details) = &outcome.degraded {
            eprintln!("[ACS-COST] cost breakdown unavailable: {details}");
            self.log(ActivityEvent::CostQueryDegraded {
                details: details.clone(),
            });
        }

        let summary = RunSummary::from_findings(&findings, outcome.rows.len());
        self.log(ActivityEvent::RunCompleted {
            findings: findings.len(),
            deletes_requested: summary.deletes_requested,
            duration_ms: elapsed_ms(started),
        });

        ScanReport {
            generated_at: Utc::now(),
            auto_delete: self.options.auto_delete,
            findings,
            costs: outcome.rows,
            cost_degraded: outcome.degraded,
            summary,
        }
    }

    /// Write the CSV report to the configured target (or `target` if given).
    pub fn publish(&self, report: &ScanReport, target: Option<&Path>) -> Result<PathBuf> {
        let path = target.unwrap_or(self.options.report_target.as_path());
        report::write_report(path, report)?;
        self.log(ActivityEvent::ReportWritten {
            path: path.display().to_string(),
            findings: report.findings.len(),
            cost_rows: report.costs.len(),
        });
        Ok(path.to_path_buf())
    }

    fn timed_pass(&self, pass: &'static str, run: impl FnOnce() -> FindingSet) -> FindingSet {
        let started = Instant::now();
        let findings = run();
        self.log(ActivityEvent::PassCompleted {
            pass,
            findings: findings.len(),
            errors: findings.iter().filter(|f| f.is_error()).count(),
            duration_ms: elapsed_ms(started),
        });
        findings
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
