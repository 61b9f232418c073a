//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use azure_cost_sweep::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, SweepOptions};
pub use crate::core::errors::{AcsError, Result};
pub use crate::core::resource_id::resource_group_from_id;

// Source
pub use crate::source::snapshot::{Inventory, SnapshotSource};
pub use crate::source::{Disk, ResourceSource, TagSet, VirtualMachine};

// Scanner
pub use crate::scanner::classify::{PowerState, VmPowerClass, classify_vm};
pub use crate::scanner::deletion::{DeleteResult, DeletionConfig, DeletionOrchestrator, DiskDisposition};
pub use crate::scanner::finding::{Finding, FindingSet, ResourceType};
pub use crate::scanner::protection::ProtectionGuard;
pub use crate::scanner::rightsize::{RightSizeAdvice, RightSizePolicy};
pub use crate::scanner::run::{RunSummary, ScanReport, ScanRun};

// Cost
pub use crate::cost::{CostAggregator, CostQuery, CostRow, aggregate, format_cost};

// Logger
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};

// Report
pub use crate::report::{render_csv, write_report};
