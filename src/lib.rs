#![forbid(unsafe_code)]

//! Azure cost sweep (acs): a low-risk cost-hygiene pass over one subscription.
//!
//! A run scans virtual machines, managed disks and blob containers, classifies
//! each by cost-relevant state, optionally deletes unattached disks that are not
//! tag-protected, aggregates month-to-date cost per resource group, and writes a
//! CSV report.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use azure_cost_sweep::prelude::*;
//!
//! # fn main() -> azure_cost_sweep::core::errors::Result<()> {
//! let config = Config::load(None)?;
//! let source = SnapshotSource::load(std::path::Path::new("inventory.json"))?;
//! let run = ScanRun::new(&source, SweepOptions::from_config(&config));
//! let report = run.execute();
//! run.publish(&report, None)?;
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod cost;
pub mod logger;
pub mod report;
pub mod scanner;
pub mod source;
