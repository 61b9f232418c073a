//! Classifier: pure mappings from raw resource facts to report statuses.
//!
//! Power states are decoded once into a closed enum; the stopped-over-deallocated
//! priority is an explicit ordered match. Nothing here performs I/O.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

pub const VM_STOPPED: &str = "Stopped — billing may apply";
pub const VM_DEALLOCATED: &str = "Deallocated — No cost";
pub const VM_RUNNING: &str = "Running";

pub const DISK_UNATTACHED: &str = "Unattached — recommended for cleanup";
pub const DISK_ATTACHED: &str = "Attached";

pub const CONTAINER_EMPTY: &str = "Empty — cleanup recommended";
pub const ACCOUNT_NO_EMPTY_CONTAINERS: &str = "No empty containers";

/// Every error status starts with this prefix.
pub const ERROR_STATUS_PREFIX: &str = "Error — ";

const POWER_STATE_PREFIX: &str = "powerstate/";

/// A decoded `PowerState/*` instance-view code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Unknown,
}

impl PowerState {
    /// Decode one raw status code. Non-power codes such as
    /// `ProvisioningState/succeeded` yield `None`.
    #[must_use]
    pub fn decode(code: &str) -> Option<Self> {
        let lowered = code.trim().to_ascii_lowercase();
        let state = lowered.strip_prefix(POWER_STATE_PREFIX)?;
        Some(match state {
            "starting" => Self::Starting,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "deallocating" => Self::Deallocating,
            "deallocated" => Self::Deallocated,
            _ => Self::Unknown,
        })
    }
}

/// Cost-relevant VM class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmPowerClass {
    /// Stopped but still allocated; compute may still be billed.
    Stopped,
    /// Released from the host; compute is not billed.
    Deallocated,
    Running,
}

impl VmPowerClass {
    /// Resolve a VM's full code set. Stopped wins over deallocated so that an
    /// inconsistent view is treated as possibly billed.
    #[must_use]
    pub fn from_codes<S: AsRef<str>>(codes: &[S]) -> Self {
        let states: Vec<PowerState> = codes
            .iter()
            .filter_map(|c| PowerState::decode(c.as_ref()))
            .collect();
        if states.contains(&PowerState::Stopped) {
            Self::Stopped
        } else if states.contains(&PowerState::Deallocated) {
            Self::Deallocated
        } else {
            Self::Running
        }
    }

    #[must_use]
    pub const fn status(self) -> &'static str {
        match self {
            Self::Stopped => VM_STOPPED,
            Self::Deallocated => VM_DEALLOCATED,
            Self::Running => VM_RUNNING,
        }
    }
}

/// Status for a VM given its instance-view codes.
#[must_use]
pub fn classify_vm<S: AsRef<str>>(codes: &[S]) -> &'static str {
    VmPowerClass::from_codes(codes).status()
}

/// Cost-relevant disk class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskClass {
    Attached,
    Unattached,
    /// Unattached but carrying the protection tag.
    Protected,
}

impl DiskClass {
    /// Attachment decides first; protection only matters for unattached disks.
    #[must_use]
    pub const fn from_facts(attached: bool, protected: bool) -> Self {
        match (attached, protected) {
            (true, _) => Self::Attached,
            (false, true) => Self::Protected,
            (false, false) => Self::Unattached,
        }
    }

    #[must_use]
    pub fn status(self, protected_tag: &str) -> String {
        match self {
            Self::Attached => DISK_ATTACHED.to_string(),
            Self::Unattached => DISK_UNATTACHED.to_string(),
            Self::Protected => protected_status(protected_tag),
        }
    }
}

/// Status shown for a disk skipped because of its protection tag.
#[must_use]
pub fn protected_status(protected_tag: &str) -> String {
    format!("Protected ({protected_tag}=yes) — skipped")
}

/// A container is empty when the bounded probe returned nothing.
///
/// This is a presence check up to the probe limit, not an exhaustive count.
#[must_use]
pub const fn container_is_empty(probed_blobs: usize) -> bool {
    probed_blobs == 0
}

/// Status for a resource whose facts could not be fetched.
#[must_use]
pub fn error_status(details: impl std::fmt::Display) -> String {
    format!("{ERROR_STATUS_PREFIX}{details}")
}
