//! ACS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AcsError>;

/// Top-level error type for the cost sweep.
#[derive(Debug, Error)]
pub enum AcsError {
    #[error("[ACS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ACS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ACS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ACS-1004] subscription id not found (set subscription.id or AZURE_SUBSCRIPTION_ID)")]
    MissingSubscription,

    #[error("[ACS-2001] malformed resource id {id:?}: {details}")]
    InvalidResourceId { id: String, details: String },

    #[error("[ACS-2002] data source failure during {operation}: {details}")]
    Source {
        operation: &'static str,
        details: String,
    },

    #[error("[ACS-2003] cost query unsupported: {details}")]
    CostUnsupported { details: String },

    #[error("[ACS-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ACS-2102] report encoding failure: {details}")]
    Report { details: String },

    #[error("[ACS-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ACS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl AcsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ACS-1001",
            Self::MissingConfig { .. } => "ACS-1002",
            Self::ConfigParse { .. } => "ACS-1003",
            Self::MissingSubscription => "ACS-1004",
            Self::InvalidResourceId { .. } => "ACS-2001",
            Self::Source { .. } => "ACS-2002",
            Self::CostUnsupported { .. } => "ACS-2003",
            Self::Serialization { .. } => "ACS-2101",
            Self::Report { .. } => "ACS-2102",
            Self::Io { .. } => "ACS-3002",
            Self::Runtime { .. } => "ACS-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Source { .. } | Self::Io { .. } | Self::Runtime { .. }
        )
    }

    /// Whether the error must abort the run before any scan starts.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::MissingSubscription
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for data-source failures.
    #[must_use]
    pub fn source(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Source {
            operation,
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for AcsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for AcsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<csv::Error> for AcsError {
    fn from(value: csv::Error) -> Self {
        Self::Report {
            details: value.to_string(),
        }
    }
}

impl From<std::fmt::Error> for AcsError {
    fn from(value: std::fmt::Error) -> Self {
        Self::Report {
            details: value.to_string(),
        }
    }
}
