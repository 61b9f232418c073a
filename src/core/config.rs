//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AcsError, Result};
use crate::core::resource_id::subscription_scope;
use crate::cost::CostQuery;

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub subscription: SubscriptionConfig,
    pub cleanup: CleanupConfig,
    pub storage: StorageConfig,
    pub cost: CostConfig,
    pub scanner: ScannerConfig,
    pub rightsize: RightSizeConfig,
    pub report: ReportConfig,
    pub source: SourceConfig,
    pub paths: PathsConfig,
}

/// Target subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub id: String,
}

/// Mutation mode and the tag that exempts a resource from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanupConfig {
    /// Delete unattached, unprotected disks. Off means read-only reporting.
    pub auto_delete: bool,
    /// Tag key consulted by the protection guard.
    pub protected_tag: String,
}

/// Blob container probing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum blobs fetched when deciding whether a container is empty.
    pub blob_probe_limit: usize,
}

/// Cost query and formatting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CostConfig {
    pub currency_prefix: String,
    pub timeframe: String,
    pub granularity: String,
}

/// Pass execution knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Concurrent data-source calls within one pass.
    pub parallelism: usize,
}

/// Extra right-size policy rows appended after the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RightSizeConfig {
    pub rules: Vec<RightSizeRuleConfig>,
}

/// One configured right-size rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RightSizeRuleConfig {
    /// Size family prefix, e.g. `"F"` matches `Standard_F4s_v2`.
    pub family_prefix: String,
    /// Suggested replacement size.
    pub suggestion: String,
}

/// Report destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
}

/// Where resource data comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON inventory snapshot consumed by the snapshot source.
    pub inventory_file: Option<PathBuf>,
}

/// Filesystem paths used by acs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            auto_delete: false,
            protected_tag: "safe".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_probe_limit: 1,
        }
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            currency_prefix: "₹".to_string(),
            timeframe: "MonthToDate".to_string(),
            granularity: "Daily".to_string(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism().map_or(2, |n| n.get().clamp(1, 8)),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cost_report.csv"),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[ACS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("acs").join("config.toml"),
            activity_log: home_dir
                .join(".local")
                .join("share")
                .join("acs")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::load_unvalidated(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load file and env overrides without validating, so callers can layer
    /// command-line overrides before calling [`Config::validate`].
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| AcsError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str::<Self>(&raw)?
        } else if is_explicit_path {
            return Err(AcsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over canonical JSON, stable across processes and Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Apply `ACS_*` overrides (and the legacy `AZURE_SUBSCRIPTION_ID`).
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // ACS_SUBSCRIPTION_ID wins over the Azure SDK variable.
        if let Some(raw) = lookup("AZURE_SUBSCRIPTION_ID") {
            self.subscription.id = raw;
        }
        if let Some(raw) = lookup("ACS_SUBSCRIPTION_ID") {
            self.subscription.id = raw;
        }

        if let Some(raw) = lookup("ACS_CLEANUP_AUTO_DELETE") {
            self.cleanup.auto_delete = parse_env_bool("ACS_CLEANUP_AUTO_DELETE", &raw)?;
        }
        if let Some(raw) = lookup("ACS_CLEANUP_PROTECTED_TAG") {
            self.cleanup.protected_tag = raw;
        }
        if let Some(raw) = lookup("ACS_STORAGE_BLOB_PROBE_LIMIT") {
            self.storage.blob_probe_limit = parse_env_usize("ACS_STORAGE_BLOB_PROBE_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("ACS_SCANNER_PARALLELISM") {
            self.scanner.parallelism = parse_env_usize("ACS_SCANNER_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("ACS_COST_CURRENCY_PREFIX") {
            self.cost.currency_prefix = raw;
        }
        if let Some(raw) = lookup("ACS_REPORT_PATH") {
            self.report.path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("ACS_SOURCE_INVENTORY_FILE") {
            self.source.inventory_file = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("ACS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn normalize(&mut self) {
        self.subscription.id = self.subscription.id.trim().to_string();
        self.cleanup.protected_tag = self.cleanup.protected_tag.trim().to_string();
    }

    /// Check invariants. A missing subscription id is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.subscription.id.trim().is_empty() {
            return Err(AcsError::MissingSubscription);
        }
        if self.subscription.id.contains('/') {
            return Err(AcsError::InvalidConfig {
                details: format!(
                    "subscription.id must be a bare id, got {:?}",
                    self.subscription.id
                ),
            });
        }

        if self.cleanup.protected_tag.trim().is_empty() {
            return Err(AcsError::InvalidConfig {
                details: "cleanup.protected_tag must not be empty".to_string(),
            });
        }

        if self.storage.blob_probe_limit == 0 {
            return Err(AcsError::InvalidConfig {
                details: "storage.blob_probe_limit must be >= 1".to_string(),
            });
        }

        if self.scanner.parallelism == 0 {
            return Err(AcsError::InvalidConfig {
                details: "scanner.parallelism must be >= 1".to_string(),
            });
        }

        if self.report.path.as_os_str().is_empty() {
            return Err(AcsError::InvalidConfig {
                details: "report.path must not be empty".to_string(),
            });
        }

        for (name, value) in [
            ("cost.timeframe", &self.cost.timeframe),
            ("cost.granularity", &self.cost.granularity),
        ] {
            if value.trim().is_empty() {
                return Err(AcsError::InvalidConfig {
                    details: format!("{name} must not be empty"),
                });
            }
        }

        for rule in &self.rightsize.rules {
            if rule.family_prefix.trim().is_empty() || rule.suggestion.trim().is_empty() {
                return Err(AcsError::InvalidConfig {
                    details: "rightsize.rules entries need family_prefix and suggestion"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

/// The small option set handed to the scan pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOptions {
    /// Enables the delete transition of the deletion orchestrator.
    pub auto_delete: bool,
    /// Tag key checked by the protection guard.
    pub protected_tag: String,
    /// Destination for the report assembler.
    pub report_target: PathBuf,
    /// Bounded probe size for container emptiness.
    pub blob_probe_limit: usize,
    /// Fan-out width within a pass.
    pub parallelism: usize,
    /// Prefix for formatted cost values.
    pub currency_prefix: String,
    /// Month-to-date cost query.
    pub cost_query: CostQuery,
    /// Configured right-size rules.
    pub rightsize_rules: Vec<RightSizeRuleConfig>,
}

impl SweepOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            auto_delete: config.cleanup.auto_delete,
            protected_tag: config.cleanup.protected_tag.clone(),
            report_target: config.report.path.clone(),
            blob_probe_limit: config.storage.blob_probe_limit,
            parallelism: config.scanner.parallelism,
            currency_prefix: config.cost.currency_prefix.clone(),
            cost_query: CostQuery::usage(
                subscription_scope(&config.subscription.id),
                &config.cost.timeframe,
                &config.cost.granularity,
            ),
            rightsize_rules: config.rightsize.rules.clone(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|error| AcsError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| AcsError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::{AcsError, Config, RightSizeRuleConfig, SweepOptions};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    fn with_subscription() -> Config {
        let mut cfg = Config::default();
        cfg.subscription.id = "00000000-1111-2222-3333-444444444444".to_string();
        cfg
    }

    #[test]
    fn default_config_with_subscription_is_valid() {
        assert!(with_subscription().validate().is_ok());
    }

    #[test]
    fn missing_subscription_is_fatal() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, AcsError::MissingSubscription));
        assert!(err.is_fatal());
    }

    #[test]
    fn defaults_are_read_only_with_safe_tag() {
        let cfg = Config::default();
        assert!(!cfg.cleanup.auto_delete);
        assert_eq!(cfg.cleanup.protected_tag, "safe");
        assert_eq!(cfg.storage.blob_probe_limit, 1);
        assert_eq!(cfg.report.path, PathBuf::from("cost_report.csv"));
    }

    #[test]
    fn zero_probe_limit_rejected() {
        let mut cfg = with_subscription();
        cfg.storage.blob_probe_limit = 0;
        let err = cfg.validate().expect_err("expected probe limit error");
        assert!(err.to_string().contains("blob_probe_limit"));
    }

    #[test]
    fn zero_parallelism_rejected() {
        let mut cfg = with_subscription();
        cfg.scanner.parallelism = 0;
        let err = cfg.validate().expect_err("expected parallelism error");
        assert!(err.to_string().contains("parallelism"));
    }

    #[test]
    fn empty_protected_tag_rejected() {
        let mut cfg = with_subscription();
        cfg.cleanup.protected_tag = "  ".to_string();
        let err = cfg.validate().expect_err("expected tag error");
        assert!(err.to_string().contains("protected_tag"));
    }

    #[test]
    fn incomplete_rightsize_rule_rejected() {
        let mut cfg = with_subscription();
        cfg.rightsize.rules.push(RightSizeRuleConfig {
            family_prefix: "F".to_string(),
            suggestion: String::new(),
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_subscription_precedence() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("AZURE_SUBSCRIPTION_ID", "from-azure"),
            ("ACS_SUBSCRIPTION_ID", "from-acs"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("overrides should parse");
        assert_eq!(cfg.subscription.id, "from-acs");

        let mut cfg = Config::default();
        let overrides = vars(&[("AZURE_SUBSCRIPTION_ID", "from-azure")]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("overrides should parse");
        assert_eq!(cfg.subscription.id, "from-azure");
    }

    #[test]
    fn env_cleanup_overrides_apply() {
        let mut cfg = with_subscription();
        let overrides = vars(&[
            ("ACS_CLEANUP_AUTO_DELETE", "true"),
            ("ACS_CLEANUP_PROTECTED_TAG", "keep"),
            ("ACS_STORAGE_BLOB_PROBE_LIMIT", "5"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("overrides should parse");
        assert!(cfg.cleanup.auto_delete);
        assert_eq!(cfg.cleanup.protected_tag, "keep");
        assert_eq!(cfg.storage.blob_probe_limit, 5);
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("ACS_CLEANUP_AUTO_DELETE", "yes-please")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid bool should fail");
        match err {
            AcsError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("ACS_CLEANUP_AUTO_DELETE"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn toml_sections_parse() {
        let raw = r#"
            [subscription]
            id = "sub-1"

            [cleanup]
            auto_delete = true
            protected_tag = "do-not-delete"

            [[rightsize.rules]]
            family_prefix = "F"
            suggestion = "Standard_B2ms"
        "#;
        let cfg: Config = toml::from_str(raw).expect("config should parse");
        assert!(cfg.validate().is_ok());
        assert!(cfg.cleanup.auto_delete);
        assert_eq!(cfg.cleanup.protected_tag, "do-not-delete");
        assert_eq!(cfg.rightsize.rules.len(), 1);
        assert_eq!(cfg.storage.blob_probe_limit, 1);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/acs/config.toml")));
        assert!(matches!(result, Err(AcsError::MissingConfig { .. })));
    }

    #[test]
    fn sweep_options_carry_config() {
        let mut cfg = with_subscription();
        cfg.cleanup.auto_delete = true;
        let options = SweepOptions::from_config(&cfg);
        assert!(options.auto_delete);
        assert_eq!(options.protected_tag, "safe");
        assert_eq!(
            options.cost_query.scope,
            "/subscriptions/00000000-1111-2222-3333-444444444444"
        );
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = with_subscription();
        let mut modified = with_subscription();
        modified.cleanup.auto_delete = true;
        assert_ne!(
            cfg.stable_hash().expect("hash"),
            modified.stable_hash().expect("hash")
        );
        assert_eq!(cfg.stable_hash().expect("hash"), cfg.stable_hash().expect("hash"));
    }
}
