//! Right-size policy: advisory mapping from a VM size family to a cheaper size.
//!
//! The size identifier (`Standard_D4s_v3`) is parsed into its family letters
//! (`D`) and matched against a table of family prefixes. Advice never triggers
//! any mutation.

#![allow(missing_docs)]

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::config::RightSizeRuleConfig;

static SIZE_FAMILY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:standard|basic)_([a-z]+)\d").expect("invalid regex")
});

/// Advice for one VM size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "advice", rename_all = "snake_case")]
pub enum RightSizeAdvice {
    Resize { from: String, to: String },
    Reasonable { size: String },
    /// The provider reported no size.
    Unknown,
}

impl fmt::Display for RightSizeAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resize { from, to } => write!(f, "Consider resizing from {from} to {to}"),
            Self::Reasonable { size } => write!(f, "Size {size} is reasonable"),
            Self::Unknown => f.write_str("Size not reported"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SizeRule {
    family_prefix: Cow<'static, str>,
    suggestion: Cow<'static, str>,
    configured: bool,
}

fn builtin_rules() -> Vec<SizeRule> {
    [("D", "Standard_B2s"), ("E", "Standard_D2s_v3")]
        .into_iter()
        .map(|(family, suggestion)| SizeRule {
            family_prefix: Cow::Borrowed(family),
            suggestion: Cow::Borrowed(suggestion),
            configured: false,
        })
        .collect()
}

/// Table of family-prefix rules, built-ins plus configured extras.
#[derive(Debug, Clone)]
pub struct RightSizePolicy {
    rules: Vec<SizeRule>,
}

impl Default for RightSizePolicy {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }
}

impl RightSizePolicy {
    #[must_use]
    pub fn with_custom(mut self, custom: &[RightSizeRuleConfig]) -> Self {
        self.rules.extend(custom.iter().map(|rule| SizeRule {
            family_prefix: Cow::Owned(rule.family_prefix.trim().to_string()),
            suggestion: Cow::Owned(rule.suggestion.trim().to_string()),
            configured: true,
        }));
        self
    }

    /// Advise on one size identifier.
    ///
    /// The longest matching family prefix wins; a configured rule beats a
    /// built-in of the same length. A suggestion equal to the current size is
    /// never returned.
    #[must_use]
    pub fn advise(&self, vm_size: &str) -> RightSizeAdvice {
        let size = vm_size.trim();
        if size.is_empty() {
            return RightSizeAdvice::Unknown;
        }
        let reasonable = || RightSizeAdvice::Reasonable {
            size: size.to_string(),
        };

        let Some(family) = size_family(size) else {
            return reasonable();
        };

        let best = self
            .rules
            .iter()
            .filter(|rule| starts_with_ignore_case(&family, &rule.family_prefix))
            .max_by_key(|rule| (rule.family_prefix.len(), rule.configured));

        match best {
            Some(rule) if !rule.suggestion.eq_ignore_ascii_case(size) => RightSizeAdvice::Resize {
                from: size.to_string(),
                to: rule.suggestion.to_string(),
            },
            _ => reasonable(),
        }
    }
}

/// Family letters of a size identifier, e.g. `DS` for `Standard_DS2_v2`.
#[must_use]
pub fn size_family(vm_size: &str) -> Option<String> {
    SIZE_FAMILY_REGEX
        .captures(vm_size.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    !prefix.is_empty()
        && haystack
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
