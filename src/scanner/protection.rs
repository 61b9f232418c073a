//! Protection guard: tag-based exemption from any destructive action.
//!
//! A resource is protected when its tags carry the designated key with the
//! value `yes`. Key and value are both compared case-insensitively, matching
//! how Azure treats tag names. The guard holds no state about
//! resources; callers re-evaluate it against fresh tags right before a delete.

use crate::source::TagSet;

/// Tag key used when none is configured.
pub const DEFAULT_PROTECTED_TAG: &str = "safe";

/// Value that marks a resource as protected.
pub const PROTECTED_VALUE: &str = "yes";

/// Predicate over a resource's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionGuard {
    tag: String,
}

impl Default for ProtectionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_TAG)
    }
}

impl ProtectionGuard {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Tag key this guard consults.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `true` iff `tags` is present and some spelling of the protection key
    /// maps to `yes`.
    #[must_use]
    pub fn is_protected(&self, tags: Option<&TagSet>) -> bool {
        tags.is_some_and(|t| {
            t.iter().any(|(key, value)| {
                key.trim().eq_ignore_ascii_case(self.tag.trim())
                    && value.trim().eq_ignore_ascii_case(PROTECTED_VALUE)
            })
        })
    }

    /// Human-readable reason, or `None` if not protected.
    #[must_use]
    pub fn protection_reason(&self, tags: Option<&TagSet>) -> Option<String> {
        self.is_protected(tags)
            .then(|| format!("tag {}={PROTECTED_VALUE}", self.tag))
    }
}
