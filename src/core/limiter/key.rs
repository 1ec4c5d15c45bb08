//! Counter key generation
//!
//! A counter key is a pure function of `(prefix, domain, descriptor
//! entries, unit, window start)`:
//!
//! ```text
//! [<prefix>]<domain>_<k1>_<v1>[_<k2>_<v2>...]_<windowStartSeconds>
//! ```
//!
//! Two requests in the same window for the same descriptor always produce
//! identical keys; windows never overlap for one descriptor. Rules that are
//! absent or unlimited yield an empty key, which the engine skips.

use super::types::{Descriptor, RateLimit, Unit};
use std::fmt::Write;

/// A generated counter key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKey {
    /// The store key; empty when the descriptor carries no quota
    pub key: String,
    /// Whether the rule uses SECOND windows (routes to the dedicated
    /// per-second store when one is configured)
    pub per_second: bool,
}

impl CacheKey {
    /// Whether this descriptor produces no counter traffic.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Generates counter keys for descriptors.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    prefix: String,
}

impl CacheKeyGenerator {
    /// Create a generator with the given key prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Start of the window containing `now` for a rule's unit.
    pub fn window_start(now: i64, unit: Unit) -> i64 {
        let unit_seconds = unit.seconds();
        (now / unit_seconds) * unit_seconds
    }

    /// Generate the counter key for one descriptor.
    pub fn generate(
        &self,
        domain: &str,
        descriptor: &Descriptor,
        rule: Option<&RateLimit>,
        now: i64,
    ) -> CacheKey {
        let rule = match rule {
            Some(rule) if !rule.unlimited => rule,
            _ => return CacheKey::default(),
        };

        let mut capacity = self.prefix.len() + domain.len() + 12;
        for entry in &descriptor.entries {
            capacity += entry.key.len() + entry.value.len() + 2;
        }

        let mut key = String::with_capacity(capacity);
        key.push_str(&self.prefix);
        key.push_str(domain);
        for entry in &descriptor.entries {
            let _ = write!(key, "_{}_{}", entry.key, entry.value);
        }
        let _ = write!(key, "_{}", Self::window_start(now, rule.unit));

        CacheKey {
            key,
            per_second: rule.unit == Unit::Second,
        }
    }
}
