//! Rate limiter types and data structures

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time unit of a rate-limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// One-second windows
    Second,
    /// One-minute windows
    Minute,
    /// One-hour windows
    Hour,
    /// One-day windows
    Day,
    /// One-week windows
    Week,
    /// Thirty-day windows
    Month,
    /// 365-day windows
    Year,
}

impl Unit {
    /// Window length in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Unit::Second => 1,
            Unit::Minute => 60,
            Unit::Hour => 3_600,
            Unit::Day => 86_400,
            Unit::Week => 604_800,
            Unit::Month => 2_592_000,
            Unit::Year => 31_536_000,
        }
    }
}

/// A configured quota: `limit` hits per window of `unit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum hits per window
    pub limit: u32,
    /// Window length
    pub unit: Unit,
    /// Report OK regardless of the computed verdict, while still counting
    #[serde(default)]
    pub shadow_mode: bool,
    /// Rule matched but imposes no quota; produces no counter traffic
    #[serde(default)]
    pub unlimited: bool,
    /// Per-rule override of the configured near-limit ratio
    #[serde(default)]
    pub near_limit_ratio: Option<f32>,
}

impl RateLimit {
    /// Create a rule with the given quota.
    pub fn new(limit: u32, unit: Unit) -> Self {
        Self {
            limit,
            unit,
            shadow_mode: false,
            unlimited: false,
            near_limit_ratio: None,
        }
    }

    /// Mark the rule as shadow mode.
    #[must_use]
    pub fn with_shadow_mode(mut self) -> Self {
        self.shadow_mode = true;
        self
    }

    /// Mark the rule as unlimited.
    #[must_use]
    pub fn unlimited(mut self) -> Self {
        self.unlimited = true;
        self
    }

    /// Override the near-limit ratio for this rule.
    #[must_use]
    pub fn with_near_limit_ratio(mut self, ratio: f32) -> Self {
        self.near_limit_ratio = Some(ratio);
        self
    }
}

/// One key/value entry of a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorEntry {
    /// Entry key
    pub key: String,
    /// Entry value
    pub value: String,
}

impl DescriptorEntry {
    /// Create an entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A quota subject within a domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Ordered key/value entries identifying the subject
    pub entries: Vec<DescriptorEntry>,
    /// Hits this request accounts for; defaults to 1
    #[serde(default)]
    pub hits_addend: Option<u32>,
}

impl Descriptor {
    /// Create a descriptor from its entries.
    pub fn new(entries: Vec<DescriptorEntry>) -> Self {
        Self {
            entries,
            hits_addend: None,
        }
    }

    /// Set an explicit hit count.
    #[must_use]
    pub fn with_hits_addend(mut self, hits: u32) -> Self {
        self.hits_addend = Some(hits);
        self
    }

    /// Hits this descriptor accounts for.
    pub fn hits(&self) -> u64 {
        u64::from(self.hits_addend.unwrap_or(1))
    }
}

/// One rate-limit check: a domain plus the descriptors to evaluate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRequest {
    /// Namespace grouping the rules
    pub domain: String,
    /// Descriptors to evaluate, each against its corresponding rule
    pub descriptors: Vec<Descriptor>,
}

impl RateLimitRequest {
    /// Create a request.
    pub fn new(domain: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        Self {
            domain: domain.into(),
            descriptors,
        }
    }
}

/// Outcome code for one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictCode {
    /// Within quota
    Ok,
    /// Quota exhausted
    OverLimit,
}

/// Per-descriptor verdict
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Outcome code
    pub code: VerdictCode,
    /// The rule that produced this verdict, when one applied
    pub current_limit: Option<RateLimit>,
    /// Hits left in the current window
    pub limit_remaining: u32,
    /// Time until the window rolls over
    pub duration_until_reset: Duration,
    /// True when a denial was suppressed because the rule is in shadow mode
    pub shadow_mode: bool,
}

impl Verdict {
    /// Verdict for a descriptor with no applicable quota.
    pub fn unmatched() -> Self {
        Self {
            code: VerdictCode::Ok,
            current_limit: None,
            limit_remaining: 0,
            duration_until_reset: Duration::ZERO,
            shadow_mode: false,
        }
    }

    /// Whether the request may proceed.
    pub fn allowed(&self) -> bool {
        self.code == VerdictCode::Ok
    }
}
