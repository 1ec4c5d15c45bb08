//! Core functionality of the rate limiter
//!
//! This module contains the counting engine and its supporting machinery.

pub mod hotkey;
pub mod limiter;

// Re-export commonly used types
pub use hotkey::{CountMinSketch, HotKeyBatcher, HotKeyDetector};
pub use limiter::{
    Descriptor, DescriptorEntry, FixedWindowLimiter, RateLimit, RateLimitRequest, Unit, Verdict,
    VerdictCode,
};
