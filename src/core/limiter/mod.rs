//! Fixed-window rate limiting
//!
//! The engine evaluates `(domain, descriptor)` pairs against their resolved
//! rules using shared counters in the configured store, so every limiter
//! replica agrees on usage.

mod engine;
mod key;
mod local_cache;
mod types;


// Re-export public types
pub use engine::FixedWindowLimiter;
pub use key::{CacheKey, CacheKeyGenerator};
pub use local_cache::OverLimitCache;
pub use types::{
    Descriptor, DescriptorEntry, RateLimit, RateLimitRequest, Unit, Verdict, VerdictCode,
};
