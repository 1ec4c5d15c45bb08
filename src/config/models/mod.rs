//! Configuration data models
//!
//! This module defines all configuration structures consumed by the limiter.

pub mod cache;
pub mod hot_key;
pub mod store;

// Re-export all configuration types
pub use cache::*;
pub use hot_key::*;
pub use store::*;

/// Default store URL
pub fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Default connections per endpoint
pub fn default_pool_size() -> usize {
    10
}

/// Default cap on blocking pool acquisition, in milliseconds
pub fn default_pool_wait_ms() -> u64 {
    100
}

/// Default pipeline deadline, in milliseconds
pub fn default_request_timeout_ms() -> u64 {
    200
}

/// Default near-limit classification ratio
pub fn default_near_limit_ratio() -> f32 {
    0.8
}

/// Default Count-Min Sketch memory budget (10 MB)
pub fn default_sketch_memory_bytes() -> usize {
    10 * 1024 * 1024
}

/// Default Count-Min Sketch depth
pub fn default_sketch_depth() -> usize {
    4
}

/// Default hot classification threshold
pub fn default_hot_threshold() -> u32 {
    100
}

/// Default cap on the hot-key set
pub fn default_max_hot_keys() -> usize {
    10_000
}

/// Default batcher flush tick, in microseconds
pub fn default_flush_window_micros() -> u64 {
    300
}

/// Default sketch decay interval, in seconds
pub fn default_decay_interval_seconds() -> u64 {
    10
}

/// Default sketch decay factor
pub fn default_decay_factor() -> f64 {
    0.5
}
