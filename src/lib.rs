//! # ratelimit-rs
//!
//! The counting core of a distributed rate limiter. An edge proxy asks, per
//! `(domain, descriptor)` pair: does taking N more hits keep this subject
//! within its configured per-window quota? Counters live in a shared store
//! (standalone Redis, sentinel-fronted masters, or a sharded cluster) so
//! every stateless limiter replica agrees on usage.
//!
//! ## Features
//!
//! - **Fixed-window counting**: deterministic counter keys per
//!   `(domain, descriptor, window)`, TTL-expired by the store
//! - **Cluster-aware pipelining**: operations grouped by hash slot and
//!   executed as parallel single-slot pipelines
//! - **Hot-key handling**: a Count-Min Sketch detector promotes heavily hit
//!   keys to a micro-batcher that coalesces their increments within a
//!   sub-millisecond flush window
//! - **Local over-limit cache**: memoizes exhausted keys so repeat
//!   offenders are refused without store I/O
//! - **Shadow mode**: per-rule counting without enforcement
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ratelimit_rs::{
//!     Descriptor, DescriptorEntry, FixedWindowLimiter, RateLimit, RateLimitRequest, Settings,
//!     Unit,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_file("ratelimit.yaml").await?;
//!     let limiter = FixedWindowLimiter::connect(&settings).await?;
//!
//!     let request = RateLimitRequest::new(
//!         "edge",
//!         vec![Descriptor::new(vec![DescriptorEntry::new("api_key", "abc")])],
//!     );
//!     let rules = vec![Some(RateLimit::new(100, Unit::Minute))];
//!
//!     let verdicts = limiter.do_limit(&request, &rules).await?;
//!     println!("allowed: {}", verdicts[0].allowed());
//!
//!     limiter.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod storage;
pub mod utils;

// Re-export the primary API surface
pub use config::Settings;
pub use core::limiter::{
    Descriptor, DescriptorEntry, FixedWindowLimiter, RateLimit, RateLimitRequest, Unit, Verdict,
    VerdictCode,
};
pub use utils::error::{Error, Result};
pub use utils::logging::init_logging;
