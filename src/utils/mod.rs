//! Utility modules for the rate limiter
//!
//! - **error**: Error handling
//! - **logging**: Tracing subscriber setup
//! - **time**: Time source abstraction for window math

pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
pub use time::{SystemTimeSource, TimeSource};
