//! Hot-key detection and micro-batching
//!
//! Keys receiving disproportionate traffic are identified by a Count-Min
//! Sketch backed detector and their increments coalesced into single store
//! operations within a sub-millisecond flush window.

mod batcher;
mod detector;
mod sketch;


// Re-export public types
pub use batcher::HotKeyBatcher;
pub use detector::HotKeyDetector;
pub use sketch::CountMinSketch;
