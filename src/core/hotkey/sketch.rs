//! Count-Min Sketch
//!
//! Probabilistic frequency estimator: a `depth x width` matrix of saturating
//! counters with one seeded hash per row. Estimates never under-count; the
//! over-count probability shrinks with width.

use parking_lot::RwLock;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Approximate frequency counters for string keys under a fixed memory budget.
pub struct CountMinSketch {
    width: u32,
    depth: u32,
    seeds: Vec<u64>,
    rows: RwLock<Vec<Vec<u32>>>,
}

impl CountMinSketch {
    /// Minimum row width regardless of memory budget.
    const MIN_WIDTH: u32 = 256;

    /// Create a sketch sized from `memory_bytes` (4 bytes per counter).
    ///
    /// `depth` is clamped to [2, 8]; more rows lower the error rate at the
    /// cost of width for the same budget.
    pub fn new(memory_bytes: usize, depth: usize) -> Self {
        let depth = depth.clamp(2, 8) as u32;
        let width = ((memory_bytes / (depth as usize * 4)) as u32).max(Self::MIN_WIDTH);

        let seeds = (0..depth as u64)
            .map(|i| {
                i.wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    .wrapping_add(0x517C_C1B7_2722_0A95)
            })
            .collect();

        Self {
            width,
            depth,
            seeds,
            rows: RwLock::new(vec![vec![0; width as usize]; depth as usize]),
        }
    }

    fn cell(&self, key: &str, seed: u64) -> usize {
        let mut hasher = XxHash64::with_seed(seed);
        hasher.write(key.as_bytes());
        (hasher.finish() % u64::from(self.width)) as usize
    }

    /// Add `delta` to the key's cells and return the new minimum estimate.
    /// Cells saturate at `u32::MAX`.
    pub fn increment(&self, key: &str, delta: u32) -> u32 {
        let cells: Vec<usize> = self.seeds.iter().map(|&s| self.cell(key, s)).collect();

        let mut rows = self.rows.write();
        let mut min_count = u32::MAX;
        for (row, &idx) in rows.iter_mut().zip(&cells) {
            let value = row[idx].saturating_add(delta);
            row[idx] = value;
            min_count = min_count.min(value);
        }
        min_count
    }

    /// Estimated frequency of the key: minimum cell value across rows.
    pub fn estimate(&self, key: &str) -> u32 {
        let cells: Vec<usize> = self.seeds.iter().map(|&s| self.cell(key, s)).collect();

        let rows = self.rows.read();
        rows.iter()
            .zip(&cells)
            .map(|(row, &idx)| row[idx])
            .min()
            .unwrap_or(0)
    }

    /// Multiply every cell by `factor` (flooring). Values outside (0, 1)
    /// leave the sketch unchanged.
    pub fn decay(&self, factor: f64) {
        if factor <= 0.0 || factor >= 1.0 {
            return;
        }

        let mut rows = self.rows.write();
        for row in rows.iter_mut() {
            for cell in row.iter_mut() {
                *cell = (f64::from(*cell) * factor) as u32;
            }
        }
    }

    /// Zero all cells.
    pub fn reset(&self) {
        let mut rows = self.rows.write();
        for row in rows.iter_mut() {
            row.fill(0);
        }
    }

    /// Row width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Approximate memory held by the counter matrix, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.width as usize * self.depth as usize * 4
    }
}
