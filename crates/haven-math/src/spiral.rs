//! Deterministic square-spiral enumeration of horizontal offsets.
//!
//! Ring 0 is the origin. Ring `k` holds the `8k` cells on the border of the
//! `(2k+1) x (2k+1)` square and starts at index `(2k-1)^2`. Each ring begins
//! at `(k, -k+1)` and walks counter-clockwise when viewed with +Z up:
//!
//! | Index | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 |
//! |-------|---|---|---|---|---|---|---|---|---|
//! | (x, z) | (0,0) | (1,0) | (1,1) | (0,1) | (-1,1) | (-1,0) | (-1,-1) | (0,-1) | (1,-1) |
//!
//! Offsets are computed in closed form from the index, so the whole search
//! state is a single integer.

use serde::{Deserialize, Serialize};

/// Restartable cursor over the square spiral.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareSpiral {
    index: u32,
}

impl SquareSpiral {
    /// A cursor positioned at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor positioned at `index`.
    pub fn at(index: u32) -> Self {
        Self { index }
    }

    /// Current position in the sequence.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Advance by exactly one cell.
    pub fn next(&mut self) {
        self.index += 1;
    }

    /// Return to the origin.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Ring number of the current cell.
    pub fn ring(&self) -> u32 {
        ring_of(self.index)
    }

    /// `(x, z)` offset of the current cell.
    pub fn offset(&self) -> (i32, i32) {
        offset_of(self.index)
    }

    /// `(x², z²)` of the current offset, for callers that only need magnitudes.
    pub fn offset_squared(&self) -> (i64, i64) {
        let (x, z) = self.offset();
        (x as i64 * x as i64, z as i64 * z as i64)
    }
}

/// Ring containing `index`.
pub fn ring_of(index: u32) -> u32 {
    (index.isqrt() + 1) / 2
}

/// `(x, z)` offset of the cell at `index`.
pub fn offset_of(index: u32) -> (i32, i32) {
    let k = ring_of(index);
    if k == 0 {
        return (0, 0);
    }
    let first = (2 * k - 1) * (2 * k - 1);
    let pos = index - first;
    let side_len = 2 * k;
    let side = pos / side_len;
    let t = (pos % side_len) as i32;
    let k = k as i32;

    match side {
        0 => (k, -k + 1 + t),
        1 => (k - 1 - t, k),
        2 => (-k, k - 1 - t),
        _ => (-k + 1 + t, -k),
    }
}
