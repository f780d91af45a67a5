//! Windowed index space to absolute genomic coordinates.
//!
//! A windowed file stores, for every row `i`, `num_window` columns centred on
//! `i`. Column `w` of row `i` (both 0-based) is the absolute pair
//! `(i + 1, i + 1 - num_window / 2 + w)`.

use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGrid {
    pub num_window: i32,
    pub num_pos: i32,
}

impl WindowGrid {
    pub fn new(num_window: i32, num_pos: i32) -> Self {
        Self { num_window, num_pos }
    }

    pub fn half_window(&self) -> i64 {
        (self.num_window / 2) as i64
    }

    /// Map a 0-based row and window column to an absolute pair.
    pub fn to_pair(&self, row: i64, window_index: i64) -> PairKey {
        let i = row + 1;
        let j = i - self.half_window() + window_index;
        PairKey { i, j }
    }

    /// Map a sparse flat index (`row * num_window + window_index`) to an absolute pair.
    pub fn flat_to_pair(&self, flat_index: i64) -> PairKey {
        let num_window = self.num_window.max(1) as i64;
        let row = flat_index.div_euclid(num_window);
        let window_index = flat_index.rem_euclid(num_window);
        self.to_pair(row, window_index)
    }

    /// Recover the window column of a stored pair, if it lies inside the band.
    pub fn window_index(&self, pair: PairKey) -> Option<i64> {
        let w = pair.j - pair.i + self.half_window();
        if w >= 0 && w < self.num_window as i64 {
            Some(w)
        } else {
            None
        }
    }

    /// Inverse of [`WindowGrid::flat_to_pair`].
    pub fn flat_index(&self, pair: PairKey) -> Option<i64> {
        let w = self.window_index(pair)?;
        Some((pair.i - 1) * self.num_window as i64 + w)
    }

    pub fn in_band(&self, pair: PairKey) -> bool {
        (pair.i - pair.j).abs() <= self.half_window()
    }

    /// Whether `j` addresses a real position of the dataset.
    pub fn in_range(&self, pos: Position) -> bool {
        pos >= 1 && pos <= self.num_pos as i64
    }
}

impl From<DatasetDims> for WindowGrid {
    fn from(dims: DatasetDims) -> Self {
        Self::new(dims.num_window, dims.num_pos)
    }
}
