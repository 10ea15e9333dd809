//! Step grid for pattern-driven triggering.

use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const WORD_BITS: usize = u32::BITS as usize;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Grid {
    dim0: usize,
    dim1: usize,
    length: usize,
    /// `dim0 * dim1` bitmaps of `words(length)` words each.
    bits: Vec<u32>,
}

fn words(length: usize) -> usize {
    length.div_ceil(WORD_BITS)
}

impl Grid {
    fn bitmap(&self, i: usize, j: usize) -> Option<&[u32]> {
        if i >= self.dim0 || j >= self.dim1 {
            return None;
        }
        let w = words(self.length);
        let start = (i * self.dim1 + j) * w;
        self.bits.get(start..start + w)
    }

    fn bitmap_mut(&mut self, i: usize, j: usize) -> Option<&mut [u32]> {
        if i >= self.dim0 || j >= self.dim1 {
            return None;
        }
        let w = words(self.length);
        let start = (i * self.dim1 + j) * w;
        self.bits.get_mut(start..start + w)
    }
}

/// Boolean grid indexed by `(bank0, bank1, step)`.
#[derive(Debug, Default)]
pub struct Pattern {
    grid: Mutex<Grid>,
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        Self {
            grid: Mutex::new(self.grid.lock().clone()),
        }
    }
}

impl Pattern {
    pub fn new(dim0: usize, dim1: usize, length: usize) -> Self {
        let pattern = Self::default();
        pattern.set_dim(dim0, dim1, length);
        pattern
    }

    /// `(dim0, dim1, length)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        let grid = self.grid.lock();
        (grid.dim0, grid.dim1, grid.length)
    }

    /// Resize the grid, keeping every cell that stays in range.
    pub fn set_dim(&self, dim0: usize, dim1: usize, length: usize) {
        let mut grid = self.grid.lock();
        let mut resized = Grid {
            dim0,
            dim1,
            length,
            bits: vec![0; dim0 * dim1 * words(length)],
        };

        for i in 0..dim0.min(grid.dim0) {
            for j in 0..dim1.min(grid.dim1) {
                let (Some(old), Some(new)) = (grid.bitmap(i, j), resized.bitmap_mut(i, j)) else {
                    continue;
                };
                for (dst, src) in new.iter_mut().zip(old) {
                    *dst = *src;
                }
                if length % WORD_BITS != 0 {
                    if let Some(last) = new.last_mut() {
                        *last &= (1u32 << (length % WORD_BITS)) - 1;
                    }
                }
            }
        }

        *grid = resized;
    }

    fn locate(grid: &Grid, i: usize, j: usize, bit: usize) -> Result<(usize, u32)> {
        if i >= grid.dim0 || j >= grid.dim1 || bit >= grid.length {
            return Err(Error::PatternIndex {
                bank0: i,
                bank1: j,
                bit,
            });
        }
        Ok((bit / WORD_BITS, 1 << (bit % WORD_BITS)))
    }

    /// Whether step `bit` of bank `(i, j)` is on. Out-of-range cells are off.
    pub fn get_bit(&self, i: usize, j: usize, bit: usize) -> bool {
        let grid = self.grid.lock();
        let Ok((word, mask)) = Self::locate(&grid, i, j, bit) else {
            return false;
        };
        grid.bitmap(i, j)
            .is_some_and(|bitmap| bitmap[word] & mask != 0)
    }

    /// Flip step `bit` of bank `(i, j)` and return its new value.
    pub fn toggle_bit(&self, i: usize, j: usize, bit: usize) -> Result<bool> {
        let mut grid = self.grid.lock();
        let (word, mask) = Self::locate(&grid, i, j, bit)?;
        let bitmap = grid.bitmap_mut(i, j).ok_or(Error::PatternIndex {
            bank0: i,
            bank1: j,
            bit,
        })?;
        bitmap[word] ^= mask;
        Ok(bitmap[word] & mask != 0)
    }

    /// No step of bank `(i, j)` is on.
    pub fn is_empty(&self, i: usize, j: usize) -> bool {
        self.grid
            .lock()
            .bitmap(i, j)
            .map_or(true, |bitmap| bitmap.iter().all(|w| *w == 0))
    }

    pub fn to_document(&self) -> PatternDocument {
        let grid = self.grid.lock();
        let mut on = Vec::new();
        for i in 0..grid.dim0 {
            for j in 0..grid.dim1 {
                for bit in 0..grid.length {
                    if let Ok((word, mask)) = Self::locate(&grid, i, j, bit) {
                        if grid.bitmap(i, j).is_some_and(|b| b[word] & mask != 0) {
                            on.push((i, j, bit));
                        }
                    }
                }
            }
        }
        PatternDocument {
            dim: (grid.dim0, grid.dim1, grid.length),
            on,
        }
    }

    pub fn from_document(document: &PatternDocument) -> Result<Self> {
        let (dim0, dim1, length) = document.dim;
        let pattern = Self::new(dim0, dim1, length);
        for &(i, j, bit) in &document.on {
            if !pattern.get_bit(i, j, bit) {
                pattern.toggle_bit(i, j, bit)?;
            }
        }
        Ok(pattern)
    }
}

/// Persisted form of a pattern: dimensions plus the cells that are on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDocument {
    pub dim: (usize, usize, usize),
    pub on: Vec<(usize, usize, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_toggle_and_get() {
        let pattern = Pattern::new(1, 1, 16);
        assert!(pattern.is_empty(0, 0));
        assert!(pattern.toggle_bit(0, 0, 3).unwrap());
        assert!(pattern.get_bit(0, 0, 3));
        assert!(!pattern.get_bit(0, 0, 4));
        assert!(!pattern.is_empty(0, 0));
    }

    #[test]
    fn test_out_of_range() {
        let pattern = Pattern::new(2, 4, 64);
        assert!(!pattern.get_bit(2, 0, 0));
        assert!(!pattern.get_bit(0, 0, 64));
        assert!(matches!(
            pattern.toggle_bit(0, 4, 0),
            Err(Error::PatternIndex { bank1: 4, .. })
        ));
    }

    #[test]
    fn test_set_dim_keeps_cells() {
        let pattern = Pattern::new(1, 1, 64);
        pattern.toggle_bit(0, 0, 40).unwrap();
        pattern.toggle_bit(0, 0, 2).unwrap();

        pattern.set_dim(2, 2, 33);
        assert!(pattern.get_bit(0, 0, 2));
        assert!(!pattern.get_bit(0, 0, 40));

        pattern.set_dim(2, 2, 64);
        assert!(!pattern.get_bit(0, 0, 40));
        assert!(pattern.get_bit(0, 0, 2));
        assert_eq!(pattern.dim(), (2, 2, 64));
    }

    #[test]
    fn test_document_roundtrip() {
        let pattern = Pattern::new(2, 2, 16);
        pattern.toggle_bit(1, 0, 15).unwrap();
        let restored = Pattern::from_document(&pattern.to_document()).unwrap();
        assert!(restored.get_bit(1, 0, 15));
        assert_eq!(restored.dim(), (2, 2, 16));
    }

    proptest! {
        #[test]
        fn prop_toggle_twice_is_identity(
            i in 0usize..4, j in 0usize..12, bit in 0usize..64, seed in prop::collection::vec((0usize..4, 0usize..12, 0usize..64), 0..20)
        ) {
            let pattern = Pattern::new(4, 12, 64);
            for (a, b, c) in seed {
                pattern.toggle_bit(a, b, c).unwrap();
            }
            let before = pattern.get_bit(i, j, bit);
            pattern.toggle_bit(i, j, bit).unwrap();
            pattern.toggle_bit(i, j, bit).unwrap();
            prop_assert_eq!(pattern.get_bit(i, j, bit), before);
        }
    }
}
