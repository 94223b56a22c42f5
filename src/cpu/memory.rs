//! Main memory.
//!
//! A flat array of 32-bit words addressed by a 16-bit index. The same cells
//! hold both instructions and data; nothing tags a cell as one or the other.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Default number of memory words.
pub const DEFAULT_MEMORY_SIZE: usize = 1024;

/// Largest memory a 16-bit address can reach.
pub const ADDRESS_SPACE: usize = 1 << 16;

/// Word-addressed memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u32>,
}

impl Memory {
    /// Create a memory of `size` zeroed words.
    ///
    /// Sizes beyond [`ADDRESS_SPACE`] are clamped, since no address could
    /// reach the extra cells.
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0; size.min(ADDRESS_SPACE)],
        }
    }

    /// Read the word at `addr`, or 0 if the address is out of range.
    #[inline]
    pub fn get(&self, addr: u16) -> u32 {
        self.cells.get(addr as usize).copied().unwrap_or(0)
    }

    /// Write the word at `addr`. Out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, addr: u16, value: u32) {
        if let Some(cell) = self.cells.get_mut(addr as usize) {
            *cell = value;
        }
    }

    /// Number of words.
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Load a block of words starting at `start`.
    pub fn load_program(&mut self, start: u16, program: &[u32]) -> Result<(), MemoryError> {
        let start = start as usize;
        let available = self.size().saturating_sub(start);
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        for (i, &word) in program.iter().enumerate() {
            self.cells[start + i] = word;
        }

        Ok(())
    }

    /// All non-zero cells as `(address, word)` pairs.
    pub fn non_zero(&self) -> Vec<(usize, u32)> {
        self.cells
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, word)| word != 0)
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&word| word != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors from bulk memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
