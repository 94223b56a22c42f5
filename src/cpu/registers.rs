//! General-purpose register file.
//!
//! A fixed bank of 32-bit registers addressed by an 8-bit index. Accesses
//! outside the bank never fail: reads yield zero and writes are dropped.

use serde::{Serialize, Deserialize};

/// Number of registers in a default register file.
pub const DEFAULT_REGISTER_COUNT: usize = 16;

/// The CPU register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    values: Vec<u32>,
}

impl RegisterFile {
    /// Create a register file of `count` registers, all zero.
    pub fn new(count: usize) -> Self {
        Self {
            values: vec![0; count],
        }
    }

    /// Read register `index`, or 0 if it does not exist.
    #[inline]
    pub fn get(&self, index: u8) -> u32 {
        self.values.get(index as usize).copied().unwrap_or(0)
    }

    /// Write register `index`. Out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, index: u8, value: u32) {
        if let Some(slot) = self.values.get_mut(index as usize) {
            *slot = value;
        }
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.values.iter().copied().enumerate()
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTER_COUNT)
    }
}
