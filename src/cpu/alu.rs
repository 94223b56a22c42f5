//! Arithmetic logic unit.
//!
//! Every operation is total: overflow wraps and division by zero yields 0.

/// The stateless ALU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alu;

impl Alu {
    #[inline]
    pub fn add(&self, a: u32, b: u32) -> u32 {
        a.wrapping_add(b)
    }

    #[inline]
    pub fn sub(&self, a: u32, b: u32) -> u32 {
        a.wrapping_sub(b)
    }

    #[inline]
    pub fn mul(&self, a: u32, b: u32) -> u32 {
        a.wrapping_mul(b)
    }

    /// Truncating division; `div(a, 0) == 0`.
    #[inline]
    pub fn div(&self, a: u32, b: u32) -> u32 {
        a.checked_div(b).unwrap_or(0)
    }

    #[inline]
    pub fn inc(&self, a: u32) -> u32 {
        a.wrapping_add(1)
    }

    #[inline]
    pub fn dec(&self, a: u32) -> u32 {
        a.wrapping_sub(1)
    }
}
