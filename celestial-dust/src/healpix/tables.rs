//! Bit-interleave tables for NESTED pixel encoding.
//!
//! `x2pix[i]` spreads the 7 bits of `i` onto the even bit positions of a
//! 14-bit word (bit p of `i` lands at bit 2p); `y2pix[i]` is the same
//! pattern shifted onto the odd positions. Summing one entry of each gives
//! the Morton (Z-order) code of a 7-bit (x, y) pair.

use crate::constants::BIT_TABLE_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitTables {
    x2pix: [u32; BIT_TABLE_SIZE],
    y2pix: [u32; BIT_TABLE_SIZE],
}

impl BitTables {
    /// Builds both tables. Pure and deterministic; evaluated at compile time
    /// when used in a `const` context.
    pub const fn new() -> Self {
        let mut x2pix = [0u32; BIT_TABLE_SIZE];
        let mut y2pix = [0u32; BIT_TABLE_SIZE];
        let mut i = 0;
        while i < BIT_TABLE_SIZE {
            let mut j = i as u32;
            let mut k = 0u32;
            let mut ip = 1u32;
            while j > 0 {
                k += ip * (j & 1);
                j >>= 1;
                ip *= 4;
            }
            x2pix[i] = k;
            y2pix[i] = 2 * k;
            i += 1;
        }
        Self { x2pix, y2pix }
    }

    pub fn x2pix(&self) -> &[u32; BIT_TABLE_SIZE] {
        &self.x2pix
    }

    pub fn y2pix(&self) -> &[u32; BIT_TABLE_SIZE] {
        &self.y2pix
    }

    /// Morton code of a 7-bit pair. Both inputs must be below 128.
    #[inline]
    pub fn interleave(&self, ix: usize, iy: usize) -> u64 {
        self.x2pix[ix] as u64 + self.y2pix[iy] as u64
    }
}

impl Default for BitTables {
    fn default() -> Self {
        Self::new()
    }
}
