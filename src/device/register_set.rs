//! # Register Storage
//!
//! This module provides byte-backed storage for register blocks whose bits are either fixed or
//! writable.

use crate::device::bus::Request;

/// A builder for [`RegisterSet`] objects.
///
/// With this struct the register block can be incrementally constructed
/// and finally converted into a matching `RegisterSet` struct, whose
/// layout is immutable.
///
/// # Examples
///
/// ```
/// use pci_target::device::register_set::*;
///
/// let region: RegisterSet::<8> = RegisterSetBuilder::<8>::new()
///     .u8_ro_at(0, 0xAB)              // A completely read-only byte register containing 0xAB at offset 0.
///     .u16_le_at(2, 0xCAFE, 0x00FF)   // A little-endian 16-bit value with a writable low byte.
///     .u32_le_rw_at(4, 0)             // A fully writable 32-bit value.
///     .into();
/// ```
#[derive(Debug, Clone)]
pub struct RegisterSetBuilder<const SIZE: usize> {
    data: [u8; SIZE],
    rw_mask: [u8; SIZE],
}

impl<const SIZE: usize> Default for RegisterSetBuilder<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> RegisterSetBuilder<SIZE> {
    /// Initialize a builder for a fully read-only register block where
    /// all bits are set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: [0xFF; SIZE],
            rw_mask: [0; SIZE],
        }
    }

    fn init_u8_slice(&mut self, pos: usize, value_bytes: &[u8], write_mask_bytes: &[u8]) {
        assert_eq!(value_bytes.len(), write_mask_bytes.len());
        assert!(pos + value_bytes.len() <= SIZE);

        self.data[pos..pos + value_bytes.len()].copy_from_slice(value_bytes);
        self.rw_mask[pos..pos + value_bytes.len()].copy_from_slice(write_mask_bytes);
    }

    /// Place a read-only byte at the given position.
    pub fn u8_ro_at(&mut self, pos: usize, value: u8) -> &mut Self {
        self.init_u8_slice(pos, &[value], &[0]);
        self
    }

    /// Place a 16-bit value at the specified address in little-endian
    /// order with a mask indicating which bits are writable.
    pub fn u16_le_at(&mut self, pos: usize, value: u16, write_mask: u16) -> &mut Self {
        self.init_u8_slice(pos, &value.to_le_bytes(), &write_mask.to_le_bytes());
        self
    }

    /// Place a read-only 16-bit value at the given position in
    /// little-endian order.
    pub fn u16_le_ro_at(&mut self, pos: usize, value: u16) -> &mut Self {
        self.u16_le_at(pos, value, 0)
    }

    /// Place a 32-bit value at the specified address in little-endian
    /// order with a mask indicating which bits are writable.
    pub fn u32_le_at(&mut self, pos: usize, value: u32, write_mask: u32) -> &mut Self {
        self.init_u8_slice(pos, &value.to_le_bytes(), &write_mask.to_le_bytes());
        self
    }

    /// Place a read-only 32-bit value at the given position in
    /// little-endian order.
    pub fn u32_le_ro_at(&mut self, pos: usize, value: u32) -> &mut Self {
        self.u32_le_at(pos, value, 0)
    }

    /// Place a writable 32-bit value at the given position in
    /// little-endian order.
    pub fn u32_le_rw_at(&mut self, pos: usize, value: u32) -> &mut Self {
        self.u32_le_at(pos, value, 0xFFFF_FFFF)
    }

    /// Construct the final register set from the build instructions.
    #[must_use]
    pub fn build(&self) -> RegisterSet<SIZE> {
        RegisterSet {
            data: self.data,
            rw_mask: self.rw_mask,
        }
    }
}

/// Byte-granular register storage.
///
/// Each `RegisterSet` contains a compile-time sized memory region with
/// configurable writability. Multi-byte values are little-endian, so the first field of a
/// register occupies its least significant bits.
///
/// `RegisterSets` are constructed using [`RegisterSetBuilder`].
#[derive(Debug, Clone)]
pub struct RegisterSet<const SIZE: usize> {
    data: [u8; SIZE],
    rw_mask: [u8; SIZE],
}

impl<const SIZE: usize> From<&mut RegisterSetBuilder<SIZE>> for RegisterSet<SIZE> {
    fn from(builder: &mut RegisterSetBuilder<SIZE>) -> Self {
        builder.build()
    }
}

impl<const SIZE: usize> From<RegisterSetBuilder<SIZE>> for RegisterSet<SIZE> {
    fn from(builder: RegisterSetBuilder<SIZE>) -> Self {
        builder.build()
    }
}

/// Fold a sequence of bytes into a little-endian value.
///
/// **Note**: This function will cause a runtime error in case the
/// iterator yields more bytes than fit into an u32.
fn fold_iter_le(it: impl Iterator<Item = u8>) -> u32 {
    it.enumerate().fold(0, |acc, (pos, byte)| {
        let bytes_in_u32 = 4;
        assert!(pos < bytes_in_u32);

        let shifted_byte: u32 = u32::from(byte) << (pos * 8);
        acc | shifted_byte
    })
}

impl<const SIZE: usize> RegisterSet<SIZE> {
    /// The size of the register block in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        SIZE
    }

    /// Read the current value of the requested bytes.
    #[must_use]
    pub fn read(&self, req: Request) -> u32 {
        fold_iter_le(req.iter_bytes().map(|r| self.data[r.offset]))
    }

    /// Write the requested bytes. Only bits covered by the write mask change.
    pub fn write(&mut self, req: Request, val: u32) {
        let le_bytes = val.to_le_bytes();

        for (req, &byte) in req.iter_bytes().zip(&le_bytes) {
            let off = req.offset;

            // Set writable bits to zero.
            self.data[off] &= !self.rw_mask[off];

            // Populate writable bits with new content.
            self.data[off] |= byte & self.rw_mask[off];
        }
    }
}
